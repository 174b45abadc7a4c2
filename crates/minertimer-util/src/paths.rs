//! Default paths for minertimer components
//!
//! Paths are user-writable by default (no root required):
//! - Config: `$XDG_CONFIG_HOME/minertimer/config.toml` or `~/.config/minertimer/config.toml`
//! - Socket: `$XDG_RUNTIME_DIR/minertimer/minertimer.sock` or `/tmp/minertimer-$USER/minertimer.sock`
//! - Data: `$XDG_DATA_HOME/minertimer` or `~/.local/share/minertimer`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const MINERTIMER_SOCKET_ENV: &str = "MINERTIMER_SOCKET";

/// Environment variable for overriding the data directory
pub const MINERTIMER_DATA_DIR_ENV: &str = "MINERTIMER_DATA_DIR";

/// Environment variable for overriding the config file
pub const MINERTIMER_CONFIG_ENV: &str = "MINERTIMER_CONFIG";

const SOCKET_FILENAME: &str = "minertimer.sock";
const CONFIG_FILENAME: &str = "config.toml";
const DB_FILENAME: &str = "minertimer.db";
const APP_DIR: &str = "minertimer";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$MINERTIMER_CONFIG`
/// 2. `$XDG_CONFIG_HOME/minertimer/config.toml`
/// 3. `~/.config/minertimer/config.toml`
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(MINERTIMER_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the default socket path, honouring `$MINERTIMER_SOCKET`.
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(MINERTIMER_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Get the socket path without checking MINERTIMER_SOCKET.
/// Used for config defaults where the env var is checked separately.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Get the default data directory, honouring `$MINERTIMER_DATA_DIR`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(MINERTIMER_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking MINERTIMER_DATA_DIR.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Database file inside a data directory
pub fn database_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join(DB_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_contains_minertimer() {
        let path = socket_path_without_env();
        assert!(path.to_string_lossy().contains("minertimer"));
        assert!(path.to_string_lossy().ends_with(".sock"));
    }

    #[test]
    fn data_dir_contains_minertimer() {
        let path = data_dir_without_env();
        assert!(path.to_string_lossy().contains("minertimer"));
    }

    #[test]
    fn config_path_is_toml() {
        let path = default_config_path();
        assert!(path.to_string_lossy().ends_with(".toml"));
    }

    #[test]
    fn database_lives_in_data_dir() {
        let dir = PathBuf::from("/var/lib/minertimer");
        assert_eq!(database_path(&dir), dir.join("minertimer.db"));
    }
}
