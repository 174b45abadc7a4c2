//! Config validation CLI tool
//!
//! Validates a minertimer configuration file and reports any errors.

use minertimer_config::{ConfigError, StateFormat, CURRENT_CONFIG_VERSION};
use minertimer_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a minertimer configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match minertimer_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", CURRENT_CONFIG_VERSION);
            println!(
                "  Process: {} (pattern \"{}\")",
                settings.process.display_name, settings.process.pattern
            );
            println!(
                "  Limits: {} min weekdays, {} min weekends (max {})",
                settings.limits.weekday_minutes,
                settings.limits.weekend_minutes,
                settings.limits.max_minutes
            );
            println!("  Warnings at: {:?} min remaining", settings.limits.warning_minutes);
            println!(
                "  Admin password: {}",
                if settings.service.admin_password.is_some() {
                    "set"
                } else {
                    "not set (privileged commands disabled)"
                }
            );

            if settings.mqtt.enabled {
                let format = match settings.mqtt.state_format {
                    StateFormat::Plain => "plain",
                    StateFormat::Json => "json",
                };
                println!(
                    "  MQTT: {}:{} as device '{}' ({} state)",
                    settings.mqtt.host, settings.mqtt.port, settings.mqtt.device_id, format
                );
            } else {
                println!("  MQTT: disabled");
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver, CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
