//! Password gating for privileged operations

/// Validates the secret supplied with a privileged request
pub trait PasswordCheck: Send + Sync {
    fn validate(&self, secret: &str) -> bool;
}

/// Compares against a single configured password.
/// With no password configured, every request is denied.
#[derive(Clone, Default)]
pub struct ConfiguredPassword {
    expected: Option<String>,
}

impl ConfiguredPassword {
    pub fn new(expected: Option<String>) -> Self {
        Self {
            expected: expected.filter(|p| !p.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.expected.is_some()
    }
}

impl std::fmt::Debug for ConfiguredPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredPassword")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl PasswordCheck for ConfiguredPassword {
    fn validate(&self, secret: &str) -> bool {
        match &self.expected {
            Some(expected) => constant_time_eq(expected.as_bytes(), secret.as_bytes()),
            None => false,
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_configured_password() {
        let check = ConfiguredPassword::new(Some("letmein".into()));
        assert!(check.validate("letmein"));
        assert!(!check.validate("letmeout"));
        assert!(!check.validate("letmein "));
        assert!(!check.validate(""));
    }

    #[test]
    fn denies_everything_when_unset() {
        let check = ConfiguredPassword::new(None);
        assert!(!check.validate(""));
        assert!(!check.validate("anything"));

        let empty = ConfiguredPassword::new(Some(String::new()));
        assert!(!empty.is_configured());
        assert!(!empty.validate(""));
    }

    #[test]
    fn debug_hides_secret() {
        let check = ConfiguredPassword::new(Some("letmein".into()));
        assert!(!format!("{:?}", check).contains("letmein"));
    }
}
