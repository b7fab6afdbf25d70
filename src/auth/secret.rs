//! Process-wide HMAC signing secret.

use std::fmt;

/// Development fallback used when no secret is configured. Never safe for production.
pub const INSECURE_DEV_SECRET: &str = "dev_secret_123";

/// The signing key, resolved once at startup and immutable afterwards.
#[derive(Clone)]
pub struct SigningSecret {
    value: String,
    insecure_default: bool,
}

impl SigningSecret {
    /// Use the configured secret, or fall back to [`INSECURE_DEV_SECRET`].
    pub fn resolve(configured: Option<&str>) -> Self {
        match configured.filter(|s| !s.is_empty()) {
            Some(value) => Self {
                value: value.to_string(),
                insecure_default: false,
            },
            None => Self {
                value: INSECURE_DEV_SECRET.to_string(),
                insecure_default: true,
            },
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.value.as_bytes()
    }

    /// True when the development fallback is in use.
    pub fn is_insecure_default(&self) -> bool {
        self.insecure_default
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSecret")
            .field("value", &"<redacted>")
            .field("insecure_default", &self.insecure_default)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_flagged() {
        let secret = SigningSecret::resolve(None);
        assert!(secret.is_insecure_default());
        assert_eq!(secret.as_bytes(), INSECURE_DEV_SECRET.as_bytes());

        let empty = SigningSecret::resolve(Some(""));
        assert!(empty.is_insecure_default());
    }

    #[test]
    fn test_configured_secret_is_trusted() {
        let secret = SigningSecret::resolve(Some("prod-secret"));
        assert!(!secret.is_insecure_default());
        assert_eq!(secret.as_bytes(), b"prod-secret");
        assert!(!format!("{:?}", secret).contains("prod-secret"));
    }
}
