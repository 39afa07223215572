//! Network identities for session negotiation
//!
//! An identity is the tuple of egress point, impersonated browser signature,
//! and locale used consistently for one session's lifetime. The backend
//! cross-checks headers against the transport fingerprint, so the tuple is
//! modeled as one immutable value threaded through both the client builder
//! and the header stamping step.

pub mod pool;

pub use pool::RotatingIdentityPool;

use serde::{Deserialize, Serialize};

/// Immutable identity for one session attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Proxy URL for the egress point; `None` means direct egress
    egress: Option<String>,
    /// Impersonated browser user-agent string
    user_agent: String,
    /// Locale advertised alongside the user agent
    locale: String,
    /// Diagnostic label of the pool slot this identity came from
    label: String,
}

impl Identity {
    /// Create a new identity
    pub fn new(
        egress: Option<String>,
        user_agent: impl Into<String>,
        locale: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            egress,
            user_agent: user_agent.into(),
            locale: locale.into(),
            label: label.into(),
        }
    }

    /// Proxy URL of the egress point, if any
    pub fn egress(&self) -> Option<&str> {
        self.egress.as_deref()
    }

    /// Impersonated user-agent string
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Advertised locale
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Diagnostic slot label
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Supplier of identities for session attempts.
///
/// Implementations decide rotation and exhaustion policy; the session layer
/// only asks for the next identity and fails the attempt when none is
/// obtainable.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Draw the identity for the next session attempt.
    async fn acquire(&self) -> crate::Result<Identity>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_accessors() {
        let identity = Identity::new(
            Some("socks5://127.0.0.1:1080".to_string()),
            "Agent/1.0",
            "de-DE",
            "slot-0",
        );

        assert_eq!(identity.egress(), Some("socks5://127.0.0.1:1080"));
        assert_eq!(identity.user_agent(), "Agent/1.0");
        assert_eq!(identity.locale(), "de-DE");
        assert_eq!(identity.label(), "slot-0");
    }

    #[test]
    fn test_direct_identity_has_no_egress() {
        let identity = Identity::new(None, "Agent/1.0", "en-US", "direct-0");
        assert_eq!(identity.egress(), None);
    }
}
