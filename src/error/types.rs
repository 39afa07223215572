//! Error types for session negotiation
//!
//! Classifies every failure of the acquisition pipeline so callers can tell
//! recoverable conditions (retry with a fresh identity) from conditions that
//! are fatal for the current identity.

use thiserror::Error;

/// Interactive challenge kinds the backend may demand.
///
/// Neither kind can be solved by this crate; encountering one is terminal for
/// the identity that triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    /// Behavioral puzzle challenge
    Arkose,
    /// Browser verification widget
    Turnstile,
}

impl std::fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChallengeKind::Arkose => write!(f, "arkose"),
            ChallengeKind::Turnstile => write!(f, "turnstile"),
        }
    }
}

/// Main error type for the session provider
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request errors outside the negotiation exchange
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No identity could be drawn from the pool
    #[error("no identity available: {reason}")]
    IdentityUnavailable {
        /// Why the pool could not supply an identity
        reason: String,
    },

    /// The identity-bound HTTP client could not be built
    #[error("transport construction failed: {reason}")]
    TransportConstruction {
        /// Builder or proxy failure description
        reason: String,
    },

    /// The backend rejected or did not answer the negotiation request
    #[error("session negotiation failed: {}", negotiation_detail(.status))]
    Negotiation {
        /// HTTP status of the rejection, `None` for timeout/connection loss
        status: Option<u16>,
    },

    /// The negotiation response body was not well-formed
    #[error("negotiation response decode failed: {reason}")]
    Decode {
        /// Parser failure description
        reason: String,
    },

    /// The backend demanded an interactive challenge this crate cannot solve
    #[error("unsupported {kind} challenge required by backend")]
    UnsupportedChallenge {
        /// Which challenge kind was demanded
        kind: ChallengeKind,
    },

    /// The proof-of-work solver could not produce a solution
    #[error("proof-of-work solver failed: {reason}")]
    Solver {
        /// Solver failure description
        reason: String,
    },

    /// The current session's use quota is spent
    #[error("session use quota exhausted")]
    SessionExhausted,

    /// Configuration errors
    #[error("Configuration error in {field}: {message}")]
    Config {
        /// The configuration field that has an error
        field: String,
        /// Error message describing the issue
        message: String,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal issue
        message: String,
    },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Display detail for negotiation failures
fn negotiation_detail(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "timed out or unreachable".to_string(),
    }
}

impl Error {
    /// Create an identity-unavailable error
    pub fn identity_unavailable<S: Into<String>>(reason: S) -> Self {
        Self::IdentityUnavailable {
            reason: reason.into(),
        }
    }

    /// Create a transport construction error
    pub fn transport<S: Into<String>>(reason: S) -> Self {
        Self::TransportConstruction {
            reason: reason.into(),
        }
    }

    /// Create a negotiation error carrying the rejecting HTTP status
    pub fn negotiation_status(status: u16) -> Self {
        Self::Negotiation {
            status: Some(status),
        }
    }

    /// Create a negotiation error for a timeout or connection failure
    pub fn negotiation_timeout() -> Self {
        Self::Negotiation { status: None }
    }

    /// Create a decode error
    pub fn decode<S: Into<String>>(reason: S) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// Create an unsupported-challenge error
    pub fn unsupported_challenge(kind: ChallengeKind) -> Self {
        Self::UnsupportedChallenge { kind }
    }

    /// Create a solver error
    pub fn solver<S: Into<String>>(reason: S) -> Self {
        Self::Solver {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(field: S, message: S) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this is a retryable error
    ///
    /// Retryable failures should be retried with a *fresh* identity and a
    /// fresh device id, never by replaying the failed attempt verbatim.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::IdentityUnavailable { .. } => true,
            Error::TransportConstruction { .. } => true,
            Error::Negotiation { .. } => true,
            Error::Decode { .. } => true,
            // A retried negotiation issues a fresh seed, so a failed solve
            // does not doom the next attempt.
            Error::Solver { .. } => true,
            Error::SessionExhausted => true,
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Check if this failure condemns the identity that produced it
    ///
    /// An interactive challenge means the backend has flagged the current
    /// egress/fingerprint combination; replaying it would trip the same wall.
    pub fn is_fatal_for_identity(&self) -> bool {
        matches!(self, Error::UnsupportedChallenge { .. })
    }

    /// Get error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            Error::Http(..) => "http",
            Error::Json(..) => "json",
            Error::Toml(..) => "toml",
            Error::Url(..) => "url",
            Error::Io(..) => "io",
            Error::IdentityUnavailable { .. } => "identity",
            Error::TransportConstruction { .. } => "transport",
            Error::Negotiation { .. } => "negotiation",
            Error::Decode { .. } => "decode",
            Error::UnsupportedChallenge { .. } => "challenge",
            Error::Solver { .. } => "solver",
            Error::SessionExhausted => "quota",
            Error::Config { .. } => "config",
            Error::Internal { .. } => "internal",
        }
    }

    /// Reproduce this error for a second caller awaiting the same refresh.
    ///
    /// Every error the refresh pipeline can produce carries plain owned data,
    /// so waiters that arrived while the refresh was in flight receive an
    /// equivalent value instead of an opaque "refresh failed" wrapper.
    pub(crate) fn replicate(&self) -> Self {
        match self {
            Error::IdentityUnavailable { reason } => Error::IdentityUnavailable {
                reason: reason.clone(),
            },
            Error::TransportConstruction { reason } => Error::TransportConstruction {
                reason: reason.clone(),
            },
            Error::Negotiation { status } => Error::Negotiation { status: *status },
            Error::Decode { reason } => Error::Decode {
                reason: reason.clone(),
            },
            Error::UnsupportedChallenge { kind } => Error::UnsupportedChallenge { kind: *kind },
            Error::Solver { reason } => Error::Solver {
                reason: reason.clone(),
            },
            Error::SessionExhausted => Error::SessionExhausted,
            Error::Config { field, message } => Error::Config {
                field: field.clone(),
                message: message.clone(),
            },
            other => Error::Internal {
                message: other.to_string(),
            },
        }
    }
}
