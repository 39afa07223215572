//! Sentinel Session Provider
//!
//! Negotiates ephemeral, anonymous access sessions against a
//! challenge-protected conversational backend and hands ready-to-send
//! authenticated requests to a higher-level conversation layer.
//!
//! # Features
//!
//! - **Session Lifecycle**: one-shot, time-boxed sessions negotiated on
//!   demand and replaced when spent or expired
//! - **Proof-of-Work**: hashcash-style challenges solved offline before a
//!   session is handed out
//! - **Identity Rotation**: every negotiation runs under a fresh
//!   proxy/user-agent/locale triple so headers and transport always agree
//! - **Fail-Closed Challenges**: interactive challenges (arkose, turnstile)
//!   are never attempted; they park the manager until an operator rotates
//!   identities
//!
//! # Architecture
//!
//! [`SessionManager`] owns the single current session and serializes
//! refreshes so concurrent callers share one negotiation. The
//! [`identity::IdentityProvider`] and [`pow::ProofOfWorkSolver`] traits are
//! the seams for the external collaborators.
//!
//! # Examples
//!
//! ```rust
//! use sentinel_session_provider::{SessionManager, Settings};
//!
//! let settings = Settings::default();
//! let manager = SessionManager::new(settings);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod pow;
pub mod session;
pub mod types;
pub mod utils;

pub use config::{ConfigLoader, Settings};
pub use error::{ChallengeKind, Error, Result};
pub use identity::{Identity, IdentityProvider, RotatingIdentityPool};
pub use pow::{HashcashSolver, ProofOfWorkSolver};
pub use session::{SessionManager, SessionManagerGeneric, SessionPhase};
pub use types::{Session, SessionSummary};
