//! Session negotiation and lifecycle
//!
//! This module contains the session manager driving the negotiation protocol
//! and the identity-bound transport that carries it.

pub mod manager;
pub mod transport;

pub use manager::{SessionManager, SessionManagerGeneric, SessionPhase};
pub use transport::{
    BackendTransport, DEVICE_ID_HEADER, NEGOTIATION_PATH, PROOF_TOKEN_HEADER,
    REQUIREMENTS_TOKEN_HEADER,
};
