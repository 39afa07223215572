//! Type definitions for session negotiation
//!
//! This module contains the wire types exchanged with the backend and the
//! credential bundle handed to the conversation layer.

pub mod negotiation;
pub mod session;

pub use negotiation::{
    ArkoseChallenge, NegotiationResponse, ProofOfWorkChallenge, TurnstileChallenge,
};
pub use session::{SESSION_USE_QUOTA, Session, SessionSummary};
