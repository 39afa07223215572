//! Session credential bundle
//!
//! A session is the negotiated credential set permitting anonymous use of the
//! backend: a device-bound bearer token with a fixed use quota and an absolute
//! expiry. The identity the session was negotiated under travels with it so
//! request stamping always agrees with the transport fingerprint.

use crate::identity::Identity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

/// Fixed use quota per negotiated session.
///
/// The backend treats these sessions as one-shot; issuing more than one
/// conversation request against the same token draws attention, so the quota
/// stays at one and exhausted sessions are simply renegotiated.
pub const SESSION_USE_QUOTA: u32 = 1;

/// A negotiated session credential bundle
#[derive(Debug)]
pub struct Session {
    /// Device identifier presented during negotiation, immutable for the
    /// session's lifetime
    device_id: String,
    /// Backend-assigned classification, opaque
    persona: String,
    /// Bearer credential returned by the backend
    token: String,
    /// Proof-of-work solution, present iff the negotiation demanded one
    proof_token: Option<String>,
    /// Uses left before the session must be replaced
    remaining_uses: AtomicU32,
    /// Absolute expiry; the session is invalid at or after this instant
    expires_at: DateTime<Utc>,
    /// Identity the session was negotiated under
    identity: Identity,
}

impl Session {
    /// Create a new session with the full use quota.
    pub fn new(
        device_id: impl Into<String>,
        persona: impl Into<String>,
        token: impl Into<String>,
        proof_token: Option<String>,
        expires_at: DateTime<Utc>,
        identity: Identity,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            persona: persona.into(),
            token: token.into(),
            proof_token,
            remaining_uses: AtomicU32::new(SESSION_USE_QUOTA),
            expires_at,
            identity,
        }
    }

    /// Device identifier bound to this session
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Backend-assigned persona
    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Bearer credential
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Proof-of-work solution, if one was required
    pub fn proof_token(&self) -> Option<&str> {
        self.proof_token.as_deref()
    }

    /// Identity the session was negotiated under
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Expiry instant
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Snapshot of the uses left
    pub fn remaining_uses(&self) -> u32 {
        self.remaining_uses.load(Ordering::Acquire)
    }

    /// Check if the session's expiry has passed
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Check if the session may still authorize a request
    pub fn is_usable(&self) -> bool {
        self.remaining_uses() > 0 && !self.is_expired()
    }

    /// Time remaining until expiry
    pub fn time_until_expiry(&self) -> chrono::Duration {
        self.expires_at - Utc::now()
    }

    /// Spend one use of the quota.
    ///
    /// Atomic with respect to concurrent consumers: the quota never goes
    /// below zero and a single remaining use is granted to exactly one
    /// caller. Returns the uses left after the decrement.
    pub fn consume(&self) -> crate::Result<u32> {
        self.remaining_uses
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |uses| {
                uses.checked_sub(1)
            })
            .map(|previous| previous - 1)
            .map_err(|_| crate::Error::SessionExhausted)
    }

    /// Serializable snapshot for diagnostics and CLI output.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            device_id: self.device_id.clone(),
            persona: self.persona.clone(),
            token: self.token.clone(),
            proof_of_work_solved: self.proof_token.is_some(),
            remaining_uses: self.remaining_uses(),
            expires_at: self.expires_at,
            user_agent: self.identity.user_agent().to_string(),
            locale: self.identity.locale().to_string(),
        }
    }
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Device identifier
    #[serde(rename = "deviceId")]
    pub device_id: String,
    /// Backend-assigned persona
    pub persona: String,
    /// Bearer credential
    pub token: String,
    /// Whether a proof-of-work solution was computed
    #[serde(rename = "proofOfWorkSolved")]
    pub proof_of_work_solved: bool,
    /// Uses left at snapshot time
    #[serde(rename = "remainingUses")]
    pub remaining_uses: u32,
    /// Expiry timestamp
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
    /// User agent of the negotiating identity
    #[serde(rename = "userAgent")]
    pub user_agent: String,
    /// Locale of the negotiating identity
    pub locale: String,
}
