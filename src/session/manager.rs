//! # Session Lifecycle Management
//!
//! This module provides the core session management for the provider. It owns
//! the single current session, drives the negotiation protocol against the
//! backend, and hands ready-to-send authenticated requests to the
//! conversation layer.
//!
//! ## Architecture
//!
//! The module is built around the [`SessionManager`] which orchestrates:
//! - Identity acquisition and transport binding
//! - The negotiation exchange and response decoding
//! - Proof-of-work challenge resolution
//! - Session finalization, consumption and replacement
//!
//! ## Lifecycle
//!
//! A manager moves through explicit phases:
//!
//! ```text
//! Uninitialized -> Refreshing -> Ready -> (Exhausted | Expired) -> Refreshing -> ...
//! ```
//!
//! with a terminal `Failed` phase when the backend demands an interactive
//! challenge. Sessions are written in one step once fully negotiated; a
//! failed refresh never clobbers the previous session.
//!
//! ## Concurrency
//!
//! Refreshes are serialized behind an async mutex: callers that need a
//! session while one is being negotiated wait for that negotiation instead of
//! starting their own. Waiters that arrive during a refresh receive its
//! outcome (the fresh session, or an equivalent copy of its error), so a
//! burst of concurrent callers costs exactly one negotiation request.
//!
//! ## Examples
//!
//! ```rust
//! use sentinel_session_provider::{SessionManager, SessionPhase, Settings};
//!
//! # tokio_test::block_on(async {
//! let settings = Settings::default();
//! let manager = SessionManager::new(settings);
//! assert_eq!(manager.phase().await, SessionPhase::Uninitialized);
//! # });
//! ```

use crate::{
    Result,
    config::Settings,
    error::{ChallengeKind, Error},
    identity::{Identity, IdentityProvider},
    pow::ProofOfWorkSolver,
    session::transport::{BackendTransport, DEVICE_ID_HEADER, PROOF_TOKEN_HEADER,
        REQUIREMENTS_TOKEN_HEADER},
    types::{NegotiationResponse, Session},
};
use chrono::Utc;
use reqwest::Method;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Lifecycle phase of a session manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session has been negotiated yet
    Uninitialized,
    /// A negotiation is in flight
    Refreshing,
    /// A usable session is held
    Ready,
    /// The held session's use quota is spent
    Exhausted,
    /// The held session's expiry has passed
    Expired,
    /// The backend demanded an interactive challenge; terminal for the
    /// current identity until [`SessionManagerGeneric::reset`]
    Failed(ChallengeKind),
}

/// Convenience type alias for a manager with the default identity pool and solver
pub type SessionManager =
    SessionManagerGeneric<crate::identity::RotatingIdentityPool, crate::pow::HashcashSolver>;

/// Main session manager
#[derive(Debug)]
pub struct SessionManagerGeneric<I, S>
where
    I: IdentityProvider,
    S: ProofOfWorkSolver,
{
    /// Configuration settings
    settings: Arc<Settings>,
    /// Identity supplier consulted once per refresh
    identities: Arc<I>,
    /// Proof-of-work solver
    solver: Arc<S>,
    /// The single current session, replaced atomically on refresh
    current: RwLock<Option<Arc<Session>>>,
    /// Transport bound to the current session's identity
    transport: RwLock<Option<Arc<BackendTransport>>>,
    /// Explicit lifecycle phase
    state: RwLock<SessionPhase>,
    /// Serializes refresh attempts; at most one negotiation in flight
    refresh_gate: Mutex<()>,
    /// Bumped after every completed refresh, successful or not
    refresh_epoch: AtomicU64,
    /// Outcome of the last failed refresh, shared with waiters
    last_failure: RwLock<Option<Arc<Error>>>,
}

impl SessionManagerGeneric<crate::identity::RotatingIdentityPool, crate::pow::HashcashSolver> {
    /// Creates a new session manager with the default identity pool and
    /// hashcash solver derived from the given configuration.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sentinel_session_provider::{SessionManager, Settings};
    ///
    /// let settings = Settings::default();
    /// let manager = SessionManager::new(settings);
    /// ```
    pub fn new(settings: Settings) -> Self {
        let identities = crate::identity::RotatingIdentityPool::from_settings(&settings);
        let solver = crate::pow::HashcashSolver::new(settings.session.pow_max_attempts);
        Self::with_components(settings, identities, solver)
    }
}

impl<I, S> SessionManagerGeneric<I, S>
where
    I: IdentityProvider,
    S: ProofOfWorkSolver,
{
    /// Creates a session manager with explicit identity provider and solver.
    ///
    /// This is the seam for alternative pool policies and for tests that
    /// record or script the external collaborators.
    pub fn with_components(settings: Settings, identities: I, solver: S) -> Self {
        Self {
            settings: Arc::new(settings),
            identities: Arc::new(identities),
            solver: Arc::new(solver),
            current: RwLock::new(None),
            transport: RwLock::new(None),
            state: RwLock::new(SessionPhase::Uninitialized),
            refresh_gate: Mutex::new(()),
            refresh_epoch: AtomicU64::new(0),
            last_failure: RwLock::new(None),
        }
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> SessionPhase {
        *self.state.read().await
    }

    /// Returns a usable session, negotiating a new one if necessary.
    ///
    /// The fast path returns the held session while it is still usable.
    /// Otherwise callers serialize on the refresh gate: the first one drives
    /// the refresh sequence (identity -> transport -> negotiation ->
    /// proof-of-work -> finalize) and everyone waiting receives the same
    /// outcome. A manager parked in `Failed` keeps returning that failure
    /// until [`Self::reset`] is called.
    pub async fn get_usable_session(&self) -> Result<Arc<Session>> {
        if let Some(session) = self.usable_current().await {
            return Ok(session);
        }

        let epoch_on_entry = self.refresh_epoch.load(Ordering::Acquire);
        let _gate = self.refresh_gate.lock().await;

        if let SessionPhase::Failed(kind) = *self.state.read().await {
            return Err(Error::unsupported_challenge(kind));
        }

        // Another caller may have refreshed while this one waited for the gate.
        if let Some(session) = self.usable_current().await {
            return Ok(session);
        }

        if self.refresh_epoch.load(Ordering::Acquire) != epoch_on_entry {
            // The refresh this caller was waiting on already completed and
            // did not leave a usable session behind: report its failure
            // rather than issuing another negotiation on its behalf.
            if let Some(failure) = self.last_failure.read().await.as_ref() {
                return Err(failure.replicate());
            }
            // It succeeded but the session was spent in the meantime; fall
            // through and negotiate a replacement.
        }

        self.refresh().await
    }

    /// Eagerly negotiate a fresh session, replacing the current one.
    ///
    /// Intended for warm-up at startup and for operators forcing a rotation;
    /// ordinary consumers should rely on [`Self::get_usable_session`]. The
    /// previous session is left untouched if the refresh fails.
    pub async fn refresh_session(&self) -> Result<Arc<Session>> {
        let _gate = self.refresh_gate.lock().await;

        if let SessionPhase::Failed(kind) = *self.state.read().await {
            return Err(Error::unsupported_challenge(kind));
        }

        self.refresh().await
    }

    /// Build an application request authorized by the current session.
    ///
    /// Consumes one use of the session quota and returns a request stamped
    /// with the identity header set plus the device id, the session token and
    /// the proof-of-work solution when one was computed. Racing consumers can
    /// drain a session between lookup and consumption; losers transparently
    /// fall back to a fresh session.
    pub async fn authorized_request(
        &self,
        method: Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder> {
        loop {
            let session = self.get_usable_session().await?;

            if session.consume().is_err() {
                // Lost the last use to a concurrent consumer; the next
                // get_usable_session observes the exhaustion and refreshes.
                continue;
            }

            let transport = self
                .transport
                .read()
                .await
                .clone()
                .ok_or_else(|| Error::internal("session present without transport"))?;

            let mut request = transport
                .stamped_request(method, path)?
                .header(DEVICE_ID_HEADER, session.device_id())
                .header(REQUIREMENTS_TOKEN_HEADER, session.token());

            if let Some(proof) = session.proof_token() {
                request = request.header(PROOF_TOKEN_HEADER, proof);
            }

            return Ok(request);
        }
    }

    /// Clear a `Failed` phase and discard the current session.
    ///
    /// The next acquisition negotiates from scratch under the next identity
    /// the pool supplies. This is the escalation hook after an unsupported
    /// challenge condemned the previous identity.
    pub async fn reset(&self) {
        let _gate = self.refresh_gate.lock().await;
        *self.current.write().await = None;
        *self.transport.write().await = None;
        *self.last_failure.write().await = None;
        *self.state.write().await = SessionPhase::Uninitialized;
        tracing::info!("Session manager reset to uninitialized");
    }

    /// Return the held session if it still satisfies the usability
    /// invariants, demoting the phase when it no longer does.
    async fn usable_current(&self) -> Option<Arc<Session>> {
        let session = { self.current.read().await.clone() }?;

        if session.is_usable() {
            return Some(session);
        }

        let mut state = self.state.write().await;
        if *state == SessionPhase::Ready {
            *state = if session.is_expired() {
                tracing::debug!("Session {} expired", session.device_id());
                SessionPhase::Expired
            } else {
                tracing::debug!("Session {} exhausted", session.device_id());
                SessionPhase::Exhausted
            };
        }
        None
    }

    /// Drive one refresh attempt. Must be called with the gate held.
    async fn refresh(&self) -> Result<Arc<Session>> {
        let resume_phase = {
            let mut state = self.state.write().await;
            let previous = *state;
            *state = SessionPhase::Refreshing;
            previous
        };

        let outcome = self.perform_refresh().await;
        self.refresh_epoch.fetch_add(1, Ordering::AcqRel);

        match outcome {
            Ok((transport, session)) => {
                // Transport before session: a reader that sees the new
                // session must also see its transport.
                *self.transport.write().await = Some(transport);
                *self.current.write().await = Some(Arc::clone(&session));
                *self.last_failure.write().await = None;
                *self.state.write().await = SessionPhase::Ready;

                tracing::info!(
                    "Session {} ready (persona: {}, expires: {})",
                    session.device_id(),
                    session.persona(),
                    session.expires_at()
                );
                Ok(session)
            }
            Err(err) => {
                // Interactive challenges condemn the identity; every other
                // failure restores the pre-refresh phase so callers may retry.
                let next_phase = match &err {
                    Error::UnsupportedChallenge { kind } => SessionPhase::Failed(*kind),
                    _ => resume_phase,
                };
                *self.state.write().await = next_phase;

                tracing::warn!("Session refresh failed ({}): {}", err.category(), err);

                let shared = Arc::new(err);
                *self.last_failure.write().await = Some(Arc::clone(&shared));
                Err(shared.replicate())
            }
        }
    }

    /// The refresh sequence proper: identity, transport, negotiation,
    /// proof-of-work, finalization. Produces the complete session in one
    /// step or fails without side effects on the held session.
    async fn perform_refresh(&self) -> Result<(Arc<BackendTransport>, Arc<Session>)> {
        let identity = self.identities.acquire().await?;
        let transport = BackendTransport::new(identity.clone(), &self.settings)?;

        // A device id is never reused across negotiation attempts.
        let device_id = Uuid::new_v4().to_string();
        let negotiated = transport.negotiate_session(&device_id).await?;

        if let Some(kind) = negotiated.challenge_kind() {
            tracing::warn!(
                "Backend demands {} challenge for identity {}; failing closed",
                kind,
                identity.label()
            );
            return Err(Error::unsupported_challenge(kind));
        }

        let proof_token = self.resolve_proof_of_work(&negotiated, &identity)?;
        let session = self.finalize(device_id, negotiated, proof_token, identity);

        Ok((Arc::new(transport), Arc::new(session)))
    }

    /// Solve the proof-of-work challenge when the response demands one.
    ///
    /// The solver sees exactly the seed and difficulty decoded from the
    /// negotiation response and the user-agent string the backend saw in the
    /// request headers. A required challenge with an empty seed or difficulty
    /// carries nothing to solve and is skipped.
    fn resolve_proof_of_work(
        &self,
        negotiated: &NegotiationResponse,
        identity: &Identity,
    ) -> Result<Option<String>> {
        if !negotiated.proof_of_work.needs_solving() {
            return Ok(None);
        }

        let solution = self.solver.solve(
            &negotiated.proof_of_work.seed,
            &negotiated.proof_of_work.difficulty,
            identity.user_agent(),
        )?;

        Ok(Some(solution))
    }

    /// Assemble the finished session: full use quota, expiry stamped from the
    /// configured lifetime. This is the only place a session value is built.
    fn finalize(
        &self,
        device_id: String,
        negotiated: NegotiationResponse,
        proof_token: Option<String>,
        identity: Identity,
    ) -> Session {
        let expires_at =
            Utc::now() + chrono::Duration::seconds(self.settings.session.lifetime.as_secs() as i64);

        Session::new(
            device_id,
            negotiated.persona,
            negotiated.token,
            proof_token,
            expires_at,
            identity,
        )
    }
}
