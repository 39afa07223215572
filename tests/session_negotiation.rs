//! Session Negotiation Integration Tests
//!
//! End-to-end tests for the session manager against a mocked backend:
//! - Happy-path negotiation and session finalization
//! - Proof-of-work resolution with the decoded challenge parameters
//! - Fail-closed behavior on interactive challenges
//! - Refresh failures leaving the prior session untouched
//! - Single-flight negotiation under concurrent callers
//! - Quota consumption and renegotiation

use sentinel_session_provider::{
    ChallengeKind, Error, ProofOfWorkSolver, RotatingIdentityPool, SessionManager,
    SessionManagerGeneric, SessionPhase, Settings,
    session::{DEVICE_ID_HEADER, NEGOTIATION_PATH, REQUIREMENTS_TOKEN_HEADER},
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Settings pointed at the mock backend
fn settings_for(server: &MockServer) -> Settings {
    let mut settings = Settings::default();
    settings.backend.base_url = server.uri();
    settings
}

/// Response body for a session with no challenges at all
fn plain_session_body(token: &str) -> serde_json::Value {
    json!({
        "persona": "chatgpt-noauth",
        "arkose": {"required": false, "dx": ""},
        "turnstile": {"required": false},
        "proofofwork": {"required": false, "seed": "", "difficulty": ""},
        "token": token,
    })
}

/// Solver stub that records every invocation
#[derive(Debug, Clone, Default)]
struct RecordingSolver {
    calls: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl ProofOfWorkSolver for RecordingSolver {
    fn solve(
        &self,
        seed: &str,
        difficulty: &str,
        client_identity: &str,
    ) -> sentinel_session_provider::Result<String> {
        self.calls.lock().unwrap().push((
            seed.to_string(),
            difficulty.to_string(),
            client_identity.to_string(),
        ));
        Ok("recorded-proof-token".to_string())
    }
}

#[tokio::test]
async fn test_plain_negotiation_yields_usable_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(plain_session_body("abc")))
        .expect(1)
        .mount(&server)
        .await;

    let manager = SessionManager::new(settings_for(&server));
    let session = manager.get_usable_session().await.unwrap();

    assert_eq!(session.token(), "abc");
    assert_eq!(session.persona(), "chatgpt-noauth");
    assert_eq!(session.remaining_uses(), 1);
    assert!(session.is_usable());
    assert!(session.proof_token().is_none());
    assert_eq!(manager.phase().await, SessionPhase::Ready);
}

#[tokio::test]
async fn test_returned_sessions_are_never_spent_or_expired() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(plain_session_body("abc")))
        .mount(&server)
        .await;

    let manager = SessionManager::new(settings_for(&server));
    for _ in 0..5 {
        let session = manager.get_usable_session().await.unwrap();
        assert!(session.remaining_uses() > 0);
        assert!(!session.is_expired());
    }
}

#[tokio::test]
async fn test_device_id_header_matches_bound_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(plain_session_body("abc")))
        .expect(1)
        .mount(&server)
        .await;

    let manager = SessionManager::new(settings_for(&server));
    let session = manager.get_usable_session().await.unwrap();

    // The device id is a fresh uuid bound into the session record
    assert!(uuid::Uuid::parse_str(session.device_id()).is_ok());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let sent_device_id = requests[0]
        .headers
        .get(DEVICE_ID_HEADER)
        .expect("negotiation request must carry the device id header")
        .to_str()
        .unwrap();
    assert_eq!(sent_device_id, session.device_id());
}

#[tokio::test]
async fn test_negotiation_request_carries_identity_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(plain_session_body("abc")))
        .mount(&server)
        .await;

    let mut settings = settings_for(&server);
    settings.identity.user_agents = vec!["ProbeAgent/3.0".to_string()];
    settings.identity.locales = vec!["pt-BR".to_string()];

    let manager = SessionManager::new(settings);
    manager.get_usable_session().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];
    assert_eq!(request.headers.get("user-agent").unwrap(), "ProbeAgent/3.0");
    assert_eq!(request.headers.get("oai-language").unwrap(), "pt-BR");
    assert_eq!(request.headers.get("accept-language").unwrap(), "pt-BR");
    assert_eq!(request.headers.get("sec-fetch-site").unwrap(), "same-origin");
}

#[tokio::test]
async fn test_proof_of_work_solver_sees_decoded_challenge() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "persona": "chatgpt-noauth",
            "proofofwork": {"required": true, "seed": "0.8437", "difficulty": "05cdf2"},
            "token": "pow-session",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut settings = settings_for(&server);
    settings.identity.user_agents = vec!["PowAgent/1.0".to_string()];
    let pool = RotatingIdentityPool::from_settings(&settings);
    let solver = RecordingSolver::default();
    let manager = SessionManagerGeneric::with_components(settings, pool, solver.clone());

    let session = manager.get_usable_session().await.unwrap();

    assert_eq!(session.proof_token(), Some("recorded-proof-token"));

    let calls = solver.calls.lock().unwrap();
    assert_eq!(calls.len(), 1, "solver runs exactly once per negotiation");
    assert_eq!(calls[0].0, "0.8437");
    assert_eq!(calls[0].1, "05cdf2");
    assert_eq!(calls[0].2, "PowAgent/1.0");
}

#[tokio::test]
async fn test_proof_of_work_with_real_solver() {
    let server = MockServer::start().await;
    // Half of all digests satisfy this target; solved within a few nonces
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "proofofwork": {"required": true, "seed": "0.1234", "difficulty": "8fffffff"},
            "token": "pow-session",
        })))
        .mount(&server)
        .await;

    let manager = SessionManager::new(settings_for(&server));
    let session = manager.get_usable_session().await.unwrap();

    let proof = session.proof_token().expect("proof token must be set");
    assert!(!proof.is_empty());
}

#[tokio::test]
async fn test_required_pow_with_empty_difficulty_skips_solver() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "proofofwork": {"required": true, "seed": "", "difficulty": ""},
            "token": "no-pow-session",
        })))
        .mount(&server)
        .await;

    let settings = settings_for(&server);
    let pool = RotatingIdentityPool::from_settings(&settings);
    let solver = RecordingSolver::default();
    let manager = SessionManagerGeneric::with_components(settings, pool, solver.clone());

    let session = manager.get_usable_session().await.unwrap();
    assert!(session.proof_token().is_none());
    assert!(solver.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_arkose_challenge_fails_closed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "arkose": {"required": true, "dx": "opaque-descriptor"},
            "token": "never-used",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = SessionManager::new(settings_for(&server));

    let err = manager.get_usable_session().await.unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedChallenge {
            kind: ChallengeKind::Arkose
        }
    ));
    assert_eq!(
        manager.phase().await,
        SessionPhase::Failed(ChallengeKind::Arkose)
    );

    // The failure is sticky: no further negotiation is attempted
    let err = manager.get_usable_session().await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedChallenge { .. }));
}

#[tokio::test]
async fn test_turnstile_challenge_fails_closed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "turnstile": {"required": true},
            "token": "never-used",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = SessionManager::new(settings_for(&server));
    let err = manager.get_usable_session().await.unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedChallenge {
            kind: ChallengeKind::Turnstile
        }
    ));
}

#[tokio::test]
async fn test_reset_clears_a_failed_manager() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "arkose": {"required": true, "dx": ""},
            "token": "never-used",
        })))
        .mount(&server)
        .await;

    let manager = SessionManager::new(settings_for(&server));
    let _ = manager.get_usable_session().await;
    assert!(matches!(manager.phase().await, SessionPhase::Failed(_)));

    manager.reset().await;
    assert_eq!(manager.phase().await, SessionPhase::Uninitialized);

    // With the backend no longer demanding a challenge, acquisition works again
    server.reset().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(plain_session_body("after-reset")))
        .mount(&server)
        .await;

    let session = manager.get_usable_session().await.unwrap();
    assert_eq!(session.token(), "after-reset");
}

#[tokio::test]
async fn test_rejected_negotiation_reports_status_and_keeps_prior_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(plain_session_body("survivor")))
        .expect(1)
        .mount(&server)
        .await;

    let manager = SessionManager::new(settings_for(&server));
    let first = manager.get_usable_session().await.unwrap();

    // Backend starts rate limiting; a forced refresh must fail without
    // touching the session already held.
    server.reset().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let err = manager.refresh_session().await.unwrap_err();
    assert!(matches!(err, Error::Negotiation { status: Some(429) }));

    // The prior session is untouched and still served
    let survivor = manager.get_usable_session().await.unwrap();
    assert_eq!(survivor.device_id(), first.device_id());
    assert_eq!(survivor.token(), "survivor");
    assert_eq!(manager.phase().await, SessionPhase::Ready);
}

#[tokio::test]
async fn test_slow_backend_maps_to_negotiation_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(plain_session_body("late"))
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut settings = settings_for(&server);
    settings.network.request_timeout = 1;

    let manager = SessionManager::new(settings);
    let err = manager.get_usable_session().await.unwrap_err();
    assert!(matches!(err, Error::Negotiation { status: None }));
    // Recoverable: not parked in Failed
    assert_eq!(manager.phase().await, SessionPhase::Uninitialized);
}

#[tokio::test]
async fn test_malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("certainly not json"))
        .mount(&server)
        .await;

    let manager = SessionManager::new(settings_for(&server));
    let err = manager.get_usable_session().await.unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

#[tokio::test]
async fn test_concurrent_callers_share_one_negotiation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(plain_session_body("shared")))
        .expect(1)
        .mount(&server)
        .await;

    let manager = Arc::new(SessionManager::new(settings_for(&server)));

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        tasks.spawn(async move { manager.get_usable_session().await });
    }

    let mut device_ids = Vec::new();
    while let Some(result) = tasks.join_next().await {
        let session = result.unwrap().unwrap();
        device_ids.push(session.device_id().to_string());
    }

    device_ids.sort();
    device_ids.dedup();
    assert_eq!(device_ids.len(), 1, "every caller got the same session");

    // expect(1) on the mock asserts the endpoint was hit exactly once
    server.verify().await;
}

#[tokio::test]
async fn test_concurrent_callers_share_one_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(
            ResponseTemplate::new(500).set_delay(std::time::Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let manager = Arc::new(SessionManager::new(settings_for(&server)));

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..4 {
        let manager = Arc::clone(&manager);
        tasks.spawn(async move { manager.get_usable_session().await });
    }

    while let Some(result) = tasks.join_next().await {
        let err = result.unwrap().unwrap_err();
        assert!(matches!(err, Error::Negotiation { status: Some(500) }));
    }

    server.verify().await;
}

#[tokio::test]
async fn test_spent_session_triggers_renegotiation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(plain_session_body("abc")))
        .expect(2)
        .mount(&server)
        .await;

    let manager = SessionManager::new(settings_for(&server));

    let first = manager.get_usable_session().await.unwrap();
    first.consume().unwrap();
    assert_eq!(first.remaining_uses(), 0);

    let second = manager.get_usable_session().await.unwrap();
    assert_ne!(
        second.device_id(),
        first.device_id(),
        "a spent session is replaced, never reissued"
    );
    assert_eq!(second.remaining_uses(), 1);

    server.verify().await;
}

#[tokio::test]
async fn test_authorized_request_consumes_and_stamps() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(NEGOTIATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "proofofwork": {"required": true, "seed": "0.5", "difficulty": "8fffffff"},
            "token": "stamped-token",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = SessionManager::new(settings_for(&server));

    let request = manager
        .authorized_request(reqwest::Method::POST, "/backend-anon/conversation")
        .await
        .unwrap()
        .build()
        .unwrap();

    let headers = request.headers();
    assert_eq!(headers[REQUIREMENTS_TOKEN_HEADER], "stamped-token");
    assert!(headers.contains_key(DEVICE_ID_HEADER));
    assert!(headers.contains_key("openai-sentinel-proof-token"));
    assert_eq!(request.url().path(), "/backend-anon/conversation");
}
