//! Wire types for the session negotiation exchange
//!
//! Field names match the backend's chat-requirements response byte for byte.
//! Challenge objects the backend omits decode as not-required.

use crate::error::ChallengeKind;
use serde::{Deserialize, Serialize};

/// Behavioral puzzle challenge descriptor
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArkoseChallenge {
    /// Whether the backend demands this challenge
    #[serde(default)]
    pub required: bool,
    /// Opaque challenge descriptor blob
    #[serde(default)]
    pub dx: String,
}

/// Browser verification widget descriptor
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TurnstileChallenge {
    /// Whether the backend demands this challenge
    #[serde(default)]
    pub required: bool,
}

/// Proof-of-work challenge parameters
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProofOfWorkChallenge {
    /// Whether a proof token must accompany requests
    #[serde(default)]
    pub required: bool,
    /// Server-issued seed the solution must hash over
    #[serde(default)]
    pub seed: String,
    /// Target the solution digest must satisfy
    #[serde(default)]
    pub difficulty: String,
}

impl ProofOfWorkChallenge {
    /// Whether the solver must actually run.
    ///
    /// A required flag with an empty seed or difficulty carries nothing to
    /// solve against and is treated as not required.
    pub fn needs_solving(&self) -> bool {
        self.required && !self.seed.is_empty() && !self.difficulty.is_empty()
    }
}

/// Decoded body of a successful chat-requirements response
#[derive(Debug, Clone, Deserialize)]
pub struct NegotiationResponse {
    /// Backend-assigned classification, opaque to this crate
    #[serde(default)]
    pub persona: String,
    /// Behavioral challenge flags
    #[serde(default)]
    pub arkose: ArkoseChallenge,
    /// Widget challenge flags
    #[serde(default)]
    pub turnstile: TurnstileChallenge,
    /// Proof-of-work parameters
    #[serde(rename = "proofofwork", default)]
    pub proof_of_work: ProofOfWorkChallenge,
    /// Bearer credential for the negotiated session
    pub token: String,
}

impl NegotiationResponse {
    /// Which unsupported interactive challenge the response demands, if any.
    pub fn challenge_kind(&self) -> Option<ChallengeKind> {
        if self.arkose.required {
            Some(ChallengeKind::Arkose)
        } else if self.turnstile.required {
            Some(ChallengeKind::Turnstile)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_full_body() {
        let body = r#"{
            "persona": "chatgpt-noauth",
            "arkose": {"required": false, "dx": ""},
            "turnstile": {"required": false},
            "proofofwork": {"required": true, "seed": "0.42", "difficulty": "05cdf2"},
            "token": "sess-abc"
        }"#;

        let decoded: NegotiationResponse = serde_json::from_str(body).unwrap();
        assert_eq!(decoded.persona, "chatgpt-noauth");
        assert_eq!(decoded.token, "sess-abc");
        assert!(decoded.proof_of_work.needs_solving());
        assert_eq!(decoded.proof_of_work.seed, "0.42");
        assert_eq!(decoded.challenge_kind(), None);
    }

    #[test]
    fn test_missing_challenge_objects_default_to_not_required() {
        let body = r#"{"token": "sess-minimal"}"#;
        let decoded: NegotiationResponse = serde_json::from_str(body).unwrap();
        assert!(!decoded.arkose.required);
        assert!(!decoded.turnstile.required);
        assert!(!decoded.proof_of_work.needs_solving());
        assert_eq!(decoded.persona, "");
    }

    #[test]
    fn test_missing_token_is_malformed() {
        let body = r#"{"persona": "chatgpt-noauth"}"#;
        assert!(serde_json::from_str::<NegotiationResponse>(body).is_err());
    }

    #[test]
    fn test_arkose_takes_precedence_in_challenge_kind() {
        let body = r#"{
            "arkose": {"required": true, "dx": "blob"},
            "turnstile": {"required": true},
            "token": "t"
        }"#;
        let decoded: NegotiationResponse = serde_json::from_str(body).unwrap();
        assert_eq!(decoded.challenge_kind(), Some(ChallengeKind::Arkose));
    }

    #[test]
    fn test_required_pow_with_empty_difficulty_needs_no_solving() {
        let pow = ProofOfWorkChallenge {
            required: true,
            seed: "0.1".to_string(),
            difficulty: String::new(),
        };
        assert!(!pow.needs_solving());

        let pow = ProofOfWorkChallenge {
            required: true,
            seed: String::new(),
            difficulty: "ffff".to_string(),
        };
        assert!(!pow.needs_solving());
    }
}
