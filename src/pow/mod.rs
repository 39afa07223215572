//! Proof-of-work challenge solving
//!
//! The backend throttles anonymous clients with a hashcash-style challenge:
//! the negotiation response carries a seed and a difficulty target, and the
//! client must find a payload whose SHA-512 digest over the seed falls at or
//! below the target. Solving is a pure, offline computation bounded by the
//! configured attempt budget; no network traffic is involved.

use crate::Result;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha2::{Digest, Sha512};

/// Pure proof-of-work solving contract.
///
/// `solve` must be deterministic for a given input triple and free of side
/// effects, so implementations can be swapped or recorded in tests without
/// changing session behavior.
pub trait ProofOfWorkSolver: Send + Sync {
    /// Compute a solution token for the given challenge.
    ///
    /// `client_identity` is the user-agent string of the identity performing
    /// the negotiation; the backend verifies the solution against the same
    /// string it saw in the request headers.
    fn solve(&self, seed: &str, difficulty: &str, client_identity: &str) -> Result<String>;
}

/// Default hashcash-style solver
#[derive(Debug, Clone)]
pub struct HashcashSolver {
    /// Nonce attempts before the solver gives up
    max_attempts: u32,
}

impl HashcashSolver {
    /// Create a solver with the given attempt budget.
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Whether a candidate token satisfies the challenge.
    pub fn verify(seed: &str, difficulty: &str, token: &str) -> bool {
        let digest = digest_hex(seed, token);
        let width = difficulty.len().min(digest.len());
        digest[..width] <= difficulty.to_ascii_lowercase()[..width]
    }
}

impl Default for HashcashSolver {
    fn default() -> Self {
        Self {
            max_attempts: 500_000,
        }
    }
}

impl ProofOfWorkSolver for HashcashSolver {
    fn solve(&self, seed: &str, difficulty: &str, client_identity: &str) -> Result<String> {
        let target = difficulty.to_ascii_lowercase();

        for nonce in 0..self.max_attempts {
            let payload = serde_json::json!([nonce, client_identity]).to_string();
            let candidate = BASE64.encode(payload);

            let digest = digest_hex(seed, &candidate);
            let width = target.len().min(digest.len());
            if digest[..width] <= target[..width] {
                tracing::debug!("Proof-of-work solved after {} attempt(s)", nonce + 1);
                return Ok(candidate);
            }
        }

        Err(crate::Error::solver(format!(
            "no solution within {} attempts for difficulty '{}'",
            self.max_attempts, difficulty
        )))
    }
}

/// Hex digest of the seed concatenated with a candidate token.
fn digest_hex(seed: &str, candidate: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(seed.as_bytes());
    hasher.update(candidate.as_bytes());
    hex::encode(hasher.finalize())
}
