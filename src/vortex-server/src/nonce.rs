//! CSRF nonces for state-changing form posts.
//!
//! A nonce is bound to an action and a session and is valid for one
//! "tick" (half the configured lifetime) plus the tick before it, so a
//! nonce issued just before a tick boundary still gets at least half the
//! lifetime.

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

use vortex_cart::Clock;

type HmacSha256 = Hmac<Sha256>;

/// Action name for the create-link form.
pub const CREATE_LINK_ACTION: &str = "vortex-create";

/// Hex characters kept from the HMAC.
const NONCE_LENGTH: usize = 10;

/// Issues and verifies nonces.
pub struct NonceIssuer {
    secret: Vec<u8>,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for NonceIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceIssuer")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl NonceIssuer {
    pub fn new(secret: impl Into<Vec<u8>>, lifetime: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: secret.into(),
            lifetime: lifetime.max(Duration::from_secs(2)),
            clock,
        }
    }

    /// Issuer with a random 32-byte secret.
    pub fn with_random_secret(lifetime: Duration, clock: Arc<dyn Clock>) -> Self {
        let mut rng = rand::rng();
        let secret: Vec<u8> = (0..32).map(|_| rng.random()).collect();
        Self::new(secret, lifetime, clock)
    }

    fn tick(&self) -> i64 {
        let half = (self.lifetime.as_secs() / 2).max(1) as i64;
        let now = self.clock.now().timestamp();
        // Ceiling division; timestamps are positive in practice.
        (now + half - 1).div_euclid(half)
    }

    fn compute(&self, tick: i64, action: &str, session: &str) -> String {
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            // HMAC accepts keys of any length.
            Err(_) => return String::new(),
        };
        mac.update(format!("{tick}|{action}|{session}").as_bytes());
        let digest = hex::encode(mac.finalize().into_bytes());
        digest[..NONCE_LENGTH].to_string()
    }

    /// Issue a nonce for `action` on behalf of `session`.
    pub fn issue(&self, action: &str, session: &str) -> String {
        self.compute(self.tick(), action, session)
    }

    /// Check a nonce submitted with a form.
    pub fn verify(&self, nonce: &str, action: &str, session: &str) -> bool {
        if nonce.len() != NONCE_LENGTH {
            return false;
        }
        let tick = self.tick();
        [tick, tick - 1]
            .iter()
            .any(|t| constant_time_compare(&self.compute(*t, action, session), nonce))
    }
}

/// Compare two strings without short-circuiting on the first difference.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use vortex_cart::ManualClock;

    fn issuer() -> (NonceIssuer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ));
        let issuer = NonceIssuer::new("secret", Duration::from_secs(86_400), clock.clone());
        (issuer, clock)
    }

    #[test]
    fn test_issue_and_verify() {
        let (issuer, _clock) = issuer();
        let nonce = issuer.issue(CREATE_LINK_ACTION, "session-a");
        assert_eq!(nonce.len(), NONCE_LENGTH);
        assert!(issuer.verify(&nonce, CREATE_LINK_ACTION, "session-a"));
    }

    #[test]
    fn test_bound_to_session_and_action() {
        let (issuer, _clock) = issuer();
        let nonce = issuer.issue(CREATE_LINK_ACTION, "session-a");
        assert!(!issuer.verify(&nonce, CREATE_LINK_ACTION, "session-b"));
        assert!(!issuer.verify(&nonce, "other-action", "session-a"));
        assert!(!issuer.verify("", CREATE_LINK_ACTION, "session-a"));
        assert!(!issuer.verify("0123456789", CREATE_LINK_ACTION, "session-a"));
    }

    #[test]
    fn test_expires_after_two_ticks() {
        let (issuer, clock) = issuer();
        let nonce = issuer.issue(CREATE_LINK_ACTION, "s");

        clock.advance(Duration::from_secs(12 * 60 * 60));
        assert!(issuer.verify(&nonce, CREATE_LINK_ACTION, "s"));

        clock.advance(Duration::from_secs(24 * 60 * 60));
        assert!(!issuer.verify(&nonce, CREATE_LINK_ACTION, "s"));
    }

    #[test]
    fn test_different_secrets_disagree() {
        let (issuer, clock) = issuer();
        let other = NonceIssuer::new("another", Duration::from_secs(86_400), clock);
        let nonce = issuer.issue(CREATE_LINK_ACTION, "s");
        assert!(!other.verify(&nonce, CREATE_LINK_ACTION, "s"));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
