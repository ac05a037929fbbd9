//! Anti-forgery token issuance and verification.
//!
//! One opaque random token at a time, with a fixed lifetime. `current`
//! returns the live token, minting a fresh one once the previous has
//! expired; `verify` is an equality check against the unexpired token.

use std::sync::Mutex;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::config::schema::CsrfConfig;
use crate::security::unix_millis;

struct IssuedToken {
    value: String,
    issued_at: u64,
}

pub struct AntiForgeryToken {
    slot: Mutex<Option<IssuedToken>>,
    lifetime_ms: u64,
}

impl AntiForgeryToken {
    pub fn new(config: CsrfConfig) -> Self {
        Self {
            slot: Mutex::new(None),
            lifetime_ms: config.token_lifetime_ms,
        }
    }

    /// The live token, regenerated once expired.
    pub fn current(&self) -> String {
        self.current_at(unix_millis())
    }

    pub fn current_at(&self, now: u64) -> String {
        // a poisoned slot means an issuer panicked mid-write; discard
        // whatever it left behind and mint fresh rather than panic here
        let mut slot = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                self.slot.clear_poison();
                let mut guard = poisoned.into_inner();
                *guard = None;
                guard
            }
        };
        match slot.as_ref() {
            Some(token) if now.saturating_sub(token.issued_at) < self.lifetime_ms => {
                token.value.clone()
            }
            _ => {
                let value = mint_token();
                *slot = Some(IssuedToken {
                    value: value.clone(),
                    issued_at: now,
                });
                value
            }
        }
    }

    /// True iff `presented` equals the live, unexpired token.
    pub fn verify(&self, presented: &str) -> bool {
        self.verify_at(presented, unix_millis())
    }

    pub fn verify_at(&self, presented: &str, now: u64) -> bool {
        // a token left by a panicked issuer is not trustworthy; fail closed
        let Ok(slot) = self.slot.lock() else {
            return false;
        };
        match slot.as_ref() {
            Some(token) => {
                now.saturating_sub(token.issued_at) < self.lifetime_ms
                    && token.value == presented
            }
            None => false,
        }
    }
}

fn mint_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> AntiForgeryToken {
        AntiForgeryToken::new(CsrfConfig::default())
    }

    #[test]
    fn token_is_stable_within_its_lifetime() {
        let t = tokens();
        let t0 = 1_000_000;
        let a = t.current_at(t0);
        let b = t.current_at(t0 + 3_599_999);
        assert_eq!(a, b);
        assert!(t.verify_at(&a, t0 + 1_000));
    }

    #[test]
    fn expired_token_fails_verification_and_rotates() {
        let t = tokens();
        let t0 = 1_000_000;
        let a = t.current_at(t0);

        assert!(!t.verify_at(&a, t0 + 3_600_000));
        let b = t.current_at(t0 + 3_600_000);
        assert_ne!(a, b);
        assert!(t.verify_at(&b, t0 + 3_600_001));
    }

    #[test]
    fn poisoned_slot_degrades_instead_of_panicking() {
        let t = std::sync::Arc::new(tokens());
        let a = t.current_at(1_000_000);

        let t2 = t.clone();
        let _ = std::thread::spawn(move || {
            let _guard = t2.slot.lock().unwrap();
            panic!("poison the slot");
        })
        .join();

        assert!(!t.verify_at(&a, 1_000_001));
        let b = t.current_at(1_000_002);
        assert_ne!(a, b);
        assert!(t.verify_at(&b, 1_000_003));
    }

    #[test]
    fn wrong_value_never_verifies() {
        let t = tokens();
        t.current_at(1_000_000);
        assert!(!t.verify_at("forged", 1_000_001));
    }
}
