use crate::domain::{Money, Quantity};
use base64::Engine as _;
use moka::ops::compute::Op;
use moka::sync::Cache;
use rand::RngCore;
use ring::digest;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Name of the private cookie carrying the session token.
pub const SESSION_COOKIE: &str = "dryfruits_session";

/// One line of the billing cart. `price` is per kilogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: i64,
    pub quality_id: i64,
    pub quantity: Quantity,
    pub price: Money,
}

impl CartLine {
    pub fn subtotal(&self) -> Money {
        self.price.times_quantity(self.quantity)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user_id: i64,
    pub cart: Vec<CartLine>,
}

/// SHA-256 of the lowercased email and the password, as presented by a Basic client.
fn credential_fingerprint(email: &str, password: &str) -> String {
    let mut ctx = digest::Context::new(&digest::SHA256);
    ctx.update(email.trim().to_lowercase().as_bytes());
    ctx.update(&[0]);
    ctx.update(password.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(ctx.finish())
}

/// In-process session table; entries expire after `ttl` without access.
///
/// Also remembers Basic credentials that already passed a full password check,
/// so repeat requests skip the key derivation and the login limiter.
#[derive(Clone)]
pub struct SessionStore {
    cache: Cache<String, Session>,
    verified: Cache<String, i64>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(10_000)
                .time_to_idle(ttl)
                .build(),
            verified: Cache::builder()
                .max_capacity(10_000)
                .time_to_idle(ttl)
                .build(),
        }
    }

    fn generate_token() -> String {
        // 256 bits => 43 chars base64url (no padding).
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn create(&self, user_id: i64) -> String {
        let token = Self::generate_token();
        self.cache.insert(
            token.clone(),
            Session {
                user_id,
                cart: Vec::new(),
            },
        );
        token
    }

    /// Returns the session under `key`, creating an empty one for `user_id` if absent.
    ///
    /// Used for clients authenticating per request, which carry no cookie.
    pub fn attach(&self, key: &str, user_id: i64) -> Session {
        self.cache.get_with(key.to_string(), || Session {
            user_id,
            cart: Vec::new(),
        })
    }

    pub fn get(&self, token: &str) -> Option<Session> {
        self.cache.get(token)
    }

    /// Applies `f` to the cart of `token` and stores the result.
    ///
    /// The read-modify-write runs under the entry lock, so concurrent updates of
    /// one session are applied one after the other.
    pub fn update_cart<R>(
        &self,
        token: &str,
        f: impl FnOnce(&mut Vec<CartLine>) -> R,
    ) -> Option<R> {
        let mut out = None;
        self.cache
            .entry_by_ref(token)
            .and_compute_with(|entry| match entry {
                Some(entry) => {
                    let mut session = entry.into_value();
                    out = Some(f(&mut session.cart));
                    Op::Put(session)
                }
                None => Op::Nop,
            });
        out
    }

    /// User id for Basic credentials that were verified earlier.
    pub fn verified_basic(&self, email: &str, password: &str) -> Option<i64> {
        self.verified.get(&credential_fingerprint(email, password))
    }

    pub fn remember_basic(&self, email: &str, password: &str, user_id: i64) {
        self.verified
            .insert(credential_fingerprint(email, password), user_id);
    }

    pub fn remove(&self, token: &str) {
        self.cache.invalidate(token);
    }

    /// Drops every session of a user (deactivation, password reset).
    pub fn remove_user(&self, user_id: i64) {
        let tokens: Vec<String> = self
            .cache
            .iter()
            .filter(|(_, s)| s.user_id == user_id)
            .map(|(k, _)| (*k).clone())
            .collect();
        for token in tokens {
            self.cache.invalidate(&token);
        }
        let fingerprints: Vec<String> = self
            .verified
            .iter()
            .filter(|(_, id)| *id == user_id)
            .map(|(k, _)| (*k).clone())
            .collect();
        for fingerprint in fingerprints {
            self.verified.invalidate(&fingerprint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_updates_persist() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create(7);
        assert_eq!(token.len(), 43);

        let count = store.update_cart(&token, |cart| {
            cart.push(CartLine {
                product_id: 1,
                quality_id: 2,
                quantity: Quantity(500),
                price: Money(80_000),
            });
            cart.len()
        });
        assert_eq!(count, Some(1));

        let session = store.get(&token).unwrap();
        assert_eq!(session.user_id, 7);
        assert_eq!(session.cart[0].subtotal(), Money(40_000));

        store.remove_user(7);
        assert!(store.get(&token).is_none());
        assert!(store.update_cart(&token, |c| c.len()).is_none());
    }

    #[test]
    fn concurrent_cart_updates_keep_every_line() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create(1);
        std::thread::scope(|scope| {
            for worker in 0..8_i64 {
                let store = &store;
                let token = token.as_str();
                scope.spawn(move || {
                    for i in 0..25_i64 {
                        store.update_cart(token, |cart| {
                            cart.push(CartLine {
                                product_id: worker,
                                quality_id: i,
                                quantity: Quantity(1_000),
                                price: Money(100),
                            });
                        });
                    }
                });
            }
        });
        assert_eq!(store.get(&token).unwrap().cart.len(), 200);
    }

    #[test]
    fn verified_basic_credentials_are_dropped_with_the_user() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.remember_basic("Admin@Example.com", "pass-word-1", 5);
        assert_eq!(store.verified_basic("admin@example.com", "pass-word-1"), Some(5));
        assert_eq!(store.verified_basic("admin@example.com", "pass-word-2"), None);

        store.remove_user(5);
        assert_eq!(store.verified_basic("admin@example.com", "pass-word-1"), None);
    }

    #[test]
    fn attach_reuses_existing_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.attach("basic:3", 3);
        store.update_cart("basic:3", |cart| {
            cart.push(CartLine {
                product_id: 1,
                quality_id: 1,
                quantity: Quantity(1_000),
                price: Money(10_000),
            });
        });
        assert_eq!(store.attach("basic:3", 3).cart.len(), 1);
    }
}
