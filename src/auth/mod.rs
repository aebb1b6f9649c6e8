//! Credentials, sessions and login throttling.

pub mod password;
pub mod session;

pub use password::{PasswordError, hash_password, verify_password};
pub use session::{CartLine, SESSION_COOKIE, Session, SessionStore};

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use rand::Rng;
use std::num::NonZeroU32;

pub const MIN_PASSWORD_LEN: usize = 8;

const PASSWORD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()-_=+[]{};:,.?";

/// Loose shape check: one `@`, non-empty local part, dotted domain.
pub fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

pub fn validate_new_password(password: &str, confirm: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters."
        ));
    }
    if password != confirm {
        return Err("The two password fields didn't match.".to_string());
    }
    Ok(())
}

/// Random password of `len` letters, digits and punctuation.
pub fn generate_password(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(PASSWORD_ALPHABET[rng.random_range(0..PASSWORD_ALPHABET.len())]))
        .collect()
}

/// Per-email limiter for login attempts.
pub type LoginLimiter = DefaultKeyedRateLimiter<String>;

pub fn login_limiter(attempts_per_minute: u32) -> LoginLimiter {
    let per_minute = NonZeroU32::new(attempts_per_minute).unwrap_or(NonZeroU32::MIN);
    RateLimiter::keyed(Quota::per_minute(per_minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(looks_like_email("admin@example.com"));
        assert!(!looks_like_email("admin"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("a b@c.com"));
        assert!(!looks_like_email("@c.com"));
    }

    #[test]
    fn password_rules() {
        assert!(validate_new_password("short", "short").is_err());
        assert!(validate_new_password("longenough", "different").is_err());
        assert!(validate_new_password("longenough", "longenough").is_ok());
    }

    #[test]
    fn generated_passwords_use_alphabet() {
        let pwd = generate_password(12);
        assert_eq!(pwd.chars().count(), 12);
        assert!(pwd.bytes().all(|b| PASSWORD_ALPHABET.contains(&b)));
    }

    #[test]
    fn limiter_blocks_after_quota() {
        let limiter = login_limiter(2);
        let key = "a@b.com".to_string();
        assert!(limiter.check_key(&key).is_ok());
        assert!(limiter.check_key(&key).is_ok());
        assert!(limiter.check_key(&key).is_err());
        assert!(limiter.check_key(&"other@b.com".to_string()).is_ok());
    }
}
