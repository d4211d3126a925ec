//! One-way password hashing.
//!
//! Hashes are Argon2id PHC strings, so the salt and cost parameters travel
//! with the hash and [`PasswordHash::verify`] needs nothing else.

use crate::model::user::Password;
use argon2::{
    Argon2, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString},
};
use std::{
    fmt::{Debug, Formatter},
    sync::OnceLock,
};
use thiserror::Error;

pub const PASSWORD_SALT_LEN: usize = 16;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(password_hash::Error);

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hashes `password` with a freshly generated salt.
    pub fn hash(password: &Password) -> Result<Self, PasswordHashError> {
        let salt_bytes: [u8; PASSWORD_SALT_LEN] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordHashError)?;

        let hash = Argon2::default()
            .hash_password(password.get().as_bytes(), &salt)
            .map_err(PasswordHashError)?;

        Ok(Self(hash.to_string()))
    }

    /// Returns `false` both on mismatch and when the stored hash cannot be parsed.
    #[must_use]
    pub fn verify(&self, password: &Password) -> bool {
        let Ok(parsed) = password_hash::PasswordHash::new(&self.0) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.get().as_bytes(), &parsed)
            .is_ok()
    }

    /// Wraps a hash read back from the store. The string is not checked here;
    /// a malformed one simply never verifies.
    #[must_use]
    pub fn from_stored(hash: String) -> Self {
        Self(hash)
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Debug for PasswordHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PasswordHash").field(&"[redacted]").finish()
    }
}

/// Verifies `password` against the stored hash of an account, if there is
/// one. Without an account the password is checked against a throwaway hash
/// instead, so login timing does not tell registered emails apart.
#[must_use]
pub fn verify_stored(stored: Option<&PasswordHash>, password: &Password) -> bool {
    static DUMMY_HASH: OnceLock<Option<PasswordHash>> = OnceLock::new();

    if let Some(stored) = stored {
        return stored.verify(password);
    }

    let dummy = DUMMY_HASH.get_or_init(|| {
        let secret: [u8; PASSWORD_SALT_LEN] = rand::random();
        let secret = secret.iter().map(|byte| format!("{byte:02x}")).collect();
        PasswordHash::hash(&Password::new(secret)).ok()
    });
    if let Some(dummy) = dummy {
        let _ = dummy.verify(password);
    }

    false
}

#[cfg(test)]
mod tests {
    use crate::model::{
        password::{PasswordHash, verify_stored},
        user::Password,
    };

    fn password(s: &str) -> Password {
        Password::new(s.to_owned())
    }

    #[test]
    fn hash_then_verify() {
        for plain in ["pw1", "", "correct horse battery staple", "pässwörd 🔑"] {
            let hash = PasswordHash::hash(&password(plain)).unwrap();

            assert!(hash.verify(&password(plain)), "{plain:?} did not verify");
            assert!(!hash.verify(&password("something else")));
        }
    }

    #[test]
    fn salts_differ_between_calls() {
        let first = PasswordHash::hash(&password("pw1")).unwrap();
        let second = PasswordHash::hash(&password("pw1")).unwrap();

        assert_ne!(first, second);
        assert!(first.get().starts_with("$argon2id$"));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        for stored in ["", "plaintext", "$argon2id$v=19$garbage", "$2b$12$notreallybcrypt"] {
            assert!(!PasswordHash::from_stored(stored.to_owned()).verify(&password("plaintext")));
        }
    }

    #[test]
    fn missing_accounts_never_verify() {
        let hash = PasswordHash::hash(&password("pw1")).unwrap();

        assert!(verify_stored(Some(&hash), &password("pw1")));
        assert!(!verify_stored(Some(&hash), &password("pw2")));

        for plain in ["", "pw1", "00000000000000000000000000000000"] {
            assert!(!verify_stored(None, &password(plain)), "{plain:?} verified");
        }
    }
}
