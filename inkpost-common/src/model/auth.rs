//! Signed, self-contained bearer tokens.
//!
//! Tokens are HS256 JWTs carrying the user's email as subject and an absolute
//! expiry. Nothing about them is stored server side: a token stays valid for
//! its whole lifetime.

use crate::{model::user::Email, util::PositiveDuration};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::{Error as JwtError, ErrorKind},
};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use thiserror::Error;
use time::UtcDateTime;

pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Error)]
pub enum TokenEncodeError {
    #[error("Encoding the auth token failed: {0}")]
    Encode(JwtError),
    #[error("The token expiry lies beyond the representable date range")]
    ExpiryOutOfRange,
}

#[derive(Debug, Error)]
pub enum TokenValidationError {
    #[error("The token has expired")]
    Expired,
    #[error("The token was rejected: {0}")]
    Rejected(JwtError),
}

impl From<JwtError> for TokenValidationError {
    fn from(value: JwtError) -> Self {
        if matches!(value.kind(), ErrorKind::ExpiredSignature) {
            Self::Expired
        } else {
            Self::Rejected(value)
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Claims {
    /// Email of the user the token was issued to.
    pub sub: String,
    /// Unix timestamp after which the token is no longer accepted.
    pub exp: i64,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    #[default]
    Bearer,
}

/// Response body of a successful login.
#[derive(Clone, Eq, PartialEq, Hash, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: TokenType,
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"[redacted]")
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Server-held signing material plus the lifetime given to new tokens.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: PositiveDuration,
}

impl TokenKeys {
    #[must_use]
    pub fn new(secret: &[u8], lifetime: PositiveDuration) -> Self {
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            lifetime,
        }
    }

    pub fn issue(&self, subject: &Email) -> Result<AccessToken, TokenEncodeError> {
        self.issue_at(subject, UtcDateTime::now())
    }

    /// Issues a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        subject: &Email,
        now: UtcDateTime,
    ) -> Result<AccessToken, TokenEncodeError> {
        let expires_at = now
            .checked_add(self.lifetime.get())
            .ok_or(TokenEncodeError::ExpiryOutOfRange)?;
        let claims = Claims {
            sub: subject.get().to_owned(),
            exp: expires_at.unix_timestamp(),
        };

        let access_token = encode(&Header::new(TOKEN_ALGORITHM), &claims, &self.encoding)
            .map_err(TokenEncodeError::Encode)?;

        Ok(AccessToken {
            access_token,
            token_type: TokenType::Bearer,
        })
    }

    pub fn validate(&self, token: &str) -> Result<Claims, TokenValidationError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;

        Ok(data.claims)
    }
}

impl Debug for TokenKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys")
            .field("keys", &"[redacted]")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        model::{
            auth::{TokenEncodeError, TokenKeys, TokenValidationError},
            user::Email,
        },
        util::PositiveDuration,
    };
    use time::{Duration, UtcDateTime};

    fn keys(secret: &str) -> TokenKeys {
        TokenKeys::new(secret.as_bytes(), PositiveDuration::minutes(30).unwrap())
    }

    fn email() -> Email {
        Email::new("a@x.com".to_owned()).unwrap()
    }

    #[test]
    fn issued_token_validates_to_subject() {
        let keys = keys("test-secret");
        let token = keys.issue(&email()).unwrap();

        let serialized = serde_json::to_value(&token).unwrap();
        assert_eq!(serialized["token_type"], "bearer");

        let claims = keys.validate(&token.access_token).unwrap();
        assert_eq!(claims.sub, "a@x.com");
        assert!(claims.exp > UtcDateTime::now().unix_timestamp());
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = keys("test-secret");
        let issued_at = UtcDateTime::now() - Duration::minutes(31);
        let token = keys.issue_at(&email(), issued_at).unwrap();

        assert!(matches!(
            keys.validate(&token.access_token),
            Err(TokenValidationError::Expired)
        ));
    }

    #[test]
    fn token_within_window_is_accepted() {
        let keys = keys("test-secret");
        let issued_at = UtcDateTime::now() - Duration::minutes(29);
        let token = keys.issue_at(&email(), issued_at).unwrap();

        assert!(keys.validate(&token.access_token).is_ok());
    }

    #[test]
    fn expiry_past_the_calendar_fails_instead_of_panicking() {
        let keys = TokenKeys::new(
            b"test-secret",
            PositiveDuration::minutes(10_000_000_000).unwrap(),
        );

        assert!(matches!(
            keys.issue(&email()),
            Err(TokenEncodeError::ExpiryOutOfRange)
        ));
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let token = keys("secret-one").issue(&email()).unwrap();

        assert!(matches!(
            keys("secret-two").validate(&token.access_token),
            Err(TokenValidationError::Rejected(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let keys = keys("test-secret");

        for token in ["", "not-a-jwt", "a.b.c"] {
            assert!(keys.validate(token).is_err(), "{token:?} was accepted");
        }
    }

    #[test]
    fn tampered_token_is_rejected() {
        let keys = keys("test-secret");
        let token = keys.issue(&email()).unwrap().access_token;
        let other = keys
            .issue(&Email::new("b@x.com".to_owned()).unwrap())
            .unwrap()
            .access_token;

        // Payload of one token with the signature of another.
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = other.split('.').nth(1).unwrap();
        let forged = parts.join(".");

        assert!(keys.validate(&forged).is_err());
    }
}
