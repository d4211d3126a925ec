use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use inkpost_common::model::{
    Id,
    auth::TokenKeys,
    user::{User, UserMarker},
};
use inkpost_db::client::DbClient;
use std::sync::Arc;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The caller of a protected route, resolved from its bearer token.
///
/// Rejects with 401 when the header is missing or malformed, the token does
/// not validate, or its subject no longer names a stored user.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    user: User,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.user.id
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    Arc<TokenKeys>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = AuthorizationHeader::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?;

        let claims = Arc::<TokenKeys>::from_ref(state).validate(header.token())?;

        let account = Arc::<DbClient>::from_ref(state)
            .fetch_user_by_email(&claims.sub)
            .await?
            .ok_or(ServerError::UnknownTokenSubject)?;

        Ok(Self {
            user: account.user,
        })
    }
}
