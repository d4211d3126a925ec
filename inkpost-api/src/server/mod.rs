use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{HeaderValue, StatusCode, Uri, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use cache::PostsCache;
use inkpost_common::model::{
    Id,
    auth::{TokenEncodeError, TokenKeys, TokenValidationError},
    password::PasswordHashError,
    post::PostMarker,
};
use inkpost_db::client::{DbClient, DbError};
use json::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

mod auth;
pub mod cache;
mod json;
mod routes;

pub const API_PREFIX: &str = "/api";

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub token_keys: Arc<TokenKeys>,
    pub posts_cache: Arc<PostsCache>,
}

pub fn routes() -> ServerRouter {
    Router::new()
        .nest(API_PREFIX, routes::routes())
        .fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("Could not validate credentials: {0}")]
    InvalidToken(#[from] TokenValidationError),
    #[error("Could not validate credentials: the token's user does not exist")]
    UnknownTokenSubject,
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error(transparent)]
    TokenEncode(#[from] TokenEncodeError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_) | ServerError::PostByIdNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ServerError::PathRejection(_) | ServerError::JsonRejection(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidToken(_)
            | ServerError::UnknownTokenSubject
            | ServerError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ServerError::Database(DbError::EmailTaken(_)) => StatusCode::CONFLICT,
            ServerError::JsonResponse(_)
            | ServerError::PasswordHash(_)
            | ServerError::TokenEncode(_)
            | ServerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        // Internal failures may carry store details; clients only get the reason phrase.
        let detail = if status.is_server_error() {
            status.canonical_reason().unwrap_or_default().to_owned()
        } else {
            self.to_string()
        };
        let error_response = ErrorResponse {
            status: status.as_u16(),
            detail,
        };
        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}
