use crate::server::{Result, ServerError, ServerRouter, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkpost_common::model::{
    auth::{AccessToken, TokenKeys},
    password::{PasswordHash, verify_stored},
    user::{Credentials, User},
};
use inkpost_db::client::DbClient;
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_post(signup).typed_post(login)
}

#[derive(TypedPath)]
#[typed_path("/signup")]
struct SignupPath;

async fn signup(
    SignupPath: SignupPath,
    State(db): State<Arc<DbClient>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<User>> {
    let password_hash = PasswordHash::hash(&credentials.password)?;
    let user = db.create_user(&credentials.email, &password_hash).await?;

    info!(user_id = %user.id, "User signed up");

    Ok(Json(user))
}

#[derive(TypedPath)]
#[typed_path("/login")]
struct LoginPath;

async fn login(
    LoginPath: LoginPath,
    State(db): State<Arc<DbClient>>,
    State(token_keys): State<Arc<TokenKeys>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<AccessToken>> {
    let account = db.fetch_user_by_email(credentials.email.get()).await?;

    // Unknown emails still pay for a hash verification.
    let stored = account.as_ref().map(|account| &account.password_hash);
    let verified = verify_stored(stored, &credentials.password);
    let Some(account) = account.filter(|_| verified) else {
        return Err(ServerError::InvalidCredentials);
    };

    let token = token_keys.issue(&account.user.email)?;

    info!(user_id = %account.user.id, "User logged in");

    Ok(Json(token))
}
