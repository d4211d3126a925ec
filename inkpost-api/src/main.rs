use inkpost_common::{
    model::auth::TokenKeys,
    util::{InvalidDurationError, PositiveDuration},
};
use inkpost_db::client::{DbClient, DbError};
use serde::Deserialize;
use server::{ServerState, cache::PostsCache};
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid token lifetime: {0}")]
    TokenLifetime(#[from] InvalidDurationError),
    #[error(
        "Token lifetime of {0} minutes exceeds the maximum of {max}",
        max = MAX_TOKEN_LIFETIME_MINUTES
    )]
    TokenLifetimeTooLong(i64),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

/// One year.
const MAX_TOKEN_LIFETIME_MINUTES: i64 = 365 * 24 * 60;

#[derive(Clone, Eq, PartialEq, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    #[serde(default = "default_database_url")]
    database_url: String,
    #[serde(default = "default_database_max_connections")]
    database_max_connections: u32,
    token_secret: String,
    #[serde(default = "default_token_lifetime_minutes")]
    token_lifetime_minutes: i64,
    #[serde(default = "default_posts_cache_ttl_seconds")]
    posts_cache_ttl_seconds: u64,
    #[serde(default = "default_posts_cache_capacity")]
    posts_cache_capacity: usize,
}

fn default_database_url() -> String {
    "sqlite://inkpost.db?mode=rwc".to_owned()
}

fn default_database_max_connections() -> u32 {
    5
}

fn default_token_lifetime_minutes() -> i64 {
    30
}

fn default_posts_cache_ttl_seconds() -> u64 {
    300
}

fn default_posts_cache_capacity() -> usize {
    100
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "inkpost_api=debug,\
                inkpost_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .env file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn build_state(env: &Env) -> Result<ServerState, InitError> {
    let db_client = DbClient::connect(&env.database_url, env.database_max_connections).await?;
    db_client.migrate().await?;
    info!("Database schema is up to date");

    if env.token_lifetime_minutes > MAX_TOKEN_LIFETIME_MINUTES {
        return Err(InitError::TokenLifetimeTooLong(env.token_lifetime_minutes));
    }
    let token_lifetime = PositiveDuration::minutes(env.token_lifetime_minutes)?;
    let token_keys = TokenKeys::new(env.token_secret.as_bytes(), token_lifetime);

    let posts_cache = PostsCache::new(
        Duration::from_secs(env.posts_cache_ttl_seconds),
        env.posts_cache_capacity,
    );

    Ok(ServerState {
        db_client: Arc::new(db_client),
        token_keys: Arc::new(token_keys),
        posts_cache: Arc::new(posts_cache),
    })
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(err) => error!(error = %err, "Could not listen for Ctrl-C, shutting down"),
    }
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;
    let state = build_state(&env).await?;

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes().layer(tracing_layer).with_state(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
