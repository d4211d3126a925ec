use crate::server::{
    Result, ServerError, ServerRouter, auth::AuthenticatedUser, cache::PostsCache, json::Json,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use inkpost_common::model::{
    Id,
    post::{Post, PostContent, PostMarker},
};
use inkpost_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(add_post)
        .typed_get(get_posts)
        .typed_delete(delete_post)
}

#[derive(TypedPath)]
#[typed_path("/addpost")]
struct AddPostPath;

async fn add_post(
    AddPostPath: AddPostPath,
    State(db): State<Arc<DbClient>>,
    State(cache): State<Arc<PostsCache>>,
    user: AuthenticatedUser,
    Json(content): Json<PostContent>,
) -> Result<Json<Post>> {
    let post = db.create_post(&content, user.user_id()).await?;
    cache.invalidate(user.user_id());

    Ok(Json(post))
}

#[derive(TypedPath)]
#[typed_path("/getposts")]
struct GetPostsPath;

async fn get_posts(
    GetPostsPath: GetPostsPath,
    State(db): State<Arc<DbClient>>,
    State(cache): State<Arc<PostsCache>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Post>>> {
    let user_id = user.user_id();

    if let Some(posts) = cache.get(user_id) {
        debug!(%user_id, "Serving posts from cache");
        return Ok(Json(posts));
    }

    let generation = cache.generation();
    let posts = db.fetch_user_posts(user_id).await?;
    cache.insert(user_id, generation, posts.clone());

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/deletepost/{post_id}", rejection(ServerError))]
struct DeletePostPath {
    post_id: Id<PostMarker>,
}

async fn delete_post(
    DeletePostPath { post_id }: DeletePostPath,
    State(db): State<Arc<DbClient>>,
    State(cache): State<Arc<PostsCache>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    if !db.delete_post(post_id, user.user_id()).await? {
        return Err(ServerError::PostByIdNotFound(post_id));
    }
    cache.invalidate(user.user_id());

    Ok(StatusCode::NO_CONTENT)
}
