use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::IntoResponse,
};

use scrawl_types::api::{CreatePostRequest, WallQuery};

use crate::error::ApiError;
use crate::session::SessionToken;
use crate::{AppState, run_blocking};

/// GET /walls/{username}: public, newest first.
pub async fn get_wall(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<WallQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(username) = path?;
    let Query(query) = query?;
    let posts = run_blocking(&state, move |s| s.get_wall(&username, query.limit)).await?;
    Ok(([(header::CACHE_CONTROL, "no-cache")], Json(posts)))
}

/// POST /walls/{username}/posts, authored by whoever holds the session.
pub async fn create_post(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    token: SessionToken,
    body: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(username) = path?;
    let Json(req) = body?;
    let post = run_blocking(&state, move |s| {
        s.post_to_wall(token.as_deref(), &username, &req.body)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(post)))
}
