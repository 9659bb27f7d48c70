use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{AppState, auth, walls};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/walls/{username}", get(walls::get_wall))
        .route("/walls/{username}/posts", post(walls::create_post))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
