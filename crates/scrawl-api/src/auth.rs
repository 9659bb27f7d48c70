use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;

use scrawl_types::api::{LoginRequest, LoginResponse, MeResponse, RegisterRequest, RegisterResponse};

use crate::error::ApiError;
use crate::session::{SessionToken, expired_session_cookie, session_cookie};
use crate::{AppState, run_blocking};

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let username = req.username.clone();
    let user_id =
        run_blocking(&state, move |s| s.register(&req.username, &req.password)).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id, username }),
    ))
}

/// Always starts a new session; a token the user already held stops working.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let cred = run_blocking(&state, move |s| s.login(&req.username, &req.password)).await?;

    let jar = jar.add(session_cookie(cred.token.clone()));
    Ok((
        jar,
        Json(LoginResponse {
            user_id: cred.user_id,
            username: cred.username,
            token: cred.token,
        }),
    ))
}

/// 204 whether or not the token was live.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    token: SessionToken,
) -> impl IntoResponse {
    let _ = run_blocking(&state, move |s| {
        s.logout(token.as_deref());
        Ok(())
    })
    .await;

    (jar.remove(expired_session_cookie()), StatusCode::NO_CONTENT)
}

pub async fn me(
    State(state): State<AppState>,
    token: SessionToken,
) -> Result<impl IntoResponse, ApiError> {
    let user = run_blocking(&state, move |s| s.whoami(token.as_deref())).await?;
    Ok(Json(MeResponse {
        user_id: user.id,
        username: user.username,
    }))
}
