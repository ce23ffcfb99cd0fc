use std::sync::Arc;

use warp::{http::StatusCode, hyper::body::Bytes, reply::Response, Rejection};

use crate::{
    actions::users::login_user,
    api::types::{LoginPayload, TokenView},
    jwt::SessionData,
    state::State,
};

use super::{json_reply, no_content, parse_json};

pub async fn token_login(body: Bytes, state: Arc<State>) -> Result<Response, Rejection> {
    let payload = parse_json::<LoginPayload>(&body)?;

    let auth_token = login_user(
        &payload.email,
        &payload.password,
        &state.config.secret_key,
        state.token_lifetime(),
        &state.pool,
    )
    .await?;

    Ok(json_reply(&TokenView { auth_token }, StatusCode::OK))
}

/// Tokens are stateless; logging out only acknowledges a valid session.
pub async fn token_logout(session: SessionData) -> Result<Response, Rejection> {
    log::debug!("User {} logged out", session.user_id);
    Ok(no_content())
}
