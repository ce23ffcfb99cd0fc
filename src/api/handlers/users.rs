use std::sync::Arc;

use warp::{
    http::{Method, StatusCode},
    hyper::body::Bytes,
    reply::Response,
    Rejection,
};

use crate::{
    actions::{
        subscriptions::{fetch_subscriptions, subscribe, unsubscribe},
        users::{fetch_users, get_user_by_id, register_user, set_password},
    },
    api::types::{CreatedUserView, SetPasswordPayload, SubscriptionView, UserView},
    error::{Error, FieldErrors, HtmlError},
    jwt::SessionData,
    pagination::PageRequest,
    permissions::{authorize_profile, ProfileTarget, RequestContext},
    schema::{User, Uuid},
    state::State,
    validation::{validate_user, UserDraft},
};

use super::{json_reply, no_content, parse_json, query_value};

async fn load_user(id: Uuid, state: &State) -> Result<User, Error> {
    get_user_by_id(id, &state.pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())
}

fn parse_page(query: &[(String, String)], state: &State) -> Result<PageRequest, Error> {
    PageRequest::parse(
        query_value(query, "page"),
        query_value(query, "limit"),
        state.config.page_size,
    )
}

/// `recipes_limit` must be a non-negative integer when present.
pub fn parse_recipes_limit(value: Option<&str>) -> Result<Option<i64>, Error> {
    let value = match value {
        Some(value) => value.trim(),
        None => return Ok(None),
    };

    match value.parse::<i64>() {
        Ok(limit) if limit >= 0 => Ok(Some(limit)),
        _ => {
            let mut errors = FieldErrors::new();
            errors.insert(
                String::from("recipes_limit"),
                vec![String::from("Ensure this value is a non-negative integer.")],
            );
            Err(HtmlError::InvalidRequest.fields(errors))
        }
    }
}

pub async fn user_collection(
    method: Method,
    session: Option<SessionData>,
    query: Vec<(String, String)>,
    body: Bytes,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    if method == Method::POST {
        let user = validate_user(parse_json::<UserDraft>(&body)?)?;
        let user = register_user(&user, &state.pool).await?;
        return Ok(json_reply(&CreatedUserView::from(user), StatusCode::CREATED));
    }

    let ctx = RequestContext::new(&method, session.as_ref());
    authorize_profile(&ctx, ProfileTarget::Collection)?;
    let viewer = ctx.session.map(|s| s.user_id);

    let mut page = fetch_users(parse_page(&query, &state)?, &state.pool).await?;
    let users = std::mem::take(&mut page.results);
    let mut views = Vec::with_capacity(users.len());
    for user in users {
        views.push(UserView::load(user, viewer, &state.pool).await?);
    }

    Ok(json_reply(&page.with_results(views), StatusCode::OK))
}

pub async fn user_me(
    method: Method,
    session: Option<SessionData>,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let ctx = RequestContext::new(&method, session.as_ref());
    authorize_profile(&ctx, ProfileTarget::Me)?;
    let session = ctx.require_session()?;

    let user = load_user(session.user_id, &state).await?;
    Ok(json_reply(&UserView::new(user, false), StatusCode::OK))
}

pub async fn user_detail(
    id: Uuid,
    method: Method,
    session: Option<SessionData>,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let ctx = RequestContext::new(&method, session.as_ref());
    authorize_profile(&ctx, ProfileTarget::Object)?;
    if !ctx.is_safe() {
        return Err(HtmlError::MethodNotAllowed.default().into());
    }

    let viewer = ctx.session.map(|s| s.user_id);
    let user = load_user(id, &state).await?;
    let view = UserView::load(user, viewer, &state.pool).await?;
    Ok(json_reply(&view, StatusCode::OK))
}

pub async fn user_set_password(
    session: SessionData,
    body: Bytes,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let payload = parse_json::<SetPasswordPayload>(&body)?;
    if payload.new_password.trim().is_empty() {
        let mut errors = FieldErrors::new();
        errors.insert(
            String::from("new_password"),
            vec![String::from("This field may not be blank.")],
        );
        return Err(HtmlError::InvalidRequest.fields(errors).into());
    }

    set_password(
        session.user_id,
        &payload.current_password,
        &payload.new_password,
        &state.pool,
    )
    .await?;

    log::info!("User {} changed their password", session.user_id);
    Ok(no_content())
}

pub async fn user_subscriptions(
    session: SessionData,
    query: Vec<(String, String)>,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let page = parse_page(&query, &state)?;
    let recipes_limit = parse_recipes_limit(query_value(&query, "recipes_limit"))?;

    let mut page = fetch_subscriptions(session.user_id, page, &state.pool).await?;
    let authors = std::mem::take(&mut page.results);
    let mut views = Vec::with_capacity(authors.len());
    for author in authors {
        views.push(SubscriptionView::load(author, session.user_id, recipes_limit, &state.pool).await?);
    }

    Ok(json_reply(&page.with_results(views), StatusCode::OK))
}

/// `/users/{id}/subscribe/`. Subscribing to oneself is refused before any
/// lookup.
pub async fn user_subscribe(
    id: Uuid,
    method: Method,
    session: Option<SessionData>,
    query: Vec<(String, String)>,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let ctx = RequestContext::new(&method, session.as_ref());
    let session = ctx.require_session()?;

    if ![Method::POST, Method::DELETE].contains(&method) {
        return Err(HtmlError::MethodNotAllowed.default().into());
    }
    if id == session.user_id {
        return Err(HtmlError::InvalidRequest
            .new("You cannot subscribe to yourself.")
            .into());
    }

    let author = load_user(id, &state).await?;

    if method == Method::POST {
        let recipes_limit = parse_recipes_limit(query_value(&query, "recipes_limit"))?;
        subscribe(author.id, session.user_id, &state.pool).await?;
        let view = SubscriptionView::load(author, session.user_id, recipes_limit, &state.pool).await?;
        Ok(json_reply(&view, StatusCode::CREATED))
    } else {
        unsubscribe(author.id, session.user_id, &state.pool).await?;
        Ok(no_content())
    }
}
