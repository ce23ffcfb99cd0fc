use std::sync::Arc;

use warp::{
    http::{Method, StatusCode},
    hyper::body::Bytes,
    reply::Response,
    Rejection,
};

use crate::{
    actions::tags::{create_tag, delete_tag, get_tag, list_tags, update_tag},
    error::HtmlError,
    jwt::SessionData,
    schema::{Tag, Uuid},
    state::State,
    validation::{validate_tag, TagDraft},
};

use super::{json_reply, no_content, parse_json};

fn actor(session: Option<&SessionData>) -> String {
    session
        .map(|s| format!("User {}", s.user_id))
        .unwrap_or_else(|| String::from("Anonymous client"))
}

pub async fn tag_collection(
    method: Method,
    session: Option<SessionData>,
    body: Bytes,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    match method {
        Method::GET | Method::HEAD => {
            let list = list_tags(&state.pool).await?;
            Ok(json_reply(&list, StatusCode::OK))
        }
        Method::POST => {
            let tag = validate_tag(parse_json::<TagDraft>(&body)?)?;
            let tag = create_tag(&tag, &state.pool).await?;

            log::info!("{} created tag {}", actor(session.as_ref()), tag.slug);
            Ok(json_reply(&tag, StatusCode::CREATED))
        }
        _ => Err(HtmlError::MethodNotAllowed.default().into()),
    }
}

/// PATCH keeps the stored value of every field the body leaves out.
fn merge_draft(mut draft: TagDraft, current: Tag) -> TagDraft {
    draft.name = draft.name.or(Some(current.name));
    draft.color = draft.color.or(Some(current.color));
    draft.slug = draft.slug.or(Some(current.slug));
    draft
}

pub async fn tag_detail(
    id: Uuid,
    method: Method,
    session: Option<SessionData>,
    body: Bytes,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let current = get_tag(id, &state.pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    match method {
        Method::GET | Method::HEAD => Ok(json_reply(&current, StatusCode::OK)),
        Method::PUT | Method::PATCH => {
            let mut draft = parse_json::<TagDraft>(&body)?;
            if method == Method::PATCH {
                draft = merge_draft(draft, current);
            }
            let tag = validate_tag(draft)?;
            let tag = update_tag(id, &tag, &state.pool)
                .await?
                .ok_or_else(|| HtmlError::NotFound.default())?;

            log::info!("{} updated tag {}", actor(session.as_ref()), tag.slug);
            Ok(json_reply(&tag, StatusCode::OK))
        }
        Method::DELETE => {
            if !delete_tag(id, &state.pool).await? {
                return Err(HtmlError::NotFound.default().into());
            }
            log::info!("{} deleted tag {id}", actor(session.as_ref()));
            Ok(no_content())
        }
        _ => Err(HtmlError::MethodNotAllowed.default().into()),
    }
}
