use std::sync::Arc;

use warp::{http::StatusCode, reply::Response, Rejection};

use crate::{
    actions::ingredients::{get_ingredient, list_ingredients},
    error::HtmlError,
    schema::Uuid,
    state::State,
};

use super::{json_reply, query_value};

pub async fn ingredient_list(
    query: Vec<(String, String)>,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let list = list_ingredients(query_value(&query, "name"), &state.pool).await?;
    Ok(json_reply(&list, StatusCode::OK))
}

pub async fn ingredient_detail(id: Uuid, state: Arc<State>) -> Result<Response, Rejection> {
    let ingredient = get_ingredient(id, &state.pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(json_reply(&ingredient, StatusCode::OK))
}
