use std::sync::Arc;

use warp::{
    http::{header::CONTENT_DISPOSITION, Method, StatusCode},
    hyper::body::Bytes,
    reply::{self, Response},
    Rejection, Reply,
};

use crate::{
    actions::{
        favorites::{add_to_list, list_cart_parts, remove_from_list, RecipeList},
        recipes::{
            create_recipe, delete_recipe, fetch_recipes, get_recipe, get_recipe_mut, update_recipe,
            RecipeFilter,
        },
    },
    api::types::{RecipeView, ShortRecipeView},
    error::{Error, HtmlError},
    jwt::SessionData,
    pagination::PageRequest,
    permissions::{authorize_recipe, RequestContext},
    schema::{Recipe, Uuid},
    shopping_list::ShoppingList,
    state::State,
    validation::{validate_recipe, RecipeDraft},
    SHOPPING_LIST_FILE_NAME,
};

use super::{json_reply, no_content, parse_json, query_value};

async fn load_recipe(id: Uuid, state: &State) -> Result<Recipe, Error> {
    get_recipe(id, &state.pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())
}

pub async fn recipe_collection(
    method: Method,
    session: Option<SessionData>,
    query: Vec<(String, String)>,
    body: Bytes,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let ctx = RequestContext::new(&method, session.as_ref());
    authorize_recipe(&ctx)?;
    let viewer = ctx.session.map(|s| s.user_id);

    match method {
        Method::GET | Method::HEAD => {
            let filter = RecipeFilter::from_pairs(&query)?;
            let page = PageRequest::parse(
                query_value(&query, "page"),
                query_value(&query, "limit"),
                state.config.page_size,
            )?;

            let mut page = fetch_recipes(&filter, viewer, page, &state.pool).await?;
            let recipes = std::mem::take(&mut page.results);
            let mut views = Vec::with_capacity(recipes.len());
            for recipe in recipes {
                views.push(RecipeView::load(recipe, viewer, &state.pool).await?);
            }

            Ok(json_reply(&page.with_results(views), StatusCode::OK))
        }
        Method::POST => {
            let session = ctx.require_session()?;
            let recipe = validate_recipe(parse_json::<RecipeDraft>(&body)?, true)?;
            let id = create_recipe(
                session.user_id,
                &recipe,
                &state.config.media_root,
                &state.pool,
            )
            .await?;

            let view = RecipeView::load(load_recipe(id, &state).await?, viewer, &state.pool).await?;
            Ok(json_reply(&view, StatusCode::CREATED))
        }
        _ => Err(HtmlError::MethodNotAllowed.default().into()),
    }
}

pub async fn recipe_detail(
    id: Uuid,
    method: Method,
    session: Option<SessionData>,
    body: Bytes,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let ctx = RequestContext::new(&method, session.as_ref());
    authorize_recipe(&ctx)?;
    let viewer = ctx.session.map(|s| s.user_id);

    match method {
        Method::GET | Method::HEAD => {
            let recipe = load_recipe(id, &state).await?;
            let view = RecipeView::load(recipe, viewer, &state.pool).await?;
            Ok(json_reply(&view, StatusCode::OK))
        }
        Method::PATCH | Method::PUT => {
            let current = get_recipe_mut(id, &ctx, &state.pool).await?;
            let recipe = validate_recipe(parse_json::<RecipeDraft>(&body)?, false)?;
            update_recipe(&current, &recipe, &state.config.media_root, &state.pool).await?;

            let view = RecipeView::load(load_recipe(id, &state).await?, viewer, &state.pool).await?;
            Ok(json_reply(&view, StatusCode::OK))
        }
        Method::DELETE => {
            let current = get_recipe_mut(id, &ctx, &state.pool).await?;
            delete_recipe(&current, &state.config.media_root, &state.pool).await?;
            Ok(no_content())
        }
        _ => Err(HtmlError::MethodNotAllowed.default().into()),
    }
}

/// `/recipes/{id}/favorite/` and `/recipes/{id}/shopping_cart/`.
pub async fn recipe_list_toggle(
    id: Uuid,
    list: RecipeList,
    method: Method,
    session: Option<SessionData>,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let ctx = RequestContext::new(&method, session.as_ref());
    let session = ctx.require_session()?;

    match method {
        Method::POST => {
            let recipe = load_recipe(id, &state).await?;
            add_to_list(list, recipe.id, session.user_id, &state.pool).await?;
            Ok(json_reply(&ShortRecipeView::from(recipe), StatusCode::CREATED))
        }
        Method::DELETE => {
            let recipe = load_recipe(id, &state).await?;
            remove_from_list(list, recipe.id, session.user_id, &state.pool).await?;
            Ok(no_content())
        }
        _ => Err(HtmlError::MethodNotAllowed.default().into()),
    }
}

pub async fn download_shopping_cart(
    session: SessionData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let parts = list_cart_parts(session.user_id, &state.pool).await?;
    let list = ShoppingList::from_parts(parts);

    log::debug!(
        "User {} downloaded a shopping list of {} lines",
        session.user_id,
        list.lines().len()
    );

    Ok(reply::with_header(
        list.render(),
        CONTENT_DISPOSITION,
        format!("attachment; filename={SHOPPING_LIST_FILE_NAME}"),
    )
    .into_response())
}
