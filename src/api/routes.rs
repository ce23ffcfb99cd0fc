use std::{convert::Infallible, sync::Arc};

use futures_util::{pin_mut, Stream, TryStreamExt};
use warp::{
    hyper::body::{Buf, Bytes},
    Filter, Rejection, Reply,
};

use crate::{
    actions::favorites::RecipeList,
    api::{
        handlers::{auth, ingredients, recipes, tags, users},
        rejection::handle_rejection,
    },
    error::HtmlError,
    middleware::{with_possible_session, with_session, with_valid_token},
    schema::Uuid,
    state::State,
    MAX_BODY_SIZE,
};

fn with_state(state: Arc<State>) -> impl Filter<Extract = (Arc<State>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn with_list(list: RecipeList) -> impl Filter<Extract = (RecipeList,), Error = Infallible> + Clone {
    warp::any().map(move || list)
}

fn query_pairs() -> impl Filter<Extract = (Vec<(String, String)>,), Error = Rejection> + Clone {
    warp::query::<Vec<(String, String)>>()
}

/// Buffers the request body, giving up with a 413 once it passes
/// `MAX_BODY_SIZE`. Chunked bodies are counted as they arrive.
async fn collect_body<S, B>(length: Option<u64>, stream: S) -> Result<Bytes, Rejection>
where
    S: Stream<Item = Result<B, warp::Error>>,
    B: Buf,
{
    if length.is_some_and(|length| length > MAX_BODY_SIZE as u64) {
        return Err(HtmlError::PayloadTooLarge.default().into());
    }

    pin_mut!(stream);
    let mut body = Vec::new();
    while let Some(mut chunk) = stream.try_next().await.map_err(|e| {
        log::debug!("Failed to read request body: {e}");
        HtmlError::InvalidRequest.new("Failed to read request body.")
    })? {
        if body.len() + chunk.remaining() > MAX_BODY_SIZE {
            return Err(HtmlError::PayloadTooLarge.default().into());
        }
        while chunk.has_remaining() {
            let part = chunk.chunk();
            let read = part.len();
            body.extend_from_slice(part);
            chunk.advance(read);
        }
    }
    Ok(Bytes::from(body))
}

fn limited_body() -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and(warp::body::stream())
        .and_then(collect_body)
}

fn ingredient_routes(
    state: Arc<State>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("ingredients")
        .and(warp::get())
        .and(with_valid_token(state.clone()))
        .and(query_pairs())
        .and(with_state(state.clone()))
        .and_then(ingredients::ingredient_list);

    let detail = warp::path!("ingredients" / Uuid)
        .and(warp::get())
        .and(with_valid_token(state.clone()))
        .and(with_state(state))
        .and_then(ingredients::ingredient_detail);

    list.or(detail)
}

fn tag_routes(state: Arc<State>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let collection = warp::path!("tags")
        .and(warp::method())
        .and(with_possible_session(state.clone()))
        .and(limited_body())
        .and(with_state(state.clone()))
        .and_then(tags::tag_collection);

    let detail = warp::path!("tags" / Uuid)
        .and(warp::method())
        .and(with_possible_session(state.clone()))
        .and(limited_body())
        .and(with_state(state))
        .and_then(tags::tag_detail);

    collection.or(detail)
}

fn recipe_routes(
    state: Arc<State>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipes::download_shopping_cart);

    let favorite = warp::path!("recipes" / Uuid / "favorite")
        .and(with_list(RecipeList::Favorites))
        .and(warp::method())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipes::recipe_list_toggle);

    let shopping_cart = warp::path!("recipes" / Uuid / "shopping_cart")
        .and(with_list(RecipeList::ShoppingCart))
        .and(warp::method())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipes::recipe_list_toggle);

    let detail = warp::path!("recipes" / Uuid)
        .and(warp::method())
        .and(with_possible_session(state.clone()))
        .and(limited_body())
        .and(with_state(state.clone()))
        .and_then(recipes::recipe_detail);

    let collection = warp::path!("recipes")
        .and(warp::method())
        .and(with_possible_session(state.clone()))
        .and(query_pairs())
        .and(limited_body())
        .and(with_state(state))
        .and_then(recipes::recipe_collection);

    download
        .or(favorite)
        .or(shopping_cart)
        .or(detail)
        .or(collection)
}

fn user_routes(state: Arc<State>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let me = warp::path!("users" / "me")
        .and(warp::method())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(users::user_me);

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(query_pairs())
        .and(with_state(state.clone()))
        .and_then(users::user_subscriptions);

    let set_password = warp::path!("users" / "set_password")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(limited_body())
        .and(with_state(state.clone()))
        .and_then(users::user_set_password);

    let subscribe = warp::path!("users" / Uuid / "subscribe")
        .and(warp::method())
        .and(with_possible_session(state.clone()))
        .and(query_pairs())
        .and(with_state(state.clone()))
        .and_then(users::user_subscribe);

    let detail = warp::path!("users" / Uuid)
        .and(warp::method())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(users::user_detail);

    let collection = warp::path!("users")
        .and(warp::method())
        .and(with_possible_session(state.clone()))
        .and(query_pairs())
        .and(limited_body())
        .and(with_state(state))
        .and_then(users::user_collection);

    me.or(subscriptions)
        .or(set_password)
        .or(subscribe)
        .or(detail)
        .or(collection)
}

fn auth_routes(state: Arc<State>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let login = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(limited_body())
        .and(with_state(state.clone()))
        .and_then(auth::token_login);

    let logout = warp::path!("auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(state))
        .and_then(auth::token_logout);

    login.or(logout)
}

pub fn routes(state: Arc<State>) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let api = warp::path("api").and(
        ingredient_routes(state.clone())
            .or(tag_routes(state.clone()))
            .or(recipe_routes(state.clone()))
            .or(user_routes(state.clone()))
            .or(auth_routes(state.clone()))
            .boxed(),
    );

    let media = warp::path("media").and(warp::fs::dir(state.config.media_root.clone()));

    api.or(media)
        .recover(handle_rejection)
        .with(warp::log("foodgram::api"))
}

