use std::convert::Infallible;

use serde_json::json;
use warp::{
    http::StatusCode,
    reject::{InvalidQuery, MethodNotAllowed},
    reply::Response,
    Rejection,
};

use crate::{api::handlers::json_reply, error::Error};

fn detail(status: StatusCode, message: &str) -> Response {
    json_reply(&json!({ "detail": message }), status)
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(e) = err.find::<Error>() {
        if e.code >= 500 {
            log::error!("Request failed: {e}");
        }
        return Ok(json_reply(&e.info, e.status()));
    }

    if err.is_not_found() {
        return Ok(detail(StatusCode::NOT_FOUND, "Not found."));
    }

    if err.find::<InvalidQuery>().is_some() {
        return Ok(detail(StatusCode::BAD_REQUEST, "Invalid query string."));
    }
    if err.find::<MethodNotAllowed>().is_some() {
        return Ok(detail(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed."));
    }

    log::error!("Unhandled rejection: {err:?}");
    Ok(detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error."))
}

#[cfg(test)]
mod tests {
    use warp::hyper::body::to_bytes;

    use super::*;
    use crate::error::HtmlError;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn custom_errors_keep_status_and_body() {
        let rejection = Rejection::from(HtmlError::Forbidden.default());
        let response = handle_rejection(rejection).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_of(response).await["detail"],
            "You do not have permission to perform this action."
        );
    }

    #[tokio::test]
    async fn unknown_routes_are_json_404() {
        let response = handle_rejection(warp::reject::not_found()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await, json!({ "detail": "Not found." }));
    }
}
