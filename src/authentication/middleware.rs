use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use crate::{
    error::{Error, HtmlError},
    state::State,
};

use super::jwt::{verify_jwt_session, SessionData};

/// Accepts `Token <jwt>` and `Bearer <jwt>`.
pub fn token_from_header(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    if token.is_empty() {
        return None;
    }

    match scheme {
        s if s.eq_ignore_ascii_case("token") || s.eq_ignore_ascii_case("bearer") => Some(token),
        _ => None,
    }
}

fn resolve_session(header: Option<String>, secret: &str) -> Result<Option<SessionData>, Error> {
    let header = match header {
        Some(header) => header,
        None => return Ok(None),
    };

    let token = token_from_header(&header)
        .ok_or_else(|| HtmlError::InvalidSession.new("Invalid token header."))?;

    verify_jwt_session(token, secret).map(|data| Some(data.into()))
}

/// Session of the caller when an `Authorization` header is present. A header
/// carrying a bad token rejects with 401 instead of falling back to anonymous.
pub fn with_possible_session(
    state: Arc<State>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let state = state.clone();
        async move {
            resolve_session(header, &state.config.secret_key).map_err(Rejection::from)
        }
    })
}

pub fn with_session(
    state: Arc<State>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    with_possible_session(state).and_then(|session: Option<SessionData>| async move {
        session.ok_or_else(|| Rejection::from(HtmlError::Unauthorized.default()))
    })
}

/// Rejects a bad `Authorization` header on routes that never look at the
/// session.
pub fn with_valid_token(state: Arc<State>) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    with_possible_session(state)
        .map(|_session: Option<SessionData>| ())
        .untuple_one()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_and_bearer_schemes() {
        assert_eq!(token_from_header("Token abc.def"), Some("abc.def"));
        assert_eq!(token_from_header("Bearer abc.def"), Some("abc.def"));
        assert_eq!(token_from_header("bearer  abc "), Some("abc"));
    }

    #[test]
    fn rejects_unknown_or_empty_headers() {
        assert_eq!(token_from_header("Basic dXNlcg=="), None);
        assert_eq!(token_from_header("Token"), None);
        assert_eq!(token_from_header("Token    "), None);
        assert_eq!(token_from_header(""), None);
    }

    #[test]
    fn missing_header_is_anonymous() {
        assert_eq!(resolve_session(None, "secret").unwrap(), None);
    }

    #[test]
    fn malformed_header_is_unauthorized() {
        let err = resolve_session(Some("Token nonsense".to_string()), "secret").unwrap_err();
        assert_eq!(err.code, 401);
    }
}
