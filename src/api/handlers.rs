pub mod auth;
pub mod ingredients;
pub mod recipes;
pub mod tags;
pub mod users;

use serde::{de::DeserializeOwned, Serialize};
use warp::{
    http::StatusCode,
    reply::{self, Response},
    Reply,
};

use crate::error::{Error, TypeError};

pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    serde_json::from_slice(body)
        .map_err(|e| TypeError::new(&format!("JSON parse error: {e}")).into())
}

pub fn json_reply<T: Serialize>(value: &T, status: StatusCode) -> Response {
    reply::with_status(reply::json(value), status).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub fn query_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize, Debug)]
    struct Login {
        email: String,
    }

    #[test]
    fn malformed_json_is_a_bad_request() {
        let err = parse_json::<Login>(b"{\"email\":").unwrap_err();
        assert_eq!(err.code, 400);
        assert!(err.detail().unwrap().starts_with("JSON parse error"));

        let ok = parse_json::<Login>(br#"{"email":"a@b.c"}"#).unwrap();
        assert_eq!(ok.email, "a@b.c");
    }

    #[test]
    fn query_value_takes_the_last_occurrence() {
        let pairs = vec![
            ("limit".to_string(), "2".to_string()),
            ("limit".to_string(), "5".to_string()),
        ];
        assert_eq!(query_value(&pairs, "limit"), Some("5"));
        assert_eq!(query_value(&pairs, "page"), None);
    }
}
