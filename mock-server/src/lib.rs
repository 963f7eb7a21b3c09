//! In-process stand-in for a Moodle webservice REST endpoint.
//!
//! Serves `POST /webservice/rest/server.php` and the same path under
//! `/moodle`. The form body is decoded flat (percent-decoding only, no
//! bracket nesting), the token is checked, and `wsfunction` picks the
//! canned behaviour. A few `local_test_*` functions exist only to exercise
//! client error paths.

use std::{sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use percent_encoding::percent_decode_str;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const SERVER_PATH: &str = "/webservice/rest/server.php";
pub const SUBDIRECTORY: &str = "/moodle";
pub const DEFAULT_TOKEN: &str = "test-token";

/// Body served by the `local_test_invalid_utf8*` functions.
pub const INVALID_UTF8_BODY: &[u8] = b"\xff\xfe bad";

/// How long `local_test_slow` waits before answering.
pub const SLOW_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug)]
struct Site {
    token: String,
}

type SharedSite = Arc<Site>;

pub fn app(token: impl Into<String>) -> Router {
    let site: SharedSite = Arc::new(Site {
        token: token.into(),
    });
    Router::new()
        .route(SERVER_PATH, post(server))
        .route(&format!("{SUBDIRECTORY}{SERVER_PATH}"), post(server))
        .with_state(site)
}

pub async fn run(listener: TcpListener, token: impl Into<String>) -> Result<(), std::io::Error> {
    axum::serve(listener, app(token)).await
}

/// Split a form body into decoded `(key, value)` pairs, keeping order.
pub fn decode_form(body: &str) -> Vec<(String, String)> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

fn field<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

async fn server(State(site): State<SharedSite>, headers: HeaderMap, body: String) -> Response {
    let pairs = decode_form(&body);
    let function = field(&pairs, "wsfunction").unwrap_or_default().to_string();
    tracing::info!(function = %function, bytes = body.len(), "webservice call");

    if field(&pairs, "wstoken") != Some(site.token.as_str()) {
        return Json(json!({
            "exception": "moodle_exception",
            "errorcode": "invalidtoken",
            "message": "Invalid token - token not found",
        }))
        .into_response();
    }

    match function.as_str() {
        "core_webservice_get_site_info" => Json(json!({
            "sitename": "Mock Moodle",
            "username": "wsuser",
            "userid": 2,
            "release": "4.3 (Build: 20231009)",
            "functions": [
                {"name": "core_webservice_get_site_info", "version": "2023100900"},
            ],
        }))
        .into_response(),
        "local_test_echo" => {
            let header_value = |name: header::HeaderName| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            let content_length = header_value(header::CONTENT_LENGTH)
                .and_then(|v| v.parse::<u64>().ok());
            let params: Vec<Value> = pairs.iter().map(|(k, v)| json!([k, v])).collect();
            Json(json!({
                "content_type": header_value(header::CONTENT_TYPE),
                "content_length": content_length,
                "body": body,
                "params": params,
            }))
            .into_response()
        }
        "local_test_not_found" => (StatusCode::NOT_FOUND, "not found").into_response(),
        "local_test_empty_error" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "local_test_garbage" => (StatusCode::OK, "not-json").into_response(),
        "local_test_invalid_utf8" => (StatusCode::OK, INVALID_UTF8_BODY.to_vec()).into_response(),
        "local_test_invalid_utf8_error" => {
            (StatusCode::NOT_FOUND, INVALID_UTF8_BODY.to_vec()).into_response()
        }
        "local_test_slow" => {
            tokio::time::sleep(SLOW_DELAY).await;
            Json(json!({})).into_response()
        }
        _ => Json(json!({
            "exception": "dml_missing_record_exception",
            "errorcode": "invalidrecord",
            "message": "Can't find data record in database table external_functions.",
        }))
        .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_form_handles_brackets_and_multibyte() {
        let pairs = decode_form("a%5B0%5D=1&name=%C3%91and%C3%BA&flag=");
        assert_eq!(
            pairs,
            vec![
                ("a[0]".to_string(), "1".to_string()),
                ("name".to_string(), "Ñandú".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn decode_form_treats_plus_as_space() {
        let pairs = decode_form("q=a+b");
        assert_eq!(pairs, vec![("q".to_string(), "a b".to_string())]);
    }

    #[test]
    fn decode_form_ignores_empty_segments() {
        assert!(decode_form("").is_empty());
        assert_eq!(decode_form("a=1&&b=2").len(), 2);
    }

    #[test]
    fn field_returns_first_match() {
        let pairs = decode_form("wstoken=x&wstoken=y");
        assert_eq!(field(&pairs, "wstoken"), Some("x"));
        assert_eq!(field(&pairs, "missing"), None);
    }
}
