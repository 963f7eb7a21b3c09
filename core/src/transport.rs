//! Executes `HttpRequest` values against the network.
//!
//! # Design
//! `Transport` is the only I/O seam in the crate. `RestClient` is generic
//! over it, so tests substitute an in-memory double and count invocations,
//! while production code uses `UreqTransport`.

use std::time::Duration;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

/// Performs one HTTP exchange.
///
/// Implementations must return every status code as data; only failures to
/// obtain a complete response are errors. `timeout` bounds the whole
/// exchange, `None` waits indefinitely.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        request: &HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(
        &self,
        request: &HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError> {
        (**self).execute(request, timeout)
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn execute(
        &self,
        request: &HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError> {
        (**self).execute(request, timeout)
    }
}

/// Blocking transport backed by a shared `ureq::Agent`.
///
/// HTTPS URLs go over rustls.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(
        &self,
        request: &HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError> {
        let mut builder = self.agent.post(&request.url);
        for (name, value) in &request.headers {
            // ureq writes Content-Length itself from the body slice.
            if name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        let mut response = builder
            .config()
            .timeout_global(timeout)
            .build()
            .send(request.body.as_bytes())
            .map_err(into_transport_error)?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        // The exchange is complete once the bytes are in; bad UTF-8 is left
        // for status and JSON handling to report.
        let bytes = response
            .body_mut()
            .read_to_vec()
            .map_err(into_transport_error)?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: reason_phrase(status.as_u16()),
            headers,
            body,
        })
    }
}

/// `http::Response` does not keep the reason phrase the server sent, so the
/// standard phrase for the code stands in for it.
fn reason_phrase(status: u16) -> String {
    ureq::http::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or_default()
        .to_string()
}

fn into_transport_error(err: ureq::Error) -> TransportError {
    if matches!(err, ureq::Error::Timeout(_)) {
        TransportError::timeout(err)
    } else {
        TransportError::new(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_phrase_is_the_standard_one() {
        assert_eq!(reason_phrase(503), "Service Unavailable");
        assert_eq!(reason_phrase(404), "Not Found");
    }

    #[test]
    fn reason_phrase_is_empty_for_unregistered_codes() {
        assert_eq!(reason_phrase(599), "");
    }
}
