//! Request builder, response parser and call driver for the REST endpoint.
//!
//! # Design
//! Every remote function is reached through the same POST to
//! `{subdirectory}/webservice/rest/server.php`; the function to run travels
//! in the body as `wsfunction`. A call is split into `build_request`, which
//! is pure, `Transport::execute`, and `parse_response`, which is pure again.
//! `send` strings the three together. The client carries no per-call state,
//! so one instance can serve concurrent calls from several threads.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{ClientConfig, OverridePolicy, TraceLevel};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::params::{self, Params};
use crate::transport::{Transport, UreqTransport};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const RESPONSE_FORMAT: &str = "json";

/// Client for one webservice site, authenticated by a fixed token.
#[derive(Debug)]
pub struct RestClient<T = UreqTransport> {
    config: ClientConfig,
    transport: T,
    verbosity: AtomicU8,
}

impl RestClient<UreqTransport> {
    /// Create a client that talks to the network through `ureq`.
    ///
    /// Fails with `InvalidArgument` if the host or token is missing.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        Self::with_transport(config, UreqTransport::new())
    }
}

impl<T: Transport> RestClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, ApiError> {
        config.validate()?;
        let verbosity = AtomicU8::new(config.trace_level.into());
        Ok(Self {
            config,
            transport,
            verbosity,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn verbosity(&self) -> TraceLevel {
        TraceLevel::try_from(self.verbosity.load(Ordering::Relaxed)).unwrap_or_default()
    }

    /// Change how much this client reports through `tracing`. Only affects
    /// calls started afterwards, and never what is sent or returned.
    pub fn set_verbosity(&self, level: TraceLevel) {
        self.verbosity.store(level.into(), Ordering::Relaxed);
    }

    /// Build the POST request for `function` without sending it.
    pub fn build_request(&self, function: &str, params: &Params) -> Result<HttpRequest, ApiError> {
        let envelope = self.envelope(function, params)?;
        let body = params::encode(&envelope);
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: self.config.endpoint(),
            headers: vec![
                ("Content-type".to_string(), FORM_CONTENT_TYPE.to_string()),
                ("Content-Length".to_string(), body.len().to_string()),
            ],
            body,
        })
    }

    /// Turn a raw response into the decoded JSON value or an error.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Value, ApiError> {
        check_status(&response)?;
        Ok(serde_json::from_str(&response.body)?)
    }

    /// Call `function` on the remote site using the configured timeout.
    pub fn send(&self, function: &str, params: &Params) -> Result<Value, ApiError> {
        self.execute(function, params, self.config.timeout)
    }

    /// Like `send`, but bounded by `timeout` instead of the configured one.
    pub fn send_with_timeout(
        &self,
        function: &str,
        params: &Params,
        timeout: Duration,
    ) -> Result<Value, ApiError> {
        self.execute(function, params, Some(timeout))
    }

    /// Typed variant of `send`: `params` must serialize to an object and the
    /// response must deserialize into `R`.
    pub fn call<P, R>(&self, function: &str, params: &P) -> Result<R, ApiError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let params = Params::from_serialize(params)?;
        let value = self.send(function, &params)?;
        Ok(serde_json::from_value(value)?)
    }

    fn execute(
        &self,
        function: &str,
        params: &Params,
        timeout: Option<Duration>,
    ) -> Result<Value, ApiError> {
        let request = self.build_request(function, params)?;
        let level = self.verbosity();

        if level >= TraceLevel::Verbose {
            tracing::debug!(
                function,
                url = %request.url,
                content_length = request.body.len(),
                "sending webservice request"
            );
        }
        if level >= TraceLevel::Debug {
            tracing::trace!(function, body = %self.redacted_body(function, params), "request body");
        }

        let response = self.transport.execute(&request, timeout).inspect_err(|err| {
            if level >= TraceLevel::Verbose {
                tracing::debug!(function, error = %err, "webservice transport failed");
            }
        })?;

        if level >= TraceLevel::Verbose {
            tracing::debug!(
                function,
                status = response.status,
                content_length = response.body.len(),
                "received webservice response"
            );
        }
        if level >= TraceLevel::Debug {
            tracing::trace!(function, body = %response.body, "response body");
        }

        self.parse_response(response)
    }

    /// Reserved keys first, caller parameters merged over them.
    fn envelope(&self, function: &str, params: &Params) -> Result<Map<String, Value>, ApiError> {
        if function.trim().is_empty() {
            return Err(ApiError::InvalidArgument(
                "webservice function name is required".to_string(),
            ));
        }
        let shadowed = params.reserved_keys();
        if !shadowed.is_empty() && self.config.reserved_keys == OverridePolicy::Reject {
            return Err(ApiError::InvalidArgument(format!(
                "parameters may not override reserved keys: {}",
                shadowed.join(", ")
            )));
        }

        let mut envelope = Map::new();
        envelope.insert("wstoken".to_string(), Value::from(self.config.token.as_str()));
        envelope.insert("wsfunction".to_string(), Value::from(function));
        envelope.insert("moodlewsrestformat".to_string(), Value::from(RESPONSE_FORMAT));
        for (key, value) in params.iter() {
            envelope.insert(key.clone(), value.clone());
        }
        Ok(envelope)
    }

    fn redacted_body(&self, function: &str, params: &Params) -> String {
        match self.envelope(function, params) {
            Ok(mut envelope) => {
                envelope.insert("wstoken".to_string(), Value::from("***"));
                params::encode(&envelope)
            }
            Err(_) => String::new(),
        }
    }
}

/// Map a status of 400 or above to `ApiError::Http`.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.status < 400 {
        return Ok(());
    }
    let message = if response.body.is_empty() {
        format!("{} - {}", response.status, response.status_text)
    } else {
        response.body.clone()
    };
    Err(ApiError::Http {
        status: response.status,
        message,
    })
}
