//! Blocking client for a Moodle-style "webservice REST" endpoint.
//!
//! # Overview
//! Every remote function is invoked by POSTing a form-urlencoded body to
//! `{subdirectory}/webservice/rest/server.php`. The body carries the access
//! token, the function name, the response format (`json`) and the caller's
//! parameters. The JSON response is handed back untouched.
//!
//! # Design
//! - `RestClient` holds its `ClientConfig` and a `Transport`. It keeps no
//!   per-call state, so concurrent calls through one client are safe.
//! - Each call goes through `build_request` and then `parse_response`. Both
//!   are pure, so the wire format can be tested without a server.
//! - `UreqTransport` is the default transport; tests plug in doubles.
//! - Trace verbosity is per client and only controls `tracing` output.
//!
//! ```no_run
//! use moodle_rest_core::{ClientConfig, Params, Protocol, RestClient};
//!
//! let client = RestClient::new(
//!     ClientConfig::new("school.example", "0123456789abcdef")
//!         .with_protocol(Protocol::Https)
//!         .with_port(443),
//! )?;
//! let courses = client.send(
//!     "core_course_get_courses",
//!     &Params::new().with("options", serde_json::json!({"ids": [2, 3]})),
//! )?;
//! println!("{courses}");
//! # Ok::<(), moodle_rest_core::ApiError>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod params;
pub mod transport;

pub use client::RestClient;
pub use config::{ClientConfig, OverridePolicy, Protocol, TraceLevel};
pub use error::{ApiError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use params::Params;
pub use transport::{Transport, UreqTransport};
