//! Connection settings for a `RestClient`.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Path of the REST server script, relative to the site root.
pub const SERVER_PATH: &str = "/webservice/rest/server.php";

/// Environment variable that switches on request tracing at startup.
pub const VERBOSE_ENV: &str = "HTTP_VERBOSE";

const DEFAULT_PORT: u16 = 80;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl Protocol {
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// How much request/response detail a client reports through `tracing`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum TraceLevel {
    #[default]
    Silent = 0,
    Verbose = 1,
    Debug = 2,
}

impl TraceLevel {
    /// Level requested through `HTTP_VERBOSE`, read once per process.
    ///
    /// Unset or empty is `Silent`, `"2"` is `Debug`, anything else is
    /// `Verbose`.
    pub fn from_env() -> Self {
        static LEVEL: OnceLock<TraceLevel> = OnceLock::new();
        *LEVEL.get_or_init(|| Self::parse_env(std::env::var(VERBOSE_ENV).ok().as_deref()))
    }

    fn parse_env(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => TraceLevel::Silent,
            Some("2") => TraceLevel::Debug,
            Some(_) => TraceLevel::Verbose,
        }
    }
}

impl TryFrom<u8> for TraceLevel {
    type Error = ApiError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(TraceLevel::Silent),
            1 => Ok(TraceLevel::Verbose),
            2 => Ok(TraceLevel::Debug),
            other => Err(ApiError::InvalidArgument(format!(
                "trace level must be 0, 1 or 2, got {other}"
            ))),
        }
    }
}

impl From<TraceLevel> for u8 {
    fn from(level: TraceLevel) -> u8 {
        level as u8
    }
}

/// What happens when call parameters use a key the client reserves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverridePolicy {
    /// The caller's value replaces the client's.
    #[default]
    Allow,
    /// The call fails with `InvalidArgument` before any I/O.
    Reject,
}

/// Connection parameters for one webservice site.
///
/// `host` is a bare host name (no scheme, port or path); IPv6 literals go in
/// brackets. `subdirectory` is
/// the path the site is installed under, if any; `"moodle"`, `"/moodle"` and
/// `"/moodle/"` are equivalent.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub host: String,
    pub token: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub subdirectory: Option<String>,
    #[serde(default = "default_timeout", with = "timeout_secs")]
    pub timeout: Option<Duration>,
    #[serde(default = "TraceLevel::from_env")]
    pub trace_level: TraceLevel,
    #[serde(default)]
    pub reserved_keys: OverridePolicy,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
            port: DEFAULT_PORT,
            protocol: Protocol::default(),
            subdirectory: None,
            timeout: Some(DEFAULT_TIMEOUT),
            trace_level: TraceLevel::from_env(),
            reserved_keys: OverridePolicy::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_subdirectory(mut self, subdirectory: impl Into<String>) -> Self {
        self.subdirectory = Some(subdirectory.into());
        self
    }

    /// `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_trace_level(mut self, level: TraceLevel) -> Self {
        self.trace_level = level;
        self
    }

    pub fn with_reserved_keys(mut self, policy: OverridePolicy) -> Self {
        self.reserved_keys = policy;
        self
    }

    /// Reject settings that can never produce a usable request.
    pub fn validate(&self) -> Result<(), ApiError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(ApiError::InvalidArgument("host is required".to_string()));
        }
        let ipv6_literal = host.starts_with('[') && host.ends_with(']');
        if host.contains('/')
            || host.chars().any(char::is_whitespace)
            || (host.contains(':') && !ipv6_literal)
        {
            return Err(ApiError::InvalidArgument(format!(
                "host must be a bare host name, got {:?}",
                self.host
            )));
        }
        if self.token.trim().is_empty() {
            return Err(ApiError::InvalidArgument("token is required".to_string()));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(ApiError::InvalidArgument("timeout must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Request path: normalized subdirectory followed by `SERVER_PATH`.
    pub fn path(&self) -> String {
        let sub = self
            .subdirectory
            .as_deref()
            .map(|s| s.trim().trim_matches('/'))
            .unwrap_or("");
        if sub.is_empty() {
            SERVER_PATH.to_string()
        } else {
            format!("/{sub}{SERVER_PATH}")
        }
    }

    /// Absolute URL every call is posted to.
    pub fn endpoint(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.protocol,
            self.host.trim(),
            self.port,
            self.path()
        )
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("token", &"***")
            .field("port", &self.port)
            .field("protocol", &self.protocol)
            .field("subdirectory", &self.subdirectory)
            .field("timeout", &self.timeout)
            .field("trace_level", &self.trace_level)
            .field("reserved_keys", &self.reserved_keys)
            .finish()
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout() -> Option<Duration> {
    Some(DEFAULT_TIMEOUT)
}

/// Timeouts are written as fractional seconds; `null` disables the timeout.
mod timeout_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        secs.map(|s| Duration::try_from_secs_f64(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new("school.example", "abc123")
    }

    #[test]
    fn defaults() {
        let c = config();
        assert_eq!(c.port, 80);
        assert_eq!(c.protocol, Protocol::Http);
        assert_eq!(c.subdirectory, None);
        assert_eq!(c.timeout, Some(Duration::from_secs(30)));
        assert_eq!(c.reserved_keys, OverridePolicy::Allow);
        assert_eq!(c.endpoint(), "http://school.example:80/webservice/rest/server.php");
    }

    #[test]
    fn subdirectory_is_normalized() {
        for sub in ["moodle", "/moodle", "/moodle/", " moodle/ "] {
            let c = config().with_subdirectory(sub);
            assert_eq!(c.path(), "/moodle/webservice/rest/server.php", "{sub:?}");
        }
        assert_eq!(config().with_subdirectory("").path(), SERVER_PATH);
        assert_eq!(config().with_subdirectory("a/b").path(), "/a/b/webservice/rest/server.php");
    }

    #[test]
    fn https_endpoint() {
        let c = config().with_protocol(Protocol::Https).with_port(8443);
        assert_eq!(c.endpoint(), "https://school.example:8443/webservice/rest/server.php");
    }

    #[test]
    fn validate_requires_host_and_token() {
        assert!(config().validate().is_ok());
        assert!(matches!(
            ClientConfig::new("", "t").validate(),
            Err(ApiError::InvalidArgument(_))
        ));
        assert!(matches!(
            ClientConfig::new("host", "  ").validate(),
            Err(ApiError::InvalidArgument(_))
        ));
        assert!(ClientConfig::new("http://host", "t").validate().is_err());
        assert!(ClientConfig::new("host/moodle", "t").validate().is_err());
        assert!(ClientConfig::new("school.example:8080", "t").validate().is_err());
        assert!(ClientConfig::new("::1", "t").validate().is_err());
        assert!(ClientConfig::new("[::1]", "t").validate().is_ok());
        assert!(ClientConfig::new("127.0.0.1", "t").validate().is_ok());
        assert!(config().with_timeout(Some(Duration::ZERO)).validate().is_err());
        assert!(config().with_timeout(None).validate().is_ok());
    }

    #[test]
    fn trace_level_conversions() {
        assert_eq!(TraceLevel::try_from(2).unwrap(), TraceLevel::Debug);
        assert!(TraceLevel::try_from(3).is_err());
        assert_eq!(u8::from(TraceLevel::Verbose), 1);
    }

    #[test]
    fn trace_level_env_parsing() {
        assert_eq!(TraceLevel::parse_env(None), TraceLevel::Silent);
        assert_eq!(TraceLevel::parse_env(Some("")), TraceLevel::Silent);
        assert_eq!(TraceLevel::parse_env(Some("1")), TraceLevel::Verbose);
        assert_eq!(TraceLevel::parse_env(Some("yes")), TraceLevel::Verbose);
        assert_eq!(TraceLevel::parse_env(Some("2")), TraceLevel::Debug);
    }

    #[test]
    fn deserializes_with_defaults() {
        let c: ClientConfig = serde_json::from_str(
            r#"{"host":"school.example","token":"abc","protocol":"https","subdirectory":"moodle","timeout":2.5,"trace_level":1}"#,
        )
        .unwrap();
        assert_eq!(c.port, 80);
        assert_eq!(c.protocol, Protocol::Https);
        assert_eq!(c.timeout, Some(Duration::from_millis(2500)));
        assert_eq!(c.trace_level, TraceLevel::Verbose);
        assert_eq!(c.endpoint(), "https://school.example:80/moodle/webservice/rest/server.php");
    }

    #[test]
    fn deserialize_rejects_unknown_trace_level() {
        let result: Result<ClientConfig, _> =
            serde_json::from_str(r#"{"host":"h","token":"t","trace_level":7}"#);
        assert!(result.is_err());
    }

    #[test]
    fn debug_output_redacts_token() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("abc123"));
        assert!(rendered.contains("***"));
    }
}
