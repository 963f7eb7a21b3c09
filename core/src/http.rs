//! HTTP request and response values shared by the client and its transports.
//!
//! # Design
//! The client builds `HttpRequest` values and parses `HttpResponse` values as
//! plain data. Only a `Transport` touches the network, so request building
//! and response parsing stay deterministic and can be tested without a
//! server.

/// HTTP method for a request. The webservice only accepts POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
        }
    }
}

/// An HTTP request described as plain data.
///
/// Built by `RestClient::build_request`. `url` is absolute, including scheme
/// and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpRequest {
    /// First header value whose name matches `name`, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
///
/// `status_text` is the reason phrase, used to synthesize an error message
/// when a failing response carries no body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest {
            method: HttpMethod::Post,
            url: "http://localhost:80/webservice/rest/server.php".to_string(),
            headers: vec![("Content-Length".to_string(), "12".to_string())],
            body: String::new(),
        };
        assert_eq!(req.header("content-length"), Some("12"));
        assert_eq!(req.header("content-type"), None);
    }

    #[test]
    fn method_name() {
        assert_eq!(HttpMethod::Post.as_str(), "POST");
    }
}
