//! License server transport.
//!
//! Sessions talk to the license server through [`LicenseTransport`], so the
//! HTTP stack can be swapped out (or mocked). The reqwest implementation is
//! behind the `http` feature.
use std::io::Read;

use crate::utils::b64_encode;

/// Status reported when no HTTP response was received at all.
pub const TRANSPORT_FAILURE: i32 = -1;

/// An outgoing license request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Build a ClearKey license request.
    ///
    /// Besides the JSON body, the body is repeated Base64 encoded in a
    /// `postdata` header; some ClearKey servers only look there.
    pub fn clearkey_license(url: impl Into<String>, body: Vec<u8>) -> Self {
        let headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("postdata".to_string(), b64_encode(&body)),
        ];
        Self {
            url: url.into(),
            headers,
            body,
        }
    }

    /// Value of the header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response of an exchange, with the body still to be read.
pub struct HttpResponse {
    /// HTTP status, or [`TRANSPORT_FAILURE`].
    pub status: i32,
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    pub fn new(status: i32, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            body: Box::new(body),
        }
    }

    /// A transport failure without response.
    pub fn failed() -> Self {
        Self::new(TRANSPORT_FAILURE, std::io::empty())
    }

    pub fn is_error(&self) -> bool {
        self.status == TRANSPORT_FAILURE || self.status >= 400
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Blocking license server exchange.
///
/// Implementations never fail outright: transport problems are reported as
/// status [`TRANSPORT_FAILURE`], body read problems surface when the body is
/// read.
pub trait LicenseTransport {
    fn open(&self, request: &HttpRequest) -> HttpResponse;
}

impl<T: LicenseTransport + ?Sized> LicenseTransport for &T {
    fn open(&self, request: &HttpRequest) -> HttpResponse {
        (**self).open(request)
    }
}

#[cfg(feature = "http")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "http")]
mod reqwest_transport {
    use std::time::Duration;

    use reqwest::blocking::Client;

    use super::{HttpRequest, HttpResponse, LicenseTransport};
    use crate::error::{Error, Result};

    /// POSTs license requests with a blocking reqwest client.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: Client,
    }

    impl ReqwestTransport {
        pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

        pub fn new() -> Result<Self> {
            let client = Client::builder()
                .user_agent(concat!("rsclearkey/", env!("CARGO_PKG_VERSION")))
                .timeout(Self::DEFAULT_TIMEOUT)
                .build()
                .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {}", e)))?;
            Ok(Self { client })
        }
    }

    impl LicenseTransport for ReqwestTransport {
        fn open(&self, request: &HttpRequest) -> HttpResponse {
            let mut builder = self.client.post(&request.url).body(request.body.clone());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            match builder.send() {
                Ok(response) => {
                    let status = i32::from(response.status().as_u16());
                    debug!("License server {} answered {}", request.url, status);
                    HttpResponse::new(status, response)
                }
                Err(e) => {
                    error!("License request to {} failed: {}", request.url, e);
                    HttpResponse::failed()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::{HttpRequest, HttpResponse, TRANSPORT_FAILURE};
    use crate::utils::b64_decode;

    #[test]
    fn license_request_headers() {
        let body = br#"{"kids":["YmFy"],"type":"temporary"}"#.to_vec();
        let request = HttpRequest::clearkey_license("https://example/license", body.clone());

        assert_eq!(request.header("accept"), Some("application/json"));
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        let postdata = request.header("postdata").expect("postdata");
        assert_eq!(b64_decode(postdata).expect("b64"), body);
        assert_eq!(request.body, body);
    }

    #[test]
    fn error_statuses() {
        assert!(HttpResponse::failed().is_error());
        assert_eq!(HttpResponse::failed().status, TRANSPORT_FAILURE);
        assert!(HttpResponse::new(400, std::io::empty()).is_error());
        assert!(HttpResponse::new(503, std::io::empty()).is_error());
        assert!(!HttpResponse::new(200, std::io::empty()).is_error());
        assert!(!HttpResponse::new(302, std::io::empty()).is_error());
    }

    #[test]
    fn body_is_streamed() {
        let mut response = HttpResponse::new(200, &b"{}"[..]);
        let mut body = Vec::new();
        response.body.read_to_end(&mut body).expect("read");
        assert_eq!(body, b"{}");
    }
}
