//! HTTP transport types and the default blocking transport.
//!
//! # Design
//! Requests and responses are plain data. Handles build an `HttpRequest`
//! without touching the network; a `Transport` executes it. A host that
//! prefers to do its own I/O can call the `build_*` methods and skip the
//! transport entirely.
//!
//! Parameters stay as a `ParamMap` rather than a pre-encoded string. Percent
//! encoding is left to whatever actually puts bytes on the wire.

use std::time::Duration;

use ureq::tls::TlsConfig;
use ureq::Agent;

use crate::error::ApiError;
use crate::params::ParamMap;

/// HTTP method for a request. Moodle's REST endpoint only uses these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// An HTTP request described as plain data.
///
/// For `Get` the params belong in the query string, for `Post` in a
/// form-encoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub params: ParamMap,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes an `HttpRequest` and returns the response as data.
///
/// Implementations must return non-2xx responses as `Ok`; status
/// interpretation happens in the caller.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// Global request timeout used unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking transport backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
    verify_tls: bool,
    timeout: Option<Duration>,
}

impl UreqTransport {
    /// Certificate verification is on unless `verify_tls` is false.
    pub fn new(verify_tls: bool, timeout: Option<Duration>) -> Self {
        if !verify_tls {
            tracing::warn!("TLS certificate verification is disabled");
        }
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .tls_config(TlsConfig::builder().disable_verification(!verify_tls).build())
            .build()
            .new_agent();
        Self {
            agent,
            verify_tls,
            timeout,
        }
    }

    pub fn verifies_tls(&self) -> bool {
        self.verify_tls
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(true, Some(DEFAULT_TIMEOUT))
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let pairs = request.params.iter();
        let mut response = match request.method {
            HttpMethod::Get => self.agent.get(request.url.as_str()).query_pairs(pairs).call()?,
            HttpMethod::Post => self.agent.post(request.url.as_str()).send_form(pairs)?,
        };

        let status = response.status().as_u16();
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
        let body = response.body_mut().read_to_string()?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
