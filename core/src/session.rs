//! Authenticated session context and its configuration.
//!
//! # Design
//! A `Session` is an owned, immutable value. Resource handles borrow it, so
//! authenticating again yields a separate session and can never change what
//! an existing handle sends.

use std::fmt;
use std::time::Duration;

use crate::client::{Category, Course, Courses};
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, Transport, UreqTransport, DEFAULT_TIMEOUT};
use crate::params::ParamMap;
use crate::router::RoutedCall;

/// Path of the REST server script, appended to the site URL.
pub const WS_ENDPOINT: &str = "/webservice/rest/server.php";

/// Response format requested on every call.
pub const REST_FORMAT: &str = "json";

/// Settings used to open a `Session`.
#[derive(Clone)]
pub struct SessionConfig {
    pub base_url: String,
    pub token: String,
    pub verify_tls: bool,
    pub timeout: Option<Duration>,
}

impl SessionConfig {
    pub fn new(token: &str, base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            token: token.to_string(),
            verify_tls: true,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Skip certificate verification. Only for sites with self-signed
    /// certificates you control.
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read configuration from the environment.
    ///
    /// Expects:
    /// - `MOODLE_URL`: site root, e.g. `https://moodle.example.edu` (required)
    /// - `MOODLE_TOKEN`: web-service token (required)
    /// - `MOODLE_INSECURE_TLS`: `1` or `true` disables certificate checks
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let base_url =
            lookup("MOODLE_URL").ok_or_else(|| ApiError::Config("MOODLE_URL not set".into()))?;
        let token =
            lookup("MOODLE_TOKEN").ok_or_else(|| ApiError::Config("MOODLE_TOKEN not set".into()))?;
        let insecure = lookup("MOODLE_INSECURE_TLS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Ok(Self::new(&token, &base_url).with_verify_tls(!insecure))
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("verify_tls", &self.verify_tls)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Authenticated context shared by reference with every resource handle.
pub struct Session {
    endpoint: String,
    defaults: ParamMap,
    transport: Box<dyn Transport + Send + Sync>,
}

/// Open a session against `base_url` with the default blocking transport.
///
/// The token is not checked against the site here; a bad token surfaces on
/// the first call. Only an empty token or an empty base URL is refused up
/// front, with `ApiError::Config`.
pub fn authenticate(token: &str, base_url: &str) -> Result<Session, ApiError> {
    Session::from_config(SessionConfig::new(token, base_url))
}

impl Session {
    pub fn from_config(config: SessionConfig) -> Result<Self, ApiError> {
        let transport = UreqTransport::new(config.verify_tls, config.timeout);
        Self::with_transport(&config, transport)
    }

    /// Open a session that sends requests through `transport`.
    pub fn with_transport(
        config: &SessionConfig,
        transport: impl Transport + Send + Sync + 'static,
    ) -> Result<Self, ApiError> {
        let base = config.base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(ApiError::Config("base URL is empty".into()));
        }
        if config.token.is_empty() {
            return Err(ApiError::Config("token is empty".into()));
        }

        let mut defaults = ParamMap::new();
        defaults.insert("wstoken", config.token.as_str());
        defaults.insert("moodlewsrestformat", REST_FORMAT);

        Ok(Self {
            endpoint: format!("{base}{WS_ENDPOINT}"),
            defaults,
            transport: Box::new(transport),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Parameters merged into every request.
    pub fn default_params(&self) -> &ParamMap {
        &self.defaults
    }

    pub fn course(&self, id: u64) -> Course<'_> {
        Course::new(self, id)
    }

    pub fn courses(&self, ids: impl IntoIterator<Item = u64>) -> Courses<'_> {
        Courses::new(self, ids.into_iter().collect())
    }

    pub fn category(&self, id: u64) -> Category<'_> {
        Category::new(self, id)
    }

    /// Encode a routed call and merge the session defaults last.
    pub fn build_request(&self, call: &RoutedCall) -> HttpRequest {
        let mut params = call.encode();
        params.merge_defaults(&self.defaults);
        HttpRequest {
            method: call.method,
            url: self.endpoint.clone(),
            params,
        }
    }

    /// Execute `request` and fail on any non-2xx status.
    pub fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let function = request.params.get("wsfunction").unwrap_or_default();
        tracing::debug!(
            function,
            method = ?request.method,
            params = request.params.len(),
            "sending web-service request"
        );
        let response = self.transport.execute(request)?;
        check_status(response)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

fn check_status(response: HttpResponse) -> Result<HttpResponse, ApiError> {
    if response.is_success() {
        return Ok(response);
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body,
    })
}

/// Decode a read operation's body as JSON.
pub fn parse_json(response: &HttpResponse) -> Result<serde_json::Value, ApiError> {
    Ok(serde_json::from_str(&response.body)?)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::router::{route, Operation, Resource};

    struct Unreachable;

    impl Transport for Unreachable {
        fn execute(&self, _request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            panic!("no request expected");
        }
    }

    struct Fixed(u16, &'static str);

    impl Transport for Fixed {
        fn execute(&self, _request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            Ok(HttpResponse {
                status: self.0,
                headers: Vec::new(),
                body: self.1.to_string(),
            })
        }
    }

    fn session(token: &str) -> Session {
        Session::with_transport(&SessionConfig::new(token, "https://lms.test/"), Unreachable).unwrap()
    }

    #[test]
    fn endpoint_is_base_plus_server_script() {
        assert_eq!(
            session("t").endpoint(),
            "https://lms.test/webservice/rest/server.php"
        );
    }

    #[test]
    fn defaults_hold_token_and_format() {
        let s = session("abc");
        assert_eq!(s.default_params().get("wstoken"), Some("abc"));
        assert_eq!(s.default_params().get("moodlewsrestformat"), Some("json"));
        assert_eq!(s.default_params().len(), 2);
    }

    #[test]
    fn build_request_merges_defaults_last() {
        let s = session("abc");
        let call = route(&Resource::Course(10), &Operation::Delete).unwrap();
        let req = s.build_request(&call);
        assert_eq!(req.method, crate::http::HttpMethod::Post);
        assert_eq!(req.url, s.endpoint());
        assert_eq!(req.params.get("wstoken"), Some("abc"));
        assert_eq!(req.params.get("courseids[0]"), Some("10"));
    }

    #[test]
    fn empty_token_or_url_is_a_config_error() {
        let err = Session::with_transport(&SessionConfig::new("", "https://x"), Unreachable).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
        let err = Session::with_transport(&SessionConfig::new("t", " / "), Unreachable).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn non_success_status_becomes_http_error() {
        let s = Session::with_transport(&SessionConfig::new("t", "https://x"), Fixed(503, "down"))
            .unwrap();
        let call = route(&Resource::Course(1), &Operation::Contents).unwrap();
        let err = s.send(&s.build_request(&call)).unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 503, ref body } if body == "down"));
    }

    #[test]
    fn parse_json_reports_malformed_bodies() {
        let response = HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: "<html>".to_string(),
        };
        assert!(matches!(parse_json(&response), Err(ApiError::MalformedResponse(_))));
    }

    #[test]
    fn config_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("MOODLE_URL", "https://lms.test"),
            ("MOODLE_TOKEN", "secret"),
            ("MOODLE_INSECURE_TLS", "true"),
        ]
        .into_iter()
        .collect();
        let config = SessionConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.base_url, "https://lms.test");
        assert_eq!(config.token, "secret");
        assert!(!config.verify_tls);
    }

    #[test]
    fn config_requires_token() {
        let err = SessionConfig::from_lookup(|k| (k == "MOODLE_URL").then(|| "https://x".to_string()))
            .unwrap_err();
        assert!(matches!(err, ApiError::Config(ref m) if m.contains("MOODLE_TOKEN")));
    }

    #[test]
    fn verification_and_timeout_defaults() {
        let config = SessionConfig::new("t", "https://x");
        assert!(config.verify_tls);
        assert_eq!(config.timeout, UreqTransport::default().timeout());
    }

    #[test]
    fn debug_redacts_token() {
        let shown = format!("{:?}", SessionConfig::new("hunter2", "https://x"));
        assert!(!shown.contains("hunter2"));
    }
}
