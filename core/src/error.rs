//! Error types for the Moodle web-service client.
//!
//! # Design
//! Errors are never recovered locally. Failures detected before any I/O
//! (`UnsupportedOption`, `InvalidOptionValue`, `NotImplemented`,
//! `InvalidRoute`) guarantee that no
//! request was built or sent. Everything that happens on the wire
//! (`Transport`, `HttpError`, `MalformedResponse`) is surfaced as-is with the
//! underlying cause attached.

use std::collections::BTreeSet;

use thiserror::Error;

/// Errors returned by session construction, routing, and handle operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller supplied keyword options the remote function does not accept.
    #[error("unsupported option(s) for {operation}: {}", join_keys(.unknown))]
    UnsupportedOption {
        operation: &'static str,
        unknown: BTreeSet<String>,
    },

    /// An option that must be an on/off flag was given another value.
    #[error("option {name} for {operation} must be a flag, got {value}")]
    InvalidOptionValue {
        operation: &'static str,
        name: String,
        value: String,
    },

    /// The operation is routable but intentionally has no request shape yet.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    /// The operation does not apply to this kind of resource.
    #[error("{operation} cannot be routed for a {resource} resource")]
    InvalidRoute {
        resource: &'static str,
        operation: &'static str,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The request never completed (connection, TLS, timeout, body read).
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A read operation's response body was not valid JSON.
    #[error("malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    /// Session configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<ureq::Error> for ApiError {
    fn from(err: ureq::Error) -> Self {
        ApiError::Transport(Box::new(err))
    }
}

fn join_keys(keys: &BTreeSet<String>) -> String {
    keys.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}
