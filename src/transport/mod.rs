//! Transport client
//!
//! This module handles all HTTP traffic of a crawl:
//! - Building the HTTP client with the configured user agent and timeouts
//! - GET and form-encoded POST requests relative to a site root
//! - Cookie persistence across calls of one client
//! - Bounded retry with linear backoff for transient failures
//!
//! Everything above this layer talks to the [`Transport`] trait so the
//! pagination and listing state machines can be driven by scripted fakes.

mod http;

pub use http::{build_http_client, HttpTransport};

use crate::Result;
use std::future::Future;

/// A request relative to the site root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// Path and query, e.g. `/community/c6h1234`
    pub path: String,

    /// Form fields; `Some` turns the request into a POST
    pub form: Option<Vec<(String, String)>>,
}

impl TransportRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            form: None,
        }
    }

    pub fn post(path: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            path: path.into(),
            form: Some(form),
        }
    }

    pub fn method(&self) -> &'static str {
        if self.form.is_some() {
            "POST"
        } else {
            "GET"
        }
    }

    /// Looks up a form field by name
    pub fn field(&self, name: &str) -> Option<&str> {
        self.form
            .as_ref()?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Fetches response bodies
///
/// Implementations retry transient failures themselves and return
/// `ArchiveError::Transport` once retries are exhausted.
pub trait Transport: Send + Sync {
    fn fetch(&self, request: &TransportRequest) -> impl Future<Output = Result<String>> + Send;
}

impl<T: Transport> Transport for &T {
    fn fetch(&self, request: &TransportRequest) -> impl Future<Output = Result<String>> + Send {
        (**self).fetch(request)
    }
}
