//! Outbound HTTP round-trip logging
//!
//! Hook for HTTP client transports (search-cluster clients and the like) that report
//! each finished request together with its response or transport error.

use crate::core::{format_duration, Fields, Logger};
use http::{Method, Request, Response};
use std::sync::Arc;
use std::time::Duration;

/// Logs one summary record per outbound round trip
#[derive(Debug, Clone)]
pub struct ClientTraceLogger {
    logger: Arc<Logger>,
    request_body: bool,
    response_body: bool,
}

impl ClientTraceLogger {
    pub const MESSAGE: &'static str = "[CLIENT]";
    pub const REQUEST_MESSAGE: &'static str = "[CLIENT-REQUEST]";
    pub const RESPONSE_MESSAGE: &'static str = "[CLIENT-RESPONSE]";

    pub fn new(logger: Arc<Logger>) -> Self {
        Self {
            logger,
            request_body: false,
            response_body: false,
        }
    }

    #[must_use]
    pub fn with_request_body(mut self, enabled: bool) -> Self {
        self.request_body = enabled;
        self
    }

    #[must_use]
    pub fn with_response_body(mut self, enabled: bool) -> Self {
        self.response_body = enabled;
        self
    }

    pub fn request_body_enabled(&self) -> bool {
        self.request_body
    }

    pub fn response_body_enabled(&self) -> bool {
        self.response_body
    }

    /// Log a finished round trip and hand the transport error back unchanged.
    ///
    /// `HEAD` requests get no summary record. Body records are written when enabled and
    /// the body is not empty.
    pub fn log_round_trip<Q, S, E>(
        &self,
        request: &Request<Q>,
        response: Option<&Response<S>>,
        error: Option<E>,
        elapsed: Duration,
    ) -> Result<(), E>
    where
        Q: AsRef<[u8]>,
        S: AsRef<[u8]>,
    {
        if request.method() != Method::HEAD {
            let uri = request.uri();
            let query = uri.query().map(unescape_query).unwrap_or_default();
            let path = if query.is_empty() {
                uri.path().to_string()
            } else {
                format!("{}?{}", uri.path(), query)
            };

            let fields = Fields::new()
                .with("Method", request.method().as_str())
                .with("Scheme", uri.scheme_str().unwrap_or_default())
                .with("Host", uri.authority().map(|a| a.as_str()).unwrap_or_default())
                .with("Path", path)
                .with("Status", status_text(response))
                .with("Time", format_duration(truncate_millis(elapsed)));
            self.logger.info(Self::MESSAGE, fields);
        }

        if self.request_body {
            let body = flatten_body(request.body().as_ref());
            if !body.is_empty() {
                self.logger
                    .info(format!("{} {}", Self::REQUEST_MESSAGE, body), ());
            }
        }

        if self.response_body {
            if let Some(response) = response {
                let body = flatten_body(response.body().as_ref());
                if !body.is_empty() {
                    self.logger
                        .info(format!("{} {}", Self::RESPONSE_MESSAGE, body), ());
                }
            }
        }

        match error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Query unescaping with `+` as space; undecodable input yields an empty string.
fn unescape_query(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_default()
}

fn status_text<S>(response: Option<&Response<S>>) -> String {
    match response {
        Some(response) => {
            let status = response.status();
            match status.canonical_reason() {
                Some(reason) => format!("{} {}", status.as_str(), reason),
                None => status.as_str().to_string(),
            }
        }
        None => "ERROR".to_string(),
    }
}

fn truncate_millis(elapsed: Duration) -> Duration {
    Duration::from_millis(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

/// Every non-empty line trimmed and concatenated
fn flatten_body(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}
