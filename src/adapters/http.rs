//! HTTP request tracing
//!
//! A small middleware pipeline over a mutable request/response context, plus the
//! [`AccessLog`] stage that turns every finished request into one record.

use crate::core::{Field, Logger};
use http::{HeaderMap, Method, Request, StatusCode};
use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Paths the access log ignores unless configured otherwise
pub const DEFAULT_SKIP_PATHS: &[&str] = &["/favicon.ico"];

/// Whether a handler error is meant for the log or for the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Internal detail; logged by [`AccessLog`]
    Private,
    /// Already rendered to the client; not logged
    Public,
}

/// Error reported by a handler through its context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    pub message: String,
    pub kind: ErrorKind,
}

impl HandlerError {
    pub fn private(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::Private,
        }
    }

    pub fn public(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::Public,
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// `Error #01: first\nError #02: second\n` over the private errors; empty when there
/// are none.
pub fn private_error_text(errors: &[HandlerError]) -> String {
    errors
        .iter()
        .filter(|err| err.kind == ErrorKind::Private)
        .enumerate()
        .map(|(i, err)| format!("Error #{:02}: {}\n", i + 1, err.message))
        .collect()
}

/// Request/response state the tracing middleware reads and mutates
pub trait HttpContext {
    fn method(&self) -> &Method;
    /// URL path without the query
    fn path(&self) -> &str;
    fn raw_query(&self) -> Option<&str>;
    fn user_agent(&self) -> &str;
    fn client_ip(&self) -> String;
    /// Path and query as sent by the client
    fn request_uri(&self) -> String;
    fn status(&self) -> StatusCode;
    fn body_size(&self) -> usize;
    fn errors(&self) -> &[HandlerError];
    /// Wire-format dump of the request, body included
    fn dump_request(&self) -> Vec<u8>;
    /// Stop the remaining stages and answer with `status`
    fn abort_with_status(&mut self, status: StatusCode);
}

/// In-process request/response exchange
///
/// # Example
///
/// ```
/// use rust_trace_logger::adapters::{Exchange, HttpContext};
/// use http::Request;
///
/// let request = Request::get("/users?id=7")
///     .header("User-Agent", "curl/8.0")
///     .body(Vec::new())
///     .unwrap();
/// let exchange = Exchange::new(request);
/// assert_eq!(exchange.path(), "/users");
/// assert_eq!(exchange.raw_query(), Some("id=7"));
/// ```
#[derive(Debug)]
pub struct Exchange {
    request: Request<Vec<u8>>,
    peer: Option<SocketAddr>,
    status: StatusCode,
    response_headers: HeaderMap,
    response_body: Vec<u8>,
    errors: Vec<HandlerError>,
    aborted: bool,
}

impl Exchange {
    pub fn new(request: Request<Vec<u8>>) -> Self {
        Self {
            request,
            peer: None,
            status: StatusCode::OK,
            response_headers: HeaderMap::new(),
            response_body: Vec::new(),
            errors: Vec::new(),
            aborted: false,
        }
    }

    #[must_use]
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn request(&self) -> &Request<Vec<u8>> {
        &self.request
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response_headers
    }

    pub fn write_body(&mut self, bytes: &[u8]) {
        self.response_body.extend_from_slice(bytes);
    }

    pub fn response_body(&self) -> &[u8] {
        &self.response_body
    }

    /// Record a handler error for the access log
    pub fn push_error(&mut self, error: HandlerError) {
        self.errors.push(error);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
    }
}

impl HttpContext for Exchange {
    fn method(&self) -> &Method {
        self.request.method()
    }

    fn path(&self) -> &str {
        self.request.uri().path()
    }

    fn raw_query(&self) -> Option<&str> {
        self.request.uri().query()
    }

    fn user_agent(&self) -> &str {
        self.header("user-agent").unwrap_or_default()
    }

    /// First `X-Forwarded-For` entry, then `X-Real-IP`, then the peer address.
    fn client_ip(&self) -> String {
        let forwarded = self
            .header("x-forwarded-for")
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        let real_ip = self
            .header("x-real-ip")
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        forwarded
            .or(real_ip)
            .map(str::to_string)
            .or_else(|| self.peer.map(|peer| peer.ip().to_string()))
            .unwrap_or_default()
    }

    fn request_uri(&self) -> String {
        self.request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| self.path().to_string())
    }

    fn status(&self) -> StatusCode {
        self.status
    }

    fn body_size(&self) -> usize {
        self.response_body.len()
    }

    fn errors(&self) -> &[HandlerError] {
        &self.errors
    }

    fn dump_request(&self) -> Vec<u8> {
        let mut dump = format!(
            "{} {} {:?}\r\n",
            self.request.method(),
            self.request_uri(),
            self.request.version()
        );
        if let Some(host) = self.request.uri().host() {
            if !self.request.headers().contains_key(http::header::HOST) {
                dump.push_str(&format!("Host: {}\r\n", host));
            }
        }
        for (name, value) in self.request.headers() {
            dump.push_str(&format!(
                "{}: {}\r\n",
                name,
                String::from_utf8_lossy(value.as_bytes())
            ));
        }
        dump.push_str("\r\n");

        let mut bytes = dump.into_bytes();
        bytes.extend_from_slice(self.request.body());
        bytes
    }

    fn abort_with_status(&mut self, status: StatusCode) {
        self.status = status;
        self.aborted = true;
    }
}

/// One pipeline stage
pub trait Middleware<C>: Send + Sync {
    fn handle(&self, ctx: &mut C, next: Next<'_, C>);
}

/// Stage built from a closure, see [`from_fn`]
#[derive(Clone)]
pub struct FromFn<F>(F);

/// Wrap a closure taking the context and the [`Next`] primitive as a stage.
pub fn from_fn<C, F>(f: F) -> FromFn<F>
where
    F: for<'a> Fn(&mut C, Next<'a, C>) + Send + Sync,
{
    FromFn(f)
}

impl<C, F> Middleware<C> for FromFn<F>
where
    F: for<'a> Fn(&mut C, Next<'a, C>) + Send + Sync,
{
    fn handle(&self, ctx: &mut C, next: Next<'_, C>) {
        (self.0)(ctx, next)
    }
}

/// Final handler of a pipeline
pub type Endpoint<C> = dyn Fn(&mut C) + Send + Sync;

/// The "continue" primitive handed to each stage
pub struct Next<'a, C> {
    stages: &'a [Arc<dyn Middleware<C>>],
    endpoint: &'a Endpoint<C>,
}

impl<'a, C> Next<'a, C> {
    /// Run the remaining stages and the endpoint on the calling thread.
    pub fn run(self, ctx: &mut C) {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.handle(
                ctx,
                Next {
                    stages: rest,
                    endpoint: self.endpoint,
                },
            ),
            None => (self.endpoint)(ctx),
        }
    }
}

/// Ordered middleware chain ending in an endpoint
///
/// # Example
///
/// ```
/// use rust_trace_logger::adapters::{Exchange, Pipeline};
/// use http::{Request, StatusCode};
///
/// let pipeline = Pipeline::new(|ex: &mut Exchange| ex.set_status(StatusCode::CREATED));
/// let mut exchange = Exchange::new(Request::post("/items").body(Vec::new()).unwrap());
/// pipeline.handle(&mut exchange);
/// ```
pub struct Pipeline<C> {
    stages: Vec<Arc<dyn Middleware<C>>>,
    endpoint: Box<Endpoint<C>>,
}

impl<C> Pipeline<C> {
    pub fn new<F>(endpoint: F) -> Self
    where
        F: Fn(&mut C) + Send + Sync + 'static,
    {
        Self {
            stages: Vec::new(),
            endpoint: Box::new(endpoint),
        }
    }

    /// Append a stage; stages run in insertion order around the endpoint.
    #[must_use]
    pub fn with<M: Middleware<C> + 'static>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    pub fn handle(&self, ctx: &mut C) {
        Next {
            stages: &self.stages,
            endpoint: self.endpoint.as_ref(),
        }
        .run(ctx);
    }
}

/// Access log middleware
///
/// After the rest of the pipeline has run, emits one Info record `[HTTP]` with
/// `Path`, `Code`, `Method`, `User-Agent`, `Latency`, `ClientIP` and `BodySize`, or,
/// when the handlers reported private errors, one Error record with `Path` and the
/// joined `Error` text. Requests for a skipped path are never logged.
#[derive(Debug, Clone)]
pub struct AccessLog {
    logger: Arc<Logger>,
    skip_paths: HashSet<String>,
}

impl AccessLog {
    pub const MESSAGE: &'static str = "[HTTP]";

    pub fn new(logger: Arc<Logger>) -> Self {
        Self {
            logger,
            skip_paths: DEFAULT_SKIP_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Replace the skip set
    #[must_use]
    pub fn with_skip_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn skips(&self, path: &str) -> bool {
        self.skip_paths.contains(path)
    }

    fn record<C: HttpContext>(&self, ctx: &C, path: &str, started: Instant) {
        let latency = started.elapsed();
        let errors = private_error_text(ctx.errors());

        if errors.is_empty() {
            let full_path = match ctx.raw_query() {
                Some(query) if !query.is_empty() => format!("{}?{}", path, query),
                _ => path.to_string(),
            };
            self.logger.info(
                Self::MESSAGE,
                [
                    Field::string("Path", full_path),
                    Field::int("Code", i64::from(ctx.status().as_u16())),
                    Field::string("Method", ctx.method().as_str()),
                    Field::string("User-Agent", ctx.user_agent()),
                    Field::duration("Latency", latency),
                    Field::string("ClientIP", ctx.client_ip()),
                    Field::new("BodySize", ctx.body_size()),
                ],
            );
        } else {
            self.logger.error(
                Self::MESSAGE,
                [Field::string("Path", path), Field::string("Error", errors)],
            );
        }
    }
}

impl<C: HttpContext> Middleware<C> for AccessLog {
    fn handle(&self, ctx: &mut C, next: Next<'_, C>) {
        let started = Instant::now();
        let path = ctx.path().to_string();

        next.run(ctx);

        if !self.skips(&path) {
            self.record(ctx, &path, started);
        }
    }
}
