//! # Wiretap
//!
//! A Tower middleware that logs the HTTP traffic passing through a client (or server) pipeline as
//! human-readable diagnostic lines, without changing the outcome of the call.
//!
//! ## Features
//!
//! - **Four verbosity levels**: from nothing at all to request/response lines, headers and bodies
//! - **Non-destructive body capture**: bodies are buffered and replayed, so whatever consumes the
//!   message afterwards reads exactly the bytes it would have read without the logger
//! - **Binary detection**: bodies that do not look like text are summarised instead of dumped
//! - **Pluggable output**: lines go to a [`LogSink`]; `tracing` by default
//!
//! ## Quick Start
//!
//! Wrap any `Service<Request<Body>, Response = Response<Body>>`, typically an HTTP client:
//!
//! ```rust
//! use axum::body::Body;
//! use axum::http::{Request, Response};
//! use tower::{service_fn, ServiceBuilder, ServiceExt};
//! use wiretap::{Level, TrafficLoggerConfig, TrafficLoggerLayer};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layer = TrafficLoggerLayer::new(
//!     TrafficLoggerConfig::default()
//!         .with_tag("weather-api")
//!         .with_level(Level::Body),
//! )?;
//!
//! // Stands in for the real transport
//! let transport = service_fn(|_request: Request<Body>| async {
//!     Ok::<_, std::io::Error>(Response::new(Body::from("sunny")))
//! });
//!
//! let client = ServiceBuilder::new().layer(layer).service(transport);
//! let response = client
//!     .oneshot(Request::get("http://weather.example/today").body(Body::empty())?)
//!     .await?;
//! assert!(response.status().is_success());
//! # Ok(())
//! # }
//! ```
//!
//! ## Output
//!
//! At [`Level::Body`] an exchange produces two debug lines such as:
//!
//! ```text
//! #1 Sending POST request http://example.com/greeting
//! ------
//! Headers
//! ------
//! Content-Type: text/plain
//! Content-Length: 3
//! ------
//! Body: Hi?
//! ------
//! #1 Received response for http://example.com/greeting with 200 in 22ms
//! ------
//! Headers
//! ------
//! content-type: text/plain
//! ------
//! Body: Hello!
//! ------
//! ```
//!
//! The format is meant for humans and may change between releases.

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Request, Response},
};
use http_body::Body as _;
use std::{
    error::Error,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    task::{Context, Poll},
    time::Instant,
};
use tower::{Layer, Service};
use tracing::{debug, instrument};

pub mod types;
pub use types::{ConfigError, Level, TrafficLoggerConfig, DEFAULT_TAG};

pub mod body_wrapper;
use body_wrapper::buffer_body;

pub mod inspect;
use inspect::{is_cancellation, is_encoded, is_plaintext, response_has_body, Charset};

pub mod sink;
pub use sink::{LogRecord, LogSink, MemorySink, Severity, TracingSink};

pub mod multi_sink;
pub use multi_sink::MultiSink;

/// Response bodies longer than this are truncated in the log.
const BODY_PREVIEW_BYTES: usize = 1024;

/// Logs the exchanges it intercepts and forwards them untouched.
///
/// Most users reach it through [`TrafficLoggerLayer`]; hosts that are not built on Tower can call
/// [`TrafficLogger::intercept`] directly.
pub struct TrafficLogger {
    tag: String,
    level: Level,
    counter: AtomicU64,
    sink: Arc<dyn LogSink>,
}

impl TrafficLogger {
    /// Create a logger that writes through [`TracingSink`].
    pub fn new(config: TrafficLoggerConfig) -> Result<Self, ConfigError> {
        Self::with_sink(config, TracingSink)
    }

    /// Create a logger that writes to `sink`.
    ///
    /// Fails with [`ConfigError::MissingLevel`] if the configuration does not set a level.
    pub fn with_sink<L: LogSink>(config: TrafficLoggerConfig, sink: L) -> Result<Self, ConfigError> {
        let (tag, level) = config.resolve()?;
        Ok(Self {
            tag,
            level,
            counter: AtomicU64::new(0),
            sink: Arc::new(sink),
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Log `request`, forward it to `next`, log the outcome and return it.
    ///
    /// `next` must already be ready to accept a request, as with [`Service::call`]. The returned
    /// response is the one produced by `next`; its body may have been replaced by an equivalent
    /// body replaying the same bytes. Errors from `next` are returned unchanged.
    #[instrument(skip_all, fields(tag = %self.tag))]
    pub async fn intercept<S>(&self, mut request: Request<Body>, mut next: S) -> Result<Response<Body>, S::Error>
    where
        S: Service<Request<Body>, Response = Response<Body>>,
        S::Error: Error + 'static,
    {
        if self.level == Level::None {
            return next.call(request).await;
        }

        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let log_body = self.level == Level::Body;
        let log_headers = log_body || self.level == Level::Headers;

        let method = request.method().clone();
        let uri = request.uri().clone();

        let mut line = format!("#{id} Sending {method} request {uri}");
        if log_headers {
            let headers = request_header_block(&request);
            if log_body {
                let body = request_body_text(&mut request).await;
                line.push_str(&with_headers_and_body(&headers, &body));
            } else {
                line.push_str(&with_headers(&headers));
            }
        }
        self.sink.debug(&self.tag, &line);

        let start = Instant::now();
        let result = next.call(request).await;
        let took_ms = start.elapsed().as_millis();

        let mut response = match result {
            Ok(response) => response,
            Err(e) => {
                if is_cancellation(&e) {
                    debug!(correlation_id = id, "Forwarded call was canceled");
                } else {
                    self.sink
                        .warn(&self.tag, &format!("Response failed for {uri}"), Some(&e));
                }
                return Err(e);
            }
        };

        let status = response.status();
        let mut line = format!(
            "#{id} Received response for {uri} with {} in {took_ms}ms",
            status.as_u16()
        );
        if log_headers {
            let headers = header_block(response.headers().iter());
            if log_body {
                let mut body = String::new();
                if response_has_body(&method, status, response.headers())
                    && !is_encoded(response.headers())
                {
                    debug!(correlation_id = id, "Buffering response body");
                    let original = std::mem::replace(response.body_mut(), Body::empty());
                    let buffered = buffer_body(original).await;
                    *response.body_mut() = buffered.body;

                    if let Some(error) = buffered.error {
                        let text = format!("Internal Error! Response body stream was closed: {error}");
                        line.push_str(&with_headers_and_body(&headers, &text));
                        self.sink.warn(&self.tag, &line, Some(&error));
                        return Ok(response);
                    }

                    body = response_body_text(&buffered.bytes, Charset::from_headers(response.headers()));
                }
                line.push_str(&with_headers_and_body(&headers, &body));
            } else {
                line.push_str(&with_headers(&headers));
            }
        }
        self.sink.debug(&self.tag, &line);

        Ok(response)
    }
}

impl std::fmt::Debug for TrafficLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficLogger")
            .field("tag", &self.tag)
            .field("level", &self.level)
            .field("counter", &self.counter.load(Ordering::Relaxed))
            .finish()
    }
}

fn with_headers(headers: &str) -> String {
    format!("\n------\nHeaders\n------{headers}\n------")
}

fn with_headers_and_body(headers: &str, body: &str) -> String {
    format!("\n------\nHeaders\n------{headers}\n------\nBody: {body}\n------")
}

fn header_block<'a>(headers: impl Iterator<Item = (&'a HeaderName, &'a HeaderValue)>) -> String {
    let mut block = String::new();
    for (name, value) in headers {
        block.push('\n');
        block.push_str(name.as_str());
        block.push_str(": ");
        block.push_str(&String::from_utf8_lossy(value.as_bytes()));
    }
    block
}

/// Headers of an outgoing request, led by the entries describing its body.
///
/// Content headers may only be added by a lower layer, so they are rebuilt from the body itself
/// when possible and never listed twice.
fn request_header_block(request: &Request<Body>) -> String {
    let headers = request.headers();
    let mut block = String::new();

    if has_body(request) {
        if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
            block.push_str("\nContent-Type: ");
            block.push_str(&String::from_utf8_lossy(content_type.as_bytes()));
        }
        let content_length = request
            .body()
            .size_hint()
            .exact()
            .or_else(|| inspect::declared_content_length(headers));
        if let Some(length) = content_length {
            block.push_str(&format!("\nContent-Length: {length}"));
        }
    }

    block.push_str(&header_block(
        headers
            .iter()
            .filter(|(name, _)| **name != header::CONTENT_TYPE && **name != header::CONTENT_LENGTH),
    ));
    block
}

fn has_body(request: &Request<Body>) -> bool {
    !request.body().is_end_stream()
}

/// Body text for the request line. Buffers the body and puts an equivalent one back.
async fn request_body_text(request: &mut Request<Body>) -> String {
    if !has_body(request) {
        return "no body".to_string();
    }
    if is_encoded(request.headers()) {
        return "encoded body omitted".to_string();
    }

    let original = std::mem::replace(request.body_mut(), Body::empty());
    let buffered = buffer_body(original).await;
    *request.body_mut() = buffered.body;

    if let Some(error) = buffered.error {
        // The next stage reads the same failure from the replayed body.
        debug!(error = %error, "Request body could not be buffered");
        return String::new();
    }
    if !is_plaintext(&buffered.bytes) {
        return String::new();
    }
    Charset::from_headers(request.headers()).decode(&buffered.bytes)
}

fn response_body_text(bytes: &[u8], charset: Charset) -> String {
    if !is_plaintext(bytes) {
        return format!("(binary {}-byte body omitted)", bytes.len());
    }
    if bytes.len() > BODY_PREVIEW_BYTES {
        let mut text = charset.decode_prefix(bytes, BODY_PREVIEW_BYTES);
        text.push_str("...");
        text
    } else {
        charset.decode(bytes)
    }
}

/// Tower layer for the traffic logging middleware.
///
/// Every service produced by one layer shares the same [`TrafficLogger`], and therefore the same
/// exchange counter.
///
/// # Examples
///
/// ```rust
/// use wiretap::{Level, MemorySink, TrafficLoggerConfig, TrafficLoggerLayer};
///
/// let sink = MemorySink::new();
/// let layer = TrafficLoggerLayer::with_sink(
///     TrafficLoggerConfig::default().with_level(Level::Headers),
///     sink.clone(),
/// )
/// .unwrap();
/// assert_eq!(layer.logger().tag(), "HTTP");
///
/// // Without a level the layer cannot be built
/// assert!(TrafficLoggerLayer::new(TrafficLoggerConfig::default()).is_err());
/// ```
#[derive(Clone, Debug)]
pub struct TrafficLoggerLayer {
    logger: Arc<TrafficLogger>,
}

impl TrafficLoggerLayer {
    /// Create a layer that writes through [`TracingSink`].
    pub fn new(config: TrafficLoggerConfig) -> Result<Self, ConfigError> {
        Ok(Self::from_logger(TrafficLogger::new(config)?))
    }

    /// Create a layer that writes to `sink`.
    pub fn with_sink<L: LogSink>(config: TrafficLoggerConfig, sink: L) -> Result<Self, ConfigError> {
        Ok(Self::from_logger(TrafficLogger::with_sink(config, sink)?))
    }

    pub fn from_logger(logger: TrafficLogger) -> Self {
        Self {
            logger: Arc::new(logger),
        }
    }

    pub fn logger(&self) -> &TrafficLogger {
        &self.logger
    }
}

impl<S> Layer<S> for TrafficLoggerLayer {
    type Service = TrafficLoggerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TrafficLoggerService {
            inner,
            logger: self.logger.clone(),
        }
    }
}

/// Tower service implementation for the traffic logging middleware.
///
/// Users typically don't interact with this type directly - it's created by
/// [`TrafficLoggerLayer`].
#[derive(Clone, Debug)]
pub struct TrafficLoggerService<S> {
    inner: S,
    logger: Arc<TrafficLogger>,
}

impl<S> Service<Request<Body>> for TrafficLoggerService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Error + Send + Sync + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        if self.logger.level() == Level::None {
            return Box::pin(self.inner.call(request));
        }

        // Call the instance that was driven to readiness, keep a fresh clone for the next call.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let logger = self.logger.clone();

        Box::pin(async move { logger.intercept(request, inner).await })
    }
}
