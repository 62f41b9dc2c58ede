// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core invocation primitives – requests, responses, errors & transport.
//!
//! Everything that physically moves through the invocation pipeline is
//! defined in this module.  No model logic lives here; that sits in
//! `model` (dispatch) and `mapper`/`interceptor` (behaviour).

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use futures_util::TryStreamExt;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::Config;

/// Boxed application-level error, as produced by response exception mappers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while building or invoking a rest client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP transport error
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Client definition error (invalid model, missing base URI, bad bindings)
    #[error("client definition error: {0}")]
    Definition(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Async interceptor error
    #[error("interceptor error: {0}")]
    Interceptor(String),

    /// Timeout error
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Application-level error raised by a response exception mapper
    #[error("mapped application error: {0}")]
    Mapped(BoxError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<crate::config::ConfigError> for ClientError {
    fn from(err: crate::config::ConfigError) -> Self {
        ClientError::Config(err.to_string())
    }
}

/// Terminal outcome of a failed invocation: the primary fault plus any
/// cleanup faults recorded after it.
///
/// A caller always receives exactly one primary error; `remove_context`
/// failures that happened while tearing the invocation down are attached
/// as `suppressed` so they are never silently lost.
#[derive(Debug)]
pub struct InvocationError {
    /// The error reported to the caller.
    pub primary: ClientError,
    /// Cleanup faults recorded after the primary, in occurrence order.
    pub suppressed: Vec<ClientError>,
}

impl InvocationError {
    /// Wrap a primary error with no suppressed faults.
    pub fn new(primary: ClientError) -> Self {
        Self {
            primary,
            suppressed: Vec::new(),
        }
    }

    /// Record a secondary fault.
    pub fn suppress(&mut self, err: ClientError) {
        self.suppressed.push(err);
    }
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.suppressed.is_empty() {
            write!(f, "{}", self.primary)
        } else {
            write!(
                f,
                "{} ({} suppressed cleanup fault(s))",
                self.primary,
                self.suppressed.len()
            )
        }
    }
}

impl std::error::Error for InvocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.primary)
    }
}

impl From<ClientError> for InvocationError {
    fn from(primary: ClientError) -> Self {
        Self::new(primary)
    }
}

/// HTTP methods a client method can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
}

impl HttpMethod {
    /// The verb name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

/// Context data carried by a single invocation and accessible to
/// interceptors and transports.
///
/// One context is created per logical invocation and travels with the
/// request through every pipeline phase.  There is no thread-local
/// propagation anywhere in the crate; this object is the only carrier.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Correlation id for this invocation, used in log output
    pub invocation_id: Uuid,
    /// When the invocation was composed
    pub start_time: Option<Instant>,
    /// Custom attributes that can be set by interceptors
    pub attributes: HashMap<String, serde_json::Value>,
}

impl InvocationContext {
    /// Create a fresh context for one invocation.
    pub fn new() -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            start_time: Some(Instant::now()),
            attributes: HashMap::new(),
        }
    }
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A fully composed HTTP request, ready for the transport.
#[derive(Debug)]
pub struct ClientRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub context: InvocationContext,
}

/// A received HTTP response with a fully buffered body.
///
/// The body is read from the wire exactly once, when the transport
/// completes.  Exception mappers and result conversion may inspect it any
/// number of times afterwards.
#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ClientResponse {
    /// Whether the status code is in the 2xx/3xx range.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }

    /// The body decoded as (lossy) UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The body decoded as JSON into the requested type.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ClientError::Other(format!("failed to decode response body: {e}")))
    }
}

/// The outbound HTTP capability the client is composed around.
///
/// The default implementation is [`ReqwestTransport`]; tests substitute
/// their own to observe composed requests without a network.
#[async_trait::async_trait]
pub trait HttpTransport: fmt::Debug + Send + Sync {
    /// Execute the request and return the received response.
    async fn send(&self, request: ClientRequest) -> Result<ClientResponse, ClientError>;
}

/// Transport backed by a shared [`reqwest::Client`].
#[derive(Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Build a transport, taking the request timeout from `client.timeout`
    /// (seconds, default 30).
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let timeout_secs: u64 = config.get_or_default("client.timeout", 30)?;
        let timeout = Duration::from_secs(timeout_secs);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Transport)?;

        Ok(Self { client, timeout })
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ClientRequest) -> Result<ClientResponse, ClientError> {
        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .headers(request.headers.clone());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = timeout(self.timeout, builder.send())
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))?
            .map_err(ClientError::Transport)?;

        let status = resp.status().as_u16();
        let headers = resp.headers().clone();

        // Drain the stream into a single buffer; later stages may inspect
        // the body more than once.
        let mut stream = resp.bytes_stream();
        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.try_next().await? {
            buf.extend_from_slice(&chunk);
        }

        log::debug!(
            "[{}] {} {} -> {} ({} bytes)",
            request.context.invocation_id,
            request.method,
            request.url,
            status,
            buf.len()
        );

        Ok(ClientResponse {
            status,
            headers,
            body: buf.freeze(),
        })
    }
}
