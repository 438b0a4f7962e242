//! Client factory and request execution.

use std::time::Duration;

use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::Full;

use crate::config::{parse_duration, ClientConfig};
use crate::error::{Error, Result};
use crate::transport::{build_transport, Body, DecoratingTransport, Transport};

/// Timeout-bound HTTP client with header and credential injection.
///
/// Built once from a [`ClientConfig`] and immutable afterwards; safe to
/// share behind an `Arc` across tasks.
pub struct Client {
    transport: DecoratingTransport,
    timeout: Duration,
}

impl Client {
    /// Build a client from `config`.
    ///
    /// Fails if the timeout string does not parse, if the TLS connector
    /// cannot be constructed, or if the configured User-Agent is not a valid
    /// header value. An invalid timeout is a configuration error surfaced to
    /// the caller; whether to terminate on it is the caller's decision.
    pub fn new(config: ClientConfig) -> Result<Client> {
        let timeout = parse_duration(&config.timeout).map_err(|err| {
            tracing::error!(timeout = %config.timeout, %err, "invalid HTTP timeout value");
            err
        })?;

        let inner = build_transport(config.insecure_skip_verify, config.use_ntlm)?;
        let transport =
            DecoratingTransport::new(inner, &config.user_agent, &config.username, &config.password)?;

        Ok(Client { transport, timeout })
    }

    /// Effective total request timeout. Zero means unbounded.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute a prepared request.
    ///
    /// The whole exchange is bounded by the configured timeout; expiry fails
    /// the call with [`Error::Timeout`] instead of hanging. Dropping the
    /// returned future cancels the in-flight exchange.
    pub async fn execute(&self, req: Request<Full<Bytes>>) -> Result<Response<Body>> {
        if self.timeout.is_zero() {
            return self.transport.round_trip(req).await;
        }
        match tokio::time::timeout(self.timeout, self.transport.round_trip(req)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.timeout)),
        }
    }

    /// Create a GET request builder.
    pub fn get(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::GET, url)
    }

    /// Create a POST request builder.
    pub fn post(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::POST, url)
    }

    /// Create a request builder for an arbitrary method.
    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder {
            client: self,
            method,
            uri: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }
}

/// Builder for a single request.
pub struct RequestBuilder<'a> {
    client: &'a Client,
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
}

impl<'a> RequestBuilder<'a> {
    /// Add a header to the request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Send the request through the client.
    pub async fn send(self) -> Result<Response<Body>> {
        let mut builder = Request::builder().method(self.method).uri(self.uri.as_str());
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let req = builder.body(Full::new(self.body.unwrap_or_else(Bytes::new)))?;
        self.client.execute(req).await
    }
}
