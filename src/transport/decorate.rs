//! Request decoration: User-Agent stamping and Basic-Auth injection.

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{AUTHORIZATION, USER_AGENT};
use http::{HeaderValue, Request, Response};
use http_body_util::Full;

use crate::auth::basic_credentials;
use crate::error::Result;
use crate::transport::{Body, Transport};

/// Transport wrapper that applies configured headers to every request.
///
/// Holds its own copies of the configuration, fixed at construction. When a
/// User-Agent is configured it replaces whatever the caller set on the
/// request (last-write-wins); the credential pair is only applied when both
/// halves are non-empty, and likewise replaces any existing `Authorization`
/// header. With neither configured this is an exact pass-through.
pub struct DecoratingTransport {
    inner: Box<dyn Transport>,
    user_agent: Option<HeaderValue>,
    credentials: Option<HeaderValue>,
}

impl DecoratingTransport {
    /// Wrap `inner`. Fails only if `user_agent` contains bytes that are not
    /// legal in a header value.
    pub fn new(
        inner: Box<dyn Transport>,
        user_agent: &str,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        let user_agent = if user_agent.is_empty() {
            None
        } else {
            Some(HeaderValue::from_str(user_agent).map_err(http::Error::from)?)
        };
        let credentials = if username.is_empty() || password.is_empty() {
            None
        } else {
            Some(basic_credentials(username, password))
        };
        Ok(Self {
            inner,
            user_agent,
            credentials,
        })
    }
}

#[async_trait]
impl Transport for DecoratingTransport {
    async fn round_trip(&self, mut req: Request<Full<Bytes>>) -> Result<Response<Body>> {
        if let Some(user_agent) = &self.user_agent {
            req.headers_mut().insert(USER_AGENT, user_agent.clone());
        }
        if let Some(credentials) = &self.credentials {
            req.headers_mut().insert(AUTHORIZATION, credentials.clone());
        }
        self.inner.round_trip(req).await
    }
}
