//! Transparent NTLM negotiation around an inner transport.
//!
//! Requests carrying Basic credentials are probed anonymously first, in
//! case the server still finds us authenticated; the credentials stay off
//! the wire until the server asks for them. A 401 without an NTLM demand
//! gets one replay with the Basic header; a 401 with an `NTLM` (or
//! `Negotiate`) demand starts the handshake: a NEGOTIATE message, the
//! server's CHALLENGE, then an AUTHENTICATE message with the NTLMv2
//! response. Every other response passes through verbatim.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};

use crate::auth::parse_basic_credentials;
use crate::error::{Error, Result};
use crate::ntlm;
use crate::transport::{Body, Transport};

/// Decorator that performs the NTLM handshake per request.
pub struct NtlmTransport<T> {
    inner: T,
}

impl<T: Transport> NtlmTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: Transport> Transport for NtlmTransport<T> {
    async fn round_trip(&self, mut req: Request<Full<Bytes>>) -> Result<Response<Body>> {
        // Without a credential pair there is nothing to negotiate with.
        let credentials = req.headers().get(AUTHORIZATION).and_then(parse_basic_credentials);
        let Some((username, password)) = credentials else {
            return self.inner.round_trip(req).await;
        };

        // Anonymous first, in case the server still finds us authenticated.
        let mut probe = clone_request(&req)?;
        probe.headers_mut().remove(AUTHORIZATION);
        let mut resp = self.inner.round_trip(probe).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        if ntlm_scheme(&resp).is_none() {
            // Unauthorized without an NTLM demand: offer the Basic header.
            drain(resp).await?;
            resp = self.inner.round_trip(clone_request(&req)?).await?;
            if resp.status() != StatusCode::UNAUTHORIZED {
                return Ok(resp);
            }
        }
        let Some(scheme) = ntlm_scheme(&resp) else {
            return Ok(resp);
        };

        tracing::debug!(scheme, "server demands NTLM, negotiating");
        drain(resp).await?;

        let mut negotiate = clone_request(&req)?;
        let token = BASE64.encode(ntlm::negotiate_message());
        negotiate
            .headers_mut()
            .insert(AUTHORIZATION, token_header(scheme, &token)?);
        let resp = self.inner.round_trip(negotiate).await?;

        let Some(challenge_token) = challenge_token(&resp, scheme) else {
            // No challenge came back; hand the server's answer up unchanged.
            return Ok(resp);
        };
        let raw = BASE64
            .decode(challenge_token.trim())
            .map_err(|e| Error::ntlm(format!("challenge is not valid base64: {e}")))?;
        let challenge = ntlm::parse_challenge(&raw)?;
        drain(resp).await?;

        let token = BASE64.encode(ntlm::authenticate_message(&challenge, &username, &password));
        req.headers_mut()
            .insert(AUTHORIZATION, token_header(scheme, &token)?);
        self.inner.round_trip(req).await
    }
}

/// Scheme the server demanded, if any `WWW-Authenticate` value names NTLM.
fn ntlm_scheme(resp: &Response<Body>) -> Option<&'static str> {
    for value in resp.headers().get_all(WWW_AUTHENTICATE) {
        let Ok(value) = value.to_str() else { continue };
        let value = value.trim();
        if value == "NTLM" || value.starts_with("NTLM ") {
            return Some("NTLM");
        }
        if value == "Negotiate" || value.starts_with("Negotiate ") {
            return Some("Negotiate");
        }
    }
    None
}

/// Base64 challenge payload from a `WWW-Authenticate: <scheme> <token>` value.
fn challenge_token<'a>(resp: &'a Response<Body>, scheme: &str) -> Option<&'a str> {
    resp.headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.trim().strip_prefix(scheme)?.strip_prefix(' ').map(str::trim))
}

fn token_header(scheme: &str, token: &str) -> Result<HeaderValue> {
    let mut value =
        HeaderValue::from_str(&format!("{scheme} {token}")).map_err(http::Error::from)?;
    value.set_sensitive(true);
    Ok(value)
}

/// Discard a response body so the underlying connection can be reused.
async fn drain(resp: Response<Body>) -> Result<()> {
    let mut body = resp.into_body();
    while let Some(frame) = body.frame().await {
        frame?;
    }
    Ok(())
}

/// Rebuild a request around a clone of its (cheaply cloneable) body.
fn clone_request(req: &Request<Full<Bytes>>) -> Result<Request<Full<Bytes>>> {
    let mut clone = Request::builder()
        .method(req.method().clone())
        .uri(req.uri().clone())
        .version(req.version())
        .body(req.body().clone())
        .map_err(Error::from)?;
    *clone.headers_mut() = req.headers().clone();
    Ok(clone)
}
