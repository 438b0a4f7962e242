//! HTTP transport capability and its implementations.
//!
//! A [`Transport`] performs one request/response exchange. The concrete
//! implementations compose: [`BaseTransport`] does the actual network work,
//! [`NtlmTransport`] adds transparent NTLM negotiation around any inner
//! transport, and [`DecoratingTransport`] stamps configured headers onto
//! every outgoing request before delegating.

pub mod base;
pub mod decorate;
pub mod ntlm;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::combinators::BoxBody;
use http_body_util::Full;

use crate::error::Result;

pub use base::BaseTransport;
pub use decorate::DecoratingTransport;
pub use ntlm::NtlmTransport;

/// Response body type produced by transports.
pub type Body = BoxBody<Bytes, crate::error::Error>;

/// A single HTTP request/response exchange.
///
/// Implementations must be callable concurrently: the only mutable state in
/// a round trip is the request value itself, owned by the caller for that
/// call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, req: Request<Full<Bytes>>) -> Result<Response<Body>>;
}

/// Select the transport stack for a client.
///
/// Always builds a [`BaseTransport`] honoring `skip_verify`; when `use_ntlm`
/// is set the base is wrapped in the NTLM negotiator.
pub fn build_transport(skip_verify: bool, use_ntlm: bool) -> Result<Box<dyn Transport>> {
    let base = BaseTransport::new(skip_verify)?;
    Ok(if use_ntlm {
        Box::new(NtlmTransport::new(base))
    } else {
        Box::new(base)
    })
}
