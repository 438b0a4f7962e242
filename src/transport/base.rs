//! TLS-configured base transport over the hyper legacy client.

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;

use crate::error::{Error, Result};
use crate::transport::{Body, Transport};

/// Plain network transport: TCP + TLS via native-tls, HTTP via hyper.
///
/// Connection pooling is left to the hyper client defaults.
pub struct BaseTransport {
    client: HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl BaseTransport {
    /// Build the transport.
    ///
    /// `skip_verify` disables server certificate verification entirely:
    /// expired, self-signed, and hostname-mismatched certificates are all
    /// accepted. The resulting connection is open to man-in-the-middle
    /// interception; only use it against peers that cannot present a valid
    /// chain.
    pub fn new(skip_verify: bool) -> Result<Self> {
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(skip_verify)
            .danger_accept_invalid_hostnames(skip_verify)
            .build()
            .map_err(|e| Error::tls(e.to_string()))?;

        let mut http = HttpConnector::new();
        http.enforce_http(false);

        let connector = HttpsConnector::from((http, tokio_native_tls::TlsConnector::from(tls)));
        let client = HyperClient::builder(TokioExecutor::new()).build(connector);
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for BaseTransport {
    async fn round_trip(&self, req: Request<Full<Bytes>>) -> Result<Response<Body>> {
        let resp: Response<Incoming> = self
            .client
            .request(req)
            .await
            .map_err(|e| Error::connection(e.to_string()))?;
        Ok(resp.map(|body| {
            body.map_err(|e| Error::connection(e.to_string())).boxed()
        }))
    }
}
