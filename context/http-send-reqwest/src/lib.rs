//! reqwest-backed transport for the reqflow request engine.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;
use reqflow_core::{Error, HttpSend, Result};
use reqwest::{Client, Request};

/// HttpSend implementation backed by a shared [`reqwest::Client`].
///
/// Connection pooling, TLS and timeouts are the client's concern; configure
/// them on the `reqwest::Client` passed to [`ReqwestHttpSend::new`].
#[derive(Debug, Default)]
pub struct ReqwestHttpSend {
    client: Client,
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend with a reqwest::Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let req = Request::try_from(req)
            .map_err(|e| Error::transport("failed to convert outbound request").with_source(e))?;
        let resp: http::Response<_> = self
            .client
            .execute(req)
            .await
            .map_err(|e| Error::transport(format!("failed to send request: {e}")).with_source(e))?
            .into();

        let (parts, body) = resp.into_parts();
        let bs = BodyExt::collect(body)
            .await
            .map(|buf| buf.to_bytes())
            .map_err(|e| {
                Error::transport("failed to read response body").with_source(e)
            })?;
        Ok(http::Response::from_parts(parts, bs))
    }
}
