use crate::{Error, Result};
use bytes::Bytes;
use std::fmt::Debug;
use std::sync::Arc;

/// HttpSend is the transport capability: one synchronous exchange of an
/// outbound request for an inbound response.
///
/// The engine does not reconnect or pool connections; that is the
/// implementation's responsibility. Implementations must be safe to share
/// across concurrently running requests.
#[async_trait::async_trait]
pub trait HttpSend: Debug + Send + Sync + 'static {
    /// Send http request and return the response.
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>>;
}

#[async_trait::async_trait]
impl<T: HttpSend + ?Sized> HttpSend for Arc<T> {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        (**self).http_send(req).await
    }
}

/// NoopHttpSend is a no-op implementation that always returns an error.
///
/// This is used when no HTTP client is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHttpSend;

#[async_trait::async_trait]
impl HttpSend for NoopHttpSend {
    async fn http_send(&self, _req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        Err(Error::transport(
            "HTTP sending not supported: no HTTP client configured",
        ))
    }
}
