//! Default stage handlers shared by every client.
//!
//! Each behavior here is composable: clients that want different semantics
//! clear the stage list and install their own handlers.

use crate::{AsyncSleep, Error, ErrorKind, Handle, HttpSend, Request, RetryPolicy};
use http::header;
use http::HeaderValue;
use log::debug;
use std::sync::Arc;

/// User agent reported when the caller did not set one.
const DEFAULT_USER_AGENT: &str = concat!("reqflow/", env!("CARGO_PKG_VERSION"));

/// Rejects requests whose URI carries no authority, before any network I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateEndpoint;

#[async_trait::async_trait]
impl Handle for ValidateEndpoint {
    async fn handle(&self, req: &mut Request) {
        if req.error.is_some() {
            return;
        }
        if req.parts.uri.authority().is_none() {
            req.fail(Error::validation("request endpoint has no authority"));
        }
    }
}

/// Tags the outbound request with the library user agent if none is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserAgent;

#[async_trait::async_trait]
impl Handle for UserAgent {
    async fn handle(&self, req: &mut Request) {
        if req.parts.headers.get(header::USER_AGENT).is_none() {
            req.parts
                .headers
                .insert(header::USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        }
    }
}

/// Computes `Content-Length` from the finalized body.
///
/// Runs after the serializing build handlers, so body producers prepend
/// themselves to the build list.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildContentLength;

#[async_trait::async_trait]
impl Handle for BuildContentLength {
    async fn handle(&self, req: &mut Request) {
        if req.error.is_some() || req.body.is_empty() {
            return;
        }
        req.parts.headers.insert(
            header::CONTENT_LENGTH,
            HeaderValue::from(req.body.len() as u64),
        );
    }
}

/// Performs the network transport call through the shared [`HttpSend`].
///
/// Transport failures are recorded as retryable-by-default [`Transport`]
/// errors; a preceding send handler may pre-set the request's retryable flag
/// to override the policy's verdict.
///
/// [`Transport`]: crate::ErrorKind::Transport
#[derive(Debug)]
pub struct SendHandler {
    http: Arc<dyn HttpSend>,
}

impl SendHandler {
    /// Create a send handler over the given transport.
    pub fn new(http: Arc<dyn HttpSend>) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl Handle for SendHandler {
    async fn handle(&self, req: &mut Request) {
        if req.error.is_some() {
            return;
        }

        let body = req.body.read_remaining();
        let outbound = http::Request::builder()
            .method(req.parts.method.clone())
            .uri(req.parts.uri.clone())
            .version(req.parts.version)
            .body(body);
        let outbound = match outbound {
            Ok(mut r) => {
                *r.headers_mut() = req.parts.headers.clone();
                r
            }
            Err(e) => {
                req.fail(
                    Error::unexpected("failed to assemble outbound request")
                        .with_source(anyhow::Error::from(e)),
                );
                return;
            }
        };

        match self.http.http_send(outbound).await {
            Ok(resp) => req.response = Some(resp),
            Err(err) => {
                let err = if err.kind() == ErrorKind::Transport {
                    err
                } else {
                    Error::transport(err.to_string()).with_source(err)
                };
                req.fail(err);
            }
        }
    }
}

/// Classifies the response status: anything outside 2xx fails the attempt
/// with a [`Service`] error carrying the status code. The error-unmarshal
/// stage fills in code and message afterwards.
///
/// [`Service`]: crate::ErrorKind::Service
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateStatus;

#[async_trait::async_trait]
impl Handle for ValidateStatus {
    async fn handle(&self, req: &mut Request) {
        if req.error.is_some() {
            return;
        }
        let Some(resp) = &req.response else {
            req.fail(Error::unexpected("send stage produced no response"));
            return;
        };

        let status = resp.status();
        if !status.is_success() {
            req.fail(Error::service(format!("http status {status}")).with_status(status));
        }
    }
}

/// Consults the [`RetryPolicy`] to decide whether the failed attempt is
/// retryable and what the backoff is.
///
/// An explicit decision already on the request (set by a transport handler)
/// is honored and never overwritten. This stage only decides; the sleep
/// happens in [`AfterRetryHandler`].
#[derive(Debug)]
pub struct RetryHandler {
    policy: Arc<dyn RetryPolicy>,
}

impl RetryHandler {
    /// Create a retry-decision handler over the given policy.
    pub fn new(policy: Arc<dyn RetryPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait::async_trait]
impl Handle for RetryHandler {
    async fn handle(&self, req: &mut Request) {
        if req.error.is_none() {
            return;
        }

        if req.retryable.is_none() {
            req.retryable = Some(self.policy.should_retry(req));
        }
        if req.retryable == Some(true) {
            req.retry_delay = self.policy.retry_delay(req);
        }
    }
}

/// Sleeps out the computed backoff and resets attempt-scoped state, or
/// finalizes the error once the retry budget is spent.
#[derive(Debug)]
pub struct AfterRetryHandler {
    policy: Arc<dyn RetryPolicy>,
    sleep: Arc<dyn AsyncSleep>,
}

impl AfterRetryHandler {
    /// Create an after-retry handler over the given policy and sleeper.
    pub fn new(policy: Arc<dyn RetryPolicy>, sleep: Arc<dyn AsyncSleep>) -> Self {
        Self { policy, sleep }
    }
}

#[async_trait::async_trait]
impl Handle for AfterRetryHandler {
    async fn handle(&self, req: &mut Request) {
        if req.error.is_none() {
            return;
        }

        let retryable = req.retryable.unwrap_or(false);
        if !retryable || req.retry_count >= self.policy.max_retries() {
            if retryable {
                // The error itself was worth retrying; the budget ran out.
                if let Some(err) = req.error.as_mut() {
                    err.set_exhausted(true);
                }
            }
            return;
        }

        debug!(
            "retrying {} in {:?} (retry {} of {})",
            req.operation.name,
            req.retry_delay,
            req.retry_count + 1,
            self.policy.max_retries()
        );
        self.sleep.sleep(req.retry_delay).await;

        req.retry_count += 1;
        req.error = None;
        req.prepare_retry();
    }
}
