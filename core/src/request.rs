use crate::time::{now, DateTime};
use crate::{Body, Error, Handlers, Operation, Result};
use bytes::Bytes;
use http::Uri;
use log::debug;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// Request owns one HTTP exchange's mutable state and drives the pipeline
/// stages in order.
///
/// A Request is single-use: created fresh for every API invocation and
/// dropped after [`send`](Request::send) returns. Each Request carries its
/// own copy of the client's [`Handlers`], so per-call customization never
/// mutates shared state.
pub struct Request {
    /// Time the request was created.
    pub time: DateTime,
    /// The operation this request executes.
    pub operation: Arc<Operation>,
    /// Outbound HTTP message, body excluded.
    pub parts: http::request::Parts,
    /// Outbound body. Must be finalized before the sign stage runs.
    pub body: Body,
    /// Inbound HTTP message, set by the send stage.
    pub response: Option<http::Response<Bytes>>,
    /// Accumulated error. Handlers record failures here instead of aborting.
    pub error: Option<Error>,
    /// Number of retries performed so far. Starts at zero.
    pub retry_count: u32,
    /// Tri-state retry decision for the current failed attempt: `None` until
    /// decided, then the retry stage's (or a transport handler's) verdict.
    pub retryable: Option<bool>,
    /// Backoff computed by the retry stage for the next attempt.
    pub retry_delay: Duration,
    /// Request-tracking id extracted from the response metadata.
    pub request_id: Option<String>,
    /// Expiry selecting query presigning; set by [`presign`](Request::presign).
    pub presign_expires: Option<Duration>,
    /// This request's private copy of the pipeline.
    pub handlers: Handlers,

    output: Option<Box<dyn Any + Send>>,
    built: bool,
    signed: bool,
}

impl Request {
    /// Create a request for one operation against the given endpoint.
    pub fn new(operation: Operation, endpoint: &Uri, handlers: Handlers) -> Result<Self> {
        let scheme = endpoint.scheme_str().unwrap_or("https");
        let authority = endpoint
            .authority()
            .ok_or_else(|| Error::validation("endpoint has no authority"))?;
        let path = if operation.path.is_empty() {
            "/"
        } else {
            operation.path.as_str()
        };
        let uri: Uri = format!("{scheme}://{authority}{path}").parse()?;

        let (parts, _) = http::Request::builder()
            .method(operation.method.clone())
            .uri(uri)
            .body(())?
            .into_parts();

        Ok(Self {
            time: now(),
            operation: Arc::new(operation),
            parts,
            body: Body::empty(),
            response: None,
            error: None,
            retry_count: 0,
            retryable: None,
            retry_delay: Duration::ZERO,
            request_id: None,
            presign_expires: None,
            handlers,
            output: None,
            built: false,
            signed: false,
        })
    }

    /// Replace the outbound body. Must happen before the sign stage: the
    /// body's content hash is part of what is signed.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    /// Record a failure. Later stages observe it through
    /// [`error`](Request::error) and short-circuit as appropriate.
    pub fn fail(&mut self, err: Error) {
        self.error = Some(err);
    }

    /// Store the decoded output. Called by unmarshal handlers.
    pub fn set_output(&mut self, output: impl Any + Send) {
        self.output = Some(Box::new(output));
    }

    /// Take the decoded output, if the unmarshal stage stored a `T`.
    pub fn take_output<T: Any>(&mut self) -> Option<T> {
        match self.output.take()?.downcast::<T>() {
            Ok(v) => Some(*v),
            Err(other) => {
                self.output = Some(other);
                None
            }
        }
    }

    /// Run the validate and build stages.
    ///
    /// Idempotent within an attempt: a second call is a no-op, so presigning
    /// and sending can share the machinery safely. Errors here mean a
    /// malformed call and are never retried.
    pub async fn build(&mut self) -> Result<()> {
        if self.built {
            return Ok(());
        }

        let validate = self.handlers.validate.clone();
        validate.run(self).await;
        if self.error.is_some() {
            return Err(self.finish_error());
        }

        let build = self.handlers.build.clone();
        build.run(self).await;
        if self.error.is_some() {
            return Err(self.finish_error());
        }

        self.built = true;
        Ok(())
    }

    /// Run the validate, build and sign stages.
    ///
    /// Signing is a no-op if this attempt is already signed.
    pub async fn sign(&mut self) -> Result<()> {
        self.build().await?;
        if self.signed {
            return Ok(());
        }

        let sign = self.handlers.sign.clone();
        sign.run(self).await;
        if self.error.is_some() {
            return Err(self.finish_error());
        }

        self.signed = true;
        Ok(())
    }

    /// Sign the request for out-of-band use and return the authenticated URI
    /// without sending anything.
    pub async fn presign(&mut self, expires_in: Duration) -> Result<Uri> {
        self.presign_expires = Some(expires_in);
        self.sign().await?;

        Ok(self.parts.uri.clone())
    }

    /// Execute the request: drive the pipeline stages in order, looping back
    /// through the retry stages on failure until success, a terminal error,
    /// or retry exhaustion.
    ///
    /// Returns `Ok(())` with the output sink populated, or one structured
    /// [`Error`] carrying status, code, message and retry count.
    pub async fn send(&mut self) -> Result<()> {
        loop {
            self.sign().await?;

            if self.retry_count > 0 {
                // A retried attempt must transmit byte-identical content.
                self.body.rewind();
            }

            debug!(
                "sending {} (attempt {})",
                self.operation.name,
                self.retry_count + 1
            );
            self.retryable = None;
            let send = self.handlers.send.clone();
            send.run(self).await;
            if self.error.is_some() {
                if self.retry().await {
                    continue;
                }
                return Err(self.finish_error());
            }

            let meta = self.handlers.unmarshal_meta.clone();
            meta.run(self).await;

            let validate = self.handlers.validate_response.clone();
            validate.run(self).await;
            if self.error.is_some() {
                let unmarshal_error = self.handlers.unmarshal_error.clone();
                unmarshal_error.run(self).await;
                if self.retry().await {
                    continue;
                }
                return Err(self.finish_error());
            }

            let unmarshal = self.handlers.unmarshal.clone();
            unmarshal.run(self).await;
            return match self.error.take() {
                // A success response with an undecodable body is a protocol
                // mismatch; resending would reproduce the same bytes.
                Some(mut err) => {
                    err.set_attempts(self.retry_count);
                    Err(err)
                }
                None => Ok(()),
            };
        }
    }

    /// Reset attempt-scoped state so the next loop iteration re-signs and
    /// re-sends. Called by after-retry handlers once the backoff has elapsed.
    pub fn prepare_retry(&mut self) {
        self.response = None;
        self.signed = false;
    }

    /// Run the retry and after-retry stages; true means the error was cleared
    /// and another attempt should run.
    async fn retry(&mut self) -> bool {
        let retry = self.handlers.retry.clone();
        retry.run(self).await;

        let after_retry = self.handlers.after_retry.clone();
        after_retry.run(self).await;

        self.error.is_none()
    }

    fn finish_error(&mut self) -> Error {
        let mut err = self
            .error
            .take()
            .unwrap_or_else(|| Error::unexpected("request failed without a recorded error"));
        err.set_attempts(self.retry_count);
        err
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("operation", &self.operation)
            .field("uri", &self.parts.uri)
            .field("body", &self.body)
            .field("retry_count", &self.retry_count)
            .field("retryable", &self.retryable)
            .field("error", &self.error)
            .finish()
    }
}
