//! Pipeline glue: handlers wiring the V4 signer and the JSON envelope into
//! the request engine.

use crate::constants::{X_AMZN_REQUEST_ID, X_AMZ_REQUEST_ID, X_AMZ_TARGET};
use crate::Credential;
use async_trait::async_trait;
use http::{header, HeaderValue};
use log::debug;
use reqflow_core::hash::hex_sha256;
use reqflow_core::{Error, Handle, Handlers, Request, Signer};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::Debug;
use std::marker::PhantomData;

/// Sign-stage handler: hashes the finalized body and drives the [`Signer`].
///
/// When the request is being presigned, the expiry recorded on the request
/// selects query signing instead of the `Authorization` header.
#[derive(Debug, Clone)]
pub struct SigningHandler {
    signer: Signer<Credential>,
}

impl SigningHandler {
    /// Create a sign-stage handler over the given signer.
    pub fn new(signer: Signer<Credential>) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl Handle for SigningHandler {
    async fn handle(&self, req: &mut Request) {
        if req.error.is_some() {
            return;
        }

        let payload_hash = hex_sha256(req.body.bytes());
        if let Err(err) = self
            .signer
            .sign(&mut req.parts, &payload_hash, req.presign_expires)
            .await
        {
            req.fail(err);
        }
    }
}

/// Unmarshal-meta handler: extracts the request-tracking id from the
/// response headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractRequestId;

#[async_trait]
impl Handle for ExtractRequestId {
    async fn handle(&self, req: &mut Request) {
        let Some(resp) = &req.response else {
            return;
        };

        let id = resp
            .headers()
            .get(X_AMZN_REQUEST_ID)
            .or_else(|| resp.headers().get(X_AMZ_REQUEST_ID));
        if let Some(id) = id.and_then(|v| v.to_str().ok()) {
            req.request_id = Some(id.to_string());
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    code: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Error-unmarshal handler: decodes the JSON error envelope
/// `{"__type": "namespace#Code", "message": "..."}` into the request's
/// service error.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnmarshalJsonError;

#[async_trait]
impl Handle for UnmarshalJsonError {
    async fn handle(&self, req: &mut Request) {
        let request_id = req.request_id.clone();
        let Some(err) = req.error.as_mut() else {
            return;
        };
        if let Some(id) = request_id {
            err.set_request_id(id);
        }

        let Some(resp) = &req.response else {
            return;
        };
        let body = resp.body();
        if body.is_empty() {
            return;
        }

        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(decoded) => {
                if let Some(code) = decoded.code {
                    err.set_code(error_code(&code));
                }
                if let Some(message) = decoded.message {
                    err.set_message(message);
                }
            }
            // An undecodable error body keeps the status-derived error.
            Err(parse_err) => debug!("error body is not decodable json: {parse_err}"),
        }
    }
}

/// Strip the namespace prefix: `com.example.service#ThrottlingException`
/// becomes `ThrottlingException`.
fn error_code(code: &str) -> &str {
    code.rsplit('#').next().unwrap_or(code)
}

/// Build-stage handler serializing a typed input into the JSON envelope:
/// the body, `Content-Type`, and the `X-Amz-Target` header derived from the
/// operation name.
///
/// Body producers run before the default build handlers, so installers
/// prepend this to the build list.
pub struct JsonBody<T> {
    input: T,
    target_prefix: String,
}

impl<T: Serialize + Send + Sync + 'static> JsonBody<T> {
    /// Wrap a typed input; `target_prefix` is the service's target namespace,
    /// e.g. `DynamoDB_20120810`.
    pub fn new(input: T, target_prefix: impl Into<String>) -> Self {
        Self {
            input,
            target_prefix: target_prefix.into(),
        }
    }
}

impl<T> Debug for JsonBody<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonBody")
            .field("target_prefix", &self.target_prefix)
            .finish()
    }
}

#[async_trait]
impl<T: Serialize + Send + Sync + 'static> Handle for JsonBody<T> {
    async fn handle(&self, req: &mut Request) {
        if req.error.is_some() {
            return;
        }

        let body = match serde_json::to_vec(&self.input) {
            Ok(body) => body,
            Err(e) => {
                req.fail(Error::validation("failed to serialize request input").with_source(e));
                return;
            }
        };
        req.set_body(body);
        req.parts.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-amz-json-1.0"),
        );

        let target = format!("{}.{}", self.target_prefix, req.operation.name);
        match HeaderValue::from_str(&target) {
            Ok(v) => {
                req.parts.headers.insert(X_AMZ_TARGET, v);
            }
            Err(e) => req.fail(
                Error::validation(format!("operation target is not a valid header: {target}"))
                    .with_source(e),
            ),
        }
    }
}

/// Unmarshal-stage handler decoding a JSON success body into a typed output
/// stored in the request's output sink.
///
/// A success response whose body does not decode is a protocol mismatch and
/// fails the request without retrying.
pub struct JsonOutput<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonOutput<T> {
    /// Create an unmarshal handler for the output type `T`.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonOutput<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for JsonOutput<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonOutput")
    }
}

#[async_trait]
impl<T: DeserializeOwned + Any + Send> Handle for JsonOutput<T> {
    async fn handle(&self, req: &mut Request) {
        if req.error.is_some() {
            return;
        }
        let Some(resp) = &req.response else {
            return;
        };

        match serde_json::from_slice::<T>(resp.body()) {
            Ok(output) => req.set_output(output),
            Err(e) => req.fail(
                Error::protocol("failed to decode the success response body").with_source(e),
            ),
        }
    }
}

/// Wire the AWS glue into a pipeline template: signing, request-id
/// extraction, and JSON error decoding.
pub fn install(handlers: &mut Handlers, signer: Signer<Credential>) {
    handlers.sign.push_back(SigningHandler::new(signer));
    handlers.unmarshal_meta.push_back(ExtractRequestId);
    handlers.unmarshal_error.push_back(UnmarshalJsonError);
}
