//! End-to-end run of the engine with the V4 glue installed: build, sign,
//! send against a scripted transport, unmarshal.

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use reqflow_aws_v4::{
    install, Config, DefaultCredentialProvider, JsonBody, JsonOutput, RequestSigner,
};
use reqflow_core::{
    Client, Context, Error, HttpSend, Operation, Result, Signer, StandardRetryPolicy, StaticEnv,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Transport that records every outbound request and replays a script of
/// responses, repeating the last entry once the script runs dry.
#[derive(Debug, Default)]
struct ScriptedHttpSend {
    script: Mutex<Vec<(StatusCode, &'static str)>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<http::Request<Bytes>>>,
}

impl ScriptedHttpSend {
    fn new(script: Vec<(StatusCode, &'static str)>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            ..Default::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpSend for ScriptedHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap();
        let (status, body) = script
            .get(n)
            .or_else(|| script.last())
            .copied()
            .ok_or_else(|| Error::transport("script is empty"))?;
        self.seen.lock().unwrap().push(req);

        Ok(http::Response::builder()
            .status(status)
            .header("x-amzn-requestid", "req-1")
            .body(Bytes::from_static(body.as_bytes()))
            .expect("response must build"))
    }
}

#[derive(Debug, Serialize)]
struct GetItemInput {
    key: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct GetItemOutput {
    data: String,
}

fn dynamodb_client(transport: Arc<ScriptedHttpSend>) -> Client {
    let ctx = Context::new().with_env(StaticEnv {
        envs: HashMap::from_iter([
            ("AWS_ACCESS_KEY_ID".to_string(), "AKID".to_string()),
            ("AWS_SECRET_ACCESS_KEY".to_string(), "SECRET".to_string()),
        ]),
    });
    let signer = Signer::new(
        ctx,
        DefaultCredentialProvider::new(Arc::new(Config::default())),
        RequestSigner::new("dynamodb", "us-east-1"),
    );

    let mut client = Client::builder()
        .with_endpoint("https://dynamodb.us-east-1.amazonaws.com")
        .with_http_send(transport)
        .with_retry_policy(
            StandardRetryPolicy::default()
                .with_max_retries(2)
                .with_base(Duration::from_millis(1)),
        )
        .build()
        .expect("client must build");
    install(client.handlers_mut(), signer);

    client
}

#[tokio::test]
async fn test_signed_call_roundtrip() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let transport = ScriptedHttpSend::new(vec![(StatusCode::OK, r#"{"data":"valid"}"#)]);
    let client = dynamodb_client(transport.clone());

    let mut req = client.new_request(Operation::new("GetItem", Method::POST, "/"))?;
    req.handlers.build.push_front(JsonBody::new(
        GetItemInput {
            key: "1".to_string(),
        },
        "DynamoDB_20120810",
    ));
    req.handlers
        .unmarshal
        .push_back(JsonOutput::<GetItemOutput>::new());

    req.send().await?;

    assert_eq!(
        req.take_output::<GetItemOutput>(),
        Some(GetItemOutput {
            data: "valid".to_string()
        })
    );
    assert_eq!(req.request_id.as_deref(), Some("req-1"));
    assert_eq!(transport.calls(), 1);

    // The transmitted request carries the whole envelope and the proof.
    let seen = transport.seen.lock().unwrap();
    let sent = &seen[0];
    let auth = sent.headers()["authorization"].to_str()?;
    assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKID/"));
    assert!(auth.contains("/us-east-1/dynamodb/aws4_request"));
    assert!(auth.contains("SignedHeaders="));
    assert!(sent.headers().contains_key("x-amz-date"));
    assert_eq!(
        sent.headers()["x-amz-target"].to_str()?,
        "DynamoDB_20120810.GetItem"
    );
    assert_eq!(sent.body().as_ref(), br#"{"key":"1"}"#.as_slice());

    Ok(())
}

#[tokio::test]
async fn test_throttling_error_is_retried_and_decoded() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let transport = ScriptedHttpSend::new(vec![(
        StatusCode::BAD_REQUEST,
        r#"{"__type":"com.amazonaws.dynamodb.v20120810#ProvisionedThroughputExceededException","message":"Throughput exceeds the current capacity"}"#,
    )]);
    let client = dynamodb_client(transport.clone());

    let mut req = client.new_request(Operation::new("GetItem", Method::POST, "/"))?;
    req.set_body(r#"{"key":"1"}"#);

    let err = req.send().await.expect_err("send must fail");

    // Throttling is retryable: budget of 2 means 3 attempts in total.
    assert_eq!(transport.calls(), 3);
    assert_eq!(err.code(), Some("ProvisionedThroughputExceededException"));
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    assert_eq!(err.request_id(), Some("req-1"));
    assert_eq!(err.attempts(), 2);
    assert!(err.is_exhausted());

    Ok(())
}

#[tokio::test]
async fn test_terminal_client_fault_is_not_retried() -> anyhow::Result<()> {
    let transport = ScriptedHttpSend::new(vec![(
        StatusCode::BAD_REQUEST,
        r#"{"__type":"ValidationException","message":"One or more parameter values were invalid"}"#,
    )]);
    let client = dynamodb_client(transport.clone());

    let mut req = client.new_request(Operation::new("GetItem", Method::POST, "/"))?;
    req.set_body("{}");

    let err = req.send().await.expect_err("send must fail");

    assert_eq!(transport.calls(), 1);
    assert_eq!(err.code(), Some("ValidationException"));
    assert!(!err.is_exhausted());

    Ok(())
}

#[tokio::test]
async fn test_presign_produces_an_authenticated_uri() -> anyhow::Result<()> {
    let transport = ScriptedHttpSend::new(vec![(StatusCode::OK, "")]);
    let client = dynamodb_client(transport.clone());

    let mut req = client.new_request(Operation::new("GetItem", Method::GET, "/item"))?;
    let uri = req.presign(Duration::from_secs(900)).await?;

    let query = uri.query().expect("presigned uri must have a query");
    assert!(query.contains("X-Amz-Algorithm=AWS4-HMAC-SHA256"));
    assert!(query.contains("X-Amz-Expires=900"));
    assert!(query.contains("X-Amz-Signature="));
    // Nothing was sent.
    assert_eq!(transport.calls(), 0);

    Ok(())
}
