//! Engine integration tests: the send loop, retries, body rewind, and
//! handler isolation, driven against a scripted transport.

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use reqflow_core::{
    AsyncSleep, Client, Error, ErrorKind, HttpSend, Operation, Result, StandardRetryPolicy,
};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted transport step.
#[derive(Debug, Clone, Copy)]
enum Step {
    Respond(u16, &'static str),
    FailTransport,
}

/// Transport that replays a script of steps, repeating the last one once the
/// script runs dry, while recording call count and transmitted bodies.
#[derive(Debug, Default)]
struct ScriptedHttpSend {
    script: Vec<Step>,
    calls: AtomicUsize,
    bodies: Mutex<Vec<Bytes>>,
}

impl ScriptedHttpSend {
    fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script,
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
        self.bodies.lock().unwrap().push(req.into_body());

        let step = self
            .script
            .get(n)
            .or_else(|| self.script.last())
            .copied()
            .unwrap_or(Step::FailTransport);
        match step {
            Step::Respond(status, body) => Ok(http::Response::builder()
                .status(status)
                .body(Bytes::from_static(body.as_bytes()))
                .expect("response must build")),
            Step::FailTransport => Err(Error::transport("connection reset by peer")),
        }
    }
}

/// Sleeper that records the requested delays instead of waiting.
#[derive(Debug, Default)]
struct RecordingSleep {
    delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl AsyncSleep for RecordingSleep {
    async fn sleep(&self, dur: Duration) {
        self.delays.lock().unwrap().push(dur);
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct GetItemOutput {
    data: String,
}

fn test_client(
    transport: Arc<ScriptedHttpSend>,
    sleep: Arc<RecordingSleep>,
    max_retries: u32,
) -> Client {
    Client::builder()
        .with_endpoint("https://svc.test.example.com")
        .with_http_send(transport)
        .with_retry_policy(
            StandardRetryPolicy::default()
                .with_max_retries(max_retries)
                .with_base(Duration::from_millis(10)),
        )
        .with_sleep(sleep)
        .build()
        .expect("client must build")
}

/// Unmarshal handler used by the tests: decode the body as JSON into the
/// output sink, failing with a protocol error on garbage.
fn install_json_unmarshal(req: &mut reqflow_core::Request) {
    req.handlers
        .unmarshal
        .push_back_fn("test.JsonUnmarshal", |req| {
            let Some(resp) = &req.response else {
                return;
            };
            match serde_json::from_slice::<GetItemOutput>(resp.body()) {
                Ok(output) => req.set_output(output),
                Err(e) => {
                    req.fail(Error::protocol("failed to decode response body").with_source(e))
                }
            }
        });
}

#[tokio::test]
async fn test_end_to_end_retries_then_succeeds() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let transport = ScriptedHttpSend::new(vec![
        Step::Respond(500, "internal error"),
        Step::Respond(500, "internal error"),
        Step::Respond(200, r#"{"data":"valid"}"#),
    ]);
    let sleep = Arc::new(RecordingSleep::default());
    let client = test_client(transport.clone(), sleep, 2);

    let mut req = client.new_request(Operation::new("GetItem", Method::POST, "/"))?;
    req.set_body("{}");
    install_json_unmarshal(&mut req);

    req.send().await?;

    assert_eq!(req.retry_count, 2);
    assert_eq!(transport.calls(), 3);
    assert_eq!(
        req.take_output::<GetItemOutput>(),
        Some(GetItemOutput {
            data: "valid".to_string()
        })
    );

    Ok(())
}

#[tokio::test]
async fn test_retry_bound_is_exactly_n_plus_one_attempts() -> anyhow::Result<()> {
    for max_retries in [0u32, 1, 2, 3] {
        let transport = ScriptedHttpSend::new(vec![Step::Respond(500, "permanently failing")]);
        let sleep = Arc::new(RecordingSleep::default());
        let client = test_client(transport.clone(), sleep, max_retries);

        let mut req = client.new_request(Operation::new("GetItem", Method::POST, "/"))?;
        let err = req.send().await.expect_err("send must fail");

        assert_eq!(
            transport.calls() as u32,
            max_retries + 1,
            "max_retries {max_retries}"
        );
        assert_eq!(err.attempts(), max_retries);
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(err.is_exhausted());
    }

    Ok(())
}

#[tokio::test]
async fn test_backoff_doubles_between_attempts() -> anyhow::Result<()> {
    let transport = ScriptedHttpSend::new(vec![Step::Respond(500, "")]);
    let sleep = Arc::new(RecordingSleep::default());
    let client = test_client(transport, sleep.clone(), 3);

    let mut req = client.new_request(Operation::new("GetItem", Method::POST, "/"))?;
    let _ = req.send().await.expect_err("send must fail");

    assert_eq!(
        *sleep.delays.lock().unwrap(),
        vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(40),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_retried_attempts_transmit_identical_bodies() -> anyhow::Result<()> {
    let transport = ScriptedHttpSend::new(vec![
        Step::Respond(503, "try later"),
        Step::Respond(200, r#"{"data":"valid"}"#),
    ]);
    let sleep = Arc::new(RecordingSleep::default());
    let client = test_client(transport.clone(), sleep, 2);

    let mut req = client.new_request(Operation::new("PutItem", Method::PUT, "/items/1"))?;
    req.set_body("the exact payload bytes");

    req.send().await?;

    let bodies = transport.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0], Bytes::from_static(b"the exact payload bytes"));
    assert_eq!(bodies[0], bodies[1]);

    Ok(())
}

#[tokio::test]
async fn test_handler_isolation_between_requests() -> anyhow::Result<()> {
    let transport = ScriptedHttpSend::new(vec![Step::Respond(200, "{}")]);
    let sleep = Arc::new(RecordingSleep::default());
    let client = test_client(transport, sleep, 0);

    let calls = Arc::new(AtomicUsize::new(0));

    let mut customized = client.new_request(Operation::new("GetItem", Method::POST, "/"))?;
    let counter = calls.clone();
    customized
        .handlers
        .validate
        .push_back_fn("test.CountValidate", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    let mut plain = client.new_request(Operation::new("GetItem", Method::POST, "/"))?;

    customized.send().await?;
    plain.send().await?;

    // The callback registered on one request's copy never ran for the other.
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn test_validation_error_returns_before_any_io() -> anyhow::Result<()> {
    let transport = ScriptedHttpSend::new(vec![Step::Respond(200, "{}")]);
    let sleep = Arc::new(RecordingSleep::default());
    let client = test_client(transport.clone(), sleep, 3);

    let mut req = client.new_request(Operation::new("GetItem", Method::POST, "/"))?;
    req.handlers
        .validate
        .push_back_fn("test.RejectInput", |req| {
            req.fail(Error::validation("required parameter `key` is missing"));
        });

    let err = req.send().await.expect_err("send must fail");

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.attempts(), 0);
    assert!(!err.is_exhausted());
    assert_eq!(transport.calls(), 0);

    Ok(())
}

#[tokio::test]
async fn test_transport_errors_are_retryable_by_default() -> anyhow::Result<()> {
    let transport = ScriptedHttpSend::new(vec![Step::FailTransport]);
    let sleep = Arc::new(RecordingSleep::default());
    let client = test_client(transport.clone(), sleep, 1);

    let mut req = client.new_request(Operation::new("GetItem", Method::POST, "/"))?;
    let err = req.send().await.expect_err("send must fail");

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(transport.calls(), 2);
    assert!(err.is_exhausted());

    Ok(())
}

#[tokio::test]
async fn test_send_stage_can_override_the_retry_decision() -> anyhow::Result<()> {
    let transport = ScriptedHttpSend::new(vec![Step::FailTransport]);
    let sleep = Arc::new(RecordingSleep::default());
    let client = test_client(transport.clone(), sleep, 3);

    let mut req = client.new_request(Operation::new("GetItem", Method::POST, "/"))?;
    // Runs after the transport handler; sees its error and pins the verdict.
    req.handlers
        .send
        .push_back_fn("test.NeverRetry", |req| {
            if req.error.is_some() {
                req.retryable = Some(false);
            }
        });

    let err = req.send().await.expect_err("send must fail");

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(transport.calls(), 1);
    assert!(!err.is_exhausted());

    Ok(())
}

#[tokio::test]
async fn test_undecodable_success_body_is_fatal() -> anyhow::Result<()> {
    let transport = ScriptedHttpSend::new(vec![Step::Respond(200, "not json at all")]);
    let sleep = Arc::new(RecordingSleep::default());
    let client = test_client(transport.clone(), sleep, 3);

    let mut req = client.new_request(Operation::new("GetItem", Method::POST, "/"))?;
    install_json_unmarshal(&mut req);

    let err = req.send().await.expect_err("send must fail");

    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(transport.calls(), 1);
    assert!(req.take_output::<GetItemOutput>().is_none());

    Ok(())
}

#[tokio::test]
async fn test_error_unmarshal_stage_runs_on_failures() -> anyhow::Result<()> {
    let transport = ScriptedHttpSend::new(vec![Step::Respond(500, "service said no")]);
    let sleep = Arc::new(RecordingSleep::default());
    let client = test_client(transport, sleep, 0);

    let mut req = client.new_request(Operation::new("GetItem", Method::POST, "/"))?;
    req.handlers
        .unmarshal_error
        .push_back_fn("test.DecodeError", |req| {
            let body = req
                .response
                .as_ref()
                .map(|r| String::from_utf8_lossy(r.body()).to_string());
            if let (Some(err), Some(body)) = (req.error.as_mut(), body) {
                err.set_message(body);
            }
        });

    let err = req.send().await.expect_err("send must fail");

    assert_eq!(err.to_string(), "service said no");
    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));

    Ok(())
}
