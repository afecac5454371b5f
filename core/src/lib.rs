//! Core components for executing signed API requests.
//!
//! This crate is the request execution engine of the reqflow ecosystem: a
//! staged, pluggable pipeline that builds, signs, transmits, and retries one
//! HTTP request at a time.
//!
//! ## Overview
//!
//! The crate is built around a few key concepts:
//!
//! - **Pipeline**: ordered [`HandlerList`]s bundled per stage in [`Handlers`];
//!   every [`Request`] takes its own copy, so per-call customization never
//!   leaks into concurrently issued calls.
//! - **Request**: the unit of work. [`Request::send`] drives
//!   Validate → Build → Sign → Send → ValidateResponse → Unmarshal, looping
//!   back through UnmarshalError → Retry → AfterRetry on failure.
//! - **Client**: the immutable pipeline template plus shared transport;
//!   [`Client::new_request`] stamps out requests.
//! - **Signing**: the [`ProvideCredential`] / [`SignRequest`] traits and the
//!   caching [`Signer`] orchestrator; concrete algorithms live in service
//!   crates such as `reqflow-aws-v4`.
//! - **Retry**: an injectable [`RetryPolicy`] decides; the after-retry stage
//!   sleeps through an injectable [`AsyncSleep`].
//!
//! ## Example
//!
//! ```no_run
//! use http::Method;
//! use reqflow_core::{Client, Operation, StandardRetryPolicy};
//!
//! # async fn example(transport: impl reqflow_core::HttpSend) -> reqflow_core::Result<()> {
//! let client = Client::builder()
//!     .with_endpoint("https://svc.us-east-1.example.com")
//!     .with_http_send(transport)
//!     .with_retry_policy(StandardRetryPolicy::default().with_max_retries(2))
//!     .build()?;
//!
//! let mut req = client.new_request(Operation::new("GetItem", Method::POST, "/"))?;
//! req.set_body(r#"{"Key":{"id":{"S":"1"}}}"#);
//! req.send().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Concurrency: the engine takes no locks. Each request is driven
//! synchronously by its caller; shared configuration (transport, retry
//! policy, credential cache) is safe for concurrent read access, and
//! cancellation is dropping the `send()` future.

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod handlers;
pub mod hash;
pub mod time;
pub mod utils;

mod api;
pub use api::{ProvideCredential, ProvideCredentialChain, SignRequest, SigningCredential};
mod body;
pub use body::Body;
mod client;
pub use client::{Client, ClientBuilder};
mod context;
pub use context::Context;
mod env;
pub use env::{Env, NoopEnv, OsEnv, StaticEnv};
mod error;
pub use error::{Error, ErrorKind, Result};
mod http;
pub use crate::http::{HttpSend, NoopHttpSend};
mod operation;
pub use operation::Operation;
mod pipeline;
pub use pipeline::{Handle, HandlerFn, HandlerList, Handlers};
mod request;
pub use request::Request;
mod retry;
pub use retry::{RetryPolicy, StandardRetryPolicy};
mod signer;
pub use signer::Signer;
mod signing;
pub use signing::SigningContext;
mod sleep;
pub use sleep::{AsyncSleep, TokioSleep};
