//! AWS SigV4 signing and pipeline glue for the reqflow request engine.
//!
//! The crate provides:
//!
//! - [`RequestSigner`]: the V4 keyed-HMAC canonicalization scheme, header and
//!   query-presign modes.
//! - [`Credential`] plus static / env / config providers and the
//!   [`DefaultCredentialProvider`] chain.
//! - Pipeline handlers ([`SigningHandler`], [`ExtractRequestId`],
//!   [`UnmarshalJsonError`], [`JsonBody`], [`JsonOutput`]) and an
//!   [`install`] convenience wiring them into a `Handlers` template.

mod config;
pub use config::Config;

mod credential;
pub use credential::Credential;

mod handlers;
pub use handlers::{
    install, ExtractRequestId, JsonBody, JsonOutput, SigningHandler, UnmarshalJsonError,
};

mod provide_credential;
pub use provide_credential::{
    ConfigCredentialProvider, DefaultCredentialProvider, EnvCredentialProvider,
    StaticCredentialProvider,
};

mod sign_request;
pub use sign_request::RequestSigner;

mod constants;
