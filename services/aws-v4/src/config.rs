use crate::constants::*;
use reqflow_core::utils::Redact;
use reqflow_core::Context;
use std::fmt::{Debug, Formatter};

/// Static configuration for AWS-style services.
///
/// Values left `None` fall through to the other providers in the default
/// chain.
#[derive(Clone, Default)]
pub struct Config {
    /// Access key id to sign with.
    pub access_key_id: Option<String>,
    /// Secret access key to sign with.
    pub secret_access_key: Option<String>,
    /// Session token, for temporary credentials.
    pub session_token: Option<String>,
    /// Region the requests are scoped to.
    pub region: Option<String>,
}

impl Config {
    /// Populate the config from the environment:
    /// `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`,
    /// `AWS_REGION` (falling back to `AWS_DEFAULT_REGION`).
    pub fn from_env(ctx: &Context) -> Self {
        let envs = ctx.env_vars();

        Self {
            access_key_id: envs.get(AWS_ACCESS_KEY_ID).cloned(),
            secret_access_key: envs.get(AWS_SECRET_ACCESS_KEY).cloned(),
            session_token: envs.get(AWS_SESSION_TOKEN).cloned(),
            region: envs
                .get(AWS_REGION)
                .or_else(|| envs.get(AWS_DEFAULT_REGION))
                .cloned(),
        }
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("access_key_id", &Redact::from(&self.access_key_id))
            .field("secret_access_key", &Redact::from(&self.secret_access_key))
            .field("session_token", &Redact::from(&self.session_token))
            .field("region", &self.region)
            .finish()
    }
}
