use crate::provide_credential::{ConfigCredentialProvider, EnvCredentialProvider};
use crate::{Config, Credential};
use async_trait::async_trait;
use reqflow_core::{Context, ProvideCredential, ProvideCredentialChain, Result};
use std::sync::Arc;

/// DefaultCredentialProvider is a loader that will try to load credentials
/// via the default chain.
///
/// Resolution order:
///
/// 1. Environment variables
/// 2. Shared [`Config`]
#[derive(Debug)]
pub struct DefaultCredentialProvider {
    chain: ProvideCredentialChain<Credential>,
}

impl DefaultCredentialProvider {
    /// Create a new `DefaultCredentialProvider` instance.
    pub fn new(config: Arc<Config>) -> Self {
        let chain = ProvideCredentialChain::new()
            .push(EnvCredentialProvider::new())
            .push(ConfigCredentialProvider::new(config));

        Self { chain }
    }

    /// Create with a custom credential chain.
    pub fn with_chain(chain: ProvideCredentialChain<Credential>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl ProvideCredential for DefaultCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        self.chain.provide_credential(ctx).await
    }
}
