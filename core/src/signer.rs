use crate::{Context, ProvideCredential, Result, SignRequest, SigningCredential};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Signer orchestrates credential loading and request signing.
///
/// The loaded credential is cached and reused while it stays valid; a stale
/// credential is re-loaded through the provider. The cache is internally
/// synchronized, so one Signer may serve many concurrently running requests.
#[derive(Clone, Debug)]
pub struct Signer<K: SigningCredential> {
    ctx: Context,
    provider: Arc<dyn ProvideCredential<Credential = K>>,
    builder: Arc<dyn SignRequest<Credential = K>>,
    credential: Arc<Mutex<Option<K>>>,
}

impl<K: SigningCredential> Signer<K> {
    /// Create a new signer from a credential provider and a request signer.
    pub fn new(
        ctx: Context,
        provider: impl ProvideCredential<Credential = K>,
        builder: impl SignRequest<Credential = K>,
    ) -> Self {
        Self {
            ctx,

            provider: Arc::new(provider),
            builder: Arc::new(builder),
            credential: Arc::new(Mutex::new(None)),
        }
    }

    /// Sign the request in place.
    ///
    /// `payload_hash` is the hex SHA-256 of the finalized body; `expires_in`
    /// selects query presigning.
    pub async fn sign(
        &self,
        parts: &mut http::request::Parts,
        payload_hash: &str,
        expires_in: Option<Duration>,
    ) -> Result<()> {
        let cred = self.credential.lock().expect("lock poisoned").clone();
        let cred = if cred.is_valid() {
            cred
        } else {
            let loaded = self.provider.provide_credential(&self.ctx).await?;
            *self.credential.lock().expect("lock poisoned") = loaded.clone();
            loaded
        };

        self.builder
            .sign_request(&self.ctx, parts, payload_hash, cred.as_ref(), expires_in)
            .await
    }
}
