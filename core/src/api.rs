use crate::{Context, Result};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// SigningCredential is the capability the signer borrows per signing
/// operation.
///
/// A credential may come from a static value or a refreshing provider, so a
/// cached one must be re-validated before every use. Tokens may rotate
/// between calls.
pub trait SigningCredential: Clone + Debug + Send + Sync + Unpin + 'static {
    /// Check if the credential is still valid for signing.
    fn is_valid(&self) -> bool;
}

impl<T: SigningCredential> SigningCredential for Option<T> {
    fn is_valid(&self) -> bool {
        let Some(cred) = self else {
            return false;
        };

        cred.is_valid()
    }
}

/// ProvideCredential loads a credential on demand.
///
/// Services may require different credentials to sign the request; the
/// concrete type is the implementation's choice. Implementations must be safe
/// for concurrent invocation and must synchronize any internal refresh.
#[async_trait::async_trait]
pub trait ProvideCredential: Debug + Send + Sync + Unpin + 'static {
    /// Credential returned by this provider.
    type Credential: Send + Sync + Unpin + 'static;

    /// Load a credential from the given context.
    ///
    /// Returns `Ok(None)` when this provider has nothing to offer, so a chain
    /// can move on to the next provider.
    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>>;
}

/// ProvideCredentialChain tries a list of providers in order and returns the
/// first credential found.
pub struct ProvideCredentialChain<C> {
    providers: Vec<Arc<dyn ProvideCredential<Credential = C>>>,
}

impl<C: Send + Sync + Unpin + 'static> Debug for ProvideCredentialChain<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvideCredentialChain")
            .field("providers", &self.providers)
            .finish()
    }
}

impl<C: Send + Sync + Unpin + 'static> Default for ProvideCredentialChain<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Send + Sync + Unpin + 'static> ProvideCredentialChain<C> {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Append a provider to the end of the chain.
    pub fn push(mut self, provider: impl ProvideCredential<Credential = C>) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }
}

#[async_trait::async_trait]
impl<C: Send + Sync + Unpin + 'static> ProvideCredential for ProvideCredentialChain<C> {
    type Credential = C;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        for provider in &self.providers {
            log::debug!("trying credential provider {provider:?}");
            if let Some(cred) = provider.provide_credential(ctx).await? {
                return Ok(Some(cred));
            }
        }

        Ok(None)
    }
}

/// SignRequest derives an authentication proof and writes it onto the
/// outbound request.
#[async_trait::async_trait]
pub trait SignRequest: Debug + Send + Sync + Unpin + 'static {
    /// Credential used by this signer.
    type Credential: Send + Sync + Unpin + 'static;

    /// Sign the request in place.
    ///
    /// ## Payload hash
    ///
    /// `payload_hash` is the hex SHA-256 of the finalized request body; an
    /// empty body hashes to the hash of the empty string. Signing must only
    /// happen once the body is finalized, since this hash is part of what is
    /// signed.
    ///
    /// ## Expires In
    ///
    /// `expires_in` selects query-string presigning with the given expiry
    /// instead of header signing. Signers that do not support presigning
    /// should return an error for it.
    async fn sign_request(
        &self,
        ctx: &Context,
        parts: &mut http::request::Parts,
        payload_hash: &str,
        credential: Option<&Self::Credential>,
        expires_in: Option<Duration>,
    ) -> Result<()>;
}
