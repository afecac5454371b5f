use crate::handlers::{
    AfterRetryHandler, BuildContentLength, RetryHandler, SendHandler, UserAgent, ValidateEndpoint,
    ValidateStatus,
};
use crate::{
    AsyncSleep, Error, Handlers, HttpSend, NoopHttpSend, Operation, Request, Result, RetryPolicy,
    StandardRetryPolicy, TokioSleep,
};
use http::Uri;
use std::sync::Arc;

/// Client holds the shared, read-mostly configuration for one remote API:
/// the endpoint, the transport, and the pipeline template.
///
/// The template is assembled once at construction and cloned into every
/// request, so there is no shared mutable pipeline anywhere: per-client
/// customization edits this client's own template, per-call customization
/// edits the request's private copy.
#[derive(Clone, Debug)]
pub struct Client {
    endpoint: Uri,
    handlers: Handlers,
}

impl Client {
    /// Start building a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// The endpoint requests are issued against.
    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    /// The pipeline template cloned into every request.
    pub fn handlers(&self) -> &Handlers {
        &self.handlers
    }

    /// Mutable access to the pipeline template, for installing service glue
    /// (signing, codecs) before the client is shared.
    pub fn handlers_mut(&mut self) -> &mut Handlers {
        &mut self.handlers
    }

    /// Create a fresh request for one operation, carrying its own copy of
    /// the pipeline template.
    pub fn new_request(&self, operation: Operation) -> Result<Request> {
        Request::new(operation, &self.endpoint, self.handlers.clone())
    }
}

/// Builder for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    endpoint: Option<String>,
    http: Option<Arc<dyn HttpSend>>,
    retry_policy: Option<Arc<dyn RetryPolicy>>,
    sleep: Option<Arc<dyn AsyncSleep>>,
}

impl ClientBuilder {
    /// Set the endpoint, e.g. `https://dynamodb.us-east-1.amazonaws.com`.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the transport implementation.
    pub fn with_http_send(mut self, http: impl HttpSend) -> Self {
        self.http = Some(Arc::new(http));
        self
    }

    /// Set the retry policy. Defaults to [`StandardRetryPolicy`].
    pub fn with_retry_policy(mut self, policy: impl RetryPolicy) -> Self {
        self.retry_policy = Some(Arc::new(policy));
        self
    }

    /// Set the backoff sleeper. Defaults to [`TokioSleep`]; tests inject a
    /// recording fake.
    pub fn with_sleep(mut self, sleep: impl AsyncSleep) -> Self {
        self.sleep = Some(Arc::new(sleep));
        self
    }

    /// Assemble the client and its default pipeline template.
    pub fn build(self) -> Result<Client> {
        let endpoint: Uri = self
            .endpoint
            .ok_or_else(|| Error::validation("client endpoint is not set"))?
            .parse()?;
        if endpoint.authority().is_none() {
            return Err(Error::validation("client endpoint has no authority"));
        }

        let http = self.http.unwrap_or_else(|| Arc::new(NoopHttpSend));
        let policy = self
            .retry_policy
            .unwrap_or_else(|| Arc::new(StandardRetryPolicy::default()));
        let sleep = self.sleep.unwrap_or_else(|| Arc::new(TokioSleep));

        let mut handlers = Handlers::default();
        handlers.validate.push_back(ValidateEndpoint);
        handlers.build.push_back(UserAgent);
        handlers.build.push_back(BuildContentLength);
        handlers.send.push_back(SendHandler::new(http));
        handlers.validate_response.push_back(ValidateStatus);
        handlers.retry.push_back(RetryHandler::new(policy.clone()));
        handlers
            .after_retry
            .push_back(AfterRetryHandler::new(policy, sleep));

        Ok(Client { endpoint, handlers })
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
