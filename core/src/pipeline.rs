use crate::Request;
use std::fmt::Debug;
use std::sync::Arc;

/// Handle is one callback in the request pipeline.
///
/// A handler observes and may mutate the Request it is given. Handlers never
/// abort the traversal: failures are recorded into the Request's error field,
/// and the driving state machine reacts between stages.
#[async_trait::async_trait]
pub trait Handle: Debug + Send + Sync + 'static {
    /// Run this handler against the request.
    async fn handle(&self, req: &mut Request);
}

/// HandlerFn adapts a named synchronous closure into a [`Handle`].
///
/// Asynchronous behaviors (transport send, backoff sleep) implement `Handle`
/// directly instead.
pub struct HandlerFn<F> {
    name: &'static str,
    f: F,
}

impl<F> HandlerFn<F>
where
    F: Fn(&mut Request) + Send + Sync + 'static,
{
    /// Wrap a closure under a name used for debugging output.
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

#[async_trait::async_trait]
impl<F> Handle for HandlerFn<F>
where
    F: Fn(&mut Request) + Send + Sync + 'static,
{
    async fn handle(&self, req: &mut Request) {
        (self.f)(req)
    }
}

/// HandlerList is an ordered list of callbacks attached to one pipeline
/// stage.
///
/// Execution is strictly left-to-right. `clone` produces a shallow copy that
/// shares the callback references: mutating the copy never affects the
/// original, which is what gives each Request call-site isolation while
/// sharing a common default configuration.
#[derive(Clone, Debug, Default)]
pub struct HandlerList {
    list: Vec<Arc<dyn Handle>>,
}

impl HandlerList {
    /// Append handlers to the end of the list.
    pub fn push_back(&mut self, handler: impl Handle) {
        self.list.push(Arc::new(handler));
    }

    /// Prepend handlers to the front of the list.
    pub fn push_front(&mut self, handler: impl Handle) {
        self.list.insert(0, Arc::new(handler));
    }

    /// Append a named closure to the end of the list.
    pub fn push_back_fn(
        &mut self,
        name: &'static str,
        f: impl Fn(&mut Request) + Send + Sync + 'static,
    ) {
        self.push_back(HandlerFn::new(name, f));
    }

    /// Prepend a named closure to the front of the list.
    pub fn push_front_fn(
        &mut self,
        name: &'static str,
        f: impl Fn(&mut Request) + Send + Sync + 'static,
    ) {
        self.push_front(HandlerFn::new(name, f));
    }

    /// Remove every handler. Used by tests to replace transport behavior.
    pub fn clear(&mut self) {
        self.list.clear();
    }

    /// Number of handlers in the list.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// True if the list holds no handlers.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Invoke every handler in order against the request.
    ///
    /// The list itself never short-circuits on error; that is the driving
    /// request's job.
    pub async fn run(&self, req: &mut Request) {
        for handler in &self.list {
            handler.handle(req).await;
        }
    }
}

/// Handlers bundles one HandlerList per pipeline stage.
///
/// Every Request takes its own clone at construction time, so registering a
/// one-off callback on one request cannot leak into another concurrently
/// issued request sharing the same client.
#[derive(Clone, Debug, Default)]
pub struct Handlers {
    /// Parameter sanity checks, before any serialization.
    pub validate: HandlerList,
    /// Serialize input into the outbound body/URL/headers.
    pub build: HandlerList,
    /// Derive and attach the authentication proof.
    pub sign: HandlerList,
    /// Perform the network transport call.
    pub send: HandlerList,
    /// Classify the response status into success or failure.
    pub validate_response: HandlerList,
    /// Cheap response metadata extraction, e.g. the request-id header.
    pub unmarshal_meta: HandlerList,
    /// Decode the success response body into the output sink.
    pub unmarshal: HandlerList,
    /// Decode a structured API error body.
    pub unmarshal_error: HandlerList,
    /// Decide whether a failed attempt is retryable and compute the delay.
    pub retry: HandlerList,
    /// Sleep out the backoff and reset attempt-scoped state, or finalize.
    pub after_retry: HandlerList,
}
