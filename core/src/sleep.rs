use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// AsyncSleep abstracts the backoff wait so retry decisions stay testable
/// without a wall-clock dependency: tests inject a recording fake.
#[async_trait::async_trait]
pub trait AsyncSleep: Debug + Send + Sync + 'static {
    /// Wait out the given duration.
    async fn sleep(&self, dur: Duration);
}

#[async_trait::async_trait]
impl<T: AsyncSleep + ?Sized> AsyncSleep for Arc<T> {
    async fn sleep(&self, dur: Duration) {
        (**self).sleep(dur).await;
    }
}

/// TokioSleep waits on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleep;

#[async_trait::async_trait]
impl AsyncSleep for TokioSleep {
    async fn sleep(&self, dur: Duration) {
        tokio::time::sleep(dur).await;
    }
}
