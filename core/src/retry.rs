use crate::{ErrorKind, Request};
use std::fmt::Debug;
use std::time::Duration;

/// Service error codes that signal throttling and are worth retrying even
/// though they arrive with a 4xx status.
const THROTTLE_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ProvisionedThroughputExceededException",
];

/// RetryPolicy classifies a failed attempt as retryable or terminal and
/// computes the backoff delay.
///
/// The policy is injectable: the engine never hardcodes classification, so a
/// service with its own retry rules supplies its own implementation. The
/// policy only decides; the after-retry stage is the only place that sleeps.
pub trait RetryPolicy: Debug + Send + Sync + 'static {
    /// Retry budget. Attempt counting starts at zero; retrying stops once the
    /// retry count reaches this value.
    fn max_retries(&self) -> u32;

    /// Decide whether the request's current error is worth another attempt.
    fn should_retry(&self, req: &Request) -> bool;

    /// Compute how long to wait before the next attempt.
    fn retry_delay(&self, req: &Request) -> Duration;
}

/// StandardRetryPolicy retries server faults (HTTP >= 500), known throttling
/// codes, and transport failures, with exponential backoff `base * 2^attempt`.
///
/// Backoff is deterministic by default, matching the wire-visible behavior of
/// the SDKs this engine interoperates with. Under heavy concurrent load that
/// synchronizes retries; `with_jitter` opts into full jitter, drawing the
/// delay uniformly from `(0, base * 2^attempt]`.
#[derive(Debug, Clone)]
pub struct StandardRetryPolicy {
    max_retries: u32,
    base: Duration,
    jitter: bool,
}

impl Default for StandardRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base: Duration::from_millis(30),
            jitter: false,
        }
    }
}

impl StandardRetryPolicy {
    /// Override the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Override the backoff base delay.
    pub fn with_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    /// Enable full jitter on the computed delay.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    fn ceiling(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl RetryPolicy for StandardRetryPolicy {
    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn should_retry(&self, req: &Request) -> bool {
        let Some(err) = req.error.as_ref() else {
            return false;
        };

        match err.kind() {
            ErrorKind::Transport => true,
            ErrorKind::Service => {
                err.status().map(|s| s.is_server_error()).unwrap_or(false)
                    || err
                        .code()
                        .map(|c| THROTTLE_CODES.contains(&c))
                        .unwrap_or(false)
            }
            _ => false,
        }
    }

    fn retry_delay(&self, req: &Request) -> Duration {
        let ceiling = self.ceiling(req.retry_count);
        if !self.jitter {
            return ceiling;
        }

        let nanos = ceiling.as_nanos().min(u64::MAX as u128) as u64;
        Duration::from_nanos(rand::Rng::gen_range(&mut rand::thread_rng(), 1..=nanos.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Handlers, Operation};
    use http::{Method, StatusCode};
    use test_case::test_case;

    fn request_with_error(err: Option<Error>) -> Request {
        let mut req = Request::new(
            Operation::new("TestOp", Method::POST, "/"),
            &"https://svc.test.example.com".parse().unwrap(),
            Handlers::default(),
        )
        .expect("request must build");
        req.error = err;
        req
    }

    #[test_case(Error::transport("connection reset"), true; "transport is retryable")]
    #[test_case(Error::service("oops").with_status(StatusCode::INTERNAL_SERVER_ERROR), true; "server fault is retryable")]
    #[test_case(Error::service("oops").with_status(StatusCode::SERVICE_UNAVAILABLE), true; "503 is retryable")]
    #[test_case(Error::service("slow down").with_status(StatusCode::BAD_REQUEST).with_code("Throttling"), true; "throttling code is retryable")]
    #[test_case(Error::service("slow down").with_status(StatusCode::BAD_REQUEST).with_code("ProvisionedThroughputExceededException"), true; "throughput exceeded is retryable")]
    #[test_case(Error::service("bad input").with_status(StatusCode::BAD_REQUEST).with_code("ValidationException"), false; "client fault is terminal")]
    #[test_case(Error::validation("missing parameter"), false; "validation is terminal")]
    #[test_case(Error::protocol("undecodable body"), false; "protocol is terminal")]
    fn test_should_retry(err: Error, expected: bool) {
        let policy = StandardRetryPolicy::default();
        let req = request_with_error(Some(err));

        assert_eq!(policy.should_retry(&req), expected);
    }

    #[test]
    fn test_should_not_retry_without_error() {
        let policy = StandardRetryPolicy::default();
        let req = request_with_error(None);

        assert!(!policy.should_retry(&req));
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = StandardRetryPolicy::default().with_base(Duration::from_millis(30));
        let mut req = request_with_error(Some(Error::transport("down")));

        let mut prev = policy.retry_delay(&req);
        assert_eq!(prev, Duration::from_millis(30));

        for attempt in 1..6 {
            req.retry_count = attempt;
            let delay = policy.retry_delay(&req);
            assert_eq!(delay, prev * 2, "attempt {attempt}");
            prev = delay;
        }
    }

    #[test]
    fn test_jitter_stays_under_ceiling() {
        let policy = StandardRetryPolicy::default()
            .with_base(Duration::from_millis(100))
            .with_jitter(true);
        let mut req = request_with_error(Some(Error::transport("down")));
        req.retry_count = 2;

        for _ in 0..64 {
            let delay = policy.retry_delay(&req);
            assert!(delay > Duration::ZERO);
            assert!(delay <= Duration::from_millis(400));
        }
    }
}
