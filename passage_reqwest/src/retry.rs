//! Retrying idempotent requests that fail transiently

use std::time::Duration;

use rand::Rng;
use reqwest::{Method, Request, Response, StatusCode};
use reqwest_middleware::{Error, Middleware, Next, Result};

/// How often and how patiently to retry a transiently failed request
///
/// Only idempotent methods (`GET`, `PUT`, `HEAD`, `DELETE`, `OPTIONS`,
/// `TRACE`) are retried, and only after a connection failure, a timeout, or
/// one of the statuses `408`, `413`, `429`, `500`, `502`, `503`, or `504`.
/// A `POST` is sent exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: u32,
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    /// Default retry policy
    ///
    /// Retries twice. The first retry waits 300 ms and each later one waits
    /// twice as long, plus up to 100 ms of random jitter. No wait exceeds
    /// 3 seconds.
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(3),
            multiplier: 2,
            max_jitter: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// The default policy with one more retry, for production deployments
    pub fn production() -> Self {
        Self::default().with_max_retries(3)
    }

    /// Sets how many times a request may be retried after its first attempt
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the exponential backoff
    ///
    /// The first retry waits `initial_delay`. Each later retry waits
    /// `multiplier` times longer than the one before, with a cap of
    /// `max_delay` that includes any jitter.
    #[must_use]
    pub fn with_backoff(mut self, initial_delay: Duration, max_delay: Duration, multiplier: u32) -> Self {
        self.initial_delay = initial_delay;
        self.max_delay = max_delay;
        self.multiplier = multiplier;
        self
    }

    /// Sets the upper bound of the random delay added to each backoff
    #[must_use]
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// How many times a request may be retried
    #[inline]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether requests using `method` may be retried
    pub fn retries_method(&self, method: &Method) -> bool {
        [
            Method::GET,
            Method::PUT,
            Method::HEAD,
            Method::DELETE,
            Method::OPTIONS,
            Method::TRACE,
        ]
        .contains(method)
    }

    /// Whether a response with `status` is worth retrying
    pub fn retries_status(&self, status: StatusCode) -> bool {
        matches!(status.as_u16(), 408 | 413 | 429 | 500 | 502 | 503 | 504)
    }

    fn is_transient(&self, outcome: &Result<Response>) -> bool {
        match outcome {
            Ok(resp) => self.retries_status(resp.status()),
            Err(Error::Reqwest(err)) => err.is_connect() || err.is_timeout(),
            Err(Error::Middleware(_)) => false,
        }
    }
}

/// Tracks the backoff across the retries of one request
#[derive(Debug)]
struct Backoff<'a> {
    policy: &'a RetryPolicy,
    last_delay: Option<Duration>,
}

impl<'a> Backoff<'a> {
    fn new(policy: &'a RetryPolicy) -> Self {
        Self {
            policy,
            last_delay: None,
        }
    }

    /// Reports a failure and returns the delay before the next attempt
    fn error(&mut self, jitter: Duration) -> Duration {
        let delay = self
            .last_delay
            .map(|d| d.saturating_mul(self.policy.multiplier))
            .unwrap_or(self.policy.initial_delay)
            .min(self.policy.max_delay);
        self.last_delay = Some(delay);
        delay.saturating_add(jitter).min(self.policy.max_delay)
    }
}

fn random_jitter(max_jitter: Duration) -> Duration {
    if max_jitter.is_zero() {
        return Duration::ZERO;
    }

    rand::thread_rng().gen_range(Duration::ZERO..=max_jitter)
}

/// A middleware that retries idempotent requests after transient failures
///
/// Place it before [`BearerTokenMiddleware`][crate::BearerTokenMiddleware]
/// so that each attempt resolves a current token. Requests whose bodies
/// cannot be cloned are sent once.
#[derive(Clone, Copy, Debug, Default)]
pub struct RetryMiddleware {
    policy: RetryPolicy,
}

impl RetryMiddleware {
    /// Construct a new middleware with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The policy applied to each request
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait::async_trait]
impl Middleware for RetryMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if !self.policy.retries_method(req.method()) {
            return next.run(req, extensions).await;
        }

        let mut backoff = Backoff::new(&self.policy);
        let mut req = req;
        let mut retries = 0;

        loop {
            let retry_req = if retries < self.policy.max_retries {
                req.try_clone()
            } else {
                None
            };

            let outcome = next.clone().run(req, extensions).await;

            let Some(retry_req) = retry_req else {
                return outcome;
            };

            if !self.policy.is_transient(&outcome) {
                return outcome;
            }

            retries += 1;
            let delay = backoff.error(random_jitter(self.policy.max_jitter));

            match &outcome {
                Ok(resp) => tracing::warn!(
                    url = %retry_req.url(),
                    status = resp.status().as_u16(),
                    retry = retries,
                    delay = ?delay,
                    "transient response; retrying"
                ),
                Err(err) => tracing::warn!(
                    url = %retry_req.url(),
                    error = %err,
                    retry = retries,
                    delay = ?delay,
                    "request failed; retrying"
                ),
            }

            drop(outcome);
            tokio::time::sleep(delay).await;
            req = retry_req;
        }
    }
}
