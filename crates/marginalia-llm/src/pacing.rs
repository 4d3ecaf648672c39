//! Request pacing for text-generation services.
//!
//! Requests wait for a governor permit, which spaces them at the configured
//! rate. On 429 the governor is slowed, the `Retry-After` hint (or an
//! exponential backoff) is slept off, and the request is retried.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio_util::sync::CancellationToken;

use crate::{CompletionRequest, GenerationError, TextGenerator};

/// Type alias for governor's direct rate limiter.
type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const MAX_SLOWDOWN: u32 = 16;
const RESTORE_AFTER: Duration = Duration::from_secs(60);

/// Rate limiter with adaptive rate adjustment via ArcSwap.
///
/// When a 429 is received, the governor is atomically swapped to a slower rate.
/// After a cooldown period (60s) with no 429s, the original rate is restored.
pub struct AdaptiveLimiter {
    limiter: ArcSwap<DirectLimiter>,
    /// Base period between allowed requests.
    base_period: Duration,
    /// Current slowdown factor (1 = normal, 2 = half rate, etc.).
    current_factor: AtomicU32,
    /// Timestamp of the last 429 response.
    last_429: std::sync::Mutex<Option<Instant>>,
}

impl AdaptiveLimiter {
    /// Returns `None` for a zero period, which would mean no limit at all.
    pub fn new(period: Duration) -> Option<Self> {
        let quota = Quota::with_period(period)?;
        Some(Self {
            limiter: ArcSwap::from(Arc::new(DirectLimiter::direct(quota))),
            base_period: period,
            current_factor: AtomicU32::new(1),
            last_429: std::sync::Mutex::new(None),
        })
    }

    pub fn slowdown_factor(&self) -> u32 {
        self.current_factor.load(Ordering::SeqCst)
    }

    /// Wait until the rate limiter allows a request.
    pub async fn acquire(&self) {
        self.try_decay();
        let limiter = self.limiter.load_full();
        limiter.until_ready().await;
    }

    /// Called when a 429 is received. Doubles the slowdown factor and swaps the governor.
    pub fn on_rate_limited(&self) {
        if let Ok(mut last) = self.last_429.lock() {
            *last = Some(Instant::now());
        }

        let _ = self
            .current_factor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| {
                Some((f * 2).min(MAX_SLOWDOWN))
            });

        self.swap_to(self.slowdown_factor());
    }

    /// If 60s have passed since the last 429, restore the original rate.
    fn try_decay(&self) {
        let should_restore = self
            .last_429
            .lock()
            .ok()
            .and_then(|last| last.map(|t| t.elapsed() >= RESTORE_AFTER))
            .unwrap_or(false);

        if should_restore && self.slowdown_factor() > 1 {
            self.current_factor.store(1, Ordering::SeqCst);
            self.swap_to(1);
        }
    }

    fn swap_to(&self, factor: u32) {
        if let Some(scaled) = self.base_period.checked_mul(factor)
            && let Some(quota) = Quota::with_period(scaled)
        {
            self.limiter.store(Arc::new(DirectLimiter::direct(quota)));
        }
    }
}

/// How requests to a text-generation service are spaced and retried.
#[derive(Debug, Clone, PartialEq)]
pub struct PacingPolicy {
    /// Minimum spacing between requests. `None` disables proactive pacing.
    pub min_interval: Option<Duration>,
    /// Retries after the first attempt for retryable failures.
    pub max_retries: u32,
    /// Backoff before the first retry, doubled for every further one.
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Relative jitter applied to computed backoffs (0.2 = ±20 %).
    pub jitter: f64,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            min_interval: None,
            max_retries: 3,
            base_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            jitter: 0.2,
        }
    }
}

impl PacingPolicy {
    /// Groq's free tier allows about 30 requests per minute.
    pub fn free_tier() -> Self {
        Self {
            min_interval: Some(Duration::from_secs(3)),
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Delay before retry number `attempt` (zero-based).
    ///
    /// A server-provided `Retry-After` is honored as is (capped at
    /// `max_backoff`); otherwise the exponential backoff is jittered.
    pub fn backoff_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint.min(self.max_backoff);
        }
        let exp = self
            .base_backoff
            .checked_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff);
        let spread = self.jitter.clamp(0.0, 1.0);
        let factor = 1.0 - spread + fastrand::f64() * 2.0 * spread;
        exp.mul_f64(factor).min(self.max_backoff)
    }
}

/// A [`TextGenerator`] wrapped with a [`PacingPolicy`].
pub struct Paced<G> {
    inner: G,
    policy: PacingPolicy,
    limiter: Option<AdaptiveLimiter>,
    cancel: CancellationToken,
}

impl<G: TextGenerator> Paced<G> {
    pub fn new(inner: G, policy: PacingPolicy) -> Self {
        let limiter = policy.min_interval.and_then(AdaptiveLimiter::new);
        Self {
            inner,
            policy,
            limiter,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort waits and further attempts once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    pub fn policy(&self) -> &PacingPolicy {
        &self.policy
    }

    /// Sleep unless cancelled first.
    async fn wait(&self, duration: Duration) -> Result<(), GenerationError> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancel.cancelled() => Err(GenerationError::Cancelled),
        }
    }

    async fn acquire(&self) -> Result<(), GenerationError> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        tokio::select! {
            _ = limiter.acquire() => Ok(()),
            _ = self.cancel.cancelled() => Err(GenerationError::Cancelled),
        }
    }

    async fn run(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let mut attempt = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }
            self.acquire().await?;

            match self.inner.complete(request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    let retry_after = match &e {
                        GenerationError::RateLimited { retry_after } => {
                            if let Some(lim) = &self.limiter {
                                lim.on_rate_limited();
                            }
                            *retry_after
                        }
                        _ => None,
                    };
                    let delay = self.policy.backoff_delay(attempt, retry_after);
                    tracing::info!(
                        service = self.inner.name(),
                        attempt = attempt + 1,
                        delay_secs = delay.as_secs_f64(),
                        error = %e,
                        "retrying text generation"
                    );
                    self.wait(delay).await?;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<G: TextGenerator> TextGenerator for Paced<G> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>> {
        Box::pin(self.run(request))
    }
}
