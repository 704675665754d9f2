//! Attaching to exactly one matching process, with bounded retry

use crate::core::types::{AttachError, MemoryResult, ProcessInfo};
use crate::process::handle::{ProcessLocator, SharedProcess};
use crate::process::selector::ProcessSelector;
use crate::core::ShutdownSignal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Backoff and reporting policy for repeated attach attempts
#[derive(Debug, Clone, PartialEq)]
pub struct AttachBackoff {
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Upper bound for the delay between attempts
    pub max_delay: Duration,
    /// Growth factor applied after each failure
    pub multiplier: f64,
    /// Every n-th consecutive failure is logged as a warning
    pub report_every: u32,
}

impl Default for AttachBackoff {
    fn default() -> Self {
        AttachBackoff {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            report_every: 10,
        }
    }
}

impl AttachBackoff {
    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }

    /// Whether failed attempt number `attempt` deserves a warning
    pub fn should_report(&self, attempt: u32) -> bool {
        attempt == 1 || (self.report_every > 0 && attempt % self.report_every == 0)
    }
}

/// Picks the single process matching `selector` and opens it.
///
/// Zero matches is [`AttachError::NotFound`]; more than one is
/// [`AttachError::Ambiguous`], the attacher never picks one arbitrarily.
pub fn attach(
    locator: &dyn ProcessLocator,
    selector: &ProcessSelector,
) -> MemoryResult<SharedProcess> {
    let candidates: Vec<ProcessInfo> = locator
        .processes()?
        .into_iter()
        .filter(|p| selector.matches(p))
        .collect();

    match candidates.as_slice() {
        [] => Err(AttachError::NotFound {
            selector: selector.to_string(),
        }
        .into()),
        [only] => locator.open(only),
        many => Err(AttachError::Ambiguous {
            selector: selector.to_string(),
            count: many.len(),
            pids: many.iter().map(|p| p.pid).collect(),
        }
        .into()),
    }
}

/// Keeps trying to attach until it succeeds or shutdown is requested
pub struct ProcessAttacher {
    locator: Arc<dyn ProcessLocator>,
    selector: ProcessSelector,
    backoff: AttachBackoff,
}

impl ProcessAttacher {
    /// Create a new process attacher with default backoff
    pub fn new(locator: Arc<dyn ProcessLocator>, selector: ProcessSelector) -> Self {
        Self::with_backoff(locator, selector, AttachBackoff::default())
    }

    /// Create with a custom backoff policy
    pub fn with_backoff(
        locator: Arc<dyn ProcessLocator>,
        selector: ProcessSelector,
        backoff: AttachBackoff,
    ) -> Self {
        ProcessAttacher {
            locator,
            selector,
            backoff,
        }
    }

    pub fn selector(&self) -> &ProcessSelector {
        &self.selector
    }

    /// A single attach attempt
    pub fn attach_once(&self) -> MemoryResult<SharedProcess> {
        attach(self.locator.as_ref(), &self.selector)
    }

    /// Retries [`ProcessAttacher::attach_once`] with backoff.
    ///
    /// Returns `None` only when `shutdown` fires first.
    pub async fn attach_until(&self, shutdown: &ShutdownSignal) -> Option<SharedProcess> {
        let mut attempt: u32 = 0;

        loop {
            if shutdown.is_shutdown() {
                return None;
            }
            attempt = attempt.saturating_add(1);

            match self.attach_once() {
                Ok(process) => {
                    info!(
                        pid = process.pid(),
                        name = process.name(),
                        base = %process.base_address(),
                        attempts = attempt,
                        "Attached to process"
                    );
                    return Some(process);
                }
                Err(e) => {
                    let delay = self.backoff.delay_for(attempt);
                    if self.backoff.should_report(attempt) {
                        warn!(
                            attempt,
                            retry_in_ms = delay.as_millis() as u64,
                            "Cannot attach to process ({}): {}",
                            self.selector,
                            e
                        );
                    } else {
                        debug!(attempt, "Attach attempt failed: {}", e);
                    }

                    if shutdown.wait(delay).await {
                        return None;
                    }
                }
            }
        }
    }
}
