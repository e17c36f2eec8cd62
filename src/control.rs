// Control plane: admission control
//
// Bounds concurrent route computations and smooths request bursts with a
// one-second sliding-window rate limit.
//
// Numan Thabit 2025 Nov

use crate::errors::RoutingError;
use crate::router::Budget;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

#[derive(Clone)]
pub struct AdmissionControl {
    max_inflight: Arc<Semaphore>,
    limiter: Option<Arc<Mutex<RateLimiter>>>,
}

struct RateLimiter {
    rate_per_sec: u32,
    timestamps: VecDeque<Instant>,
    window: Duration,
}

impl RateLimiter {
    /// Record an admission if the window has room.
    fn try_admit(&mut self, now: Instant) -> bool {
        while let Some(front) = self.timestamps.front() {
            if now.duration_since(*front) > self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
        if (self.timestamps.len() as u32) < self.rate_per_sec {
            self.timestamps.push_back(now);
            true
        } else {
            false
        }
    }
}

impl AdmissionControl {
    pub fn new(max_inflight: usize, rate_per_sec: Option<u32>) -> Self {
        let limiter = rate_per_sec.map(|rate| {
            Arc::new(Mutex::new(RateLimiter {
                rate_per_sec: rate.max(1),
                timestamps: VecDeque::with_capacity(256),
                window: Duration::from_secs(1),
            }))
        });
        Self {
            max_inflight: Arc::new(Semaphore::new(max_inflight.max(1))),
            limiter,
        }
    }

    /// Acquire an admission permit respecting max inflight and rate limit.
    /// Waiting gives up as soon as the request's budget runs out.
    pub async fn acquire(&self, budget: &Budget) -> Result<AdmissionPermit, RoutingError> {
        if let Some(limiter) = &self.limiter {
            let mut waited = 0u32;
            while !limiter.lock().await.try_admit(Instant::now()) {
                budget.check()?;
                waited += 1;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            if waited > 0 {
                debug!(waited_ms = waited * 5, "admission delayed by rate limit");
            }
        }
        budget.check()?;

        let semaphore = Arc::clone(&self.max_inflight);
        let acquired = match budget.remaining() {
            Some(left) => match tokio::time::timeout(left, semaphore.acquire_owned()).await {
                Ok(acquired) => acquired,
                Err(_) => {
                    debug!("admission queue outlasted the request budget");
                    return Err(budget.exceeded());
                }
            },
            None => semaphore.acquire_owned().await,
        };
        let permit =
            acquired.map_err(|_| RoutingError::InternalComputationError("admission semaphore closed".into()))?;
        Ok(AdmissionPermit { _permit: permit })
    }

    pub fn available(&self) -> usize {
        self.max_inflight.available_permits()
    }
}

pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}
