//! Circuit breaker for sink/transport calls, grounded on the teacher's
//! `CircuitBreakerState` (Closed/Open/HalfOpen) state machine and preset
//! configs, trimmed of the extraction-pipeline/event-bus plumbing that
//! doesn't apply here.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_cooldown: Duration,
    pub half_open_max_in_flight: u32,
}

/// Presets for common sink/transport kinds, mirroring the teacher's
/// `circuit::presets` module.
pub mod presets {
    use super::*;

    pub fn http_sink() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 5,
            open_cooldown: Duration::from_secs(30),
            half_open_max_in_flight: 3,
        }
    }

    pub fn database() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            open_cooldown: Duration::from_secs(60),
            half_open_max_in_flight: 2,
        }
    }

    pub fn transport() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 5,
            open_cooldown: Duration::from_secs(15),
            half_open_max_in_flight: 3,
        }
    }
}

#[derive(Debug, Clone)]
enum State {
    Closed { failure_count: u32 },
    Open { opened_at: Instant },
    HalfOpen { in_flight: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    Allowed,
    Rejected,
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::Closed { failure_count: 0 }),
        }
    }

    /// Call before attempting the guarded operation.
    pub async fn try_acquire(&self) -> Permit {
        let mut state = self.state.lock().await;
        match *state {
            State::Closed { .. } => Permit::Allowed,
            State::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.open_cooldown {
                    *state = State::HalfOpen { in_flight: 1 };
                    Permit::Allowed
                } else {
                    Permit::Rejected
                }
            }
            State::HalfOpen { in_flight } => {
                if in_flight < self.config.half_open_max_in_flight {
                    *state = State::HalfOpen { in_flight: in_flight + 1 };
                    Permit::Allowed
                } else {
                    Permit::Rejected
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        *state = State::Closed { failure_count: 0 };
    }

    pub async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        match *state {
            State::Closed { failure_count } => {
                let failure_count = failure_count + 1;
                if failure_count >= self.config.failure_threshold {
                    warn!(failure_count, "circuit breaker tripped to open");
                    *state = State::Open { opened_at: Instant::now() };
                } else {
                    *state = State::Closed { failure_count };
                }
            }
            State::HalfOpen { .. } => {
                warn!("probe failed in half-open state, re-opening circuit");
                *state = State::Open { opened_at: Instant::now() };
            }
            State::Open { .. } => {}
        }
    }

    pub async fn is_open(&self) -> bool {
        matches!(*self.state.lock().await, State::Open { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            open_cooldown: Duration::from_millis(20),
            half_open_max_in_flight: 1,
        }
    }

    #[tokio::test]
    async fn trips_open_after_consecutive_failures_reach_threshold() {
        let breaker = CircuitBreaker::new(config());
        breaker.record_failure().await;
        assert!(!breaker.is_open().await);
        breaker.record_failure().await;
        assert!(breaker.is_open().await);
    }

    #[tokio::test]
    async fn rejects_while_open_and_allows_a_probe_after_cooldown() {
        let breaker = CircuitBreaker::new(config());
        breaker.record_failure().await;
        breaker.record_failure().await;
        assert_eq!(breaker.try_acquire().await, Permit::Rejected);

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(breaker.try_acquire().await, Permit::Allowed);
    }

    #[tokio::test]
    async fn success_closes_the_circuit() {
        let breaker = CircuitBreaker::new(config());
        breaker.record_failure().await;
        breaker.record_success().await;
        breaker.record_failure().await;
        assert!(!breaker.is_open().await);
    }
}
