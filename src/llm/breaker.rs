use std::sync::Mutex;
use std::time::{Duration, Instant};

const FAILURE_THRESHOLD: u32 = 5;
const COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug)]
enum State {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen,
}

// Per-provider circuit breaker. Opens after a run of failures, lets a single
// probe through after the cooldown, closes again on success.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<State>,
    cooldown: Duration,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(COOLDOWN)
    }
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(State::Closed { failures: 0 }),
            cooldown,
        }
    }

    pub fn allow_request(&self) -> bool {
        let mut state = self.state.lock().unwrap();

        match &*state {
            State::Closed { .. } | State::HalfOpen => true,
            State::Open { opened_at } => {
                if opened_at.elapsed() >= self.cooldown {
                    *state = State::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap();

        *state = State::Closed { failures: 0 };
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap();

        match &*state {
            State::Closed { failures } => {
                let failures = failures + 1;

                if failures >= FAILURE_THRESHOLD {
                    *state = State::Open {
                        opened_at: Instant::now(),
                    };
                } else {
                    *state = State::Closed { failures };
                }
            }
            State::HalfOpen => {
                *state = State::Open {
                    opened_at: Instant::now(),
                };
            }
            State::Open { .. } => (),
        }
    }

    pub fn is_open(&self) -> bool {
        let state = self.state.lock().unwrap();

        matches!(&*state, State::Open { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::CircuitBreaker;
    use std::time::Duration;

    #[test]
    fn opens_after_sustained_failures() {
        let breaker = CircuitBreaker::default();

        for _ in 0..4 {
            breaker.record_failure();
            assert!(breaker.allow_request());
        }

        breaker.record_failure();

        assert!(breaker.is_open());
        assert!(!breaker.allow_request());
    }

    #[test]
    fn success_resets_the_failure_run() {
        let breaker = CircuitBreaker::default();

        for _ in 0..4 {
            breaker.record_failure();
        }

        breaker.record_success();

        for _ in 0..4 {
            breaker.record_failure();
        }

        assert!(!breaker.is_open());
    }

    #[test]
    fn half_open_probe_closes_on_success() {
        let breaker = CircuitBreaker::new(Duration::from_millis(0));

        for _ in 0..5 {
            breaker.record_failure();
        }

        assert!(breaker.is_open());

        // Cooldown of zero: the next request is the half-open probe.
        assert!(breaker.allow_request());

        breaker.record_success();

        assert!(!breaker.is_open());
        assert!(breaker.allow_request());
    }

    #[test]
    fn half_open_probe_reopens_on_failure() {
        let breaker = CircuitBreaker::new(Duration::from_millis(0));

        for _ in 0..5 {
            breaker.record_failure();
        }

        assert!(breaker.allow_request());

        breaker.record_failure();

        assert!(breaker.is_open());
    }
}
