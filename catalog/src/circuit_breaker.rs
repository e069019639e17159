//! Count-based circuit breaker guarding one kind of upstream call.
//!
//! The breaker keeps the outcomes of the last `sliding_window_size` admitted calls.
//! Once at least `minimum_calls` outcomes are known and the failure ratio reaches
//! `failure_rate_threshold`, it opens and rejects calls for `open_cooldown`. The first
//! acquire after the cooldown moves it to half-open, where exactly `half_open_probes`
//! calls are let through. All probes succeeding closes the breaker, any probe failing
//! opens it again.
//!
//! Callers hold a [`BreakerPermit`] for the duration of one attempt and settle it with
//! [`BreakerPermit::success`] or [`BreakerPermit::failure`]. A permit dropped without
//! being settled records nothing; a dropped probe gives its slot back.

use crate::config::BreakerPolicy;
use crate::metrics_defs::BREAKER_OPENED;
use crate::types::CallKind;
use parking_lot::Mutex;
use shared::counter;
use std::collections::VecDeque;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Normal,
    Probe,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    // Bumped on every transition. Permits from an earlier generation are stale.
    generation: u64,
    // true = failure
    window: VecDeque<bool>,
    failures: usize,
    opened_at: Option<Instant>,
    probes_admitted: u32,
    probes_succeeded: u32,
}

impl BreakerState {
    fn transition(&mut self, to: CircuitState) {
        self.state = to;
        self.generation += 1;
        self.probes_admitted = 0;
        self.probes_succeeded = 0;
        match to {
            CircuitState::Open => self.opened_at = Some(Instant::now()),
            CircuitState::Closed => {
                self.window.clear();
                self.failures = 0;
                self.opened_at = None;
            }
            CircuitState::HalfOpen => {}
        }
    }
}

pub struct CircuitBreaker {
    kind: CallKind,
    policy: BreakerPolicy,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(kind: CallKind, policy: BreakerPolicy) -> Self {
        CircuitBreaker {
            kind,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                generation: 0,
                window: VecDeque::with_capacity(policy.sliding_window_size),
                failures: 0,
                opened_at: None,
                probes_admitted: 0,
                probes_succeeded: 0,
            }),
            policy,
        }
    }

    /// Current state. An open breaker whose cooldown has elapsed reports half-open.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);
        inner.state
    }

    /// Asks for permission to issue one call. Returns `None` while the breaker is open
    /// or while every half-open probe slot is taken.
    pub fn try_acquire(&self) -> Option<BreakerPermit<'_>> {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);

        let admission = match inner.state {
            CircuitState::Closed => Admission::Normal,
            CircuitState::Open => return None,
            CircuitState::HalfOpen => {
                if inner.probes_admitted >= self.policy.half_open_probes {
                    return None;
                }
                inner.probes_admitted += 1;
                Admission::Probe
            }
        };

        Some(BreakerPermit {
            breaker: self,
            admission,
            generation: inner.generation,
            settled: false,
        })
    }

    fn refresh(&self, inner: &mut BreakerState) {
        if inner.state != CircuitState::Open {
            return;
        }
        let cooled_down = inner
            .opened_at
            .is_some_and(|opened_at| opened_at.elapsed() >= self.policy.open_cooldown());
        if cooled_down {
            inner.transition(CircuitState::HalfOpen);
            tracing::info!(kind = %self.kind, "circuit breaker half-open");
        }
    }

    fn record(&self, admission: Admission, generation: u64, failed: bool) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }

        match (inner.state, admission) {
            (CircuitState::Closed, _) => {
                inner.window.push_back(failed);
                if failed {
                    inner.failures += 1;
                }
                if inner.window.len() > self.policy.sliding_window_size
                    && inner.window.pop_front() == Some(true)
                {
                    inner.failures -= 1;
                }

                let calls = inner.window.len();
                if calls >= self.policy.minimum_calls {
                    let ratio = inner.failures as f64 / calls as f64;
                    if ratio >= self.policy.failure_rate_threshold {
                        tracing::warn!(
                            kind = %self.kind,
                            failures = inner.failures,
                            calls,
                            "circuit breaker opened"
                        );
                        inner.transition(CircuitState::Open);
                        counter!(BREAKER_OPENED, "kind" => self.kind.as_str()).increment(1);
                    }
                }
            }
            (CircuitState::HalfOpen, Admission::Probe) => {
                if failed {
                    tracing::warn!(kind = %self.kind, "probe failed, circuit breaker reopened");
                    inner.transition(CircuitState::Open);
                    counter!(BREAKER_OPENED, "kind" => self.kind.as_str()).increment(1);
                } else {
                    inner.probes_succeeded += 1;
                    if inner.probes_succeeded >= self.policy.half_open_probes {
                        tracing::info!(kind = %self.kind, "circuit breaker closed");
                        inner.transition(CircuitState::Closed);
                    }
                }
            }
            // Outcomes arriving while open are ignored.
            _ => {}
        }
    }

    fn release_probe(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation == generation && inner.state == CircuitState::HalfOpen {
            inner.probes_admitted = inner.probes_admitted.saturating_sub(1);
        }
    }
}

/// Permission to issue one call through a [`CircuitBreaker`].
#[must_use]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    generation: u64,
    settled: bool,
}

impl BreakerPermit<'_> {
    pub fn admission(&self) -> Admission {
        self.admission
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record(self.admission, self.generation, false);
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record(self.admission, self.generation, true);
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.admission == Admission::Probe {
            self.breaker.release_probe(self.generation);
        }
    }
}
