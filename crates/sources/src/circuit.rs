//! Per-source circuit breaker
//!
//! Failure accounting with closed / open / half-open states:
//! - closed -> open after `failure_threshold` consecutive failures
//! - open -> half-open once the cooldown has elapsed
//! - half-open -> closed on the first success, back to open on any failure
//!
//! `allow` is non-blocking; half-open admits exactly one probe in flight at
//! a time. State transitions happen inside a single mutex-guarded section.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct SourceCircuit {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

impl SourceCircuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_in_flight: false,
        }
    }
}

/// Read-only view for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub source: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
}

pub struct CircuitBreaker {
    circuits: Mutex<HashMap<String, SourceCircuit>>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            failure_threshold: failure_threshold.max(1),
            cooldown,
        }
    }

    /// Whether a call to `source` may proceed. Closed always allows; open
    /// never allows; half-open allows exactly one probe in flight.
    pub fn allow(&self, source: &str) -> bool {
        let mut circuits = self.circuits.lock().expect("circuit table poisoned");
        let circuit = circuits
            .entry(source.to_string())
            .or_insert_with(SourceCircuit::new);

        match circuit.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled = circuit
                    .opened_at
                    .map(|at| at.elapsed() >= self.cooldown)
                    .unwrap_or(true);
                if cooled {
                    circuit.state = CircuitState::HalfOpen;
                    circuit.probe_in_flight = true;
                    info!(source, "Circuit half-open; admitting probe");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if circuit.probe_in_flight {
                    false
                } else {
                    circuit.probe_in_flight = true;
                    true
                }
            }
        }
    }

    /// Record a successful call; closes the circuit and resets the count.
    pub fn on_success(&self, source: &str) {
        let mut circuits = self.circuits.lock().expect("circuit table poisoned");
        let circuit = circuits
            .entry(source.to_string())
            .or_insert_with(SourceCircuit::new);

        if circuit.state != CircuitState::Closed {
            info!(source, "Circuit closed after successful probe");
        }
        circuit.state = CircuitState::Closed;
        circuit.consecutive_failures = 0;
        circuit.opened_at = None;
        circuit.probe_in_flight = false;
    }

    /// Record a failed call; opens the circuit at the threshold and sends a
    /// failed half-open probe straight back to open.
    pub fn on_failure(&self, source: &str) {
        let mut circuits = self.circuits.lock().expect("circuit table poisoned");
        let circuit = circuits
            .entry(source.to_string())
            .or_insert_with(SourceCircuit::new);

        circuit.probe_in_flight = false;
        circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);

        let should_open = match circuit.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => circuit.consecutive_failures >= self.failure_threshold,
            CircuitState::Open => false,
        };

        if should_open {
            circuit.state = CircuitState::Open;
            circuit.opened_at = Some(Instant::now());
            warn!(
                source,
                failures = circuit.consecutive_failures,
                "Circuit opened"
            );
        }
    }

    /// Reset every circuit to closed (admin op).
    pub fn reset(&self) {
        let mut circuits = self.circuits.lock().expect("circuit table poisoned");
        circuits.clear();
        info!("All circuits reset");
    }

    pub fn snapshot(&self) -> Vec<CircuitSnapshot> {
        let circuits = self.circuits.lock().expect("circuit table poisoned");
        let mut rows: Vec<CircuitSnapshot> = circuits
            .iter()
            .map(|(source, c)| CircuitSnapshot {
                source: source.clone(),
                state: c.state,
                consecutive_failures: c.consecutive_failures,
            })
            .collect();
        rows.sort_by(|a, b| a.source.cmp(&b.source));
        rows
    }

    pub fn state_of(&self, source: &str) -> CircuitState {
        let circuits = self.circuits.lock().expect("circuit table poisoned");
        circuits
            .get(source)
            .map(|c| c.state)
            .unwrap_or(CircuitState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(5, Duration::from_millis(cooldown_ms))
    }

    #[test]
    fn test_opens_after_threshold() {
        let breaker = breaker(30_000);

        for _ in 0..4 {
            breaker.on_failure("pubmed");
            assert!(breaker.allow("pubmed"));
        }
        breaker.on_failure("pubmed");

        assert_eq!(breaker.state_of("pubmed"), CircuitState::Open);
        assert!(!breaker.allow("pubmed"));
    }

    #[test]
    fn test_success_resets_failure_count() {
        let breaker = breaker(30_000);

        for _ in 0..4 {
            breaker.on_failure("arxiv");
        }
        breaker.on_success("arxiv");
        for _ in 0..4 {
            breaker.on_failure("arxiv");
        }

        assert_eq!(breaker.state_of("arxiv"), CircuitState::Closed);
        assert!(breaker.allow("arxiv"));
    }

    #[test]
    fn test_half_open_after_cooldown_single_probe() {
        let breaker = breaker(20);

        for _ in 0..5 {
            breaker.on_failure("core");
        }
        assert!(!breaker.allow("core"));

        std::thread::sleep(Duration::from_millis(30));

        // One probe admitted, a second concurrent attempt is refused
        assert!(breaker.allow("core"));
        assert!(!breaker.allow("core"));
    }

    #[test]
    fn test_half_open_success_closes() {
        let breaker = breaker(20);

        for _ in 0..5 {
            breaker.on_failure("doaj");
        }
        std::thread::sleep(Duration::from_millis(30));
        assert!(breaker.allow("doaj"));

        breaker.on_success("doaj");
        assert_eq!(breaker.state_of("doaj"), CircuitState::Closed);
        assert!(breaker.allow("doaj"));
        assert!(breaker.allow("doaj"));
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let breaker = breaker(20);

        for _ in 0..5 {
            breaker.on_failure("zenodo");
        }
        std::thread::sleep(Duration::from_millis(30));
        assert!(breaker.allow("zenodo"));

        breaker.on_failure("zenodo");
        assert_eq!(breaker.state_of("zenodo"), CircuitState::Open);
        assert!(!breaker.allow("zenodo"));
    }

    #[test]
    fn test_sources_are_independent() {
        let breaker = breaker(30_000);

        for _ in 0..5 {
            breaker.on_failure("hal");
        }
        assert!(!breaker.allow("hal"));
        assert!(breaker.allow("openalex"));
    }

    #[test]
    fn test_reset_closes_everything() {
        let breaker = breaker(30_000);

        for _ in 0..5 {
            breaker.on_failure("unpaywall");
        }
        breaker.reset();
        assert!(breaker.allow("unpaywall"));
        assert_eq!(breaker.state_of("unpaywall"), CircuitState::Closed);
    }

    #[test]
    fn test_snapshot_sorted() {
        let breaker = breaker(30_000);
        breaker.on_failure("zenodo");
        breaker.on_failure("arxiv");

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot[0].source, "arxiv");
        assert_eq!(snapshot[1].source, "zenodo");
    }
}
