//! Thread-local phase timing.
//!
//! Phases are recorded only while collection is enabled (`--timing` or
//! `ORDO_TIMING=1`). Samples stay on the recording thread until
//! [`take_report`] drains them.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

thread_local! {
    static SAMPLES: RefCell<Vec<(&'static str, Duration)>> = const { RefCell::new(Vec::new()) };
}

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Returns `true` when `ORDO_TIMING` holds a truthy value
/// (`1`, `true`, `yes`, `on`; case-insensitive).
#[must_use]
pub fn enabled_from_env() -> bool {
    std::env::var("ORDO_TIMING")
        .ok()
        .is_some_and(|value| is_truthy(&value))
}

/// Turn collection on or off. Turning it off discards pending samples.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
    if !enabled {
        SAMPLES.with(|samples| samples.borrow_mut().clear());
    }
}

#[must_use]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Run `f`, recording its wall time under `phase`.
pub fn time_phase<R>(phase: &'static str, f: impl FnOnce() -> R) -> R {
    let _guard = PhaseGuard::start(phase);
    f()
}

/// Records the time between its creation and drop.
#[must_use = "the phase is recorded when the guard is dropped"]
pub struct PhaseGuard {
    phase: &'static str,
    started: Option<Instant>,
}

impl PhaseGuard {
    pub fn start(phase: &'static str) -> Self {
        Self {
            phase,
            started: is_enabled().then(Instant::now),
        }
    }
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        if let Some(started) = self.started {
            record(self.phase, started.elapsed());
        }
    }
}

fn record(phase: &'static str, elapsed: Duration) {
    SAMPLES.with(|samples| samples.borrow_mut().push((phase, elapsed)));
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Per-phase latency summary, sorted by phase name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimingReport {
    pub phases: Vec<PhaseStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseStats {
    pub name: String,
    pub count: usize,
    #[serde(rename = "total_us", serialize_with = "as_micros")]
    pub total: Duration,
    #[serde(rename = "p50_us", serialize_with = "as_micros")]
    pub p50: Duration,
    #[serde(rename = "p95_us", serialize_with = "as_micros")]
    pub p95: Duration,
    #[serde(rename = "p99_us", serialize_with = "as_micros")]
    pub p99: Duration,
}

fn as_micros<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(value.as_micros()).unwrap_or(u64::MAX))
}

/// Drain this thread's samples into a report.
#[must_use]
pub fn take_report() -> TimingReport {
    let samples = SAMPLES.with(|samples| std::mem::take(&mut *samples.borrow_mut()));

    let mut grouped: BTreeMap<&'static str, Vec<Duration>> = BTreeMap::new();
    for (phase, elapsed) in samples {
        grouped.entry(phase).or_default().push(elapsed);
    }

    let phases = grouped
        .into_iter()
        .map(|(name, mut values)| {
            values.sort_unstable();
            PhaseStats {
                name: name.to_string(),
                count: values.len(),
                total: values.iter().sum(),
                p50: percentile(&values, 50),
                p95: percentile(&values, 95),
                p99: percentile(&values, 99),
            }
        })
        .collect();

    TimingReport { phases }
}

impl TimingReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.phases.is_empty() {
            return writeln!(f, "No timing samples recorded.");
        }

        writeln!(f, "{:<20} {:>6} {:>10} {:>10} {:>10}", "phase", "count", "p50", "p95", "p99")?;
        writeln!(f, "{}", "-".repeat(60))?;
        for phase in &self.phases {
            writeln!(
                f,
                "{:<20} {:>6} {:>10} {:>10} {:>10}",
                phase.name,
                phase.count,
                format_duration(phase.p50),
                format_duration(phase.p95),
                format_duration(phase.p99),
            )?;
        }
        Ok(())
    }
}

/// Nearest-rank percentile over an ascending slice.
fn percentile(sorted: &[Duration], pct: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (pct.min(100) * sorted.len()).div_ceil(100);
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros >= 1_000_000 {
        format!("{}.{:03}s", micros / 1_000_000, (micros % 1_000_000) / 1_000)
    } else if micros >= 1_000 {
        format!("{}.{:03}ms", micros / 1_000, micros % 1_000)
    } else {
        format!("{micros}µs")
    }
}

fn is_truthy(value: &str) -> bool {
    ["1", "true", "yes", "on"]
        .iter()
        .any(|truthy| value.trim().eq_ignore_ascii_case(truthy))
}

#[cfg(test)]
mod tests {
    use super::*;

    static GUARD: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn nothing_recorded_while_disabled() {
        let _lock = GUARD.lock().expect("guard");
        set_enabled(false);

        assert_eq!(time_phase("txn.build", || 7_u8), 7);
        assert!(take_report().is_empty());
    }

    #[test]
    fn enabled_phases_are_grouped() {
        let _lock = GUARD.lock().expect("guard");
        set_enabled(true);

        time_phase("txn.build", || ());
        time_phase("txn.build", || ());
        {
            let _phase = PhaseGuard::start("txn.evaluate");
        }

        let report = take_report();
        set_enabled(false);

        let names: Vec<&str> = report.phases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["txn.build", "txn.evaluate"]);
        assert_eq!(report.phases[0].count, 2);
        assert!(take_report().is_empty(), "report drains samples");
    }

    #[test]
    fn percentiles_use_nearest_rank() {
        let _lock = GUARD.lock().expect("guard");
        set_enabled(false);
        for micros in [3_000, 1_000, 2_000] {
            record("txn.cycles", Duration::from_micros(micros));
        }

        let report = take_report();
        let cycles = &report.phases[0];
        assert_eq!(cycles.p50, Duration::from_micros(2_000));
        assert_eq!(cycles.p99, Duration::from_micros(3_000));
        assert_eq!(cycles.total, Duration::from_micros(6_000));
    }

    #[test]
    fn table_and_json_rendering() {
        let _lock = GUARD.lock().expect("guard");
        record("txn.expand", Duration::from_micros(1_500));
        let report = take_report();

        let table = report.to_string();
        assert!(table.contains("phase"));
        assert!(table.contains("txn.expand"));
        assert!(table.contains("1.500ms"));

        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["phases"][0]["name"], "txn.expand");
        assert_eq!(json["phases"][0]["p50_us"], 1_500);
    }

    #[test]
    fn truthy_values() {
        assert!(is_truthy("TrUe"));
        assert!(is_truthy(" 1 "));
        assert!(is_truthy("on"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("off"));
    }
}
