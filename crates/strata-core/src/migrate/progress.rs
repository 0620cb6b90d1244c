//! Hierarchical migration progress.
//!
//! One [`MigrationProgress`] root exists per migration invocation, with one
//! [`StepProgress`] child per step. Each step is normalized to a fixed unit
//! count; the root's fraction is the mean of its children. Counters only
//! ever grow, so observed fractions are non-decreasing and reach exactly
//! 1.0 when every step completes.
//!
//! Counters are plain atomics: safe to read from any thread, written only
//! from the executor's worker.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Normalized unit count of one step.
pub(crate) const STEP_UNITS: u64 = 10_000;

/// Progress of a single migration step.
#[derive(Debug)]
pub struct StepProgress {
    completed: AtomicU64,
}

impl StepProgress {
    fn new() -> Self {
        Self {
            completed: AtomicU64::new(0),
        }
    }

    /// Completed units, out of [`total_units`](Self::total_units).
    pub fn completed_units(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Total units of this step.
    pub fn total_units(&self) -> u64 {
        STEP_UNITS
    }

    /// Fraction completed, in `0.0..=1.0`.
    pub fn fraction_completed(&self) -> f64 {
        self.completed_units() as f64 / STEP_UNITS as f64
    }

    /// Check if the step has completed.
    pub fn is_complete(&self) -> bool {
        self.completed_units() >= STEP_UNITS
    }

    /// Raise the completed count to `units`; never lowers it.
    pub(crate) fn advance_to(&self, units: u64) {
        self.completed.fetch_max(units.min(STEP_UNITS), Ordering::AcqRel);
    }

    /// Snap the step to 100%.
    pub(crate) fn complete(&self) {
        self.completed.store(STEP_UNITS, Ordering::Release);
    }
}

/// Root progress of one migration invocation.
///
/// Cloneable handle; callers poll it for UI binding while the executor's
/// worker advances the per-step children.
#[derive(Debug, Clone)]
pub struct MigrationProgress {
    steps: Arc<Vec<StepProgress>>,
}

impl MigrationProgress {
    /// Create a root with one child per step.
    pub fn new(step_count: usize) -> Self {
        Self {
            steps: Arc::new((0..step_count).map(|_| StepProgress::new()).collect()),
        }
    }

    /// Number of steps tracked.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// The child tracker for one step.
    pub fn step(&self, index: usize) -> &StepProgress {
        &self.steps[index]
    }

    /// Aggregate fraction completed across all steps, in `0.0..=1.0`.
    pub fn fraction_completed(&self) -> f64 {
        if self.steps.is_empty() {
            return 1.0;
        }
        let sum: f64 = self.steps.iter().map(|s| s.fraction_completed()).sum();
        sum / self.steps.len() as f64
    }

    /// Check if every step has completed.
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.is_complete())
    }
}

/// Tick interval of the fabricated lightweight-migration progress.
const FAKE_TICK: Duration = Duration::from_millis(250);

/// Assumed ceiling the fabricated progress approaches (three minutes).
const FAKE_CEILING: Duration = Duration::from_secs(180);

/// Fabricates monotonically increasing progress for a lightweight step.
///
/// The in-place migration call is synchronous and reports nothing, so a
/// ticker thread advances the step's counter toward (but never onto) 100%,
/// decaying exponentially against the assumed ceiling. On success the step
/// is snapped to 100%; on failure the counter is left where it stopped and
/// the mapped fallback continues from there.
pub(crate) struct FakeProgressTicker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    progress: MigrationProgress,
    step_index: usize,
}

impl FakeProgressTicker {
    /// Start ticking against a step's counter.
    pub(crate) fn start(progress: MigrationProgress, step_index: usize) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let ticker_progress = progress.clone();

        let handle = thread::spawn(move || {
            let step = ticker_progress.step(step_index);
            let per_tick = FAKE_TICK.as_secs_f64() / FAKE_CEILING.as_secs_f64();
            while !stop_flag.load(Ordering::SeqCst) {
                thread::sleep(FAKE_TICK);
                let completed = step.completed_units();
                let remaining = STEP_UNITS.saturating_sub(completed);
                let advance = ((remaining as f64 * per_tick).ceil() as u64).max(1);
                // Hold just under 100% until the migration itself reports
                // success.
                step.advance_to((completed + advance).min(STEP_UNITS - 1));
            }
        });

        Self {
            stop,
            handle: Some(handle),
            progress,
            step_index,
        }
    }

    /// Stop ticking. `succeeded` snaps the step to 100%.
    pub(crate) fn finish(mut self, succeeded: bool) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        if succeeded {
            self.progress.step(self.step_index).complete();
        }
    }
}

impl Drop for FakeProgressTicker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
