//! Terminal progress for the CLI phases.
//!
//! Interactive runs get an indicatif bar. With `log_only` the bar is hidden
//! and every `interval`-th step is reported through `tracing` instead, so
//! output stays readable under `tail -f`.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

const BAR_TEMPLATE: &str =
    "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})";
const SPINNER_TEMPLATE: &str = "{msg} {spinner} [{elapsed_precise}]";

/// Counted progress for one phase. Safe to tick from rayon workers.
pub struct PhaseProgress {
    phase: &'static str,
    bar: ProgressBar,
    done: AtomicU64,
    total: u64,
    interval: u64,
    log_only: bool,
}

impl PhaseProgress {
    pub fn new(phase: &'static str, total: u64, interval: u64, log_only: bool) -> Self {
        let bar = ProgressBar::new(total);
        if log_only {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(phase);
        Self {
            phase,
            bar,
            done: AtomicU64::new(0),
            total,
            interval,
            log_only,
        }
    }

    /// One step done.
    pub fn tick(&self) {
        self.bar.inc(1);
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if self.log_only && is_checkpoint(done, self.total, self.interval) {
            info!(phase = self.phase, done = done, total = self.total, "progress");
        }
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    pub fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Whether step `done` of `total` should be reported: every `interval`
/// steps and always on the last one.
fn is_checkpoint(done: u64, total: u64, interval: u64) -> bool {
    if total == 0 || interval == 0 {
        return false;
    }
    done % interval == 0 || done == total
}

/// Spinner for a phase with no step count. Hidden when `log_only`.
pub fn spinner(msg: &'static str, log_only: bool) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if log_only {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        if let Ok(style) = ProgressStyle::default_spinner().template(SPINNER_TEMPLATE) {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg);
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_checkpoints() {
        assert!(is_checkpoint(10, 25, 10));
        assert!(!is_checkpoint(11, 25, 10));
        assert!(is_checkpoint(25, 25, 10));
        assert!(!is_checkpoint(0, 0, 10));
        assert!(!is_checkpoint(5, 10, 0));
    }

    #[test]
    fn test_ticks_from_parallel_workers() {
        let progress = PhaseProgress::new("load", 50, 10, true);
        (0..50).into_par_iter().for_each(|_| progress.tick());
        assert_eq!(progress.done(), 50);
        progress.finish("Loaded 50 pages".to_string());
    }
}
