//! Progress reporting infrastructure

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::{borrow::Cow, cell::Cell, rc::Rc};

/// CLI progress report of the ongoing processing stage
///
/// To avoid corrupted terminal output, you should not write anything to stdout
/// or stderr yourself as long as a report is being displayed. Please use logs
/// for diagnostics.
#[derive(Clone, Debug, Default)]
pub struct ProgressReport(MultiProgress);
//
impl ProgressReport {
    /// Prepare to report progress on the cli
    pub fn new() -> Self {
        Self::default()
    }

    /// Start reporting on a new operation
    pub fn add(&self, what: impl Into<Cow<'static, str>>, config: ProgressConfig) -> ProgressTracker {
        let ProgressConfig {
            initial_work,
            can_add_work,
        } = config;
        let trailer = match initial_work {
            Work::Steps(_) => "{pos}/{len} ({per_sec})",
            Work::PercentSteps(_) => "{percent:>2}% (~{eta} left)",
            Work::Bytes(_) => "{decimal_bytes}/{decimal_total_bytes} ({decimal_bytes_per_sec})",
        };
        let bar = ProgressBar::new(initial_work.into())
            .with_prefix(what.into())
            .with_style(
                ProgressStyle::with_template(&format!("{{prefix}} {{wide_bar}} {trailer}"))
                    .expect("all styles above should be valid indicatif styles"),
            );
        let shown = u64::from(initial_work) > 0;
        if shown {
            self.0.add(bar.clone());
        }
        ProgressTracker {
            bar,
            report: self.0.clone(),
            shown: Rc::new(Cell::new(shown)),
            upcoming: Rc::new(Cell::new(can_add_work)),
        }
    }
}

/// Progress bar configuration
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct ProgressConfig {
    /// Initial length of the progress bar
    initial_work: Work,

    /// Can add more work after initial configuration
    can_add_work: bool,
}
//
impl ProgressConfig {
    /// Default configuration, with some initial amount of work
    pub fn new(initial_work: Work) -> Self {
        Self {
            initial_work,
            can_add_work: false,
        }
    }

    /// Enable addition of work after initial configuration
    pub fn allow_adding_work(self) -> Self {
        Self {
            can_add_work: true,
            ..self
        }
    }
}

/// Work whose progression can be tracked
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Work {
    /// Steps to be taken, with a precise count display
    Steps(usize),

    /// Steps to be taken, with a percentage-based display
    PercentSteps(usize),

    /// Bytes to be processed
    Bytes(usize),
}
//
impl From<Work> for u64 {
    fn from(value: Work) -> Self {
        let inner = match value {
            Work::Steps(s) => s,
            Work::PercentSteps(p) => p,
            Work::Bytes(b) => b,
        };
        inner as u64
    }
}

/// Mechanism to track progress
#[derive(Clone, Debug)]
pub struct ProgressTracker {
    /// Progress bar for this specific operation
    bar: ProgressBar,

    /// Underlying report
    report: MultiProgress,

    /// Truth that the progress bar has already been added to the report
    shown: Rc<Cell<bool>>,

    /// Truth that more work can still be added to this progress bar
    upcoming: Rc<Cell<bool>>,
}
//
impl ProgressTracker {
    /// Show that a certain amount of progress has been made
    ///
    /// Returns truth that the progress bar has reached its maximum value. Line
    /// based readers may overshoot the byte length of their input by one
    /// missing trailing newline, so overshooting is tolerated.
    pub fn make_progress(&self, progress: u64) -> bool {
        self.bar.inc(progress);
        let max = self.bar.length().unwrap_or(0);
        let finished = self.bar.position() >= max && !self.upcoming.get();
        if finished {
            self.bar.finish_and_clear();
            self.report.remove(&self.bar);
        }
        finished
    }

    /// Increment the amount of work that remains to be done
    ///
    /// Must be enabled in [`ProgressConfig`]. If you use it, call
    /// [`done_adding_work()`](Self::done_adding_work) once you know no further
    /// work will be coming.
    pub fn add_work(&self, remaining: u64) {
        assert!(
            self.upcoming.get(),
            "should not add work after done_adding_work"
        );
        if !self.shown.replace(true) && remaining > 0 {
            self.report.add(self.bar.clone());
        }
        self.bar.inc_length(remaining);
    }

    /// Promise that add_work will not be called anymore
    ///
    /// This allows for the progress bar to be hidden once full.
    pub fn done_adding_work(&self) {
        assert!(
            self.upcoming.replace(false),
            "should only promise to stop adding work once"
        );
    }
}
