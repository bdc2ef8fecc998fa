use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crate::exception::Flow;

/// Cancellation signal shared between the embedder and a running evaluation.
///
/// The embedder sets it (directly or through the timeout timer) and the
/// interpreter polls it at every loop iteration, call, and import.
pub type CancelFlag = Arc<AtomicBool>;

/// Tracks the time budget of one evaluation.
///
/// `tick()` is the single polling point the evaluator calls at its
/// suspension points. It observes the optional deadline and the optional
/// host cancellation flag; either trips the evaluation with a timeout signal
/// carrying the elapsed wall time.
#[derive(Debug, Clone)]
pub(crate) struct Tracker {
    started: Instant,
    deadline: Option<Instant>,
    cancel: Option<CancelFlag>,
}

impl Tracker {
    /// No limits: `tick()` always succeeds.
    pub fn unbounded() -> Self {
        Self {
            started: Instant::now(),
            deadline: None,
            cancel: None,
        }
    }

    pub fn new(limit: Option<Duration>, cancel: Option<CancelFlag>) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: limit.map(|l| started + l),
            cancel,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Polls the deadline and the cancellation flag.
    pub fn tick(&self) -> Result<(), Flow> {
        if let Some(cancel) = &self.cancel
            && cancel.load(Ordering::Relaxed)
        {
            return Err(Flow::Timeout {
                elapsed: self.elapsed(),
            });
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(Flow::Timeout {
                elapsed: self.elapsed(),
            });
        }
        Ok(())
    }
}
