use std::sync::atomic::{AtomicBool, Ordering};

/// Stages of one shutdown episode, in escalation order. Transitions are
/// strictly forward; skipping ahead is legal (a dead backend skips the
/// signal stages), moving backwards never is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ShutdownStage {
    #[default]
    NotStarted,
    PoliteRequestSent,
    GraceAfterPolite,
    TermSignalSent,
    GraceAfterTerm,
    KillSignalSent,
    GraceAfterKill,
    AbsoluteDeadlineHit,
    Complete,
}

#[derive(Debug, Default)]
pub struct StageMachine {
    stage: ShutdownStage,
}

impl StageMachine {
    pub fn stage(&self) -> ShutdownStage {
        self.stage
    }

    /// Moves to `next` only if it is strictly later than the current stage.
    pub fn advance_to(&mut self, next: ShutdownStage) -> bool {
        if next > self.stage {
            self.stage = next;
            return true;
        }
        false
    }

    pub fn is_complete(&self) -> bool {
        self.stage == ShutdownStage::Complete
    }
}

/// The process-wide "isQuitting" flag: set exactly once per process
/// lifetime, at the first terminal-exit trigger, then read-only.
#[derive(Debug, Default)]
pub struct LifecycleFlag {
    quitting: AtomicBool,
}

impl LifecycleFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the single shutdown episode; only the first caller wins.
    pub fn try_begin(&self) -> bool {
        self.quitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::Acquire)
    }
}
