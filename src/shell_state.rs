use std::sync::Mutex;

use crate::{
    exit_state::{LifecycleFlag, ShutdownStage, StageMachine},
    shell_config::ShellPreferences,
};

/// Supervisor context: the quitting flag, the shutdown stage and the single
/// backend process handle, passed explicitly instead of living as globals.
#[derive(Debug)]
pub struct ShellState<P> {
    pub preferences: ShellPreferences,
    pub lifecycle: LifecycleFlag,
    stages: Mutex<StageMachine>,
    process: Mutex<Option<P>>,
}

impl<P> ShellState<P> {
    pub fn new(preferences: ShellPreferences) -> Self {
        Self {
            preferences,
            lifecycle: LifecycleFlag::new(),
            stages: Mutex::new(StageMachine::default()),
            process: Mutex::new(None),
        }
    }

    /// Stores the freshly-launched handle. At most one live handle exists;
    /// an occupied slot is a logged anomaly and keeps the existing process.
    pub fn store_process<F>(&self, handle: P, log: F)
    where
        F: Fn(&str),
    {
        let mut guard = match self.process.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log("backend process lock poisoned while storing handle");
                poisoned.into_inner()
            }
        };
        if guard.is_some() {
            log("backend process handle already present, keeping existing process");
            return;
        }
        *guard = Some(handle);
    }

    /// Transfers ownership of the handle to the shutdown episode; the slot
    /// is nulled exactly once.
    pub fn take_process(&self) -> Option<P> {
        match self.process.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    pub fn has_process(&self) -> bool {
        match self.process.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }

    pub fn advance_stage<F>(&self, next: ShutdownStage, log: F) -> bool
    where
        F: Fn(&str),
    {
        let mut guard = match self.stages.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log(&format!(
                    "shutdown stage lock poisoned while advancing to {next:?}"
                ));
                poisoned.into_inner()
            }
        };
        let advanced = guard.advance_to(next);
        if advanced {
            log(&format!("shutdown stage -> {next:?}"));
        }
        advanced
    }

    pub fn current_stage(&self) -> ShutdownStage {
        match self.stages.lock() {
            Ok(guard) => guard.stage(),
            Err(poisoned) => poisoned.into_inner().stage(),
        }
    }

    pub fn is_quitting(&self) -> bool {
        self.lifecycle.is_quitting()
    }
}

impl<P> Default for ShellState<P> {
    fn default() -> Self {
        Self::new(ShellPreferences::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_slot_holds_at_most_one_handle() {
        let state: ShellState<u32> = ShellState::default();
        assert!(!state.has_process());

        state.store_process(7, |_m| {});
        state.store_process(8, |_m| {});
        assert_eq!(state.take_process(), Some(7));
        assert_eq!(state.take_process(), None);
    }

    #[test]
    fn stage_advance_is_shared_and_monotonic() {
        let state: ShellState<u32> = ShellState::default();
        assert!(state.advance_stage(ShutdownStage::PoliteRequestSent, |_m| {}));
        assert!(!state.advance_stage(ShutdownStage::NotStarted, |_m| {}));
        assert_eq!(state.current_stage(), ShutdownStage::PoliteRequestSent);
    }
}
