use std::{process::Stdio, time::Duration};

use tokio::{process::Command, time::timeout};

use crate::{
    backend_binary::BackendTarget, error::ShellError, process_control::ChildProcessHandle,
    LAUNCH_RETRY_BACKOFF_MS, MAX_LAUNCH_ATTEMPTS, SPAWN_OBSERVATION_WINDOW_MS,
};

/// How a single spawn-and-observe cycle failed.
#[derive(Debug)]
pub enum SpawnFailure {
    FailedToSpawn(String),
    /// Started but exited inside the observation window.
    DiedEarly(String),
}

impl SpawnFailure {
    fn describe(&self) -> String {
        match self {
            Self::FailedToSpawn(detail) => format!("spawn error: {detail}"),
            Self::DiedEarly(detail) => format!("died on launch: {detail}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    Pending,
    Succeeded,
    FailedEarly,
    FailedToSpawn,
}

#[derive(Debug)]
pub struct LaunchAttempt {
    pub number: u32,
    pub outcome: LaunchOutcome,
}

pub trait SpawnBackend {
    type Handle;

    async fn spawn_observed(
        &mut self,
        target: &BackendTarget,
    ) -> Result<Self::Handle, SpawnFailure>;
}

#[derive(Debug, Clone, Copy)]
pub struct LaunchTimings {
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for LaunchTimings {
    fn default() -> Self {
        Self {
            max_attempts: MAX_LAUNCH_ATTEMPTS,
            retry_backoff: Duration::from_millis(LAUNCH_RETRY_BACKOFF_MS),
        }
    }
}

/// Spawns detached from interactive stdio, then watches the child for a
/// short window to catch immediate deaths.
#[derive(Debug, Clone, Copy)]
pub struct ProcessSpawner {
    pub observation_window: Duration,
}

impl Default for ProcessSpawner {
    fn default() -> Self {
        Self {
            observation_window: Duration::from_millis(SPAWN_OBSERVATION_WINDOW_MS),
        }
    }
}

impl SpawnBackend for ProcessSpawner {
    type Handle = ChildProcessHandle;

    async fn spawn_observed(
        &mut self,
        target: &BackendTarget,
    ) -> Result<Self::Handle, SpawnFailure> {
        let (program, args) = target.command_line();
        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(target_os = "windows")]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            command.creation_flags(CREATE_NO_WINDOW | CREATE_NEW_PROCESS_GROUP);
        }

        let mut child = command
            .spawn()
            .map_err(|error| SpawnFailure::FailedToSpawn(format!("{program}: {error}")))?;

        match timeout(self.observation_window, child.wait()).await {
            Ok(Ok(status)) => Err(SpawnFailure::DiedEarly(format!(
                "backend exited with {status} inside the observation window"
            ))),
            Ok(Err(error)) => Err(SpawnFailure::DiedEarly(format!(
                "failed to observe backend after spawn: {error}"
            ))),
            Err(_window_elapsed) => Ok(ChildProcessHandle::new(child)),
        }
    }
}

/// Bounded-retry launch against a target the caller resolved once. Each
/// failed attempt waits the fixed backoff before the next try.
pub async fn launch_backend_with_retries<S, F>(
    spawner: &mut S,
    target: &BackendTarget,
    timings: &LaunchTimings,
    log: F,
) -> Result<S::Handle, ShellError>
where
    S: SpawnBackend,
    F: Fn(&str) + Copy,
{
    for number in 1..=timings.max_attempts {
        let mut attempt = LaunchAttempt {
            number,
            outcome: LaunchOutcome::Pending,
        };

        match spawner.spawn_observed(target).await {
            Ok(handle) => {
                attempt.outcome = LaunchOutcome::Succeeded;
                log(&format!(
                    "backend launch attempt {} succeeded",
                    attempt.number
                ));
                return Ok(handle);
            }
            Err(failure) => {
                attempt.outcome = match failure {
                    SpawnFailure::FailedToSpawn(_) => LaunchOutcome::FailedToSpawn,
                    SpawnFailure::DiedEarly(_) => LaunchOutcome::FailedEarly,
                };
                log(&format!(
                    "backend launch attempt {} failed ({})",
                    attempt.number,
                    failure.describe()
                ));
            }
        }

        if number < timings.max_attempts {
            tokio::time::sleep(timings.retry_backoff).await;
        }
    }

    Err(ShellError::BackendLaunch {
        attempts: timings.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct ScriptedSpawner {
        calls: u32,
        failures_before_success: u32,
    }

    impl SpawnBackend for ScriptedSpawner {
        type Handle = ();

        async fn spawn_observed(
            &mut self,
            _target: &BackendTarget,
        ) -> Result<Self::Handle, SpawnFailure> {
            self.calls += 1;
            if self.calls > self.failures_before_success {
                Ok(())
            } else {
                Err(SpawnFailure::DiedEarly("scripted failure".to_string()))
            }
        }
    }

    fn test_target() -> BackendTarget {
        BackendTarget {
            executable: PathBuf::from("/fixtures/backend"),
            launcher: None,
            launcher_args: Vec::new(),
        }
    }

    fn test_timings() -> LaunchTimings {
        LaunchTimings {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(1_500),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_the_final_attempt_with_fixed_backoff() {
        let mut spawner = ScriptedSpawner {
            calls: 0,
            failures_before_success: 2,
        };
        let started = tokio::time::Instant::now();

        launch_backend_with_retries(&mut spawner, &test_target(), &test_timings(), |_m| {})
            .await
            .expect("third attempt should succeed");

        assert_eq!(spawner.calls, 3);
        // Two failed attempts, each followed by the fixed backoff.
        assert_eq!(started.elapsed(), Duration::from_millis(3_000));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_reports_backend_launch_error() {
        let mut spawner = ScriptedSpawner {
            calls: 0,
            failures_before_success: u32::MAX,
        };

        let error =
            launch_backend_with_retries(&mut spawner, &test_target(), &test_timings(), |_m| {})
                .await
                .expect_err("all attempts fail");

        assert_eq!(spawner.calls, 3);
        assert!(matches!(error, ShellError::BackendLaunch { attempts: 3 }));
    }

    #[tokio::test]
    async fn first_attempt_success_spawns_exactly_once() {
        let mut spawner = ScriptedSpawner {
            calls: 0,
            failures_before_success: 0,
        };

        launch_backend_with_retries(&mut spawner, &test_target(), &test_timings(), |_m| {})
            .await
            .expect("first attempt succeeds");

        assert_eq!(spawner.calls, 1);
    }

    #[cfg(unix)]
    mod real_spawns {
        use super::*;

        #[tokio::test]
        async fn observation_window_accepts_a_surviving_process() {
            let mut spawner = ProcessSpawner {
                observation_window: Duration::from_millis(100),
            };
            let target = BackendTarget {
                executable: PathBuf::from("/bin/sleep"),
                launcher: Some("sleep".to_string()),
                launcher_args: vec!["5".to_string()],
            };

            let handle = spawner
                .spawn_observed(&target)
                .await
                .expect("sleep survives the window");
            let mut handle = handle;
            use crate::process_control::BackendProcess;
            assert!(handle.is_alive());
            handle.send_kill(|_m| {}).await;
        }

        #[tokio::test]
        async fn observation_window_catches_immediate_exit() {
            let mut spawner = ProcessSpawner {
                observation_window: Duration::from_millis(300),
            };
            let target = BackendTarget {
                executable: PathBuf::from("/bin/true"),
                launcher: Some("true".to_string()),
                launcher_args: Vec::new(),
            };

            let failure = spawner
                .spawn_observed(&target)
                .await
                .expect_err("`true` exits inside the window");
            assert!(matches!(failure, SpawnFailure::DiedEarly(_)));
        }

        #[tokio::test]
        async fn missing_executable_fails_to_spawn() {
            let mut spawner = ProcessSpawner::default();
            let target = BackendTarget {
                executable: PathBuf::from("/nonexistent/backend-binary"),
                launcher: None,
                launcher_args: Vec::new(),
            };

            let failure = spawner
                .spawn_observed(&target)
                .await
                .expect_err("spawn must fail");
            assert!(matches!(failure, SpawnFailure::FailedToSpawn(_)));
        }
    }
}
