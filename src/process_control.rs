use std::process::Stdio;

use tokio::process::{Child, Command};

/// Liveness and the two escalation signals for a spawned backend. Send
/// failures are logged, never propagated.
pub trait BackendProcess {
    fn pid(&self) -> Option<u32>;

    fn is_alive(&mut self) -> bool;

    async fn send_term<F>(&mut self, log: F)
    where
        F: Fn(&str) + Copy;

    async fn send_kill<F>(&mut self, log: F)
    where
        F: Fn(&str) + Copy;
}

#[derive(Debug)]
pub struct ChildProcessHandle {
    child: Child,
}

impl ChildProcessHandle {
    pub fn new(child: Child) -> Self {
        Self { child }
    }
}

impl BackendProcess for ChildProcessHandle {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn send_term<F>(&mut self, log: F)
    where
        F: Fn(&str) + Copy,
    {
        let Some(pid) = self.pid() else {
            log("skip graceful termination signal: backend already reaped");
            return;
        };
        #[cfg(target_os = "windows")]
        run_signal_command(pid, "taskkill graceful stop", "taskkill", log).await;
        #[cfg(not(target_os = "windows"))]
        run_signal_command(pid, "kill -TERM", "kill", log).await;
    }

    async fn send_kill<F>(&mut self, log: F)
    where
        F: Fn(&str) + Copy,
    {
        let Some(pid) = self.pid() else {
            log("skip force kill: backend already reaped");
            return;
        };
        run_force_kill_command(pid, log).await;
    }
}

#[cfg(not(target_os = "windows"))]
async fn run_signal_command<F>(pid: u32, label: &str, program: &str, log: F)
where
    F: Fn(&str) + Copy,
{
    run_stop_command(pid, label, program, &["-TERM", &pid.to_string()], log).await;
}

#[cfg(target_os = "windows")]
async fn run_signal_command<F>(pid: u32, label: &str, program: &str, log: F)
where
    F: Fn(&str) + Copy,
{
    run_stop_command(pid, label, program, &["/pid", &pid.to_string(), "/t"], log).await;
}

#[cfg(not(target_os = "windows"))]
async fn run_force_kill_command<F>(pid: u32, log: F)
where
    F: Fn(&str) + Copy,
{
    run_stop_command(pid, "kill -KILL", "kill", &["-KILL", &pid.to_string()], log).await;
}

#[cfg(target_os = "windows")]
async fn run_force_kill_command<F>(pid: u32, log: F)
where
    F: Fn(&str) + Copy,
{
    run_stop_command(
        pid,
        "taskkill force stop",
        "taskkill",
        &["/pid", &pid.to_string(), "/t", "/f"],
        log,
    )
    .await;
}

async fn run_stop_command<F>(pid: u32, label: &str, program: &str, args: &[&str], log: F)
where
    F: Fn(&str) + Copy,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(target_os = "windows")]
    {
        // Avoid flashing transient console windows when invoking taskkill.
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    match command.status().await {
        Ok(exit_status) if exit_status.success() => {}
        Ok(exit_status) => log(&format!(
            "{label} returned non-zero: pid={pid}, status={exit_status:?}"
        )),
        Err(error) => log(&format!("{label} failed to start: pid={pid}, error={error}")),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spawn_sleeper() -> ChildProcessHandle {
        let child = Command::new("sleep")
            .arg("30")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn sleep");
        ChildProcessHandle::new(child)
    }

    #[tokio::test]
    async fn term_signal_stops_a_live_child() {
        let mut handle = spawn_sleeper();
        assert!(handle.is_alive());

        handle.send_term(|_message| {}).await;
        // SIGTERM delivery is asynchronous; poll briefly.
        for _ in 0..50 {
            if !handle.is_alive() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("child survived SIGTERM");
    }

    #[tokio::test]
    async fn dead_child_reports_not_alive() {
        let child = Command::new("true")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn true");
        let mut handle = ChildProcessHandle::new(child);
        for _ in 0..50 {
            if !handle.is_alive() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("`true` should exit promptly");
    }
}
