use tokio::sync::Notify;

use crate::{error::ShellError, logging::append_runtime_log};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    WindowCloseRequested,
    RequestHide,
    RequestQuit,
}

/// What a window-close should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    HideToTray,
    BeginShutdown,
    Ignore,
}

pub fn decide_close_action(minimize_to_tray: bool, is_quitting: bool) -> CloseAction {
    if is_quitting {
        // The close raced an exit already in progress; the episode owns
        // teardown from here.
        return CloseAction::Ignore;
    }
    if minimize_to_tray {
        CloseAction::HideToTray
    } else {
        CloseAction::BeginShutdown
    }
}

/// Boundary to the presentation surfaces (splash, main window, tray). The
/// supervisor only ever calls through this trait.
pub trait UiShell {
    fn on_backend_ready(&self);

    /// Startup failed terminally. A quit affordance must stay reachable.
    fn on_backend_failed(&self, error: &ShellError);

    fn destroy_surfaces(&self);

    /// Detach lifecycle handlers so nothing re-enters during teardown.
    fn clear_lifecycle_listeners(&self);

    fn request_app_exit(&self, code: i32);

    /// Resolves once the runtime's own quit sequence has finished.
    async fn wait_app_exited(&self);

    /// Terminate the whole process immediately. Last resort only.
    fn hard_exit(&self, code: i32);
}

/// Shell implementation without real windows: surface transitions become
/// log lines and quit is an in-process notification.
#[derive(Debug, Default)]
pub struct HeadlessShell {
    exit_requested: Notify,
    quit_acknowledged: Notify,
}

impl HeadlessShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn wait_exit_requested(&self) {
        self.exit_requested.notified().await;
    }

    /// Called once the event loop has observed the exit request and finished
    /// its own teardown.
    pub fn acknowledge_quit(&self) {
        self.quit_acknowledged.notify_one();
    }
}

impl UiShell for HeadlessShell {
    fn on_backend_ready(&self) {
        append_runtime_log("backend ready, main surface up");
    }

    fn on_backend_failed(&self, error: &ShellError) {
        append_runtime_log(&format!("backend failed to come online: {error}"));
        if let Some(hint) = error.remediation_hint() {
            append_runtime_log(&format!("remediation: {hint}"));
        }
        eprintln!("Backend failed to start: {error}");
        if let Some(hint) = error.remediation_hint() {
            eprintln!("{hint}");
        }
    }

    fn destroy_surfaces(&self) {
        append_runtime_log("destroying presentation surfaces");
    }

    fn clear_lifecycle_listeners(&self) {
        append_runtime_log("clearing lifecycle listeners");
    }

    fn request_app_exit(&self, code: i32) {
        append_runtime_log(&format!("requesting app exit with code {code}"));
        self.exit_requested.notify_one();
    }

    async fn wait_app_exited(&self) {
        self.quit_acknowledged.notified().await;
    }

    fn hard_exit(&self, code: i32) {
        append_runtime_log(&format!("hard exit with code {code}"));
        std::process::exit(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_hides_to_tray_when_configured() {
        assert_eq!(decide_close_action(true, false), CloseAction::HideToTray);
    }

    #[test]
    fn close_begins_shutdown_without_tray_preference() {
        assert_eq!(decide_close_action(false, false), CloseAction::BeginShutdown);
    }

    #[test]
    fn close_is_ignored_once_quitting() {
        assert_eq!(decide_close_action(false, true), CloseAction::Ignore);
        assert_eq!(decide_close_action(true, true), CloseAction::Ignore);
    }

    #[tokio::test]
    async fn headless_shell_signals_exit_request() {
        let shell = HeadlessShell::new();
        shell.request_app_exit(0);
        // The permit is stored, so the wait completes even though the
        // request happened first.
        shell.wait_exit_requested().await;
    }

    #[tokio::test]
    async fn headless_shell_acknowledges_quit() {
        let shell = HeadlessShell::new();
        shell.acknowledge_quit();
        shell.wait_app_exited().await;
    }
}
