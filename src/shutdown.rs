use std::time::Duration;

use tokio::time::{sleep, timeout};

use crate::{
    backend_http::BackendEndpoint,
    exit_state::ShutdownStage,
    process_control::BackendProcess,
    shell_state::ShellState,
    ui_lifecycle::{decide_close_action, CloseAction, UiEvent, UiShell},
    APP_FORCE_EXIT_MS, BACKEND_KILL_GRACE_MS, BACKEND_SHUTDOWN_PATH, BACKEND_TERM_GRACE_MS,
    FINAL_EXIT_GRACE_MS, SHUTDOWN_REQUEST_TIMEOUT_MS,
};

#[derive(Debug, Clone, Copy)]
pub struct ShutdownTimings {
    pub polite_request_timeout: Duration,
    pub term_grace: Duration,
    pub kill_grace: Duration,
    pub absolute_deadline: Duration,
    pub final_exit_grace: Duration,
}

impl Default for ShutdownTimings {
    fn default() -> Self {
        Self {
            polite_request_timeout: Duration::from_millis(SHUTDOWN_REQUEST_TIMEOUT_MS),
            term_grace: Duration::from_millis(BACKEND_TERM_GRACE_MS),
            kill_grace: Duration::from_millis(BACKEND_KILL_GRACE_MS),
            absolute_deadline: Duration::from_millis(APP_FORCE_EXIT_MS),
            final_exit_grace: Duration::from_millis(FINAL_EXIT_GRACE_MS),
        }
    }
}

/// Seam over the polite shutdown request so the chain is testable without a
/// listening backend. `None` means the request errored; the chain treats
/// that like a response and escalates sooner.
pub trait ShutdownTransport {
    async fn send_shutdown_request(&self, request_timeout: Duration) -> Option<u16>;
}

#[derive(Debug, Clone)]
pub struct HttpShutdownTransport {
    endpoint: BackendEndpoint,
}

impl HttpShutdownTransport {
    pub fn new(endpoint: BackendEndpoint) -> Self {
        Self { endpoint }
    }
}

impl ShutdownTransport for HttpShutdownTransport {
    async fn send_shutdown_request(&self, request_timeout: Duration) -> Option<u16> {
        self.endpoint
            .request_status_code("POST", BACKEND_SHUTDOWN_PATH, request_timeout)
            .await
    }
}

/// What the escalation chain actually did, logged at the end of the episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainReport {
    pub polite_status: Option<u16>,
    pub term_signal_sent: bool,
    pub kill_signal_sent: bool,
}

/// The escalation chain. Stage timers are the only thing gating progress;
/// every sub-operation failure is logged and means "proceed".
pub async fn run_shutdown_chain<P, T, F>(
    state: &ShellState<P>,
    transport: &T,
    process: &mut Option<P>,
    timings: &ShutdownTimings,
    log: F,
) -> ChainReport
where
    P: BackendProcess,
    T: ShutdownTransport,
    F: Fn(&str) + Copy,
{
    let mut report = ChainReport::default();

    state.advance_stage(ShutdownStage::PoliteRequestSent, log);
    let polite = timeout(
        timings.polite_request_timeout,
        transport.send_shutdown_request(timings.polite_request_timeout),
    )
    .await;

    state.advance_stage(ShutdownStage::GraceAfterPolite, log);
    match polite {
        Ok(Some(status)) => {
            // A round trip happened, so the backend saw the request; give it
            // the grace interval to exit voluntarily before signaling.
            report.polite_status = Some(status);
            log(&format!("shutdown request answered with status {status}"));
            sleep(timings.term_grace).await;
        }
        Ok(None) => {
            log("shutdown request failed, escalating immediately");
        }
        Err(_elapsed) => {
            log("shutdown request timed out, escalating immediately");
        }
    }

    match process.as_mut() {
        Some(backend) => {
            if backend.is_alive() {
                state.advance_stage(ShutdownStage::TermSignalSent, log);
                backend.send_term(log).await;
                report.term_signal_sent = true;

                state.advance_stage(ShutdownStage::GraceAfterTerm, log);
                sleep(timings.term_grace).await;

                if backend.is_alive() {
                    state.advance_stage(ShutdownStage::KillSignalSent, log);
                    backend.send_kill(log).await;
                    report.kill_signal_sent = true;
                } else {
                    log("backend exited after graceful termination signal, skip force kill");
                }

                state.advance_stage(ShutdownStage::GraceAfterKill, log);
                sleep(timings.kill_grace).await;
            } else {
                log("backend already exited, skipping termination signals");
            }
        }
        None => {
            log("no backend process handle, skipping termination signals");
        }
    }

    // Terminated or abandoned, either way the handle is done.
    *process = None;
    report
}

/// One shutdown episode, entered at most once per process lifetime. Races
/// the escalation chain against the absolute deadline; the losing side is
/// dropped, so no armed timer survives a clean completion.
pub async fn execute_exit<P, T, U, F>(
    state: &ShellState<P>,
    transport: &T,
    ui: &U,
    timings: &ShutdownTimings,
    log: F,
) where
    P: BackendProcess,
    T: ShutdownTransport,
    U: UiShell,
    F: Fn(&str) + Copy,
{
    if !state.lifecycle.try_begin() {
        log("exit already in progress, ignoring duplicate request");
        return;
    }
    log("exit requested, beginning shutdown episode");

    let mut process = state.take_process();
    tokio::select! {
        report = run_shutdown_chain(state, transport, &mut process, timings, log) => {
            log(&format!(
                "escalation chain finished: polite_status={:?}, term={}, kill={}",
                report.polite_status, report.term_signal_sent, report.kill_signal_sent
            ));
            ui.destroy_surfaces();
            ui.clear_lifecycle_listeners();
            state.advance_stage(ShutdownStage::Complete, log);
            ui.request_app_exit(0);

            tokio::select! {
                _ = ui.wait_app_exited() => {
                    log("runtime quit completed");
                }
                _ = sleep(timings.final_exit_grace) => {
                    log("runtime quit stalled past the final grace, hard exit");
                    ui.hard_exit(0);
                }
            }
        }
        _ = sleep(timings.absolute_deadline) => {
            log("absolute shutdown deadline hit, forcing application exit");
            state.advance_stage(ShutdownStage::AbsoluteDeadlineHit, log);
            state.advance_stage(ShutdownStage::Complete, log);
            ui.destroy_surfaces();
            ui.hard_exit(0);
        }
    }
}

/// Routes a presentation-layer event into the supervisor.
pub async fn handle_ui_event<P, T, U, F>(
    event: UiEvent,
    state: &ShellState<P>,
    transport: &T,
    ui: &U,
    timings: &ShutdownTimings,
    log: F,
) where
    P: BackendProcess,
    T: ShutdownTransport,
    U: UiShell,
    F: Fn(&str) + Copy,
{
    match event {
        UiEvent::RequestHide => {
            log("hide requested, window moves to tray");
        }
        UiEvent::WindowCloseRequested => {
            match decide_close_action(state.preferences.minimize_to_tray, state.is_quitting()) {
                CloseAction::HideToTray => {
                    log("window closed, hiding to tray");
                }
                CloseAction::BeginShutdown => {
                    execute_exit(state, transport, ui, timings, log).await;
                }
                CloseAction::Ignore => {}
            }
        }
        UiEvent::RequestQuit => {
            execute_exit(state, transport, ui, timings, log).await;
        }
    }
}
