use crate::{
    backend_binary::BackendTarget,
    backend_health::{wait_until_healthy, HealthProbe, HealthTimings},
    backend_launch::{launch_backend_with_retries, LaunchTimings, SpawnBackend},
    error::ShellError,
    shell_state::ShellState,
    ui_lifecycle::UiShell,
};

/// Resolve once, launch with bounded retries, poll until healthy. Exactly
/// one of the ready/failed notifications fires.
pub async fn run_startup<P, S, H, U, R, F>(
    state: &ShellState<P>,
    resolve: R,
    spawner: &mut S,
    probe: &mut H,
    ui: &U,
    launch_timings: &LaunchTimings,
    health_timings: &HealthTimings,
    log: F,
) -> Result<(), ShellError>
where
    S: SpawnBackend<Handle = P>,
    H: HealthProbe,
    U: UiShell,
    R: FnOnce() -> Result<BackendTarget, ShellError>,
    F: Fn(&str) + Copy,
{
    let outcome = startup_sequence(
        state,
        resolve,
        spawner,
        probe,
        launch_timings,
        health_timings,
        log,
    )
    .await;

    match &outcome {
        Ok(()) => ui.on_backend_ready(),
        Err(error) => ui.on_backend_failed(error),
    }
    outcome
}

async fn startup_sequence<P, S, H, R, F>(
    state: &ShellState<P>,
    resolve: R,
    spawner: &mut S,
    probe: &mut H,
    launch_timings: &LaunchTimings,
    health_timings: &HealthTimings,
    log: F,
) -> Result<(), ShellError>
where
    S: SpawnBackend<Handle = P>,
    H: HealthProbe,
    R: FnOnce() -> Result<BackendTarget, ShellError>,
    F: Fn(&str) + Copy,
{
    // Resolution runs once per startup; a retry never re-resolves.
    let target = resolve()?;
    let (program, args) = target.command_line();
    log(&format!("backend target: {program} {args:?}"));

    let handle = launch_backend_with_retries(spawner, &target, launch_timings, log).await?;
    state.store_process(handle, log);

    wait_until_healthy(probe, health_timings, log).await?;
    log("backend is healthy");
    Ok(())
}
