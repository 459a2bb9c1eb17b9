use goodreads_rpc_desktop::{
    backend_binary::{resolve_startup_target, RosettaProbe},
    backend_health::{HealthTimings, HttpHealthProbe},
    backend_http::BackendEndpoint,
    backend_launch::{LaunchTimings, ProcessSpawner},
    logging::{append_shutdown_log, append_startup_log},
    process_control::ChildProcessHandle,
    shell_config::load_preferences,
    shell_state::ShellState,
    shutdown::{handle_ui_event, HttpShutdownTransport, ShutdownTimings},
    startup::run_startup,
    ui_lifecycle::{HeadlessShell, UiEvent},
};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    append_startup_log("shell starting");

    let preferences = load_preferences(|message| append_startup_log(message));
    let state: ShellState<ChildProcessHandle> = ShellState::new(preferences);
    let endpoint = BackendEndpoint::from_env(|message| append_startup_log(message));
    let rosetta = RosettaProbe::new();

    let mut spawner = ProcessSpawner::default();
    let mut probe = HttpHealthProbe::new(endpoint.clone());
    let shell = HeadlessShell::new();

    let startup = run_startup(
        &state,
        || resolve_startup_target(&rosetta, |message| append_startup_log(message)),
        &mut spawner,
        &mut probe,
        &shell,
        &LaunchTimings::default(),
        &HealthTimings::default(),
        |message| append_startup_log(message),
    )
    .await;

    if startup.is_err() {
        // Stay up anyway: the operator keeps a quit path, and the shutdown
        // episode below still cleans up a half-started backend.
        append_startup_log("startup failed, waiting for interrupt to clean up");
    }

    if let Err(error) = tokio::signal::ctrl_c().await {
        append_shutdown_log(&format!("failed to listen for interrupt: {error}"));
    }
    append_shutdown_log("interrupt received");

    let transport = HttpShutdownTransport::new(endpoint);
    let timings = ShutdownTimings::default();
    tokio::join!(
        handle_ui_event(
            UiEvent::RequestQuit,
            &state,
            &transport,
            &shell,
            &timings,
            |message| append_shutdown_log(message),
        ),
        async {
            // Stand in for the runtime's own quit sequence: observe the exit
            // request and confirm teardown so the episode can finish cleanly.
            shell.wait_exit_requested().await;
            shell.acknowledge_quit();
        },
    );

    append_shutdown_log("shell exited cleanly");
}
