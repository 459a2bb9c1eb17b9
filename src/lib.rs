pub mod backend_binary;
pub mod backend_health;
pub mod backend_http;
pub mod backend_launch;
pub mod error;
pub mod exit_state;
pub mod http_response;
pub mod logging;
pub mod process_control;
pub mod shell_config;
pub mod shell_state;
pub mod shutdown;
pub mod startup;
pub mod ui_lifecycle;

pub use backend_binary::{BackendTarget, RosettaProbe};
pub use error::ShellError;
pub use exit_state::{LifecycleFlag, ShutdownStage, StageMachine};
pub use shell_state::ShellState;

/// Backend endpoint defaults; the backend binds loopback only.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000/";
pub const BACKEND_HEALTH_PATH: &str = "/api/hello";
pub const BACKEND_SHUTDOWN_PATH: &str = "/shutdown";

pub const BACKEND_URL_ENV: &str = "GOODREADS_RPC_BACKEND_URL";
pub const BACKEND_CMD_ENV: &str = "GOODREADS_RPC_BACKEND_CMD";
pub const BACKEND_BUILD_ROOT_ENV: &str = "GOODREADS_RPC_BUILD_ROOT";
pub const SHELL_CONFIG_PATH_ENV: &str = "GOODREADS_RPC_CONFIG_PATH";
pub const SHELL_LOG_PATH_ENV: &str = "GOODREADS_RPC_LOG_PATH";

/// Launch timings. A spawn that has not errored or exited inside the
/// observation window is treated as alive.
pub const SPAWN_OBSERVATION_WINDOW_MS: u64 = 400;
pub const LAUNCH_RETRY_BACKOFF_MS: u64 = 1_500;
pub const MAX_LAUNCH_ATTEMPTS: u32 = 3;

pub const HEALTH_POLL_INTERVAL_MS: u64 = 250;
pub const HEALTH_PROBE_BUDGET: u32 = 75;
pub const HEALTH_PROBE_TIMEOUT_MS: u64 = 800;

/// Shutdown timings; the absolute deadline is the outer safety net.
pub const SHUTDOWN_REQUEST_TIMEOUT_MS: u64 = 2_000;
pub const BACKEND_TERM_GRACE_MS: u64 = 800;
pub const BACKEND_KILL_GRACE_MS: u64 = 800;
pub const APP_FORCE_EXIT_MS: u64 = 4_000;
pub const FINAL_EXIT_GRACE_MS: u64 = 500;

pub const SHELL_LOG_FILE: &str = "shell.log";
pub const SHELL_LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub const SHELL_LOG_BACKUP_COUNT: usize = 3;
