use std::path::PathBuf;

use thiserror::Error;

/// Supervisor failures. Shutdown-chain errors never appear here; the
/// escalation chain absorbs them.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("unsupported platform: {os}")]
    UnsupportedPlatform { os: String },

    #[error("backend binary not found at {}", path.display())]
    BinaryNotFound {
        path: PathBuf,
        hint: Option<String>,
    },

    #[error("invalid backend command override: {0}")]
    InvalidBackendCommand(String),

    #[error("backend failed to launch after {attempts} attempts")]
    BackendLaunch { attempts: u32 },

    #[error("backend never became healthy after {probes} probes")]
    BackendUnhealthy {
        probes: u32,
        last_status: Option<u16>,
    },
}

impl ShellError {
    pub fn remediation_hint(&self) -> Option<&str> {
        match self {
            Self::BinaryNotFound { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }

}
