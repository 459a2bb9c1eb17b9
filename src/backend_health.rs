use std::time::Duration;

use crate::{
    backend_http::BackendEndpoint, error::ShellError, BACKEND_HEALTH_PATH, HEALTH_POLL_INTERVAL_MS,
    HEALTH_PROBE_BUDGET, HEALTH_PROBE_TIMEOUT_MS,
};

pub trait HealthProbe {
    async fn probe(&mut self) -> Option<u16>;
}

#[derive(Debug, Clone, Copy)]
pub struct HealthTimings {
    pub probe_budget: u32,
    pub poll_interval: Duration,
}

impl Default for HealthTimings {
    fn default() -> Self {
        Self {
            probe_budget: HEALTH_PROBE_BUDGET,
            poll_interval: Duration::from_millis(HEALTH_POLL_INTERVAL_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    endpoint: BackendEndpoint,
    probe_timeout: Duration,
}

impl HttpHealthProbe {
    pub fn new(endpoint: BackendEndpoint) -> Self {
        Self {
            endpoint,
            probe_timeout: Duration::from_millis(HEALTH_PROBE_TIMEOUT_MS),
        }
    }
}

impl HealthProbe for HttpHealthProbe {
    async fn probe(&mut self) -> Option<u16> {
        self.endpoint
            .request_status_code("GET", BACKEND_HEALTH_PATH, self.probe_timeout)
            .await
    }
}

/// Polls until the backend answers exactly 200 or the budget runs out. Any
/// other status or a connection failure burns one probe.
pub async fn wait_until_healthy<P, F>(
    probe: &mut P,
    timings: &HealthTimings,
    log: F,
) -> Result<(), ShellError>
where
    P: HealthProbe,
    F: Fn(&str) + Copy,
{
    let mut last_status = None;

    for attempt in 1..=timings.probe_budget {
        match probe.probe().await {
            Some(200) => {
                log(&format!("backend healthy after {attempt} probes"));
                return Ok(());
            }
            Some(status) => {
                last_status = Some(status);
            }
            None => {}
        }

        if attempt < timings.probe_budget {
            tokio::time::sleep(timings.poll_interval).await;
        }
    }

    log(&format!(
        "backend health poll budget exhausted: probes={}, last_status={}",
        timings.probe_budget,
        last_status
            .map(|status| status.to_string())
            .unwrap_or_else(|| "none".to_string())
    ));
    Err(ShellError::BackendUnhealthy {
        probes: timings.probe_budget,
        last_status,
    })
}
