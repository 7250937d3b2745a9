use std::collections::HashSet;
use std::time::Duration;

use copilot_core::config::RunConfig;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::api::{AssistantsApi, Run, RunStatus};
use crate::errors::AgentError;
use crate::tools::FunctionCallDelegate;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSettings {
    pub poll_interval: Duration,
    pub run_timeout: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self { poll_interval: Duration::from_millis(1_000), run_timeout: Duration::from_secs(300) }
    }
}

impl From<&RunConfig> for RunSettings {
    fn from(config: &RunConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            run_timeout: Duration::from_secs(config.run_timeout_secs),
        }
    }
}

/// Polls `run` until it reaches a terminal status, handing each new
/// `requires_action` step to `delegate` exactly once.
pub async fn drive_run(
    api: &dyn AssistantsApi,
    delegate: Option<&dyn FunctionCallDelegate>,
    settings: &RunSettings,
    thread_id: &str,
    mut run: Run,
    correlation_id: &str,
) -> Result<Run, AgentError> {
    let started = Instant::now();
    let mut submitted: HashSet<String> = HashSet::new();

    loop {
        debug!(
            event_name = "agent.run.status",
            correlation_id,
            run_id = %run.id,
            status = %run.status,
            "run status"
        );

        if run.status.is_terminal() {
            info!(
                event_name = "agent.run.finished",
                correlation_id,
                run_id = %run.id,
                status = %run.status,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "run finished"
            );
            return Ok(run);
        }

        if run.status == RunStatus::RequiresAction {
            let pending: Vec<String> = run
                .tool_calls()
                .iter()
                .map(|call| call.id.clone())
                .filter(|id| !submitted.contains(id))
                .collect();

            if !pending.is_empty() {
                let Some(delegate) = delegate else {
                    return Err(AgentError::MissingFunctionDelegate { run_id: run.id.clone() });
                };
                submitted.extend(pending);
                run = delegate.dispatch_function_call(api, thread_id, &run).await?;
                continue;
            }
        }

        if started.elapsed() >= settings.run_timeout {
            return Err(AgentError::RunTimedOut {
                run_id: run.id.clone(),
                waited_secs: settings.run_timeout.as_secs(),
            });
        }

        tokio::time::sleep(settings.poll_interval).await;
        run = api.get_run(thread_id, &run.id).await?;
    }
}
