use std::path::PathBuf;

use copilot_agent::messages::image_file_ids;
use copilot_agent::trading::{assistants_client, TradingCapabilities};
use copilot_agent::{AgentError, AssistantAgent};
use copilot_core::config::{ConfigOverrides, LoadOptions};

use crate::commands::{load_config, runtime, CommandResult};

#[derive(Debug, Clone)]
pub struct AskArgs {
    pub user_name: String,
    pub user_id: String,
    pub keep: bool,
    pub prompt: String,
}

/// Sends one prompt to the trading assistant and removes every remote
/// resource it created before returning.
pub fn run(args: AskArgs) -> CommandResult {
    let overrides =
        ConfigOverrides { keep_state: args.keep.then_some(true), ..ConfigOverrides::default() };
    let config = match load_config("ask", LoadOptions { overrides, ..LoadOptions::default() }) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("ask") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let capabilities = match TradingCapabilities::from_config(&config) {
        Ok(capabilities) => capabilities,
        Err(error) => return CommandResult::failure("ask", "http_client", error.to_string(), 3),
    };
    let options = capabilities.agent_options(&config);
    let output_folder: PathBuf = config.workspace.output_folder.clone();
    let AskArgs { user_name, user_id, prompt, .. } = args;

    let outcome = runtime.block_on(async {
        let api = assistants_client(&config, None)?;
        AssistantAgent::scoped(&config.agent, api, options, move |agent| {
            Box::pin(async move {
                let reply = agent.process_prompt(&user_name, &user_id, &prompt).await?;
                let mut lines: Vec<String> = reply.messages.iter().map(ToString::to_string).collect();
                for file_id in image_file_ids(&reply.messages) {
                    let path = agent.save_assistant_file(file_id, &output_folder).await?;
                    lines.push(format!("saved {}", path.display()));
                }
                Ok::<_, AgentError>(lines)
            })
        })
        .await
    });

    match outcome {
        Ok(lines) => CommandResult::success("ask", lines.join("\n")),
        Err(error) => CommandResult::agent_failure("ask", &error),
    }
}
