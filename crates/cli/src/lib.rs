pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::ask::AskArgs;

#[derive(Debug, Parser)]
#[command(
    name = "copilot",
    about = "Trading assistant CLI",
    long_about = "Ask the trading assistant questions, look up stock prices, send emails through the configured webhook and inspect configuration.",
    after_help = "Examples:\n  copilot ask --user-name Ada --user-id ada \"What is the latest MSFT close?\"\n  copilot price AAPL\n  copilot config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Send a prompt to the trading assistant and print its reply")]
    Ask {
        #[arg(long, help = "Name the assistant should address you by")]
        user_name: String,
        #[arg(long, help = "Stable identifier selecting your conversation thread")]
        user_id: String,
        #[arg(long, help = "Reuse an existing remote assistant with the same name")]
        keep: bool,
        prompt: String,
    },
    #[command(about = "Print the latest closing price for a ticker symbol")]
    Price { symbol: String },
    #[command(about = "Send an email through the configured webhook")]
    Email {
        #[arg(long)]
        to: String,
        #[arg(long)]
        content: String,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    logging::init_from_env();

    let result = match cli.command {
        Command::Ask { user_name, user_id, keep, prompt } => {
            commands::ask::run(AskArgs { user_name, user_id, keep, prompt })
        }
        Command::Price { symbol } => commands::price::run(&symbol),
        Command::Email { to, content } => commands::email::run(&to, &content),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
