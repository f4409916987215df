pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "slackforce",
    about = "Slackforce operator CLI",
    long_about = "Inspect configuration, check readiness, list MCP tools and ask the assistant from a terminal.",
    after_help = "Examples:\n  slackforce doctor --json\n  slackforce tools\n  slackforce ask \"List my top 3 accounts\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config and check that the MCP tool server can be launched")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List MCP tools and print the sanitized function declarations as JSON")]
    Tools,
    #[command(about = "Run one question through the tool loop and stream the answer to stdout")]
    Ask {
        #[arg(required = true, num_args = 1.., help = "Question to ask")]
        query: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Tools => commands::tools::run(),
        Command::Ask { query } => commands::ask::run(&query.join(" ")),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
