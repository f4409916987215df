use std::process::ExitCode;

fn main() -> ExitCode {
    slackforce_cli::run()
}
