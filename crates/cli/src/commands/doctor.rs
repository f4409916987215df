use std::path::Path;

use serde::Serialize;
use slackforce_core::config::{AppConfig, LoadOptions};
use slackforce_mcp::resolve_command;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    build_report_with(LoadOptions::default())
}

fn build_report_with(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_tool_server_command(&config));
            checks.push(check_tool_server_script(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["tool_server_command", "tool_server_script"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

// The default launch is `python <script>`; a missing script only shows up once a run spawns it.
fn check_tool_server_script(config: &AppConfig) -> DoctorCheck {
    let script = config
        .mcp
        .args
        .iter()
        .find(|arg| !arg.starts_with('-') && (arg.contains('/') || arg.ends_with(".py")));

    match script {
        None => DoctorCheck {
            name: "tool_server_script",
            status: CheckStatus::Pass,
            details: "no script path among tool server args".to_string(),
        },
        Some(script) if Path::new(script).exists() => DoctorCheck {
            name: "tool_server_script",
            status: CheckStatus::Pass,
            details: format!("found `{script}`"),
        },
        Some(script) => DoctorCheck {
            name: "tool_server_script",
            status: CheckStatus::Fail,
            details: format!("`{script}` does not exist relative to the working directory"),
        },
    }
}

fn check_tool_server_command(config: &AppConfig) -> DoctorCheck {
    match resolve_command(&config.mcp.command) {
        Ok(path) => DoctorCheck {
            name: "tool_server_command",
            status: CheckStatus::Pass,
            details: format!(
                "`{}` resolved to {} (args: {})",
                config.mcp.command,
                path.display(),
                config.mcp.args.join(" ")
            ),
        },
        Err(error) => DoctorCheck {
            name: "tool_server_command",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
