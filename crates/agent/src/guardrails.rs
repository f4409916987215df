use std::future::Future;
use std::time::Duration;

use slackforce_core::config::AppConfig;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String },
}

/// Bounds applied to every run: a round cap and one deadline per suspension point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopGuardrails {
    pub max_tool_rounds: u32,
    pub generation_timeout: Duration,
    pub tool_timeout: Duration,
}

impl Default for LoopGuardrails {
    fn default() -> Self {
        Self {
            max_tool_rounds: 8,
            generation_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(60),
        }
    }
}

impl LoopGuardrails {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_tool_rounds: config.agent.max_tool_rounds,
            generation_timeout: Duration::from_secs(config.llm.timeout_secs),
            tool_timeout: Duration::from_secs(config.mcp.tool_timeout_secs),
        }
    }

    /// Decides whether another tool round may run after `completed_rounds` rounds.
    pub fn evaluate_round(&self, completed_rounds: u32) -> GuardrailDecision {
        if completed_rounds < self.max_tool_rounds {
            return GuardrailDecision::Allow;
        }

        GuardrailDecision::Deny {
            reason_code: "tool_loop_exceeded",
            user_message: format!(
                "the model kept requesting tools after {} rounds",
                self.max_tool_rounds
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupted {
    TimedOut,
    Cancelled,
}

/// Runs `future` until it finishes, its deadline passes, or `cancel` fires.
pub async fn run_guarded<F>(
    future: F,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<F::Output, Interrupted>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        outcome = tokio::time::timeout(deadline, future) => {
            outcome.map_err(|_| Interrupted::TimedOut)
        }
    }
}
