use serde_json::Value;

use crate::domain::turn::{Part, Role, Turn};
use crate::errors::DomainError;

/// Ordered dialogue sent to the model on every generation call.
///
/// The state is append-only: turns are never removed or reordered, and a function
/// response can only follow the model turn that requested it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConversationState {
    turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a state from prior dialogue. The newest chat message is expected to be
    /// excluded by the caller and appended separately with [`Self::append_user_query`].
    pub fn seed(history: impl IntoIterator<Item = Turn>) -> Self {
        let mut state = Self::new();
        state.turns.extend(history);
        state
    }

    pub fn append_user_query(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::user_text(text));
    }

    pub fn append_model_turn(&mut self, turn: Turn) -> Result<(), DomainError> {
        if turn.role != Role::Model {
            return Err(DomainError::InvariantViolation(format!(
                "expected a model turn, got role `{}`",
                turn.role.as_str()
            )));
        }
        if turn.parts.is_empty() {
            return Err(DomainError::EmptyModelTurn);
        }

        self.turns.push(turn);
        Ok(())
    }

    pub fn append_tool_response(
        &mut self,
        name: impl Into<String>,
        payload: Value,
    ) -> Result<(), DomainError> {
        let name = name.into();
        if !self.pending_call_named(&name) {
            return Err(DomainError::OrphanedFunctionResponse { name });
        }

        self.turns.push(Turn::new(Role::User, vec![Part::function_response(name, payload)]));
        Ok(())
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    // Walks back over the function responses of the current round to the model turn
    // that opened it.
    fn pending_call_named(&self, name: &str) -> bool {
        self.turns
            .iter()
            .rev()
            .find(|turn| !turn.is_function_response_turn())
            .filter(|turn| turn.role == Role::Model)
            .is_some_and(|turn| turn.function_calls().any(|call| call.name == name))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map};

    use super::ConversationState;
    use crate::domain::turn::{Part, Role, Turn};
    use crate::errors::DomainError;

    fn call_turn(names: &[&str]) -> Turn {
        Turn::new(
            Role::Model,
            names.iter().map(|name| Part::function_call(*name, Map::new())).collect(),
        )
    }

    #[test]
    fn seed_then_query_preserves_order() {
        let mut state = ConversationState::seed(vec![
            Turn::user_text("hello"),
            Turn::model_text("hi, how can I help?"),
        ]);
        state.append_user_query("List my top 3 accounts");

        assert_eq!(state.len(), 3);
        assert_eq!(state.turns()[0].text(), "hello");
        assert_eq!(state.last().map(Turn::text).as_deref(), Some("List my top 3 accounts"));
    }

    #[test]
    fn tool_responses_follow_their_model_turn() {
        let mut state = ConversationState::new();
        state.append_user_query("compare accounts");
        state.append_model_turn(call_turn(&["get_accounts", "search_accounts"])).expect("model");

        state.append_tool_response("get_accounts", json!({"result": []})).expect("first");
        state.append_tool_response("search_accounts", json!({"result": []})).expect("second");

        assert_eq!(state.len(), 4);
        assert!(state.turns()[3].is_function_response_turn());
    }

    #[test]
    fn orphaned_tool_response_is_rejected() {
        let mut state = ConversationState::new();
        state.append_user_query("hi");

        let error = state.append_tool_response("get_accounts", json!({})).expect_err("orphan");

        assert_eq!(error, DomainError::OrphanedFunctionResponse { name: "get_accounts".to_owned() });
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn tool_response_for_a_different_call_is_rejected() {
        let mut state = ConversationState::new();
        state.append_model_turn(call_turn(&["get_accounts"])).expect("model");

        let error = state.append_tool_response("delete_account", json!({})).expect_err("mismatch");
        assert!(matches!(error, DomainError::OrphanedFunctionResponse { .. }));
    }

    #[test]
    fn model_turn_must_have_model_role_and_parts() {
        let mut state = ConversationState::new();

        assert!(matches!(
            state.append_model_turn(Turn::user_text("nope")),
            Err(DomainError::InvariantViolation(_))
        ));
        assert_eq!(
            state.append_model_turn(Turn::new(Role::Model, Vec::new())),
            Err(DomainError::EmptyModelTurn)
        );
        assert!(state.is_empty());
    }
}
