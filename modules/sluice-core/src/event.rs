use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The record broadcast on every state-changing call: the action name and
/// whatever payload was dispatched with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchEvent {
    pub action: String,
    pub payload: Value,
}

impl DispatchEvent {
    pub fn new(action: impl Into<String>, payload: Value) -> Self {
        Self {
            action: action.into(),
            payload,
        }
    }
}
