use serde::{Deserialize, Serialize};

/// What a turn reports to the transport, in order.
///
/// A turn starts with at least one `Working` status, may carry any number of
/// `Chunk`s, and ends with exactly one `Completed` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TurnEvent {
    Working(String),
    Chunk(String),
    Completed,
    Failed(String),
}

impl TurnEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnEvent::Completed | TurnEvent::Failed(_))
    }
}
