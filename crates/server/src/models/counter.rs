//! Counter model.

use serde::{Deserialize, Serialize};

use crate::counter::PLACEHOLDER;

/// Persistent, monotonically increasing sequence used to mint identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Counter {
    /// Unique identifier (`cnt_` prefix).
    #[serde(rename = "_id")]
    pub id: String,

    /// Workspace the Counter belongs to.
    pub workspace: String,

    /// Counter name, unique within its Workspace.
    pub name: String,

    /// Display format with exactly one `{}` placeholder.
    pub format: String,

    /// Current value of the numeric component.
    pub current: i64,

    /// Amount added on every step (always positive).
    pub increment: i64,

    /// Unix timestamp when created.
    pub created: i64,
}

impl Counter {
    /// Substitute `value` into this Counter's format.
    pub fn render(&self, value: i64) -> String {
        self.format.replacen(PLACEHOLDER, &value.to_string(), 1)
    }

    /// The current value rendered through the format.
    pub fn current_value(&self) -> String {
        self.render(self.current)
    }
}
