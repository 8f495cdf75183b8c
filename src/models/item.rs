use serde::{Deserialize, Serialize};

/// One named stock entry inside a leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub name: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ItemRecord {
    pub fn new(name: impl Into<String>, count: u64) -> Self {
        Self {
            name: name.into(),
            count,
            note: None,
        }
    }

    /// Applies a signed delta, clamping at zero. Returns the new count.
    pub fn apply_delta(&mut self, delta: i64) -> u64 {
        self.count = if delta >= 0 {
            self.count.saturating_add(delta.unsigned_abs())
        } else {
            self.count.saturating_sub(delta.unsigned_abs())
        };
        self.count
    }
}
