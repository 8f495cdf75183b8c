use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::LeafAddress;

/// Sign of a quantity change, part of the merge key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn of(delta: i64) -> Self {
        if delta > 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who performed a change. Opaque strings supplied by the session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub name: String,
}

impl Operator {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Reason recorded on every quantity change.
pub const STOCK_REASON: &str = "Stock in/out";

/// `location|category|subcategory|item|direction`
pub fn merge_key(location: &str, category: &str, subcategory: &str, item: &str, direction: Direction) -> String {
    format!("{}|{}|{}|{}|{}", location, category, subcategory, item, direction)
}

/// Display form of a timestamp for the `time` field.
pub fn display_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// One audit record. On the wire the id is the record key, not a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(skip)]
    pub id: String,
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub time: String,
    pub location: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    pub item: String,
    pub change: i64,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_name: Option<String>,
    #[serde(default, rename = "key")]
    pub merge_key: String,
}

impl LogEntry {
    /// A fresh quantity-change entry with a newly assigned id.
    pub fn quantity_change(
        addr: &LeafAddress,
        item: &str,
        delta: i64,
        operator: &Operator,
        now: DateTime<Utc>,
    ) -> Self {
        let subcategory = addr.flat_subcategory();
        let merge_key = merge_key(
            &addr.location,
            &addr.category,
            &subcategory,
            item,
            Direction::of(delta),
        );
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ts: now,
            time: display_time(now),
            location: addr.location.clone(),
            category: addr.category.clone(),
            subcategory,
            item: item.to_string(),
            change: delta,
            reason: STOCK_REASON.to_string(),
            operator_id: Some(operator.id.clone()),
            operator_name: Some(operator.name.clone()),
            merge_key,
        }
    }

    pub fn direction(&self) -> Direction {
        Direction::of(self.change)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}
