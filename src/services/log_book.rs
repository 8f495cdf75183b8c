//! Audit log of quantity changes with time-windowed coalescing.
//!
//! Repeated same-direction changes to the same item at the same leaf inside
//! the merge window fold into one entry whose timestamp slides forward on
//! every merge. Opposite directions never merge.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::models::log_entry::{display_time, merge_key};
use crate::models::{Direction, LeafAddress, LogEntry, Operator};
use crate::schema::{ALL_LOCATIONS, DELETION_CATEGORY};

/// A single-record change to push upstream at `logs/<id>`.
#[derive(Debug, Clone, PartialEq)]
pub enum LogWrite {
    Upsert(LogEntry),
    Remove(String),
}

impl LogWrite {
    pub fn id(&self) -> &str {
        match self {
            LogWrite::Upsert(entry) => &entry.id,
            LogWrite::Remove(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Created,
    Merged,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogFilter {
    pub date: Option<NaiveDate>,
    pub location: Option<String>,
    /// Case-insensitive substring of the item name.
    pub item: Option<String>,
}

impl LogFilter {
    fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(date) = self.date {
            if entry.ts.date_naive() != date {
                return false;
            }
        }
        if let Some(location) = self.location.as_deref().filter(|l| !l.is_empty()) {
            if entry.location != location {
                return false;
            }
        }
        if let Some(keyword) = self.item.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            if !entry.item.to_lowercase().contains(&keyword.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// Log entries, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogBook {
    entries: Vec<LogEntry>,
}

impl LogBook {
    pub fn from_entries(mut entries: Vec<LogEntry>) -> Self {
        entries.sort_by(|a, b| b.ts.cmp(&a.ts));
        Self { entries }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&LogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Records a quantity change, folding it into a live entry with the same
    /// merge key when one was touched less than `window` ago.
    pub fn append(
        &mut self,
        addr: &LeafAddress,
        item: &str,
        delta: i64,
        operator: &Operator,
        now: DateTime<Utc>,
        window: Duration,
    ) -> (AppendOutcome, LogWrite) {
        let key = merge_key(
            &addr.location,
            &addr.category,
            &addr.flat_subcategory(),
            item,
            Direction::of(delta),
        );

        if let Some(pos) = self
            .entries
            .iter()
            .position(|e| e.merge_key == key && now - e.ts < window)
        {
            let mut entry = self.entries.remove(pos);
            entry.change = entry.change.saturating_add(delta);
            entry.ts = now;
            entry.time = display_time(now);
            entry.operator_id = Some(operator.id.clone());
            entry.operator_name = Some(operator.name.clone());
            debug!(id = %entry.id, change = entry.change, "merged log entry");
            self.entries.insert(0, entry.clone());
            return (AppendOutcome::Merged, LogWrite::Upsert(entry));
        }

        let entry = LogEntry::quantity_change(addr, item, delta, operator, now);
        debug!(id = %entry.id, key = %entry.merge_key, "created log entry");
        self.entries.insert(0, entry.clone());
        (AppendOutcome::Created, LogWrite::Upsert(entry))
    }

    /// Appends the aggregate entry for an item deleted from every location.
    pub fn record_deletion(
        &mut self,
        item: &str,
        removed_total: u64,
        operator: &Operator,
        now: DateTime<Utc>,
    ) -> LogWrite {
        let change = i64::try_from(removed_total).map(|n| -n).unwrap_or(i64::MIN);
        let entry = LogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            ts: now,
            time: display_time(now),
            location: ALL_LOCATIONS.to_string(),
            category: DELETION_CATEGORY.to_string(),
            subcategory: String::new(),
            item: item.to_string(),
            change,
            reason: format!("Deleted from all locations (total {})", removed_total),
            operator_id: Some(operator.id.clone()),
            operator_name: Some(operator.name.clone()),
            merge_key: merge_key(ALL_LOCATIONS, DELETION_CATEGORY, "", item, Direction::Out),
        };
        self.entries.insert(0, entry.clone());
        LogWrite::Upsert(entry)
    }

    pub fn edit_memo(&mut self, id: &str, reason: &str) -> Result<LogWrite, ServiceError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("Log entry {} not found", id)))?;
        entry.reason = reason.trim().to_string();
        Ok(LogWrite::Upsert(entry.clone()))
    }

    pub fn delete_entry(&mut self, id: &str) -> Result<LogWrite, ServiceError> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("Log entry {} not found", id)))?;
        self.entries.remove(pos);
        Ok(LogWrite::Remove(id.to_string()))
    }

    pub fn filter(&self, filter: &LogFilter) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| filter.matches(e)).collect()
    }

    /// Wire form: an object keyed by entry id.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let mut map = Map::new();
        for entry in &self.entries {
            map.insert(entry.id.clone(), serde_json::to_value(entry)?);
        }
        Ok(Value::Object(map))
    }

    /// Reads a remote log value, either an id-keyed object or an array.
    ///
    /// Null records are dropped. Records that do not parse are skipped and
    /// their keys returned alongside the book.
    pub fn from_value(value: Value) -> Result<(Self, Vec<String>), ServiceError> {
        let records: Vec<(String, Value)> = match value {
            Value::Null => Vec::new(),
            Value::Object(map) => map.into_iter().collect(),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            other => {
                return Err(ServiceError::MalformedRemoteData(format!(
                    "log resource is not a collection: {}",
                    type_name(&other)
                )))
            }
        };

        let mut entries = Vec::with_capacity(records.len());
        let mut skipped = Vec::new();
        for (id, record) in records {
            if record.is_null() {
                continue;
            }
            match serde_json::from_value::<LogEntry>(record) {
                Ok(entry) => entries.push(entry.with_id(id)),
                Err(err) => {
                    warn!(id = %id, error = %err, "skipping unreadable log record");
                    skipped.push(id);
                }
            }
        }
        Ok((Self::from_entries(entries), skipped))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
    }

    fn addr() -> LeafAddress {
        LeafAddress::new("Club Room", "Drone Control", "Motor")
    }

    fn op() -> Operator {
        Operator::new("u1", "Park")
    }

    #[test]
    fn same_direction_within_window_merges() {
        let mut book = LogBook::default();
        let window = Duration::hours(1);
        book.append(&addr(), "2207", 1, &op(), t0(), window);
        let (outcome, _) = book.append(&addr(), "2207", 2, &op(), t0() + Duration::minutes(30), window);

        assert_eq!(outcome, AppendOutcome::Merged);
        assert_eq!(book.len(), 1);
        assert_eq!(book.entries()[0].change, 3);
        assert_eq!(book.entries()[0].ts, t0() + Duration::minutes(30));
    }

    #[test]
    fn window_slides_forward_on_merge() {
        let mut book = LogBook::default();
        let window = Duration::hours(1);
        book.append(&addr(), "2207", 1, &op(), t0(), window);
        book.append(&addr(), "2207", 1, &op(), t0() + Duration::minutes(50), window);
        book.append(&addr(), "2207", 1, &op(), t0() + Duration::minutes(100), window);

        assert_eq!(book.len(), 1);
        assert_eq!(book.entries()[0].change, 3);
    }

    #[test]
    fn boundary_starts_new_entry() {
        let mut book = LogBook::default();
        let window = Duration::hours(1);
        book.append(&addr(), "2207", 1, &op(), t0(), window);
        let (outcome, _) = book.append(&addr(), "2207", 1, &op(), t0() + window, window);

        assert_eq!(outcome, AppendOutcome::Created);
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn opposite_direction_does_not_merge() {
        let mut book = LogBook::default();
        let window = Duration::hours(1);
        book.append(&addr(), "2207", 2, &op(), t0(), window);
        book.append(&addr(), "2207", -1, &op(), t0() + Duration::minutes(1), window);

        assert_eq!(book.len(), 2);
        assert_eq!(book.entries()[0].change, -1);
        assert_eq!(book.entries()[1].change, 2);
    }

    #[test]
    fn merge_takes_latest_operator() {
        let mut book = LogBook::default();
        let window = Duration::hours(1);
        book.append(&addr(), "2207", 1, &op(), t0(), window);
        book.append(&addr(), "2207", 1, &Operator::new("u2", "Choi"), t0() + Duration::minutes(5), window);

        assert_eq!(book.entries()[0].operator_name.as_deref(), Some("Choi"));
    }

    #[test]
    fn deletion_entry_uses_sentinel_location() {
        let mut book = LogBook::default();
        let write = book.record_deletion("Old charger", 4, &op(), t0());

        let entry = &book.entries()[0];
        assert_eq!(entry.location, ALL_LOCATIONS);
        assert_eq!(entry.category, DELETION_CATEGORY);
        assert_eq!(entry.change, -4);
        assert_eq!(write.id(), entry.id);
    }

    #[test]
    fn memo_and_delete_by_id() {
        let mut book = LogBook::default();
        let (_, write) = book.append(&addr(), "2207", 1, &op(), t0(), Duration::hours(1));
        let id = write.id().to_string();

        book.edit_memo(&id, " restock ").unwrap();
        assert_eq!(book.get(&id).unwrap().reason, "restock");

        assert_matches!(book.delete_entry(&id), Ok(LogWrite::Remove(removed)) if removed == id);
        assert!(book.is_empty());
        assert_matches!(book.edit_memo(&id, "x"), Err(ServiceError::NotFound(_)));
    }

    #[test]
    fn filter_by_date_location_and_keyword() {
        let mut book = LogBook::default();
        let window = Duration::hours(1);
        book.append(&addr(), "2207 Motor", 1, &op(), t0(), window);
        book.append(&addr().at_location("Airfield"), "2207 Motor", 1, &op(), t0(), window);
        book.append(&addr(), "Prop", 1, &op(), t0() + Duration::days(1), window);

        let filter = LogFilter {
            date: Some(t0().date_naive()),
            location: Some("Club Room".into()),
            item: Some("motor".into()),
        };
        let hits = book.filter(&filter);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].location, "Club Room");
    }

    #[test]
    fn reads_array_and_object_forms() {
        let record = json!({
            "ts": "2024-06-01T10:00:00Z",
            "location": "Club Room",
            "category": "Tools",
            "subcategory": "Repair",
            "item": "Pliers",
            "change": 1,
            "key": "Club Room|Tools|Repair|Pliers|IN"
        });

        let (from_array, skipped) = LogBook::from_value(json!([null, record.clone(), 7])).unwrap();
        assert_eq!(from_array.len(), 1);
        assert_eq!(from_array.entries()[0].id, "1");
        assert_eq!(skipped, vec!["2".to_string()]);

        let (from_map, _) = LogBook::from_value(json!({ "abc": record })).unwrap();
        assert_eq!(from_map.entries()[0].id, "abc");

        assert_matches!(
            LogBook::from_value(json!("oops")),
            Err(ServiceError::MalformedRemoteData(_))
        );
    }

    #[test]
    fn wire_round_trip_keeps_ids() {
        let mut book = LogBook::default();
        book.append(&addr(), "2207", 1, &op(), t0(), Duration::hours(1));
        let (back, skipped) = LogBook::from_value(book.to_value().unwrap()).unwrap();
        assert!(skipped.is_empty());
        assert_eq!(back, book);
    }
}
