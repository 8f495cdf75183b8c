//! Bulk import of loosely typed tabular rows into the mirror.
//!
//! Rows never produce log entries. Each row is canonicalized, validated
//! against the schema and then summed into the target leaf.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, info};

use crate::metrics::IMPORT_ROWS;
use crate::models::{InventoryMirror, ItemRecord, LeafAddress};
use crate::schema::SCHEMA;
use crate::services::canonicalizer::Canonicalizer;

/// One row as read by the tabular codec: header → cell.
pub type ImportRow = Map<String, Value>;

/// How many rejected rows are kept for feedback.
pub const MAX_REJECTED_SAMPLES: usize = 5;

const LOCATION_HEADERS: &[&str] = &["location", "place", "site", "loc"];
const CATEGORY_HEADERS: &[&str] = &["category", "main category", "top category", "group"];
const SUBCATEGORY_HEADERS: &[&str] = &["subcategory", "sub category", "sub-category", "type"];
const SUBCATEGORY2_HEADERS: &[&str] = &[
    "subsubcategory",
    "sub-subcategory",
    "sub subcategory",
    "sub2",
    "detail",
];
const NAME_HEADERS: &[&str] = &["item", "item name", "name", "product"];
const NOTE_HEADERS: &[&str] = &["note", "notes", "memo", "remarks", "description"];
const QUANTITY_HEADERS: &[&str] = &["quantity", "qty", "count", "amount", "total quantity"];

const EMPTY_TOKENS: &[&str] = &["nan", "n/a", "na", "-", "none", "null"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Sum into the current mirror.
    #[default]
    Merge,
    /// Start from an empty schema-shaped mirror.
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    UnknownLocation,
    InvalidQuantity,
    EmptyName,
    InvalidPath,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::UnknownLocation => "unknown location",
            RejectReason::InvalidQuantity => "quantity must be a positive whole number",
            RejectReason::EmptyName => "item name is empty",
            RejectReason::InvalidPath => "category path does not exist",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    /// Zero-based row index in the input.
    pub row: usize,
    pub reason: RejectReason,
    /// `category>subcategory[>subcategory2]` after canonicalization.
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub applied: usize,
    pub added: usize,
    pub increased: usize,
    pub rejected: usize,
    pub rejected_samples: Vec<RejectedRow>,
}

/// A row with every logical field pulled out and trimmed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRow {
    pub location: String,
    pub category: String,
    pub subcategory: String,
    pub subcategory2: String,
    pub name: String,
    pub note: Option<String>,
    pub quantity: Option<u64>,
}

fn header_key(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn cell_text(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    };
    if EMPTY_TOKENS.contains(&text.to_lowercase().as_str()) {
        String::new()
    } else {
        text
    }
}

/// First non-empty cell under any of `synonyms`, tried in order.
fn pick(row: &ImportRow, synonyms: &[&str]) -> String {
    for synonym in synonyms {
        for (header, value) in row {
            if header_key(header) == *synonym {
                let text = cell_text(value);
                if !text.is_empty() {
                    return text;
                }
            }
        }
    }
    String::new()
}

fn parse_quantity(row: &ImportRow) -> Option<u64> {
    let raw = pick(row, QUANTITY_HEADERS).replace(',', "");
    let number: f64 = raw.parse().ok()?;
    let valid = number.is_finite() && number >= 1.0 && number.fract() == 0.0 && number <= u64::MAX as f64;
    valid.then(|| number as u64)
}

pub fn normalize_row(row: &ImportRow) -> NormalizedRow {
    let mut subcategory = pick(row, SUBCATEGORY_HEADERS);
    let mut subcategory2 = pick(row, SUBCATEGORY2_HEADERS);
    if subcategory2.is_empty() {
        if let Some((sub, sub2)) = subcategory.split_once('/') {
            let (sub, sub2) = (sub.trim().to_string(), sub2.trim().to_string());
            subcategory = sub;
            subcategory2 = sub2;
        }
    }
    let note = pick(row, NOTE_HEADERS);
    NormalizedRow {
        location: pick(row, LOCATION_HEADERS),
        category: pick(row, CATEGORY_HEADERS),
        subcategory,
        subcategory2,
        name: pick(row, NAME_HEADERS),
        note: (!note.is_empty()).then_some(note),
        quantity: parse_quantity(row),
    }
}

/// Applies `rows` on top of `mirror` (or an empty mirror in reset mode) and
/// returns the result with a summary. The input mirror is left untouched.
pub fn reconcile(
    mirror: &InventoryMirror,
    rows: &[ImportRow],
    mode: ImportMode,
    canon: &Canonicalizer,
) -> (InventoryMirror, ImportSummary) {
    let mut next = match mode {
        ImportMode::Merge => mirror.clone(),
        ImportMode::Reset => InventoryMirror::from_schema(),
    };
    let mut summary = ImportSummary::default();

    for (index, row) in rows.iter().enumerate() {
        let raw = normalize_row(row);
        let location = canon.location(&raw.location);
        let category = canon.category(&raw.category);
        let subcategory = canon.subcategory(&category, &raw.subcategory);
        let subcategory2 = if raw.subcategory2.is_empty() {
            String::new()
        } else {
            canon.subcategory2(&category, &subcategory, &raw.subcategory2)
        };

        let reason = if !SCHEMA.has_location(&location) {
            Some(RejectReason::UnknownLocation)
        } else if raw.quantity.is_none() {
            Some(RejectReason::InvalidQuantity)
        } else if raw.name.is_empty() {
            Some(RejectReason::EmptyName)
        } else if !SCHEMA.is_valid_path(&category, &subcategory, Some(subcategory2.as_str())) {
            Some(RejectReason::InvalidPath)
        } else {
            None
        };

        let quantity = match (reason, raw.quantity) {
            (None, Some(quantity)) => quantity,
            (reason, _) => {
                let reason = reason.unwrap_or(RejectReason::InvalidQuantity);
                summary.rejected += 1;
                if summary.rejected_samples.len() < MAX_REJECTED_SAMPLES {
                    let mut path = format!("{}>{}", category, subcategory);
                    if !subcategory2.is_empty() {
                        path.push('>');
                        path.push_str(&subcategory2);
                    }
                    summary.rejected_samples.push(RejectedRow { row: index, reason, path });
                }
                debug!(row = index, %reason, "import row rejected");
                continue;
            }
        };

        let leaf = LeafAddress::new(location, category, subcategory).with_subcategory2(subcategory2);
        let items = next.ensure_items(&leaf);
        match items.iter_mut().find(|item| item.name.trim() == raw.name) {
            Some(item) => {
                item.count = item.count.saturating_add(quantity);
                if raw.note.is_some() {
                    item.note = raw.note.clone();
                }
                summary.increased += 1;
            }
            None => {
                items.push(ItemRecord {
                    name: raw.name.clone(),
                    count: quantity,
                    note: raw.note.clone(),
                });
                summary.added += 1;
            }
        }
        summary.applied += 1;
    }

    IMPORT_ROWS
        .with_label_values(&["applied"])
        .inc_by(summary.applied as u64);
    IMPORT_ROWS
        .with_label_values(&["rejected"])
        .inc_by(summary.rejected as u64);
    info!(
        applied = summary.applied,
        added = summary.added,
        increased = summary.increased,
        rejected = summary.rejected,
        ?mode,
        "import reconciled"
    );
    (next, summary)
}
