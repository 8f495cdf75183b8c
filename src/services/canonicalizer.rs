//! Maps free-text location and category names onto schema keys.
//!
//! Matching is exact after [`strip_key`] normalization, then falls back to a
//! short table of known variants. Anything else comes back unchanged so that
//! path validation rejects it.

use crate::schema::{CategorySchema, SCHEMA};

/// Schema level a raw name is resolved against.
#[derive(Debug, Clone, Copy)]
pub enum SchemaLevel<'a> {
    Location,
    Category,
    Subcategory { category: &'a str },
    Subcategory2 { category: &'a str, subcategory: &'a str },
}

const LOCATION_VARIANTS: &[(&str, &str)] = &[("facultyroom", "Faculty Office")];

const CATEGORY_VARIANTS: &[(&str, &str)] = &[
    ("dronecontrols", "Drone Control"),
    ("controllercount", "Transmitter Count"),
    ("dronecount", "Airframe Count"),
];

const SUBCATEGORY_VARIANTS: &[(&str, &str)] =
    &[("propellors", "Propellers"), ("propelers", "Propellers")];

const NO_VARIANTS: &[(&str, &str)] = &[];

/// Lower-cases and drops whitespace, `&` and `/`.
pub fn strip_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '&' && *c != '/')
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct Canonicalizer {
    schema: &'static CategorySchema,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self { schema: &SCHEMA }
    }
}

impl Canonicalizer {
    pub fn new(schema: &'static CategorySchema) -> Self {
        Self { schema }
    }

    pub fn canonicalize(&self, raw: &str, level: SchemaLevel<'_>) -> String {
        let raw = raw.trim();
        let (keys, variants): (Vec<&'static str>, &[(&str, &str)]) = match level {
            SchemaLevel::Location => (self.schema.locations.to_vec(), LOCATION_VARIANTS),
            SchemaLevel::Category => (self.schema.category_names(), CATEGORY_VARIANTS),
            SchemaLevel::Subcategory { category } => (
                self.schema
                    .category(category)
                    .map(|shape| shape.subcategories())
                    .unwrap_or_default(),
                SUBCATEGORY_VARIANTS,
            ),
            SchemaLevel::Subcategory2 {
                category,
                subcategory,
            } => (
                self.schema
                    .subcategory2_names(category, subcategory)
                    .map(<[_]>::to_vec)
                    .unwrap_or_default(),
                NO_VARIANTS,
            ),
        };
        match_key(raw, &keys, variants)
    }

    pub fn location(&self, raw: &str) -> String {
        self.canonicalize(raw, SchemaLevel::Location)
    }

    pub fn category(&self, raw: &str) -> String {
        self.canonicalize(raw, SchemaLevel::Category)
    }

    pub fn subcategory(&self, category: &str, raw: &str) -> String {
        self.canonicalize(raw, SchemaLevel::Subcategory { category })
    }

    pub fn subcategory2(&self, category: &str, subcategory: &str, raw: &str) -> String {
        self.canonicalize(
            raw,
            SchemaLevel::Subcategory2 {
                category,
                subcategory,
            },
        )
    }
}

fn match_key(raw: &str, keys: &[&'static str], variants: &[(&str, &str)]) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let needle = strip_key(raw);
    if let Some(key) = keys.iter().find(|k| strip_key(k) == needle) {
        return (*key).to_string();
    }
    variants
        .iter()
        .find(|(variant, target)| *variant == needle && keys.iter().any(|k| k == target))
        .map(|(_, target)| (*target).to_string())
        .unwrap_or_else(|| raw.to_string())
}
