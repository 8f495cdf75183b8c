use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a leaf in the inventory tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeafAddress {
    pub location: String,
    pub category: String,
    pub subcategory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory2: Option<String>,
}

impl LeafAddress {
    pub fn new(
        location: impl Into<String>,
        category: impl Into<String>,
        subcategory: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            category: category.into(),
            subcategory: subcategory.into(),
            subcategory2: None,
        }
    }

    pub fn with_subcategory2(mut self, subcategory2: impl Into<String>) -> Self {
        let value = subcategory2.into();
        self.subcategory2 = if value.is_empty() { None } else { Some(value) };
        self
    }

    pub fn subcategory2(&self) -> Option<&str> {
        self.subcategory2.as_deref().filter(|s| !s.is_empty())
    }

    /// `sub` or `sub/sub2`, the flattened form used in log entries and exports.
    pub fn flat_subcategory(&self) -> String {
        match self.subcategory2() {
            Some(sub2) => format!("{}/{}", self.subcategory, sub2),
            None => self.subcategory.clone(),
        }
    }

    /// The same category path at another location.
    pub fn at_location(&self, location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..self.clone()
        }
    }

    /// Whether both addresses name the same category path, ignoring location.
    pub fn same_path(&self, other: &LeafAddress) -> bool {
        self.category == other.category
            && self.subcategory == other.subcategory
            && self.subcategory2() == other.subcategory2()
    }
}

impl fmt::Display for LeafAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} > {} > {}",
            self.location, self.category, self.subcategory
        )?;
        if let Some(sub2) = self.subcategory2() {
            write!(f, " > {}", sub2)?;
        }
        Ok(())
    }
}
