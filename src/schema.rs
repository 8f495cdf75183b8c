//! Static category schema for the club equipment inventory.
//!
//! Every leaf of the inventory tree lives at
//! `location / category / subcategory [/ subcategory2]`. The schema fixes
//! which of those paths exist; nothing outside of it is ever created.

use crate::models::LeafAddress;

/// The "all locations" sentinel used by deletion log entries.
pub const ALL_LOCATIONS: &str = "All Locations";

/// Category recorded on deletion log entries.
pub const DELETION_CATEGORY: &str = "Deleted";

/// Shape of a single subcategory inside a grouped category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubcategoryShape {
    /// The subcategory itself holds the item list.
    Leaf,
    /// The subcategory is split once more; each named child holds an item list.
    Nested(&'static [&'static str]),
}

/// Shape of a top-level category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryShape {
    /// Every subcategory is a leaf.
    Flat(&'static [&'static str]),
    /// Subcategories may be leaves or nested groups.
    Grouped(&'static [(&'static str, SubcategoryShape)]),
}

impl CategoryShape {
    pub fn subcategories(&self) -> Vec<&'static str> {
        match self {
            CategoryShape::Flat(subs) => subs.to_vec(),
            CategoryShape::Grouped(subs) => subs.iter().map(|(name, _)| *name).collect(),
        }
    }

    pub fn subcategory(&self, name: &str) -> Option<SubcategoryShape> {
        match self {
            CategoryShape::Flat(subs) => subs
                .iter()
                .any(|s| *s == name)
                .then_some(SubcategoryShape::Leaf),
            CategoryShape::Grouped(subs) => subs
                .iter()
                .find(|(s, _)| *s == name)
                .map(|(_, shape)| *shape),
        }
    }
}

#[derive(Debug)]
pub struct CategorySchema {
    pub locations: &'static [&'static str],
    pub categories: &'static [(&'static str, CategoryShape)],
}

pub static SCHEMA: CategorySchema = CategorySchema {
    locations: &["Club Room", "Airfield", "Faculty Office"],
    categories: &[
        (
            "Tools",
            CategoryShape::Flat(&["Repair", "Soldering Supplies", "Screwdrivers", "Other Tools"]),
        ),
        (
            "Consumables",
            CategoryShape::Grouped(&[
                (
                    "Pentagon Guards",
                    SubcategoryShape::Nested(&["New", "Used", "Other"]),
                ),
                (
                    "Cable Ties",
                    SubcategoryShape::Nested(&["100pcs", "1000pcs", "1000pcs_used"]),
                ),
                ("Propellers", SubcategoryShape::Nested(&["New", "Used"])),
                (
                    "Batteries",
                    SubcategoryShape::Nested(&["Airframe", "Charger", "Transmitter", "Other"]),
                ),
                (
                    "LED",
                    SubcategoryShape::Nested(&["Rear", "Top", "Position", "Round"]),
                ),
                (
                    "Tape",
                    SubcategoryShape::Nested(&[
                        "Filament",
                        "Double-sided",
                        "Paper & Masking",
                        "Insulating",
                        "Other Tape",
                    ]),
                ),
                ("Carbon Frames", SubcategoryShape::Leaf),
                ("XT Connectors", SubcategoryShape::Leaf),
                ("Bolts & Nuts", SubcategoryShape::Leaf),
                ("Soldering Materials", SubcategoryShape::Leaf),
                ("Velcro", SubcategoryShape::Leaf),
                ("Other Consumables", SubcategoryShape::Leaf),
            ]),
        ),
        (
            "Drone Control",
            CategoryShape::Flat(&[
                "FC",
                "FC-ESC Cable",
                "ESC",
                "Motor",
                "Receiver",
                "Capacitor",
                "Control Set",
            ]),
        ),
        (
            "Transmitter Count",
            CategoryShape::Flat(&["Club", "Personal"]),
        ),
        ("Airframe Count", CategoryShape::Flat(&["Club", "Personal"])),
    ],
};

impl CategorySchema {
    pub fn has_location(&self, name: &str) -> bool {
        self.locations.iter().any(|l| *l == name)
    }

    pub fn category(&self, name: &str) -> Option<&CategoryShape> {
        self.categories
            .iter()
            .find(|(c, _)| *c == name)
            .map(|(_, shape)| shape)
    }

    pub fn category_names(&self) -> Vec<&'static str> {
        self.categories.iter().map(|(c, _)| *c).collect()
    }

    /// Children of a nested subcategory, `None` when the subcategory is a
    /// leaf or does not exist.
    pub fn subcategory2_names(&self, category: &str, subcategory: &str) -> Option<&'static [&'static str]> {
        match self.category(category)?.subcategory(subcategory)? {
            SubcategoryShape::Nested(children) => Some(children),
            SubcategoryShape::Leaf => None,
        }
    }

    /// Whether `category / subcategory [/ subcategory2]` names a schema leaf.
    ///
    /// Three-level paths must name a child of the nested subcategory; two-level
    /// paths must not carry a subcategory2.
    pub fn is_valid_path(&self, category: &str, subcategory: &str, subcategory2: Option<&str>) -> bool {
        let Some(shape) = self.category(category) else {
            return false;
        };
        let sub2 = subcategory2.filter(|s| !s.is_empty());
        match (shape.subcategory(subcategory), sub2) {
            (Some(SubcategoryShape::Leaf), None) => true,
            (Some(SubcategoryShape::Nested(children)), Some(child)) => children.contains(&child),
            _ => false,
        }
    }

    /// All leaf paths of the schema at one location, in schema order.
    pub fn leaves_at(&self, location: &str) -> Vec<LeafAddress> {
        let mut leaves = Vec::new();
        for (category, shape) in self.categories {
            match shape {
                CategoryShape::Flat(subs) => {
                    for sub in subs.iter() {
                        leaves.push(LeafAddress::new(location, *category, *sub));
                    }
                }
                CategoryShape::Grouped(subs) => {
                    for (sub, sub_shape) in subs.iter() {
                        match sub_shape {
                            SubcategoryShape::Leaf => {
                                leaves.push(LeafAddress::new(location, *category, *sub))
                            }
                            SubcategoryShape::Nested(children) => {
                                for child in children.iter() {
                                    leaves.push(
                                        LeafAddress::new(location, *category, *sub).with_subcategory2(*child),
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }
        leaves
    }

    /// Every leaf path of the schema across every location.
    pub fn all_leaves(&self) -> Vec<LeafAddress> {
        self.locations
            .iter()
            .flat_map(|loc| self.leaves_at(loc))
            .collect()
    }
}
