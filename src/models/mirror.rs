use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use crate::models::{ItemRecord, LeafAddress};
use crate::schema::{CategorySchema, SCHEMA};

/// What sits under a subcategory key: either the item list itself or one more
/// level of named item lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubcategoryNode {
    Items(Vec<ItemRecord>),
    Nested(BTreeMap<String, Vec<ItemRecord>>),
}

impl SubcategoryNode {
    fn as_items_mut(&mut self) -> &mut Vec<ItemRecord> {
        match self {
            SubcategoryNode::Items(items) => items,
            SubcategoryNode::Nested(_) => {
                warn!("replacing nested branch with an item list");
                *self = SubcategoryNode::Items(Vec::new());
                self.as_items_mut()
            }
        }
    }

    fn as_nested_mut(&mut self) -> &mut BTreeMap<String, Vec<ItemRecord>> {
        match self {
            SubcategoryNode::Nested(children) => children,
            SubcategoryNode::Items(_) => {
                warn!("replacing item list with a nested branch");
                *self = SubcategoryNode::Nested(BTreeMap::new());
                self.as_nested_mut()
            }
        }
    }
}

type CategoryTree = BTreeMap<String, SubcategoryNode>;
type LocationTree = BTreeMap<String, CategoryTree>;

/// Local copy of the inventory tree:
/// location → category → subcategory → (items | subcategory2 → items).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryMirror {
    tree: BTreeMap<String, LocationTree>,
}

impl InventoryMirror {
    /// Mirror with every schema leaf present and empty.
    pub fn from_schema() -> Self {
        Self::from_category_schema(&SCHEMA)
    }

    pub fn from_category_schema(schema: &CategorySchema) -> Self {
        let mut mirror = Self::default();
        for leaf in schema.all_leaves() {
            mirror.ensure_items(&leaf);
        }
        mirror
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.tree.keys().map(String::as_str)
    }

    /// Items at a leaf. Untouched or mis-shaped addresses read as empty.
    pub fn items(&self, addr: &LeafAddress) -> &[ItemRecord] {
        let node = self
            .tree
            .get(&addr.location)
            .and_then(|cats| cats.get(&addr.category))
            .and_then(|subs| subs.get(&addr.subcategory));
        match (node, addr.subcategory2()) {
            (Some(SubcategoryNode::Items(items)), None) => items,
            (Some(SubcategoryNode::Nested(children)), Some(sub2)) => {
                children.get(sub2).map(Vec::as_slice).unwrap_or(&[])
            }
            _ => &[],
        }
    }

    pub fn item(&self, addr: &LeafAddress, index: usize) -> Option<&ItemRecord> {
        self.items(addr).get(index)
    }

    /// Existing item list at a leaf, without creating anything.
    pub fn items_mut(&mut self, addr: &LeafAddress) -> Option<&mut Vec<ItemRecord>> {
        let node = self
            .tree
            .get_mut(&addr.location)?
            .get_mut(&addr.category)?
            .get_mut(&addr.subcategory)?;
        match (node, addr.subcategory2()) {
            (SubcategoryNode::Items(items), None) => Some(items),
            (SubcategoryNode::Nested(children), Some(sub2)) => children.get_mut(sub2),
            _ => None,
        }
    }

    pub fn item_mut(&mut self, addr: &LeafAddress, index: usize) -> Option<&mut ItemRecord> {
        self.items_mut(addr)?.get_mut(index)
    }

    /// Live item list at a leaf, creating every missing branch on the way.
    ///
    /// A branch of the wrong shape for the address is replaced, so after this
    /// call the path always resolves to a list.
    pub fn ensure_items(&mut self, addr: &LeafAddress) -> &mut Vec<ItemRecord> {
        let subs = self
            .tree
            .entry(addr.location.clone())
            .or_default()
            .entry(addr.category.clone())
            .or_default();
        match addr.subcategory2() {
            None => subs
                .entry(addr.subcategory.clone())
                .or_insert_with(|| SubcategoryNode::Items(Vec::new()))
                .as_items_mut(),
            Some(sub2) => subs
                .entry(addr.subcategory.clone())
                .or_insert_with(|| SubcategoryNode::Nested(BTreeMap::new()))
                .as_nested_mut()
                .entry(sub2.to_string())
                .or_default(),
        }
    }

    /// Every populated leaf, in key order.
    pub fn leaves(&self) -> Vec<(LeafAddress, &[ItemRecord])> {
        let mut out = Vec::new();
        for (location, cats) in &self.tree {
            for (category, subs) in cats {
                for (sub, node) in subs {
                    let base = LeafAddress::new(location.as_str(), category.as_str(), sub.as_str());
                    match node {
                        SubcategoryNode::Items(items) => out.push((base, items.as_slice())),
                        SubcategoryNode::Nested(children) => {
                            for (sub2, items) in children {
                                out.push((base.clone().with_subcategory2(sub2.as_str()), items.as_slice()));
                            }
                        }
                    }
                }
            }
        }
        out
    }

    /// Visits every populated leaf mutably.
    pub fn for_each_leaf_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&LeafAddress, &mut Vec<ItemRecord>),
    {
        for (location, cats) in self.tree.iter_mut() {
            for (category, subs) in cats.iter_mut() {
                for (sub, node) in subs.iter_mut() {
                    let base = LeafAddress::new(location.as_str(), category.as_str(), sub.as_str());
                    match node {
                        SubcategoryNode::Items(items) => f(&base, items),
                        SubcategoryNode::Nested(children) => {
                            for (sub2, items) in children.iter_mut() {
                                f(&base.clone().with_subcategory2(sub2.as_str()), items);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Whether `name` exists at the category path of `addr` in any location.
    pub fn name_exists_on_path(&self, addr: &LeafAddress, name: &str) -> bool {
        self.tree.keys().any(|location| {
            self.items(&addr.at_location(location.as_str()))
                .iter()
                .any(|item| item.name == name)
        })
    }

    pub fn item_count(&self) -> usize {
        self.leaves().iter().map(|(_, items)| items.len()).sum()
    }
}
