//! Domain data types shared by the store, the log engine and the sync engine.

pub mod address;
pub mod item;
pub mod log_entry;
pub mod mirror;

pub use address::LeafAddress;
pub use item::ItemRecord;
pub use log_entry::{Direction, LogEntry, Operator, STOCK_REASON};
pub use mirror::{InventoryMirror, SubcategoryNode};

use crate::services::log_book::LogBook;

/// Everything one client owns locally: the inventory mirror and the log book.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub mirror: InventoryMirror,
    pub logs: LogBook,
}

impl Workspace {
    pub fn new(mirror: InventoryMirror, logs: LogBook) -> Self {
        Self { mirror, logs }
    }

    /// Schema-shaped empty mirror with no log history.
    pub fn empty() -> Self {
        Self::new(InventoryMirror::from_schema(), LogBook::default())
    }
}
