pub mod canonicalizer;
pub mod export;
pub mod import;
pub mod inventory;
pub mod inventory_sync;
pub mod log_book;
pub mod search;
