use crate::{errors::ServiceError, models::LeafAddress, schema::SCHEMA};

pub mod add_item_command;
pub mod adjust_quantity_command;
pub mod delete_item_command;
pub mod edit_note_command;
pub mod import_rows_command;
pub mod rename_item_command;

pub use add_item_command::{AddItemCommand, AddedItem};
pub use adjust_quantity_command::{AdjustQuantityCommand, QuantityChange};
pub use delete_item_command::{DeleteItemCommand, DeletedItem};
pub use edit_note_command::EditNoteCommand;
pub use import_rows_command::ImportRowsCommand;
pub use rename_item_command::{RenameItemCommand, RenamedItem};

/// Rejects addresses that do not name a schema leaf.
pub(crate) fn validate_address(address: &LeafAddress) -> Result<(), ServiceError> {
    if !SCHEMA.has_location(&address.location) {
        return Err(ServiceError::ValidationError(format!(
            "Unknown location: {}",
            address.location
        )));
    }
    if !SCHEMA.is_valid_path(&address.category, &address.subcategory, address.subcategory2()) {
        return Err(ServiceError::ValidationError(format!(
            "Not a valid category path: {}",
            address
        )));
    }
    Ok(())
}
