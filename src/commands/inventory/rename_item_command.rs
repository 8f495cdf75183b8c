use crate::{
    commands::{Command, CommandContext},
    errors::ServiceError,
    events::Event,
    models::{LeafAddress, Workspace},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Renames the item at `index` of a leaf. The new name applies to every
/// location that carries the same category path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameItemCommand {
    pub address: LeafAddress,
    pub index: usize,
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamedItem {
    pub old_name: String,
    pub new_name: String,
    /// Records renamed across all locations.
    pub renamed: usize,
}

impl Command for RenameItemCommand {
    type Result = Option<RenamedItem>;

    #[instrument(skip(self, workspace, ctx), fields(address = %self.address, index = self.index))]
    fn execute(
        &self,
        workspace: &mut Workspace,
        ctx: &mut CommandContext,
    ) -> Result<Self::Result, ServiceError> {
        let new_name = self.new_name.trim();
        if new_name.is_empty() {
            debug!("empty new name");
            return Ok(None);
        }
        let old_name = workspace
            .mirror
            .item(&self.address, self.index)
            .map(|item| item.name.clone())
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No item at position {} of {}",
                    self.index, self.address
                ))
            })?;
        if old_name == new_name {
            return Ok(None);
        }
        if workspace.mirror.name_exists_on_path(&self.address, new_name) {
            return Err(ServiceError::Conflict(format!(
                "{} already exists under {}",
                new_name,
                self.address.flat_subcategory()
            )));
        }

        let locations: Vec<String> = workspace.mirror.locations().map(str::to_string).collect();
        let mut renamed = 0;
        for location in locations {
            if let Some(items) = workspace.mirror.items_mut(&self.address.at_location(location)) {
                for item in items.iter_mut().filter(|item| item.name == old_name) {
                    item.name = new_name.to_string();
                    renamed += 1;
                }
            }
        }

        ctx.inventory_changed();
        ctx.emit(Event::ItemRenamed {
            category: self.address.category.clone(),
            subcategory: self.address.flat_subcategory(),
            old_name: old_name.clone(),
            new_name: new_name.to_string(),
            renamed,
        });
        info!(%old_name, %new_name, renamed, "item renamed");

        Ok(Some(RenamedItem {
            old_name,
            new_name: new_name.to_string(),
            renamed,
        }))
    }
}
