use crate::{
    commands::{Command, CommandContext},
    errors::ServiceError,
    events::Event,
    models::Workspace,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Removes every item with this exact name from every leaf and records one
/// aggregate log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteItemCommand {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedItem {
    pub name: String,
    pub removed_total: u64,
    /// Records removed.
    pub leaves: usize,
    pub log_id: String,
}

impl Command for DeleteItemCommand {
    type Result = DeletedItem;

    #[instrument(skip(self, workspace, ctx), fields(name = %self.name))]
    fn execute(
        &self,
        workspace: &mut Workspace,
        ctx: &mut CommandContext,
    ) -> Result<Self::Result, ServiceError> {
        let name = self.name.trim();
        let mut removed_total = 0u64;
        let mut leaves = 0usize;
        workspace.mirror.for_each_leaf_mut(|_, items| {
            items.retain(|item| {
                if item.name == name {
                    removed_total = removed_total.saturating_add(item.count);
                    leaves += 1;
                    false
                } else {
                    true
                }
            });
        });
        if leaves == 0 {
            return Err(ServiceError::NotFound(format!("No item named {}", name)));
        }

        let write = workspace
            .logs
            .record_deletion(name, removed_total, &ctx.operator, ctx.now);
        let log_id = write.id().to_string();

        ctx.inventory_changed();
        ctx.log_write(write);
        ctx.emit(Event::ItemDeleted {
            item: name.to_string(),
            removed_total,
            leaves,
        });
        info!(removed_total, leaves, "item deleted from every location");

        Ok(DeletedItem {
            name: name.to_string(),
            removed_total,
            leaves,
            log_id,
        })
    }
}
