use crate::{
    commands::{Command, CommandContext},
    errors::ServiceError,
    events::Event,
    models::Workspace,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteLogEntryCommand {
    pub id: String,
}

impl Command for DeleteLogEntryCommand {
    type Result = ();

    #[instrument(skip(self, workspace, ctx), fields(id = %self.id))]
    fn execute(
        &self,
        workspace: &mut Workspace,
        ctx: &mut CommandContext,
    ) -> Result<Self::Result, ServiceError> {
        let write = workspace.logs.delete_entry(&self.id)?;
        ctx.log_write(write);
        ctx.emit(Event::LogEntryDeleted {
            id: self.id.clone(),
        });
        info!("log entry deleted");
        Ok(())
    }
}
