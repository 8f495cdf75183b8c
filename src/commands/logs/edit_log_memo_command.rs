use crate::{
    commands::{Command, CommandContext},
    errors::ServiceError,
    events::Event,
    models::Workspace,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

/// Replaces the free-text reason of one log entry.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EditLogMemoCommand {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(length(max = 500))]
    pub reason: String,
}

impl Command for EditLogMemoCommand {
    type Result = ();

    #[instrument(skip(self, workspace, ctx), fields(id = %self.id))]
    fn execute(
        &self,
        workspace: &mut Workspace,
        ctx: &mut CommandContext,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        let write = workspace.logs.edit_memo(&self.id, &self.reason)?;
        ctx.log_write(write);
        ctx.emit(Event::LogMemoEdited {
            id: self.id.clone(),
        });
        info!("log memo edited");
        Ok(())
    }
}
