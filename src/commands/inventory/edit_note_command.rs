use crate::{
    commands::{Command, CommandContext},
    errors::ServiceError,
    events::Event,
    models::{LeafAddress, Workspace},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Sets the free-text note of one item. A blank note clears it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditNoteCommand {
    pub address: LeafAddress,
    pub index: usize,
    pub note: String,
}

impl Command for EditNoteCommand {
    /// Whether the note actually changed.
    type Result = bool;

    #[instrument(skip(self, workspace, ctx), fields(address = %self.address, index = self.index))]
    fn execute(
        &self,
        workspace: &mut Workspace,
        ctx: &mut CommandContext,
    ) -> Result<Self::Result, ServiceError> {
        let item = workspace
            .mirror
            .item_mut(&self.address, self.index)
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No item at position {} of {}",
                    self.index, self.address
                ))
            })?;
        let note = Some(self.note.trim().to_string()).filter(|n| !n.is_empty());
        if item.note == note {
            return Ok(false);
        }
        item.note = note;
        let name = item.name.clone();

        ctx.inventory_changed();
        ctx.emit(Event::NoteEdited {
            address: self.address.clone(),
            item: name,
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemRecord, Operator};
    use chrono::{Duration, Utc};

    #[test]
    fn note_stays_on_one_location() {
        let mut workspace = Workspace::empty();
        let here = LeafAddress::new("Club Room", "Tools", "Repair");
        let there = here.at_location("Airfield");
        workspace.mirror.ensure_items(&here).push(ItemRecord::new("Pliers", 1));
        workspace.mirror.ensure_items(&there).push(ItemRecord::new("Pliers", 1));
        let mut ctx = CommandContext::new(Operator::default(), Utc::now(), Duration::hours(1));

        let command = EditNoteCommand { address: here.clone(), index: 0, note: " red box ".into() };
        assert!(command.execute(&mut workspace, &mut ctx).unwrap());
        assert!(!command.execute(&mut workspace, &mut ctx).unwrap());

        assert_eq!(workspace.mirror.items(&here)[0].note.as_deref(), Some("red box"));
        assert_eq!(workspace.mirror.items(&there)[0].note, None);

        let clear = EditNoteCommand { address: here.clone(), index: 0, note: "  ".into() };
        assert!(clear.execute(&mut workspace, &mut ctx).unwrap());
        assert_eq!(workspace.mirror.items(&here)[0].note, None);
    }
}
