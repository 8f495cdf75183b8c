use crate::{
    commands::{Command, CommandContext},
    errors::ServiceError,
    events::Event,
    models::Workspace,
    services::import::{reconcile, ImportMode, ImportRow, ImportSummary},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Bulk import of tabular rows. Never writes log entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRowsCommand {
    pub rows: Vec<ImportRow>,
    #[serde(default)]
    pub mode: ImportMode,
}

impl Command for ImportRowsCommand {
    type Result = ImportSummary;

    #[instrument(skip(self, workspace, ctx), fields(rows = self.rows.len(), mode = ?self.mode))]
    fn execute(
        &self,
        workspace: &mut Workspace,
        ctx: &mut CommandContext,
    ) -> Result<Self::Result, ServiceError> {
        let (mirror, summary) = reconcile(&workspace.mirror, &self.rows, self.mode, &ctx.canonicalizer);
        let reset = self.mode == ImportMode::Reset;
        if summary.applied > 0 || reset {
            workspace.mirror = mirror;
            ctx.inventory_changed();
        }
        ctx.emit(Event::ImportCompleted {
            summary: summary.clone(),
            reset,
        });
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeafAddress, Operator};
    use chrono::{Duration, Utc};
    use serde_json::json;

    #[test]
    fn import_changes_mirror_without_logging() {
        let mut workspace = Workspace::empty();
        let rows = vec![
            json!({"Location": "Club Room", "Category": "Tools", "Subcategory": "Repair", "Item": "Pliers", "Qty": 3}),
            json!({"Location": "Moon", "Category": "Tools", "Subcategory": "Repair", "Item": "Pliers", "Qty": 3}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();
        let mut ctx = CommandContext::new(Operator::default(), Utc::now(), Duration::hours(1));

        let summary = ImportRowsCommand { rows, mode: ImportMode::Merge }
            .execute(&mut workspace, &mut ctx)
            .unwrap();

        assert_eq!(summary.applied, 1);
        assert_eq!(summary.rejected, 1);
        assert!(workspace.logs.is_empty());
        let repair = LeafAddress::new("Club Room", "Tools", "Repair");
        assert_eq!(workspace.mirror.items(&repair)[0].count, 3);
        let (changes, _) = ctx.into_parts();
        assert!(changes.inventory);
        assert!(changes.log_writes.is_empty());
    }
}
