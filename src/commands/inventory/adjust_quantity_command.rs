use crate::{
    commands::{Command, CommandContext},
    errors::ServiceError,
    events::Event,
    metrics::{LOG_ENTRIES, QUANTITY_CHANGES},
    models::{Direction, LeafAddress, Workspace},
    services::log_book::AppendOutcome,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Adds `delta` (possibly negative) to the item at `index` of a leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustQuantityCommand {
    pub address: LeafAddress,
    pub index: usize,
    pub delta: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityChange {
    pub item: String,
    pub previous: u64,
    pub current: u64,
    pub log_id: String,
    /// Folded into an existing log entry instead of creating one.
    pub merged: bool,
}

impl Command for AdjustQuantityCommand {
    /// `None` when there was nothing to change.
    type Result = Option<QuantityChange>;

    #[instrument(skip(self, workspace, ctx), fields(address = %self.address, index = self.index, delta = self.delta))]
    fn execute(
        &self,
        workspace: &mut Workspace,
        ctx: &mut CommandContext,
    ) -> Result<Self::Result, ServiceError> {
        if self.delta == 0 {
            debug!("zero delta");
            return Ok(None);
        }
        let Some(item) = workspace.mirror.item_mut(&self.address, self.index) else {
            debug!("no item at index");
            return Ok(None);
        };

        let previous = item.count;
        let current = item.apply_delta(self.delta);
        let name = item.name.clone();

        let (outcome, write) = workspace.logs.append(
            &self.address,
            &name,
            self.delta,
            &ctx.operator,
            ctx.now,
            ctx.merge_window,
        );
        let merged = outcome == AppendOutcome::Merged;
        let log_id = write.id().to_string();

        QUANTITY_CHANGES
            .with_label_values(&[Direction::of(self.delta).as_str()])
            .inc();
        LOG_ENTRIES
            .with_label_values(&[if merged { "merged" } else { "created" }])
            .inc();

        ctx.inventory_changed();
        ctx.log_write(write);
        ctx.emit(Event::QuantityChanged {
            address: self.address.clone(),
            item: name.clone(),
            previous,
            current,
            log_id: log_id.clone(),
            merged,
        });

        info!(item = %name, previous, current, merged, "quantity adjusted");
        Ok(Some(QuantityChange {
            item: name,
            previous,
            current,
            log_id,
            merged,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemRecord, Operator};
    use chrono::{Duration, TimeZone, Utc};

    fn setup() -> (Workspace, LeafAddress) {
        let mut workspace = Workspace::empty();
        let address = LeafAddress::new("Club Room", "Tools", "Repair");
        workspace
            .mirror
            .ensure_items(&address)
            .push(ItemRecord::new("Pliers", 1));
        (workspace, address)
    }

    fn ctx() -> CommandContext {
        CommandContext::new(
            Operator::new("u1", "Kim"),
            Utc.with_ymd_and_hms(2024, 4, 2, 10, 0, 0).unwrap(),
            Duration::hours(1),
        )
    }

    #[test]
    fn decrement_clamps_and_logs_requested_delta() {
        let (mut workspace, address) = setup();
        let mut ctx = ctx();
        let change = AdjustQuantityCommand { address: address.clone(), index: 0, delta: -4 }
            .execute(&mut workspace, &mut ctx)
            .unwrap()
            .unwrap();

        assert_eq!(change.previous, 1);
        assert_eq!(change.current, 0);
        assert!(!change.merged);
        assert_eq!(workspace.logs.entries()[0].change, -4);

        let (changes, events) = ctx.into_parts();
        assert!(changes.inventory);
        assert_eq!(changes.log_writes.len(), 1);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn zero_delta_or_missing_item_is_a_no_op() {
        let (mut workspace, address) = setup();
        let mut ctx = ctx();
        let zero = AdjustQuantityCommand { address: address.clone(), index: 0, delta: 0 };
        let missing = AdjustQuantityCommand { address, index: 7, delta: 1 };

        assert_eq!(zero.execute(&mut workspace, &mut ctx).unwrap(), None);
        assert_eq!(missing.execute(&mut workspace, &mut ctx).unwrap(), None);
        assert!(workspace.logs.is_empty());
        assert!(ctx.changes().is_empty());
    }
}
