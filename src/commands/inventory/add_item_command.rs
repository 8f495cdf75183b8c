use crate::{
    commands::{inventory::validate_address, Command, CommandContext},
    errors::ServiceError,
    events::Event,
    models::{ItemRecord, LeafAddress, Workspace},
    schema::SCHEMA,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use validator::{Validate, ValidationError};

/// Creates a new item under one category path in every location. Only the
/// target location starts with `initial_count`; the others start at zero.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddItemCommand {
    #[validate(length(min = 1))]
    pub location: String,
    #[validate(length(min = 1))]
    pub category: String,
    #[validate(length(min = 1))]
    pub subcategory: String,
    #[serde(default)]
    pub subcategory2: Option<String>,
    #[validate(length(min = 1, max = 120), custom = "validate_item_name")]
    pub name: String,
    #[serde(default)]
    pub initial_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedItem {
    pub address: LeafAddress,
    pub name: String,
    pub initial_count: u64,
}

fn validate_item_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("name");
        err.message = Some("Item name must not be blank".into());
        return Err(err);
    }
    Ok(())
}

impl AddItemCommand {
    /// Resolves loosely typed names to schema keys.
    fn address(&self, ctx: &CommandContext) -> LeafAddress {
        let canon = &ctx.canonicalizer;
        let location = canon.location(&self.location);
        let category = canon.category(&self.category);
        let subcategory = canon.subcategory(&category, &self.subcategory);
        let subcategory2 = self
            .subcategory2
            .as_deref()
            .map(|raw| canon.subcategory2(&category, &subcategory, raw))
            .unwrap_or_default();
        LeafAddress::new(location, category, subcategory).with_subcategory2(subcategory2)
    }
}

impl Command for AddItemCommand {
    type Result = AddedItem;

    #[instrument(skip(self, workspace, ctx), fields(name = %self.name))]
    fn execute(
        &self,
        workspace: &mut Workspace,
        ctx: &mut CommandContext,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            warn!("invalid add-item input: {}", e);
            ServiceError::from(e)
        })?;
        let address = self.address(ctx);
        validate_address(&address)?;

        let name = self.name.trim().to_string();
        if workspace.mirror.name_exists_on_path(&address, &name) {
            return Err(ServiceError::Conflict(format!(
                "{} already exists under {} > {}",
                name,
                address.category,
                address.flat_subcategory()
            )));
        }

        for location in SCHEMA.locations {
            let count = if *location == address.location {
                self.initial_count
            } else {
                0
            };
            workspace
                .mirror
                .ensure_items(&address.at_location(*location))
                .push(ItemRecord::new(name.clone(), count));
        }

        ctx.inventory_changed();
        ctx.emit(Event::ItemAdded {
            address: address.clone(),
            item: name.clone(),
            initial_count: self.initial_count,
        });
        info!(%address, initial_count = self.initial_count, "item added to every location");

        Ok(AddedItem {
            address,
            name,
            initial_count: self.initial_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Operator;
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    fn ctx() -> CommandContext {
        CommandContext::new(Operator::new("u1", "Kim"), Utc::now(), Duration::hours(1))
    }

    fn command(location: &str, name: &str) -> AddItemCommand {
        AddItemCommand {
            location: location.into(),
            category: "consumables".into(),
            subcategory: "propellors".into(),
            subcategory2: Some("new".into()),
            name: name.into(),
            initial_count: 4,
        }
    }

    #[test]
    fn creates_in_every_location() {
        let mut workspace = Workspace::empty();
        let added = command("airfield", "5inch").execute(&mut workspace, &mut ctx()).unwrap();

        assert_eq!(added.address.location, "Airfield");
        assert_eq!(added.address.flat_subcategory(), "Propellers/New");
        for location in SCHEMA.locations {
            let items = workspace.mirror.items(&added.address.at_location(*location));
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].count, if *location == "Airfield" { 4 } else { 0 });
        }
    }

    #[test]
    fn duplicate_name_on_path_is_rejected() {
        let mut workspace = Workspace::empty();
        command("Airfield", "5inch").execute(&mut workspace, &mut ctx()).unwrap();
        let before = workspace.mirror.clone();

        let again = command("Club Room", "5inch").execute(&mut workspace, &mut ctx());
        assert_matches!(again, Err(ServiceError::Conflict(_)));
        assert_eq!(workspace.mirror, before);
    }

    #[test]
    fn invalid_input_is_rejected() {
        let mut workspace = Workspace::empty();
        assert_matches!(
            command("Airfield", "  ").execute(&mut workspace, &mut ctx()),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            command("Garage", "5inch").execute(&mut workspace, &mut ctx()),
            Err(ServiceError::ValidationError(_))
        );

        let mut flat = command("Airfield", "Wrench");
        flat.category = "Tools".into();
        flat.subcategory = "Repair".into();
        assert_matches!(
            flat.execute(&mut workspace, &mut ctx()),
            Err(ServiceError::ValidationError(_))
        );
        assert_eq!(workspace.mirror.item_count(), 0);
    }
}
