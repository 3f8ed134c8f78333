//! Custom field definition management.

use crate::error::IssuanceResult;
use crate::store::LicenseStore;
use licensor_license::{join_options, normalize_options, validate_definition};
use licensor_types::{
    ApplicationId, CustomFieldDefinition, FieldDefinitionId, FieldKind, ProvidedValue,
};
use std::sync::Arc;
use tracing::info;

/// Creates and retires the custom field definitions of applications.
pub struct FieldManager<S> {
    store: Arc<S>,
}

impl<S: LicenseStore> FieldManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Adds a definition to an application.
    ///
    /// The name is trimmed and MultiChoice options are trimmed and
    /// de-duplicated before the definition is checked and stored.
    pub fn create_definition(
        &self,
        app_id: ApplicationId,
        name: &str,
        kind: FieldKind,
    ) -> IssuanceResult<CustomFieldDefinition> {
        let kind = match kind {
            FieldKind::MultiChoice { options, default } => FieldKind::MultiChoice {
                options: normalize_options(&join_options(&options)),
                default: default.map(|d| d.trim().to_string()),
            },
            other => other,
        };
        let candidate = CustomFieldDefinition {
            id: FieldDefinitionId::new(0),
            app_id,
            name: name.trim().to_string(),
            kind,
            active: true,
        };

        let definition = self.store.transaction(|tx| -> IssuanceResult<_> {
            tx.application(app_id)?;
            let existing = tx.field_definitions(app_id)?;
            validate_definition(&candidate, &existing)?;
            Ok(tx.insert_field_definition(app_id, &candidate.name, &candidate.kind)?)
        })?;

        info!(
            definition_id = %definition.id,
            app_id = %app_id,
            field_type = %definition.field_type(),
            "custom field defined"
        );
        Ok(definition)
    }

    /// Soft-deletes a definition. Licenses already issued keep their values.
    pub fn deactivate_definition(&self, id: FieldDefinitionId) -> IssuanceResult<()> {
        self.store.transaction(|tx| -> IssuanceResult<()> {
            Ok(tx.set_field_definition_active(id, false)?)
        })?;
        info!(definition_id = %id, "custom field deactivated");
        Ok(())
    }

    /// Active definitions of an application.
    pub fn definitions(&self, app_id: ApplicationId) -> IssuanceResult<Vec<CustomFieldDefinition>> {
        self.store.transaction(|tx| -> IssuanceResult<_> {
            tx.application(app_id)?;
            Ok(tx
                .field_definitions(app_id)?
                .into_iter()
                .filter(|d| d.active)
                .collect())
        })
    }

    /// Values a new license form starts with, one per active definition
    /// that has a default.
    pub fn default_values(&self, app_id: ApplicationId) -> IssuanceResult<Vec<ProvidedValue>> {
        Ok(self
            .definitions(app_id)?
            .iter()
            .filter_map(|d| d.default_value().map(|v| ProvidedValue::by_id(d.id, v)))
            .collect())
    }
}

