//! Custom field validation.
//!
//! Submitted values are checked against the application's active
//! definitions and then rebuilt from those definitions: the definition id,
//! name and type of every accepted value come from storage, never from the
//! caller. Only the value itself is taken from the submission.

use crate::error::{LicenseError, LicenseResult};
use chrono::NaiveDate;
use licensor_types::{
    CustomFieldDefinition, CustomFieldValue, FieldKind, FieldValue, ProvidedValue,
    SubmittedValue, DATE_FORMAT,
};
use std::collections::HashSet;

/// Separator of MultiChoice options in their stored text form.
pub const OPTION_DELIMITER: char = ';';

/// How submitted values are matched to definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchBy {
    /// By definition id; used when the caller already resolved definitions.
    Id,
    /// By field name, compared after trimming. Used by the API.
    Name,
}

/// Validates submitted values against the active definitions.
///
/// Inactive definitions in `definitions` are ignored. The number of
/// submitted values must equal the number of active definitions, and each
/// active definition must receive exactly one value. Date values must be
/// strictly after `today`.
///
/// Returns the accepted values in definition order.
///
/// # Errors
///
/// Returns [`LicenseError::Validation`] with a message naming the first
/// offending field.
pub fn validate_values(
    definitions: &[CustomFieldDefinition],
    provided: &[ProvidedValue],
    match_by: MatchBy,
    today: NaiveDate,
) -> LicenseResult<Vec<CustomFieldValue>> {
    let active: Vec<&CustomFieldDefinition> = definitions.iter().filter(|d| d.active).collect();

    if provided.len() != active.len() {
        return Err(LicenseError::Validation(format!(
            "expected {} custom field values, got {}",
            active.len(),
            provided.len()
        )));
    }

    let mut seen = HashSet::new();
    let mut accepted: Vec<Option<CustomFieldValue>> = vec![None; active.len()];

    for submitted in provided {
        let index = find_definition(&active, submitted, match_by)?;
        let definition = active[index];
        if !seen.insert(definition.id) {
            return Err(LicenseError::Validation(format!(
                "custom field \"{}\" was provided more than once",
                definition.name
            )));
        }
        let value = check_value(definition, &submitted.value, today)?;
        accepted[index] = Some(CustomFieldValue {
            definition_id: definition.id,
            name: definition.name.clone(),
            value,
        });
    }

    // Equal counts and no duplicates leave every slot filled.
    Ok(accepted.into_iter().flatten().collect())
}

fn find_definition(
    active: &[&CustomFieldDefinition],
    submitted: &ProvidedValue,
    match_by: MatchBy,
) -> LicenseResult<usize> {
    match match_by {
        MatchBy::Id => {
            let id = submitted.definition_id.ok_or_else(|| {
                LicenseError::Validation(format!(
                    "custom field \"{}\" has no definition id",
                    submitted.name
                ))
            })?;
            active
                .iter()
                .position(|d| d.id == id)
                .ok_or_else(|| LicenseError::Validation(format!("unknown custom field id {id}")))
        }
        MatchBy::Name => {
            let name = submitted.name.trim();
            active
                .iter()
                .position(|d| d.name == name)
                .ok_or_else(|| LicenseError::Validation(format!("unknown custom field \"{name}\"")))
        }
    }
}

fn check_value(
    definition: &CustomFieldDefinition,
    submitted: &SubmittedValue,
    today: NaiveDate,
) -> LicenseResult<FieldValue> {
    let name = &definition.name;
    let expected = definition.field_type();

    let value = match submitted {
        SubmittedValue::Typed(value) => {
            if value.field_type() != expected {
                return Err(LicenseError::Validation(format!(
                    "custom field \"{name}\" must be {expected}, got {}",
                    value.field_type()
                )));
            }
            value.clone()
        }
        SubmittedValue::Raw(raw) => FieldValue::parse(expected, raw).map_err(|_| {
            LicenseError::Validation(format!("custom field \"{name}\": {raw:?} is not a valid {expected}"))
        })?,
    };

    match (&definition.kind, &value) {
        (FieldKind::Integer { min, max, .. }, FieldValue::Integer(v)) => {
            if v < min || v > max {
                return Err(LicenseError::Validation(format!(
                    "custom field \"{name}\" must be between {min} and {max}, got {v}"
                )));
            }
        }
        (FieldKind::Decimal { min, max, .. }, FieldValue::Decimal(v)) => {
            if !v.is_finite() || v < min || v > max {
                return Err(LicenseError::Validation(format!(
                    "custom field \"{name}\" must be between {min} and {max}, got {v}"
                )));
            }
        }
        (FieldKind::MultiChoice { options, .. }, FieldValue::MultiChoice(v)) => {
            if !options.iter().any(|o| o == v) {
                return Err(LicenseError::Validation(format!(
                    "custom field \"{name}\": {v:?} is not one of [{}]",
                    options.join(", ")
                )));
            }
        }
        (FieldKind::Date { .. }, FieldValue::Date(v)) => {
            if *v <= today {
                return Err(LicenseError::Validation(format!(
                    "custom field \"{name}\" must be a date after {}",
                    today.format(DATE_FORMAT)
                )));
            }
        }
        _ => {}
    }

    Ok(value)
}

/// Splits a delimited option list, trimming each option and dropping empty
/// entries and later duplicates. Order of first appearance is kept.
#[must_use]
pub fn normalize_options(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(OPTION_DELIMITER)
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter(|o| seen.insert(*o))
        .map(str::to_string)
        .collect()
}

/// Joins options back into their stored text form.
#[must_use]
pub fn join_options(options: &[String]) -> String {
    let mut delimiter = [0u8; 4];
    options.join(OPTION_DELIMITER.encode_utf8(&mut delimiter))
}

/// Checks a new definition against its own constraints and against the
/// application's existing definitions.
///
/// The name must be non-empty after trimming and unique among the active
/// definitions; numeric ranges must satisfy `min <= max` with the default
/// inside; a MultiChoice needs at least one option and a default, if any,
/// from the option set.
pub fn validate_definition(
    definition: &CustomFieldDefinition,
    existing: &[CustomFieldDefinition],
) -> LicenseResult<()> {
    let name = definition.name.trim();
    if name.is_empty() {
        return Err(LicenseError::Validation(
            "custom field name must not be empty".to_string(),
        ));
    }
    if name != definition.name {
        return Err(LicenseError::Validation(format!(
            "custom field name {:?} has leading or trailing whitespace",
            definition.name
        )));
    }
    if existing
        .iter()
        .any(|d| d.active && d.app_id == definition.app_id && d.id != definition.id && d.name == name)
    {
        return Err(LicenseError::Validation(format!(
            "custom field \"{name}\" already exists"
        )));
    }

    match &definition.kind {
        FieldKind::Integer { min, max, default } => {
            if min > max {
                return Err(range_error(name, min, max));
            }
            if default < min || default > max {
                return Err(default_error(name, default));
            }
        }
        FieldKind::Decimal { min, max, default } => {
            if !(min.is_finite() && max.is_finite() && default.is_finite()) {
                return Err(LicenseError::Validation(format!(
                    "custom field \"{name}\" bounds and default must be finite"
                )));
            }
            if min > max {
                return Err(range_error(name, min, max));
            }
            if default < min || default > max {
                return Err(default_error(name, default));
            }
        }
        FieldKind::MultiChoice { options, default } => {
            if options.is_empty() {
                return Err(LicenseError::Validation(format!(
                    "custom field \"{name}\" needs at least one option"
                )));
            }
            if let Some(default) = default {
                if !options.contains(default) {
                    return Err(default_error(name, default));
                }
            }
        }
        FieldKind::Text { .. } | FieldKind::Boolean { .. } | FieldKind::Date { .. } => {}
    }

    Ok(())
}

fn range_error(name: &str, min: &dyn std::fmt::Display, max: &dyn std::fmt::Display) -> LicenseError {
    LicenseError::Validation(format!(
        "custom field \"{name}\" minimum {min} is greater than maximum {max}"
    ))
}

fn default_error(name: &str, default: &dyn std::fmt::Debug) -> LicenseError {
    LicenseError::Validation(format!(
        "custom field \"{name}\" default {default:?} violates its constraints"
    ))
}
