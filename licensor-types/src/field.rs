//! Custom field definitions and values.
//!
//! An application can declare typed attributes that every license for it
//! must carry. Their values become part of the signed payload.

use crate::{ApplicationId, Error, FieldDefinitionId, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Date layout used for date-typed values everywhere in the engine.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Type tag of a custom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Integer,
    Decimal,
    Text,
    Boolean,
    MultiChoice,
    Date,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "Integer",
            Self::Decimal => "Decimal",
            Self::Text => "Text",
            Self::Boolean => "Boolean",
            Self::MultiChoice => "MultiChoice",
            Self::Date => "Date",
        };
        f.write_str(name)
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" => Ok(Self::Integer),
            "decimal" | "float" => Ok(Self::Decimal),
            "text" | "string" => Ok(Self::Text),
            "boolean" | "bool" => Ok(Self::Boolean),
            "multichoice" | "multi_choice" | "choice" => Ok(Self::MultiChoice),
            "date" => Ok(Self::Date),
            other => Err(Error::UnknownFieldType(other.to_string())),
        }
    }
}

/// Type of a custom field together with its type-specific constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FieldKind {
    /// Whole number within the inclusive range `min..=max`.
    Integer { min: i64, max: i64, default: i64 },
    /// Decimal number within the inclusive range `min..=max`.
    Decimal { min: f64, max: f64, default: f64 },
    /// Free text, empty allowed.
    Text { default: String },
    Boolean { default: bool },
    /// One value out of a fixed option set.
    MultiChoice {
        options: Vec<String>,
        default: Option<String>,
    },
    /// Calendar date, strictly after the issue day.
    Date { default: Option<NaiveDate> },
}

impl FieldKind {
    /// Returns the type tag.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Integer { .. } => FieldType::Integer,
            Self::Decimal { .. } => FieldType::Decimal,
            Self::Text { .. } => FieldType::Text,
            Self::Boolean { .. } => FieldType::Boolean,
            Self::MultiChoice { .. } => FieldType::MultiChoice,
            Self::Date { .. } => FieldType::Date,
        }
    }
}

/// Per-application template of a custom license attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldDefinition {
    pub id: FieldDefinitionId,
    pub app_id: ApplicationId,
    /// Unique among the active definitions of the application.
    pub name: String,
    pub kind: FieldKind,
    pub active: bool,
}

impl CustomFieldDefinition {
    /// Returns the type tag of this definition.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        self.kind.field_type()
    }

    /// Returns the value a form should be pre-filled with, if the definition has one.
    #[must_use]
    pub fn default_value(&self) -> Option<FieldValue> {
        match &self.kind {
            FieldKind::Integer { default, .. } => Some(FieldValue::Integer(*default)),
            FieldKind::Decimal { default, .. } => Some(FieldValue::Decimal(*default)),
            FieldKind::Text { default } => Some(FieldValue::Text(default.clone())),
            FieldKind::Boolean { default } => Some(FieldValue::Boolean(*default)),
            FieldKind::MultiChoice { default, .. } => {
                default.clone().map(FieldValue::MultiChoice)
            }
            FieldKind::Date { default } => default.map(FieldValue::Date),
        }
    }
}

/// A concrete, typed custom field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    Integer(i64),
    Decimal(f64),
    Text(String),
    Boolean(bool),
    MultiChoice(String),
    Date(NaiveDate),
}

impl FieldValue {
    /// Returns the type tag of the populated slot.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Integer(_) => FieldType::Integer,
            Self::Decimal(_) => FieldType::Decimal,
            Self::Text(_) => FieldType::Text,
            Self::Boolean(_) => FieldType::Boolean,
            Self::MultiChoice(_) => FieldType::MultiChoice,
            Self::Date(_) => FieldType::Date,
        }
    }

    /// Parses a raw form/API string as a value of the given type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFieldValue`] if the string is not a valid
    /// value of that type. Decimals must be finite.
    pub fn parse(field_type: FieldType, raw: &str) -> Result<Self> {
        let invalid = || Error::InvalidFieldValue {
            field_type,
            raw: raw.to_string(),
        };
        let trimmed = raw.trim();
        match field_type {
            FieldType::Integer => trimmed.parse().map(Self::Integer).map_err(|_| invalid()),
            FieldType::Decimal => match trimmed.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Self::Decimal(v)),
                _ => Err(invalid()),
            },
            FieldType::Text => Ok(Self::Text(raw.to_string())),
            FieldType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Self::Boolean(true)),
                "false" | "0" | "no" | "off" => Ok(Self::Boolean(false)),
                _ => Err(invalid()),
            },
            FieldType::MultiChoice => Ok(Self::MultiChoice(trimmed.to_string())),
            FieldType::Date => NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .map(Self::Date)
                .map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Text(v) | Self::MultiChoice(v) => f.write_str(v),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Date(v) => write!(f, "{}", v.format(DATE_FORMAT)),
        }
    }
}

/// A value bound to one license and one definition.
///
/// `definition_id` and `name` are always copied from the stored
/// definition, never from caller input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldValue {
    pub definition_id: FieldDefinitionId,
    pub name: String,
    pub value: FieldValue,
}

impl CustomFieldValue {
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        self.value.field_type()
    }
}

/// Value as submitted by a caller, before it is checked against a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmittedValue {
    /// Already typed (GUI flow).
    Typed(FieldValue),
    /// Raw text to be parsed with the definition's type (API flow).
    Raw(String),
}

/// A caller-supplied custom field value.
///
/// Which of `definition_id` or `name` is used to find the definition
/// depends on how the caller asks for the values to be matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvidedValue {
    pub definition_id: Option<FieldDefinitionId>,
    pub name: String,
    pub value: SubmittedValue,
}

impl ProvidedValue {
    /// A value addressed by definition id.
    #[must_use]
    pub fn by_id(definition_id: FieldDefinitionId, value: FieldValue) -> Self {
        Self {
            definition_id: Some(definition_id),
            name: String::new(),
            value: SubmittedValue::Typed(value),
        }
    }

    /// A raw value addressed by field name.
    #[must_use]
    pub fn by_name(name: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            definition_id: None,
            name: name.into(),
            value: SubmittedValue::Raw(raw.into()),
        }
    }
}
