//! Application records.

use crate::{ApplicationId, FileFormat};
use serde::{Deserialize, Serialize};

/// A product for which licenses are issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    /// Display name, embedded in license files when `show_app_name` is set.
    pub name: String,
    /// Validity of a new license in days, counted from the issue date.
    pub default_valid_days: u32,
    /// Syntax of the license files issued for this application.
    pub file_format: FileFormat,
    /// Whether the storage identifier is part of the signed file.
    pub show_license_id: bool,
    /// Whether the application name is part of the signed file.
    pub show_app_name: bool,
    pub active: bool,
}

impl Application {
    /// Creates an active application with both identifier and name embedded.
    #[must_use]
    pub fn new(id: ApplicationId, name: impl Into<String>, file_format: FileFormat) -> Self {
        Self {
            id,
            name: name.into(),
            default_valid_days: 365,
            file_format,
            show_license_id: true,
            show_app_name: true,
            active: true,
        }
    }
}
