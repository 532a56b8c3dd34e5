//! Error and warning types shared by the reconciler and the settings codecs.
//!
//! Fatal conditions are reported through [`SpecError`]. Conditions that are
//! recovered locally (type drift, stale conversion paths) are collected as
//! [`ReconcileWarning`] values and returned next to the result.

use std::fmt;

use thiserror::Error;

use crate::serialize::FormatVersion;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error(
        "Source '{source_item}' disagrees with '{reference_item}' at {column}; merge mode FAIL requires identical column specs"
    )]
    SchemaMismatch {
        reference_item: String,
        source_item: String,
        column: String,
    },
    #[error("Unsupported settings format version '{tag}'")]
    UnsupportedFormatVersion { tag: String },
    #[error("Malformed {version} settings at '{key}': {problem}")]
    MalformedSettings {
        version: FormatVersion,
        key: String,
        problem: String,
    },
    #[error("Loading {version} settings requires the additional parameter '{parameter}'")]
    MissingAdditionalParameter {
        version: FormatVersion,
        parameter: &'static str,
    },
    #[error("Invalid table transformation: {0}")]
    InvalidTransformation(String),
    #[error("Unknown source item '{0}'")]
    UnknownSource(String),
}

/// Failure to read a typed entry from a [`crate::settings::SettingsTree`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{key}': {problem}")]
pub struct SettingsError {
    pub key: String,
    pub problem: String,
}

impl SettingsError {
    pub fn missing(key: &str) -> Self {
        SettingsError {
            key: key.to_string(),
            problem: "entry is missing".to_string(),
        }
    }

    pub fn invalid(key: &str, expected: &str) -> Self {
        SettingsError {
            key: key.to_string(),
            problem: format!("expected {expected}"),
        }
    }

    pub fn new(key: &str, problem: impl Into<String>) -> Self {
        SettingsError {
            key: key.to_string(),
            problem: problem.into(),
        }
    }

    /// Prefixes the key with the parent entry so nested failures read as paths.
    pub fn within(self, parent: &str) -> Self {
        SettingsError {
            key: format!("{parent}.{}", self.key),
            problem: self.problem,
        }
    }

    pub fn in_version(self, version: FormatVersion) -> SpecError {
        SpecError::MalformedSettings {
            version,
            key: self.key,
            problem: self.problem,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileWarning {
    /// A column kept its name but changed type; it was reset to defaults.
    TypeDrift {
        column: String,
        previous_type: String,
        current_type: String,
    },
    /// A stored conversion path is no longer registered and was replaced.
    UnknownConversionPath {
        column: String,
        path_id: String,
        fallback_id: String,
    },
}

impl fmt::Display for ReconcileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileWarning::TypeDrift {
                column,
                previous_type,
                current_type,
            } => write!(
                f,
                "Column '{column}' changed type from {previous_type} to {current_type}; its settings were reset"
            ),
            ReconcileWarning::UnknownConversionPath {
                column,
                path_id,
                fallback_id,
            } => write!(
                f,
                "Conversion path '{path_id}' for column '{column}' is not available; using '{fallback_id}' instead"
            ),
        }
    }
}
