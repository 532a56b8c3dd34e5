//! Versioned persistence of [`TableSpecConfig`] in a [`SettingsTree`].
//!
//! Saving always writes the current layout with an explicit version tag.
//! Loading detects the layout once, up front, and hands the tree to that
//! version's codec; older codecs synthesize whatever their layout lacks so
//! callers always receive a current-shape config.
//!
//! Detection order:
//! 1. an explicit `version` tag;
//! 2. no tag but a `table_transformation` entry, which the intermediate
//!    layout introduced;
//! 3. otherwise the oldest layout, provided its marker entries are present.

mod common;
mod current;
mod intermediate;
pub mod legacy;

use std::fmt;

use log::debug;

use crate::{
    config::TableSpecConfig,
    error::{ReconcileWarning, SpecError},
    path::ConversionPathRegistry,
    settings::SettingsTree,
    spec::ExternalType,
    transformation::MergeMode,
};

pub(crate) const VERSION_KEY: &str = "version";
pub(crate) const TABLE_TRANSFORMATION_KEY: &str = "table_transformation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormatVersion {
    /// Single output spec with per-output-column conversion paths and
    /// untyped per-source column names.
    V1,
    /// Table transformation stored as parallel arrays, without
    /// `skip_empty_columns`.
    V2,
    V3,
}

impl FormatVersion {
    pub const CURRENT: FormatVersion = FormatVersion::V3;

    pub fn tag(&self) -> &'static str {
        match self {
            FormatVersion::V1 => "V1",
            FormatVersion::V2 => "V2",
            FormatVersion::V3 => "V3",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "V1" => Some(FormatVersion::V1),
            "V2" => Some(FormatVersion::V2),
            "V3" => Some(FormatVersion::V3),
            _ => None,
        }
    }

    /// Reads the layout version of `settings` without decoding anything else.
    pub fn detect(settings: &SettingsTree) -> Result<Self, SpecError> {
        if settings.contains(VERSION_KEY) {
            let tag = settings
                .get_string(VERSION_KEY)
                .map_err(|err| err.in_version(FormatVersion::CURRENT))?;
            return FormatVersion::from_tag(&tag)
                .ok_or(SpecError::UnsupportedFormatVersion { tag });
        }
        if settings.contains(TABLE_TRANSFORMATION_KEY) {
            return Ok(FormatVersion::V2);
        }
        if legacy::has_markers(settings) {
            return Ok(FormatVersion::V1);
        }
        Err(SpecError::MalformedSettings {
            version: FormatVersion::V1,
            key: "<root>".to_string(),
            problem: format!(
                "no '{VERSION_KEY}' tag and none of the entries a known layout starts with"
            ),
        })
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Values older layouts did not store and the caller must supply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadParameters {
    /// Merge mode for V1 settings, which kept it outside the spec config.
    pub merge_mode: Option<MergeMode>,
    /// `skip_empty_columns` for V1 and V2 settings; V1 ignores it.
    pub skip_empty_columns: Option<bool>,
}

impl LoadParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_merge_mode(mut self, merge_mode: MergeMode) -> Self {
        self.merge_mode = Some(merge_mode);
        self
    }

    pub fn with_skip_empty_columns(mut self, skip_empty_columns: bool) -> Self {
        self.skip_empty_columns = Some(skip_empty_columns);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded<T> {
    pub config: TableSpecConfig<T>,
    /// Layout the settings were read from.
    pub version: FormatVersion,
    pub warnings: Vec<ReconcileWarning>,
}

pub struct TableSpecSerializer<'a, R: ?Sized> {
    registry: &'a R,
}

impl<'a, R: ?Sized> TableSpecSerializer<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        TableSpecSerializer { registry }
    }
}

impl<R: ?Sized> TableSpecSerializer<'_, R> {
    pub fn save<T>(&self, config: &TableSpecConfig<T>) -> Result<SettingsTree, SpecError>
    where
        T: ExternalType,
    {
        current::save(config).map_err(|err| err.in_version(FormatVersion::CURRENT))
    }

    pub fn load<T>(
        &self,
        settings: &SettingsTree,
        parameters: &LoadParameters,
    ) -> Result<Loaded<T>, SpecError>
    where
        T: ExternalType,
        R: ConversionPathRegistry<T>,
    {
        let version = FormatVersion::detect(settings)?;
        debug!("Loading table spec settings in {version} layout");
        let mut warnings = Vec::new();
        let config = match version {
            FormatVersion::V1 => legacy::load(settings, parameters, self.registry, &mut warnings)?,
            FormatVersion::V2 => {
                intermediate::load(settings, parameters, self.registry, &mut warnings)?
            }
            FormatVersion::V3 => current::load(settings, self.registry, &mut warnings)?,
        };
        Ok(Loaded {
            config,
            version,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_prefers_the_explicit_tag() {
        let tree = SettingsTree::from_yaml_str("version: V2\nfile_specs: {}\nspec: []\n").unwrap();
        assert_eq!(FormatVersion::detect(&tree).unwrap(), FormatVersion::V2);

        let tree = SettingsTree::from_yaml_str("table_transformation: {}\n").unwrap();
        assert_eq!(FormatVersion::detect(&tree).unwrap(), FormatVersion::V2);

        let tree = SettingsTree::from_yaml_str("file_specs: {}\nspec: []\n").unwrap();
        assert_eq!(FormatVersion::detect(&tree).unwrap(), FormatVersion::V1);
    }

    #[test]
    fn detection_rejects_unknown_tags_and_unmarked_trees() {
        let tree = SettingsTree::from_yaml_str("version: V9\n").unwrap();
        assert_eq!(
            FormatVersion::detect(&tree).unwrap_err(),
            SpecError::UnsupportedFormatVersion {
                tag: "V9".to_string()
            }
        );

        let tree = SettingsTree::from_yaml_str("source_group_id: x\n").unwrap();
        assert!(matches!(
            FormatVersion::detect(&tree).unwrap_err(),
            SpecError::MalformedSettings {
                version: FormatVersion::V1,
                ..
            }
        ));
    }
}
