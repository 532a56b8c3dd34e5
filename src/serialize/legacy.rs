//! V1 layout, written before sources could be transformed individually.
//!
//! It stores the column names of every source (without types), the single
//! output spec of that era, and one conversion path per output column:
//!
//! ```yaml
//! source_group_id: orders
//! file_specs:
//!   a.csv: { column_names: [id, name] }
//!   b.csv: { column_names: [id] }
//! spec:
//!   - { name: id, type: integer }
//! production_paths: [ integer->integer ]
//! ```
//!
//! The merge mode was kept elsewhere and must be passed in. Migration builds
//! a full transformation from these parts with the rules below.

use std::collections::HashSet;

use log::{debug, warn};

use crate::{
    config::TableSpecConfig,
    config_id::ConfigId,
    error::{ReconcileWarning, SettingsError, SpecError},
    path::{ConversionPath, ConversionPathRegistry},
    settings::SettingsTree,
    spec::{ColumnSpec, ExternalType, RawSpec, SourceSpecs, TableSpec},
    transformation::{ColumnTransformation, MergeMode, TableTransformation},
};

use super::{FormatVersion, LoadParameters};

const VERSION: FormatVersion = FormatVersion::V1;

const SOURCE_GROUP_ID_KEY: &str = "source_group_id";
const FILE_SPECS_KEY: &str = "file_specs";
const COLUMN_NAMES_KEY: &str = "column_names";
const SPEC_KEY: &str = "spec";
const NAME_KEY: &str = "name";
const TYPE_KEY: &str = "type";
const PRODUCTION_PATHS_KEY: &str = "production_paths";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyLayout {
    pub source_group_id: String,
    /// Column names per source item, in stored order.
    pub file_specs: Vec<(String, Vec<String>)>,
    pub output_columns: Vec<LegacyOutputColumn>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyOutputColumn {
    pub name: String,
    /// Output type label; informational, the conversion path determines types.
    pub output_type: String,
    pub path_id: String,
}

pub fn has_markers(settings: &SettingsTree) -> bool {
    settings.contains(FILE_SPECS_KEY) && settings.contains(SPEC_KEY)
}

pub fn read_layout(settings: &SettingsTree) -> Result<LegacyLayout, SettingsError> {
    let source_group_id = settings.get_string(SOURCE_GROUP_ID_KEY)?;
    let file_specs = settings
        .get_children(FILE_SPECS_KEY)?
        .into_iter()
        .map(|(item, tree)| {
            let names = tree
                .get_string_array(COLUMN_NAMES_KEY)
                .map_err(|err| err.within(&format!("{FILE_SPECS_KEY}.{item}")))?;
            Ok((item, names))
        })
        .collect::<Result<Vec<_>, SettingsError>>()?;

    let spec = settings.get_child_array(SPEC_KEY)?;
    let path_ids = settings.get_string_array(PRODUCTION_PATHS_KEY)?;
    if spec.len() != path_ids.len() {
        return Err(SettingsError::new(
            PRODUCTION_PATHS_KEY,
            format!(
                "{} path(s) stored for {} output column(s)",
                path_ids.len(),
                spec.len()
            ),
        ));
    }
    let output_columns = spec
        .iter()
        .zip(path_ids)
        .enumerate()
        .map(|(idx, (column, path_id))| {
            let within = |err: SettingsError| err.within(&format!("{SPEC_KEY}[{idx}]"));
            Ok(LegacyOutputColumn {
                name: column.get_string(NAME_KEY).map_err(within)?,
                output_type: column.get_string(TYPE_KEY).map_err(within)?,
                path_id,
            })
        })
        .collect::<Result<Vec<_>, SettingsError>>()?;

    Ok(LegacyLayout {
        source_group_id,
        file_specs,
        output_columns,
    })
}

/// Every column name across the sources, in first-seen order.
pub fn union_names(file_specs: &[(String, Vec<String>)]) -> Vec<String> {
    let mut seen: HashSet<&String> = HashSet::new();
    file_specs
        .iter()
        .flat_map(|(_, names)| names.iter())
        .filter(|name| seen.insert(*name))
        .cloned()
        .collect()
}

/// A column of the old output spec: its stored path decides its type. An
/// unknown path leaves the column untyped with the fallback type's default.
pub fn stored_column<T, R>(
    output: &LegacyOutputColumn,
    registry: &R,
    warnings: &mut Vec<ReconcileWarning>,
) -> (ColumnSpec<T>, ConversionPath<T>)
where
    T: ExternalType,
    R: ConversionPathRegistry<T> + ?Sized,
{
    match registry.resolve(&output.path_id) {
        Some(path) => (ColumnSpec::new(&output.name, path.source_type().clone()), path),
        None => {
            let (spec, fallback) = excluded_column(&output.name, registry);
            warn!(
                "Stored conversion path '{}' of column '{}' is not available; using '{}'",
                output.path_id,
                output.name,
                fallback.id()
            );
            warnings.push(ReconcileWarning::UnknownConversionPath {
                column: output.name.clone(),
                path_id: output.path_id.clone(),
                fallback_id: fallback.id().to_string(),
            });
            (spec, fallback)
        }
    }
}

/// A source column missing from the old output spec. Only intersection
/// columns were stored back then, so nothing is known about its type.
pub fn excluded_column<T, R>(name: &str, registry: &R) -> (ColumnSpec<T>, ConversionPath<T>)
where
    T: ExternalType,
    R: ConversionPathRegistry<T> + ?Sized,
{
    let fallback = registry.fallback_type();
    let path = registry.default_path(&fallback);
    (ColumnSpec::untyped(name, fallback), path)
}

/// Builds the current-shape config from a V1 layout.
///
/// Output-spec columns are kept and come first, in their stored order;
/// the remaining union columns follow, excluded. New columns are appended
/// after all of them. Type enforcement and empty-column skipping did not
/// exist and are off.
pub fn migrate<T, R>(
    layout: LegacyLayout,
    merge_mode: MergeMode,
    registry: &R,
    warnings: &mut Vec<ReconcileWarning>,
) -> Result<TableSpecConfig<T>, SpecError>
where
    T: ExternalType,
    R: ConversionPathRegistry<T> + ?Sized,
{
    let names = union_names(&layout.file_specs);
    let mut stored_names = HashSet::new();
    for output in &layout.output_columns {
        if !names.contains(&output.name) {
            return Err(malformed(
                SPEC_KEY,
                format!("output column '{}' is not part of any file spec", output.name),
            ));
        }
        if !stored_names.insert(output.name.as_str()) {
            return Err(malformed(
                SPEC_KEY,
                format!("output column '{}' is listed twice", output.name),
            ));
        }
    }

    let mut columns: Vec<ColumnTransformation<T>> = Vec::with_capacity(names.len());
    let mut next_excluded = layout.output_columns.len();
    for name in &names {
        let stored = layout
            .output_columns
            .iter()
            .position(|output| &output.name == name);
        let column = match stored {
            Some(position) => {
                let (spec, path) =
                    stored_column(&layout.output_columns[position], registry, warnings);
                ColumnTransformation::with_defaults(spec, path, true, position)
            }
            None => {
                let (spec, path) = excluded_column(name, registry);
                next_excluded += 1;
                ColumnTransformation::with_defaults(spec, path, false, next_excluded - 1)
            }
        };
        columns.push(column);
    }

    let individual_specs: SourceSpecs<T> = layout
        .file_specs
        .iter()
        .map(|(item, source_names)| {
            let spec: TableSpec<T> = source_names
                .iter()
                .filter_map(|name| {
                    columns
                        .iter()
                        .find(|column| column.external_spec.name.as_deref() == Some(name.as_str()))
                        .map(|column| column.external_spec.clone())
                })
                .collect();
            (item.clone(), spec)
        })
        .collect();

    let raw_spec = RawSpec::from_sources(&individual_specs);
    debug!(
        "Migrated V1 settings: {} union column(s), {} stored, {} in the intersection",
        names.len(),
        layout.output_columns.len(),
        raw_spec.intersection().len()
    );
    let transformation = TableTransformation {
        position_for_unknown_columns: columns.len(),
        columns,
        raw_spec,
        merge_mode,
        keep_unknown_columns: true,
        enforce_types: false,
        skip_empty_columns: false,
    };
    TableSpecConfig::new(
        layout.source_group_id,
        ConfigId::placeholder(),
        individual_specs,
        transformation,
    )
    .map_err(|err| match err {
        SpecError::InvalidTransformation(problem) => malformed(SPEC_KEY, problem),
        other => other,
    })
}

pub(super) fn load<T, R>(
    settings: &SettingsTree,
    parameters: &LoadParameters,
    registry: &R,
    warnings: &mut Vec<ReconcileWarning>,
) -> Result<TableSpecConfig<T>, SpecError>
where
    T: ExternalType,
    R: ConversionPathRegistry<T> + ?Sized,
{
    let merge_mode = parameters
        .merge_mode
        .ok_or(SpecError::MissingAdditionalParameter {
            version: VERSION,
            parameter: "merge_mode",
        })?;
    let layout = read_layout(settings).map_err(|err| err.in_version(VERSION))?;
    migrate(layout, merge_mode, registry, warnings)
}

fn malformed(key: &str, problem: String) -> SpecError {
    SettingsError::new(key, problem).in_version(VERSION)
}
