//! Entries shared by the V2 and V3 layouts.

use log::warn;

use crate::{
    config::TableSpecConfig,
    config_id::ConfigId,
    error::{ReconcileWarning, SettingsError, SpecError},
    path::{ConversionPath, ConversionPathRegistry},
    settings::SettingsTree,
    spec::{ColumnSpec, ExternalType, RawSpec, SourceSpecs, TableSpec},
    transformation::{ColumnTransformation, MergeMode, TableTransformation},
};

use super::FormatVersion;

pub(super) const SOURCE_GROUP_ID_KEY: &str = "source_group_id";
pub(super) const CONFIG_ID_KEY: &str = "config_id";
pub(super) const INDIVIDUAL_SPECS_KEY: &str = "individual_specs";
pub(super) const COLUMNS_KEY: &str = "columns";
pub(super) const INTERSECTION_INDICES_KEY: &str = "intersection_indices";
pub(super) const KEEP_UNKNOWN_COLUMNS_KEY: &str = "keep_unknown_columns";
pub(super) const POSITION_FOR_UNKNOWN_COLUMNS_KEY: &str = "position_for_unknown_columns";
pub(super) const ENFORCE_TYPES_KEY: &str = "enforce_types";
pub(super) const COLUMN_FILTER_MODE_KEY: &str = "column_filter_mode";

const NAME_KEY: &str = "name";
const HAS_TYPE_KEY: &str = "has_type";
const TYPE_KEY: &str = "type";

/// Table-level options stored next to the column list.
#[derive(Debug, Clone, Copy)]
pub(super) struct StoredOptions {
    pub merge_mode: MergeMode,
    pub position_for_unknown_columns: usize,
    pub keep_unknown_columns: bool,
    pub enforce_types: bool,
    pub skip_empty_columns: bool,
}

impl StoredOptions {
    /// Reads every option except `skip_empty_columns`, which V2 lacks.
    pub fn load(tree: &SettingsTree, skip_empty_columns: bool) -> Result<Self, SettingsError> {
        let mode = tree.get_string(COLUMN_FILTER_MODE_KEY)?;
        let merge_mode = mode
            .parse::<MergeMode>()
            .map_err(|err| SettingsError::new(COLUMN_FILTER_MODE_KEY, err.to_string()))?;
        Ok(StoredOptions {
            merge_mode,
            position_for_unknown_columns: tree.get_usize(POSITION_FOR_UNKNOWN_COLUMNS_KEY)?,
            keep_unknown_columns: tree.get_bool(KEEP_UNKNOWN_COLUMNS_KEY)?,
            enforce_types: tree.get_bool(ENFORCE_TYPES_KEY)?,
            skip_empty_columns,
        })
    }
}

pub(super) fn save_column_spec<T: ExternalType>(
    spec: &ColumnSpec<T>,
) -> Result<SettingsTree, SettingsError> {
    let mut tree = SettingsTree::new();
    tree.set_optional_string(NAME_KEY, spec.name.as_deref());
    tree.set_bool(HAS_TYPE_KEY, spec.has_type);
    tree.set_typed(TYPE_KEY, &spec.column_type)?;
    Ok(tree)
}

pub(super) fn load_column_spec<T: ExternalType>(
    tree: &SettingsTree,
) -> Result<ColumnSpec<T>, SettingsError> {
    Ok(ColumnSpec {
        name: tree.get_optional_string(NAME_KEY)?,
        column_type: tree.get_typed(TYPE_KEY)?,
        has_type: tree.get_bool(HAS_TYPE_KEY)?,
    })
}

pub(super) fn save_column_specs<T: ExternalType>(
    columns: &[ColumnSpec<T>],
) -> Result<Vec<SettingsTree>, SettingsError> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            save_column_spec(column).map_err(|err| err.within(&format!("{COLUMNS_KEY}[{idx}]")))
        })
        .collect()
}

pub(super) fn load_column_specs<T: ExternalType>(
    tree: &SettingsTree,
    key: &str,
) -> Result<Vec<ColumnSpec<T>>, SettingsError> {
    tree.get_child_array(key)?
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            load_column_spec(column).map_err(|err| err.within(&format!("{key}[{idx}]")))
        })
        .collect()
}

pub(super) fn save_individual_specs<T: ExternalType>(
    settings: &mut SettingsTree,
    specs: &SourceSpecs<T>,
) -> Result<(), SettingsError> {
    let mut children = Vec::with_capacity(specs.len());
    for (item, spec) in specs.iter() {
        let mut tree = SettingsTree::new();
        let columns = save_column_specs(&spec.columns)
            .map_err(|err| err.within(&format!("{INDIVIDUAL_SPECS_KEY}.{item}")))?;
        tree.set_child_array(COLUMNS_KEY, columns);
        children.push((item.to_string(), tree));
    }
    settings.set_children(INDIVIDUAL_SPECS_KEY, children);
    Ok(())
}

pub(super) fn load_individual_specs<T: ExternalType>(
    settings: &SettingsTree,
) -> Result<SourceSpecs<T>, SettingsError> {
    let mut specs = SourceSpecs::new();
    for (item, tree) in settings.get_children(INDIVIDUAL_SPECS_KEY)? {
        let columns = load_column_specs(&tree, COLUMNS_KEY)
            .map_err(|err| err.within(&format!("{INDIVIDUAL_SPECS_KEY}.{item}")))?;
        specs.insert(item, TableSpec::new(columns));
    }
    Ok(specs)
}

pub(super) fn save_config_id(settings: &mut SettingsTree, config_id: &ConfigId) {
    if config_id.is_placeholder() {
        return;
    }
    let mut tree = SettingsTree::new();
    config_id.save(&mut tree);
    settings.set_child(CONFIG_ID_KEY, tree);
}

pub(super) fn load_config_id(settings: &SettingsTree) -> Result<ConfigId, SettingsError> {
    match settings.get_optional_child(CONFIG_ID_KEY)? {
        Some(tree) => ConfigId::load(&tree).map_err(|err| err.within(CONFIG_ID_KEY)),
        None => Ok(ConfigId::placeholder()),
    }
}

/// Looks up a stored path id, substituting the column type's default path
/// when the id is unknown or belongs to another source type.
pub(super) fn resolve_path<T, R>(
    registry: &R,
    id: &str,
    column: &ColumnSpec<T>,
    warnings: &mut Vec<ReconcileWarning>,
) -> ConversionPath<T>
where
    T: ExternalType,
    R: ConversionPathRegistry<T> + ?Sized,
{
    match registry.resolve(id) {
        Some(path) if path.source_type() == &column.column_type => path,
        _ => {
            let fallback = registry.default_path(&column.column_type);
            warn!(
                "Stored conversion path '{id}' of column '{}' is not available; using '{}'",
                column.display_name(),
                fallback.id()
            );
            warnings.push(ReconcileWarning::UnknownConversionPath {
                column: column.display_name().to_string(),
                path_id: id.to_string(),
                fallback_id: fallback.id().to_string(),
            });
            fallback
        }
    }
}

/// Assembles and validates the config from decoded parts. Inconsistencies
/// between the column list and the individual specs are reported as
/// malformed settings of `version`.
pub(super) fn assemble<T: ExternalType>(
    version: FormatVersion,
    source_group_id: String,
    config_id: ConfigId,
    individual_specs: SourceSpecs<T>,
    columns: Vec<ColumnTransformation<T>>,
    intersection_indices: Vec<usize>,
    options: StoredOptions,
) -> Result<TableSpecConfig<T>, SpecError> {
    let raw_spec = RawSpec::from_sources(&individual_specs);
    if raw_spec.intersection_indices() != intersection_indices {
        return Err(SpecError::MalformedSettings {
            version,
            key: format!("{}.{INTERSECTION_INDICES_KEY}", super::TABLE_TRANSFORMATION_KEY),
            problem: format!(
                "stored {:?} but the individual specs intersect at {:?}",
                intersection_indices,
                raw_spec.intersection_indices()
            ),
        });
    }
    let transformation = TableTransformation {
        columns,
        raw_spec,
        merge_mode: options.merge_mode,
        position_for_unknown_columns: options.position_for_unknown_columns,
        keep_unknown_columns: options.keep_unknown_columns,
        enforce_types: options.enforce_types,
        skip_empty_columns: options.skip_empty_columns,
    };
    TableSpecConfig::new(source_group_id, config_id, individual_specs, transformation).map_err(
        |err| match err {
            SpecError::InvalidTransformation(problem) => SpecError::MalformedSettings {
                version,
                key: super::TABLE_TRANSFORMATION_KEY.to_string(),
                problem,
            },
            other => other,
        },
    )
}
