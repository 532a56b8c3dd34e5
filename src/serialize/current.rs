//! V3 layout: every field stored under its own name, one record per column.
//!
//! ```yaml
//! version: V3
//! source_group_id: orders
//! config_id: { delimiter: "," }            # omitted for the placeholder
//! individual_specs:
//!   a.csv: { columns: [ { name: id, has_type: true, type: Integer } ] }
//! table_transformation:
//!   num_columns: 1
//!   columns:
//!     - external_spec: { name: id, has_type: true, type: Integer }
//!       conversion_path: integer->integer
//!       keep: true
//!       position: 0
//!       output_name: id
//!   intersection_indices: [0]
//!   keep_unknown_columns: true
//!   position_for_unknown_columns: 1
//!   enforce_types: false
//!   column_filter_mode: UNION
//!   skip_empty_columns: false
//! ```

use crate::{
    config::TableSpecConfig,
    error::{ReconcileWarning, SettingsError, SpecError},
    path::ConversionPathRegistry,
    settings::SettingsTree,
    spec::ExternalType,
    transformation::{ColumnTransformation, TableTransformation},
};

use super::{
    FormatVersion, TABLE_TRANSFORMATION_KEY, VERSION_KEY,
    common::{self, StoredOptions},
};

const VERSION: FormatVersion = FormatVersion::V3;

const NUM_COLUMNS_KEY: &str = "num_columns";
const SKIP_EMPTY_COLUMNS_KEY: &str = "skip_empty_columns";
const EXTERNAL_SPEC_KEY: &str = "external_spec";
const CONVERSION_PATH_KEY: &str = "conversion_path";
const KEEP_KEY: &str = "keep";
const POSITION_KEY: &str = "position";
const OUTPUT_NAME_KEY: &str = "output_name";

pub(super) fn save<T: ExternalType>(
    config: &TableSpecConfig<T>,
) -> Result<SettingsTree, SettingsError> {
    let mut settings = SettingsTree::new();
    settings.set_string(VERSION_KEY, VERSION.tag());
    settings.set_string(common::SOURCE_GROUP_ID_KEY, config.source_group_id());
    common::save_config_id(&mut settings, config.config_id());
    common::save_individual_specs(&mut settings, config.individual_specs())?;
    let transformation = save_transformation(config.transformation())
        .map_err(|err| err.within(TABLE_TRANSFORMATION_KEY))?;
    settings.set_child(TABLE_TRANSFORMATION_KEY, transformation);
    Ok(settings)
}

fn save_transformation<T: ExternalType>(
    transformation: &TableTransformation<T>,
) -> Result<SettingsTree, SettingsError> {
    let mut tree = SettingsTree::new();
    tree.set_usize(NUM_COLUMNS_KEY, transformation.columns.len());
    let columns = transformation
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            save_column(column)
                .map_err(|err| err.within(&format!("{}[{idx}]", common::COLUMNS_KEY)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    tree.set_child_array(common::COLUMNS_KEY, columns);
    tree.set_usize_array(
        common::INTERSECTION_INDICES_KEY,
        &transformation.raw_spec.intersection_indices(),
    );
    tree.set_bool(common::KEEP_UNKNOWN_COLUMNS_KEY, transformation.keep_unknown_columns);
    tree.set_usize(
        common::POSITION_FOR_UNKNOWN_COLUMNS_KEY,
        transformation.position_for_unknown_columns,
    );
    tree.set_bool(common::ENFORCE_TYPES_KEY, transformation.enforce_types);
    tree.set_string(common::COLUMN_FILTER_MODE_KEY, transformation.merge_mode.as_str());
    tree.set_bool(SKIP_EMPTY_COLUMNS_KEY, transformation.skip_empty_columns);
    Ok(tree)
}

fn save_column<T: ExternalType>(
    column: &ColumnTransformation<T>,
) -> Result<SettingsTree, SettingsError> {
    let mut tree = SettingsTree::new();
    tree.set_child(EXTERNAL_SPEC_KEY, common::save_column_spec(&column.external_spec)?);
    tree.set_string(CONVERSION_PATH_KEY, column.conversion_path.id());
    tree.set_bool(KEEP_KEY, column.keep);
    tree.set_usize(POSITION_KEY, column.position);
    tree.set_string(OUTPUT_NAME_KEY, column.output_name.clone());
    Ok(tree)
}

pub(super) fn load<T, R>(
    settings: &SettingsTree,
    registry: &R,
    warnings: &mut Vec<ReconcileWarning>,
) -> Result<TableSpecConfig<T>, SpecError>
where
    T: ExternalType,
    R: ConversionPathRegistry<T> + ?Sized,
{
    let malformed = |err: SettingsError| err.in_version(VERSION);
    let source_group_id = settings
        .get_string(common::SOURCE_GROUP_ID_KEY)
        .map_err(malformed)?;
    let config_id = common::load_config_id(settings).map_err(malformed)?;
    let individual_specs = common::load_individual_specs(settings).map_err(malformed)?;

    let tree = settings
        .get_child(TABLE_TRANSFORMATION_KEY)
        .map_err(malformed)?;
    let in_transformation =
        |err: SettingsError| err.within(TABLE_TRANSFORMATION_KEY).in_version(VERSION);
    let skip_empty_columns = tree
        .get_bool(SKIP_EMPTY_COLUMNS_KEY)
        .map_err(in_transformation)?;
    let options = StoredOptions::load(&tree, skip_empty_columns).map_err(in_transformation)?;
    let intersection_indices = tree
        .get_usize_array(common::INTERSECTION_INDICES_KEY)
        .map_err(in_transformation)?;
    let num_columns = tree.get_usize(NUM_COLUMNS_KEY).map_err(in_transformation)?;
    let column_trees = tree
        .get_child_array(common::COLUMNS_KEY)
        .map_err(in_transformation)?;
    if column_trees.len() != num_columns {
        return Err(in_transformation(SettingsError::new(
            common::COLUMNS_KEY,
            format!(
                "{NUM_COLUMNS_KEY} is {num_columns} but {} column(s) are stored",
                column_trees.len()
            ),
        )));
    }

    let columns = column_trees
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            load_column(column, registry, warnings).map_err(|err| {
                in_transformation(err.within(&format!("{}[{idx}]", common::COLUMNS_KEY)))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    common::assemble(
        VERSION,
        source_group_id,
        config_id,
        individual_specs,
        columns,
        intersection_indices,
        options,
    )
}

fn load_column<T, R>(
    tree: &SettingsTree,
    registry: &R,
    warnings: &mut Vec<ReconcileWarning>,
) -> Result<ColumnTransformation<T>, SettingsError>
where
    T: ExternalType,
    R: ConversionPathRegistry<T> + ?Sized,
{
    let external_spec = common::load_column_spec(&tree.get_child(EXTERNAL_SPEC_KEY)?)
        .map_err(|err| err.within(EXTERNAL_SPEC_KEY))?;
    let path_id = tree.get_string(CONVERSION_PATH_KEY)?;
    let conversion_path = common::resolve_path(registry, &path_id, &external_spec, warnings);
    Ok(ColumnTransformation {
        conversion_path,
        keep: tree.get_bool(KEEP_KEY)?,
        position: tree.get_usize(POSITION_KEY)?,
        output_name: tree.get_string(OUTPUT_NAME_KEY)?,
        external_spec,
    })
}
