//! V2 layout: like V3 but untagged, without `skip_empty_columns`, and with
//! the per-column settings kept in parallel arrays.
//!
//! ```yaml
//! source_group_id: orders
//! individual_specs: { a.csv: { columns: [ ... ] } }
//! table_transformation:
//!   external_specs: [ { name: id, has_type: true, type: Integer } ]
//!   conversion_paths: [ integer->integer ]
//!   keep: [ true ]
//!   positions: [ 0 ]
//!   output_names: [ id ]
//!   intersection_indices: [0]
//!   keep_unknown_columns: true
//!   position_for_unknown_columns: 1
//!   enforce_types: false
//!   column_filter_mode: UNION
//! ```

use itertools::izip;

use crate::{
    config::TableSpecConfig,
    error::{ReconcileWarning, SettingsError, SpecError},
    path::ConversionPathRegistry,
    settings::SettingsTree,
    spec::ExternalType,
    transformation::ColumnTransformation,
};

use super::{
    FormatVersion, LoadParameters, TABLE_TRANSFORMATION_KEY,
    common::{self, StoredOptions},
};

const VERSION: FormatVersion = FormatVersion::V2;

const EXTERNAL_SPECS_KEY: &str = "external_specs";
const CONVERSION_PATHS_KEY: &str = "conversion_paths";
const KEEP_KEY: &str = "keep";
const POSITIONS_KEY: &str = "positions";
const OUTPUT_NAMES_KEY: &str = "output_names";

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
    let skip_empty_columns =
        parameters
            .skip_empty_columns
            .ok_or(SpecError::MissingAdditionalParameter {
                version: VERSION,
                parameter: "skip_empty_columns",
            })?;

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
    let options = StoredOptions::load(&tree, skip_empty_columns).map_err(in_transformation)?;
    let intersection_indices = tree
        .get_usize_array(common::INTERSECTION_INDICES_KEY)
        .map_err(in_transformation)?;
    let columns = zip_columns(&tree, registry, warnings).map_err(in_transformation)?;

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

/// Rebuilds per-column records from the parallel arrays, matching by index.
fn zip_columns<T, R>(
    tree: &SettingsTree,
    registry: &R,
    warnings: &mut Vec<ReconcileWarning>,
) -> Result<Vec<ColumnTransformation<T>>, SettingsError>
where
    T: ExternalType,
    R: ConversionPathRegistry<T> + ?Sized,
{
    let external_specs = common::load_column_specs::<T>(tree, EXTERNAL_SPECS_KEY)?;
    let path_ids = tree.get_string_array(CONVERSION_PATHS_KEY)?;
    let keep = tree.get_bool_array(KEEP_KEY)?;
    let positions = tree.get_usize_array(POSITIONS_KEY)?;
    let output_names = tree.get_string_array(OUTPUT_NAMES_KEY)?;

    let expected = external_specs.len();
    for (key, len) in [
        (CONVERSION_PATHS_KEY, path_ids.len()),
        (KEEP_KEY, keep.len()),
        (POSITIONS_KEY, positions.len()),
        (OUTPUT_NAMES_KEY, output_names.len()),
    ] {
        if len != expected {
            return Err(SettingsError::new(
                key,
                format!("expected {expected} entries to match {EXTERNAL_SPECS_KEY}, found {len}"),
            ));
        }
    }

    Ok(izip!(external_specs, path_ids, keep, positions, output_names)
        .map(|(external_spec, path_id, keep, position, output_name)| {
            let conversion_path =
                common::resolve_path(registry, &path_id, &external_spec, warnings);
            ColumnTransformation {
                external_spec,
                conversion_path,
                keep,
                position,
                output_name,
            }
        })
        .collect())
}
