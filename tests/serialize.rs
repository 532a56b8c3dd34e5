mod common;

use std::fs;

use common::{MAX_COLUMNS, fixture_path, raw, sources, sources_strategy};
use csv_table_spec::{
    config::TableSpecConfig,
    config_id::ConfigId,
    error::{ReconcileWarning, SpecError},
    path::ConversionPathRegistry,
    reconcile::Reconciler,
    serialize::{FormatVersion, LoadParameters, TableSpecSerializer},
    settings::SettingsTree,
    spec::RawSpec,
    transformation::{MergeMode, TableTransformation},
    types::{ColumnType, csv_registry},
};
use proptest::prelude::*;

use ColumnType::{Float, Integer, String as Text};

fn fixture(name: &str) -> SettingsTree {
    let yaml = fs::read_to_string(fixture_path(name)).expect("read fixture");
    SettingsTree::from_yaml_str(&yaml).expect("parse fixture")
}

fn sample_config() -> TableSpecConfig<ColumnType> {
    let registry = csv_registry();
    let individual = sources(&[
        ("jan.csv", &[("id", Integer), ("amount", Float), ("note", Text)]),
        ("feb.csv", &[("id", Integer), ("region", Text)]),
    ]);
    let mut transformation = TableTransformation::defaults(
        RawSpec::from_sources(&individual),
        MergeMode::Intersection,
        &registry,
    );
    transformation.columns[0].output_name = "order_id".to_string();
    transformation.columns[1].conversion_path =
        registry.resolve("float->string").expect("registered");
    transformation.columns[2].keep = false;
    transformation.columns[0].position = 3;
    transformation.columns[3].position = 0;
    transformation.position_for_unknown_columns = 1;
    transformation.keep_unknown_columns = false;
    transformation.enforce_types = true;
    transformation.skip_empty_columns = true;
    TableSpecConfig::new(
        "orders",
        ConfigId::placeholder().with("delimiter", ",").with("sample_rows", 100),
        individual,
        transformation,
    )
    .expect("valid config")
}

#[test]
fn current_layout_round_trips_through_yaml() {
    let registry = csv_registry();
    let serializer = TableSpecSerializer::new(&registry);
    let config = sample_config();

    let tree = serializer.save(&config).expect("save");
    let yaml = tree.to_yaml_string().expect("yaml");
    assert!(yaml.starts_with("version: V3"));
    assert!(yaml.contains("num_columns: 4"));

    let reloaded = SettingsTree::from_yaml_str(&yaml).expect("parse");
    let loaded = serializer
        .load::<ColumnType>(&reloaded, &LoadParameters::new())
        .expect("load");
    assert_eq!(loaded.version, FormatVersion::V3);
    assert!(loaded.warnings.is_empty());
    assert_eq!(loaded.config, config);
}

#[test]
fn reconciled_transformations_survive_save_and_load() {
    let registry = csv_registry();
    let individual = sources(&[
        ("a.csv", &[("intCol", Integer), ("stringCol", Text)]),
        ("b.csv", &[("stringCol", Text), ("extra", Float)]),
    ]);
    let reconciliation = Reconciler::new(&registry)
        .reconcile(RawSpec::from_sources(&individual), None, MergeMode::Union, false)
        .expect("reconcile");
    let config = TableSpecConfig::new(
        "group",
        ConfigId::placeholder(),
        individual,
        reconciliation.transformation,
    )
    .expect("valid");

    let serializer = TableSpecSerializer::new(&registry);
    let tree = serializer.save(&config).expect("save");
    assert!(!tree.contains("config_id"));
    let loaded = serializer
        .load::<ColumnType>(&tree, &LoadParameters::new())
        .expect("load");
    assert_eq!(loaded.config, config);
    assert!(loaded.config.config_id().is_placeholder());
}

#[test]
fn legacy_layout_migrates_with_documented_rules() {
    let registry = csv_registry();
    let serializer = TableSpecSerializer::new(&registry);
    let loaded = serializer
        .load::<ColumnType>(
            &fixture("legacy_v1.yml"),
            &LoadParameters::new().with_merge_mode(MergeMode::Intersection),
        )
        .expect("load");
    assert_eq!(loaded.version, FormatVersion::V1);
    assert!(loaded.warnings.is_empty());

    let config = &loaded.config;
    assert_eq!(config.source_group_id(), "orders");
    assert!(config.config_id().is_placeholder());
    assert_eq!(config.individual_specs().items(), vec!["jan.csv", "feb.csv"]);

    let transformation = config.transformation();
    let union: Vec<Option<String>> = config.raw_spec().union().names();
    assert_eq!(
        union,
        ["id", "customer", "amount", "region"]
            .map(|name| Some(name.to_string()))
            .to_vec()
    );
    assert_eq!(config.raw_spec().intersection_indices(), vec![0, 2]);

    let id = transformation.column("id").expect("id");
    assert_eq!((id.position, id.keep), (0, true));
    assert_eq!(id.conversion_path.id(), "integer->integer");

    let amount = transformation.column("amount").expect("amount");
    assert_eq!((amount.position, amount.keep), (1, true));
    assert_eq!(amount.external_spec.column_type, Integer);
    assert_eq!(amount.conversion_path.id(), "integer->float");

    for (name, position) in [("customer", 2), ("region", 3)] {
        let column = transformation.column(name).expect("excluded column");
        assert_eq!(column.position, position);
        assert!(!column.keep);
        assert!(!column.external_spec.has_type);
        assert_eq!(column.conversion_path, registry.default_path(&Text));
    }

    assert_eq!(transformation.position_for_unknown_columns, 4);
    assert!(transformation.keep_unknown_columns);
    assert!(!transformation.enforce_types);
    assert!(!transformation.skip_empty_columns);
    assert_eq!(transformation.merge_mode, MergeMode::Intersection);
}

#[test]
fn legacy_migration_is_idempotent() {
    let registry = csv_registry();
    let serializer = TableSpecSerializer::new(&registry);
    let parameters = LoadParameters::new().with_merge_mode(MergeMode::Union);
    let first = serializer
        .load::<ColumnType>(&fixture("legacy_v1.yml"), &parameters)
        .expect("first load");
    let saved = serializer.save(&first.config).expect("save");
    let second = serializer
        .load::<ColumnType>(&saved, &LoadParameters::new())
        .expect("second load");
    assert_eq!(second.version, FormatVersion::V3);
    assert_eq!(second.config.transformation(), first.config.transformation());
    assert_eq!(serializer.save(&second.config).expect("save again"), saved);
}

#[test]
fn legacy_layout_requires_the_merge_mode() {
    let registry = csv_registry();
    let err = TableSpecSerializer::new(&registry)
        .load::<ColumnType>(&fixture("legacy_v1.yml"), &LoadParameters::new())
        .unwrap_err();
    assert_eq!(
        err,
        SpecError::MissingAdditionalParameter {
            version: FormatVersion::V1,
            parameter: "merge_mode",
        }
    );
}

#[test]
fn legacy_unknown_path_falls_back_with_a_warning() {
    let registry = csv_registry();
    let yaml = fs::read_to_string(fixture_path("legacy_v1.yml"))
        .expect("read fixture")
        .replace("integer->float", "integer->roman");
    let tree = SettingsTree::from_yaml_str(&yaml).expect("parse");
    let loaded = TableSpecSerializer::new(&registry)
        .load::<ColumnType>(&tree, &LoadParameters::new().with_merge_mode(MergeMode::Union))
        .expect("load");
    let amount = loaded.config.transformation().column("amount").expect("amount");
    assert!(amount.keep);
    assert_eq!(amount.position, 1);
    assert_eq!(amount.conversion_path.id(), "string->string");
    assert_eq!(
        loaded.warnings,
        vec![ReconcileWarning::UnknownConversionPath {
            column: "amount".to_string(),
            path_id: "integer->roman".to_string(),
            fallback_id: "string->string".to_string(),
        }]
    );
}

#[test]
fn intermediate_layout_zips_parallel_arrays() {
    let registry = csv_registry();
    let serializer = TableSpecSerializer::new(&registry);
    let loaded = serializer
        .load::<ColumnType>(
            &fixture("intermediate_v2.yml"),
            &LoadParameters::new().with_skip_empty_columns(true),
        )
        .expect("load");
    assert_eq!(loaded.version, FormatVersion::V2);

    let config = &loaded.config;
    assert_eq!(config.config_id().get("delimiter"), Some(","));
    let transformation = config.transformation();
    assert!(transformation.skip_empty_columns);
    assert!(transformation.enforce_types);
    assert!(!transformation.keep_unknown_columns);
    assert_eq!(transformation.merge_mode, MergeMode::Intersection);

    let id = &transformation.columns[0];
    assert_eq!(id.output_name, "order_id");
    assert_eq!(id.position, 1);
    assert_eq!(id.conversion_path.id(), "integer->string");
    let note = &transformation.columns[1];
    assert!(!note.keep);
    assert_eq!(note.position, 0);
    assert!(!note.external_spec.has_type);

    let outputs: Vec<String> = config.output_spec().into_iter().map(|column| column.name).collect();
    assert_eq!(outputs, vec!["order_id"]);

    let resaved = serializer.save(config).expect("save");
    let reloaded = serializer
        .load::<ColumnType>(&resaved, &LoadParameters::new())
        .expect("reload");
    assert_eq!(&reloaded.config, config);
}

#[test]
fn intermediate_layout_requires_skip_empty_columns() {
    let registry = csv_registry();
    let err = TableSpecSerializer::new(&registry)
        .load::<ColumnType>(&fixture("intermediate_v2.yml"), &LoadParameters::new())
        .unwrap_err();
    assert_eq!(
        err,
        SpecError::MissingAdditionalParameter {
            version: FormatVersion::V2,
            parameter: "skip_empty_columns",
        }
    );
}

#[test]
fn intermediate_arrays_of_different_lengths_are_malformed() {
    let registry = csv_registry();
    let yaml = fs::read_to_string(fixture_path("intermediate_v2.yml"))
        .expect("read fixture")
        .replace("keep: [true, false]", "keep: [true]");
    let tree = SettingsTree::from_yaml_str(&yaml).expect("parse");
    let err = TableSpecSerializer::new(&registry)
        .load::<ColumnType>(&tree, &LoadParameters::new().with_skip_empty_columns(false))
        .unwrap_err();
    match err {
        SpecError::MalformedSettings { version, key, .. } => {
            assert_eq!(version, FormatVersion::V2);
            assert_eq!(key, "table_transformation.keep");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn unknown_version_tag_is_rejected() {
    let registry = csv_registry();
    let mut tree = fixture("intermediate_v2.yml");
    tree.set_string("version", "V7");
    let err = TableSpecSerializer::new(&registry)
        .load::<ColumnType>(&tree, &LoadParameters::new())
        .unwrap_err();
    assert_eq!(
        err,
        SpecError::UnsupportedFormatVersion {
            tag: "V7".to_string()
        }
    );
}

#[test]
fn missing_entries_are_reported_with_their_key() {
    let registry = csv_registry();
    let serializer = TableSpecSerializer::new(&registry);
    let mut tree = serializer.save(&sample_config()).expect("save");
    let mut transformation = tree.get_child("table_transformation").expect("child");
    transformation.set_usize("num_columns", 9);
    tree.set_child("table_transformation", transformation);

    let err = serializer
        .load::<ColumnType>(&tree, &LoadParameters::new())
        .unwrap_err();
    assert!(matches!(
        err,
        SpecError::MalformedSettings { version: FormatVersion::V3, ref key, .. }
            if key == "table_transformation.columns"
    ));

    let bare = SettingsTree::from_yaml_str("source_group_id: orders\n").expect("parse");
    assert!(matches!(
        serializer.load::<ColumnType>(&bare, &LoadParameters::new()),
        Err(SpecError::MalformedSettings { .. })
    ));
}

#[test]
fn stored_columns_must_match_the_individual_specs() {
    let registry = csv_registry();
    let serializer = TableSpecSerializer::new(&registry);
    let mut tree = serializer.save(&sample_config()).expect("save");
    let mut transformation = tree.get_child("table_transformation").expect("child");
    transformation.set_usize_array("intersection_indices", &[1]);
    tree.set_child("table_transformation", transformation);
    let err = serializer
        .load::<ColumnType>(&tree, &LoadParameters::new())
        .unwrap_err();
    assert!(matches!(err, SpecError::MalformedSettings { version: FormatVersion::V3, .. }));
}

#[test]
fn output_spec_for_a_source_reports_its_own_columns() {
    let registry = csv_registry();
    let config = sample_config();
    let jan: Vec<String> = config
        .output_spec_for("jan.csv", &registry)
        .expect("jan")
        .into_iter()
        .map(|column| column.name)
        .collect();
    assert_eq!(jan, vec!["order_id"]);
    assert_eq!(
        config.output_spec_for("mar.csv", &registry).unwrap_err(),
        SpecError::UnknownSource("mar.csv".to_string())
    );
    assert!(config.is_config_for(&ConfigId::placeholder().with("delimiter", ",")));
    assert!(!config.is_config_for(&ConfigId::placeholder().with("delimiter", ";")));
}

#[test]
fn output_spec_for_a_source_with_its_own_type_uses_that_types_path() {
    let registry = csv_registry();
    let individual = sources(&[
        ("a.csv", &[("id", Integer), ("label", Text)]),
        ("b.csv", &[("id", Text), ("label", Text)]),
    ]);
    let mut transformation = TableTransformation::defaults(
        RawSpec::from_sources(&individual),
        MergeMode::Union,
        &registry,
    );
    transformation.columns[0].conversion_path =
        registry.resolve("integer->float").expect("registered");
    let config = TableSpecConfig::new("ids", ConfigId::placeholder(), individual, transformation)
        .expect("valid config");

    let own = config.output_spec_for("b.csv", &registry).expect("b");
    assert_eq!(own[0].source.column_type, Text);
    assert_eq!(own[0].conversion_path.id(), "string->string");
    for column in &own {
        assert_eq!(column.conversion_path.source_type(), &column.source.column_type);
    }

    let union_typed = config.output_spec_for("a.csv", &registry).expect("a");
    assert_eq!(union_typed[0].source.column_type, Integer);
    assert_eq!(union_typed[0].conversion_path.id(), "integer->float");
}

#[test]
fn enforced_types_keep_the_union_path_for_every_source() {
    let registry = csv_registry();
    let individual = sources(&[("a.csv", &[("id", Integer)]), ("b.csv", &[("id", Text)])]);
    let mut transformation = TableTransformation::defaults(
        RawSpec::from_sources(&individual),
        MergeMode::Union,
        &registry,
    );
    transformation.enforce_types = true;
    let config = TableSpecConfig::new("ids", ConfigId::placeholder(), individual, transformation)
        .expect("valid config");

    let columns = config.output_spec_for("b.csv", &registry).expect("b");
    assert_eq!(columns[0].source.column_type, Integer);
    assert_eq!(columns[0].conversion_path.id(), "integer->integer");
}

#[test]
fn raw_spec_helper_matches_config_raw_spec() {
    let config = sample_config();
    let expected = raw(&[
        ("jan.csv", &[("id", Integer), ("amount", Float), ("note", Text)]),
        ("feb.csv", &[("id", Integer), ("region", Text)]),
    ]);
    assert_eq!(config.raw_spec(), &expected);
}

proptest! {
    #[test]
    fn reconciled_configs_round_trip_through_yaml(
        before in sources_strategy(),
        after in sources_strategy(),
        keeps in prop::collection::vec(any::<bool>(), MAX_COLUMNS),
        renames in prop::collection::vec(any::<bool>(), MAX_COLUMNS),
        path_choices in prop::collection::vec(0usize..8, MAX_COLUMNS),
        rotation in 0usize..MAX_COLUMNS,
        slot in 0usize..=MAX_COLUMNS,
        keep_unknown in any::<bool>(),
        intersection_only in any::<bool>(),
        enforce_types in any::<bool>(),
        skip_empty_columns in any::<bool>(),
        with_config_id in any::<bool>(),
    ) {
        let registry = csv_registry();
        let reconciler = Reconciler::new(&registry);
        let merge_mode = if intersection_only { MergeMode::Intersection } else { MergeMode::Union };

        let mut edited = reconciler
            .reconcile(RawSpec::from_sources(&before), None, merge_mode, false)
            .expect("first reconcile")
            .transformation;
        let width = edited.columns.len();
        for (idx, column) in edited.columns.iter_mut().enumerate() {
            column.keep = keeps[idx];
            if renames[idx] {
                column.output_name = format!("renamed_{idx}");
            }
            let paths = registry.available_paths(&column.external_spec.column_type);
            column.conversion_path = paths[path_choices[idx] % paths.len()].clone();
            column.position = (idx + rotation) % width;
        }
        edited.position_for_unknown_columns = slot.min(width);
        edited.keep_unknown_columns = keep_unknown;
        edited.enforce_types = enforce_types;
        edited.skip_empty_columns = skip_empty_columns;
        edited.validate().expect("edited transformation is valid");

        let reconciled = reconciler
            .reconcile(RawSpec::from_sources(&after), Some(&edited), merge_mode, false)
            .expect("second reconcile")
            .transformation;
        let config_id = if with_config_id {
            ConfigId::placeholder().with("delimiter", ",").with("has_headers", true)
        } else {
            ConfigId::placeholder()
        };
        let config = TableSpecConfig::new("generated", config_id, after, reconciled)
            .expect("reconciled config is valid");

        let serializer = TableSpecSerializer::new(&registry);
        let yaml = serializer
            .save(&config)
            .expect("save")
            .to_yaml_string()
            .expect("yaml");
        let tree = SettingsTree::from_yaml_str(&yaml).expect("parse");
        let loaded = serializer
            .load::<ColumnType>(&tree, &LoadParameters::new())
            .expect("load");
        prop_assert_eq!(loaded.version, FormatVersion::V3);
        prop_assert!(loaded.warnings.is_empty());
        prop_assert_eq!(loaded.config, config);
    }
}
