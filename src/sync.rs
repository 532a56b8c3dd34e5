use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::SyncArgs,
    config::TableSpecConfig,
    load_settings,
    reconcile::{ColumnOrigin, Reconciler},
    scan,
    serialize::TableSpecSerializer,
    spec::RawSpec,
    summarize_warnings, table,
    transformation::MergeMode,
    types::csv_registry,
};

pub fn execute(args: &SyncArgs) -> Result<()> {
    let options = args.reader.scan_options();
    let config_id = options.config_id();
    let individual_specs =
        scan::scan_sources(&args.inputs, &options).context("Scanning CSV sources")?;

    let previous = if args.settings.exists() {
        Some(load_settings(&args.settings, &args.legacy)?.config)
    } else {
        info!("No settings at {:?}; starting from defaults", args.settings);
        None
    };

    let merge_mode = args
        .merge_mode
        .map(MergeMode::from)
        .or_else(|| previous.as_ref().map(|config| config.transformation().merge_mode))
        .unwrap_or_default();
    let source_group_id = args
        .source_group
        .clone()
        .or_else(|| previous.as_ref().map(|config| config.source_group_id().to_string()))
        .unwrap_or_else(|| default_group_id(&args.settings));
    let config_id_matches = previous
        .as_ref()
        .is_some_and(|config| config.is_config_for(&config_id));

    let registry = csv_registry();
    let raw_spec = RawSpec::from_sources(&individual_specs);
    let reconciliation = Reconciler::new(&registry)
        .reconcile(
            raw_spec,
            previous.as_ref().map(TableSpecConfig::transformation),
            merge_mode,
            config_id_matches,
        )
        .with_context(|| format!("Reconciling sources of '{source_group_id}'"))?;
    summarize_warnings(&reconciliation.warnings, "reconciling");

    let count = |origin: ColumnOrigin| {
        reconciliation
            .reports
            .iter()
            .filter(|report| report.origin == origin)
            .count()
    };
    info!(
        "Reconciled {} column(s) in {merge_mode} mode: {} new, {} with a changed type",
        reconciliation.transformation.columns.len(),
        count(ColumnOrigin::New),
        count(ColumnOrigin::TypeDrift)
    );

    let rendered =
        table::transformation_table(&reconciliation.transformation, &reconciliation.reports);
    let config = TableSpecConfig::new(
        source_group_id,
        config_id,
        individual_specs,
        reconciliation.transformation,
    )?;
    print!("{rendered}");

    if args.dry_run {
        info!("Dry run; {:?} left untouched", args.settings);
        return Ok(());
    }
    let tree = TableSpecSerializer::new(&registry).save(&config)?;
    tree.save(&args.settings)
        .with_context(|| format!("Writing settings to {:?}", args.settings))?;
    info!(
        "Settings for '{}' ({}) written to {:?}",
        config.source_group_id(),
        config.config_id().fingerprint(),
        args.settings
    );
    Ok(())
}

fn default_group_id(settings: &Path) -> String {
    settings
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "default".to_string())
}
