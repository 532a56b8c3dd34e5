pub mod cli;
pub mod config;
pub mod config_id;
pub mod error;
pub mod migrate;
pub mod path;
pub mod reconcile;
pub mod scan;
pub mod serialize;
pub mod settings;
pub mod show;
pub mod spec;
pub mod sync;
pub mod table;
pub mod transformation;
pub mod types;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info, warn};

use crate::{
    cli::{Cli, Commands, LegacyArgs},
    error::ReconcileWarning,
    serialize::{Loaded, TableSpecSerializer},
    settings::SettingsTree,
    types::{ColumnType, csv_registry},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_table_spec", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Scan(args) => handle_scan(&args),
        Commands::Sync(args) => sync::execute(&args),
        Commands::Show(args) => show::execute(&args),
        Commands::Migrate(args) => migrate::execute(&args),
    }
}

fn handle_scan(args: &cli::ScanArgs) -> Result<()> {
    let options = args.reader.scan_options();
    info!(
        "Scanning {} source(s) with delimiter '{}'",
        args.inputs.len(),
        printable_delimiter(options.delimiter)
    );
    for input in &args.inputs {
        let spec = scan::scan_source(input, &options)
            .with_context(|| format!("Scanning {input:?}"))?;
        println!("{}", scan::source_item(input));
        print!("{}", table::spec_table(&spec.columns));
        println!();
    }
    Ok(())
}

/// Reads a settings file of any layout version with the CSV registry.
pub(crate) fn load_settings(path: &Path, legacy: &LegacyArgs) -> Result<Loaded<ColumnType>> {
    let tree =
        SettingsTree::load(path).with_context(|| format!("Reading settings from {path:?}"))?;
    let registry = csv_registry();
    let loaded = TableSpecSerializer::new(&registry)
        .load(&tree, &legacy.load_parameters())
        .with_context(|| format!("Loading table spec from {path:?}"))?;
    info!("Loaded {} settings from {path:?}", loaded.version);
    summarize_warnings(&loaded.warnings, &format!("loading {path:?}"));
    Ok(loaded)
}

/// Each warning is logged where it arises; this adds one summary line.
pub(crate) fn summarize_warnings(warnings: &[ReconcileWarning], during: &str) {
    if !warnings.is_empty() {
        warn!("{} warning(s) while {during}", warnings.len());
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
