use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{scan::ScanOptions, serialize::LoadParameters, transformation::MergeMode};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Keep a table transformation in step with the CSV sources it reads",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan CSV sources and print the column spec inferred for each
    Scan(ScanArgs),
    /// Scan sources and reconcile them with the saved transformation
    Sync(SyncArgs),
    /// Print the transformation stored in a settings file
    Show(ShowArgs),
    /// Rewrite a settings file of any version in the current layout
    Migrate(MigrateArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum MergeModeArg {
    Fail,
    Union,
    Intersection,
}

impl From<MergeModeArg> for MergeMode {
    fn from(value: MergeModeArg) -> Self {
        match value {
            MergeModeArg::Fail => MergeMode::Fail,
            MergeModeArg::Union => MergeMode::Union,
            MergeModeArg::Intersection => MergeMode::Intersection,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ReaderArgs {
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter, default_value = ",")]
    pub delimiter: u8,
    /// Number of rows to sample when inferring types (0 means full scan)
    #[arg(long, default_value_t = 2000)]
    pub sample_rows: usize,
    /// Treat the first row as data and leave columns unnamed
    #[arg(long = "no-headers")]
    pub no_headers: bool,
}

impl ReaderArgs {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            delimiter: self.delimiter,
            has_headers: !self.no_headers,
            sample_rows: self.sample_rows,
        }
    }
}

/// Values settings files written by older releases did not record.
#[derive(Debug, Clone, Default, Args)]
pub struct LegacyArgs {
    /// Merge mode to assume for V1 settings files
    #[arg(long = "legacy-merge-mode", value_enum)]
    pub legacy_merge_mode: Option<MergeModeArg>,
    /// skip_empty_columns to assume for V1 and V2 settings files
    #[arg(long = "skip-empty-columns")]
    pub skip_empty_columns: Option<bool>,
}

impl LegacyArgs {
    pub fn load_parameters(&self) -> LoadParameters {
        LoadParameters {
            merge_mode: self.legacy_merge_mode.map(MergeMode::from),
            skip_empty_columns: self.skip_empty_columns,
        }
    }
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// CSV sources to scan
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    #[command(flatten)]
    pub reader: ReaderArgs,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// CSV sources making up the table
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Settings file holding the transformation; created when missing
    #[arg(short, long)]
    pub settings: PathBuf,
    /// How differing source schemas are merged (defaults to the saved mode, else union)
    #[arg(long = "merge-mode", value_enum)]
    pub merge_mode: Option<MergeModeArg>,
    /// Identifier of the source group (defaults to the saved one, else the settings file stem)
    #[arg(long = "source-group")]
    pub source_group: Option<String>,
    /// Print the reconciled transformation without writing the settings file
    #[arg(long = "dry-run")]
    pub dry_run: bool,
    #[command(flatten)]
    pub reader: ReaderArgs,
    #[command(flatten)]
    pub legacy: LegacyArgs,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Settings file to read
    #[arg(short, long)]
    pub settings: PathBuf,
    /// Print the output columns of one source instead of the full transformation
    #[arg(long)]
    pub source: Option<String>,
    /// Print the output columns instead of the full transformation
    #[arg(long = "output-spec")]
    pub output_spec: bool,
    #[command(flatten)]
    pub legacy: LegacyArgs,
}

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Settings file to read
    #[arg(short, long)]
    pub settings: PathBuf,
    /// Destination file (defaults to rewriting the settings file in place)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub legacy: LegacyArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" | "\\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
