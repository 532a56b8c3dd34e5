//! Reads CSV sources and infers a column spec for each of them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;
use uuid::Uuid;

use crate::{
    config_id::ConfigId,
    printable_delimiter,
    spec::{ColumnSpec, SourceSpecs, TableSpec},
    types::ColumnType,
};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];
const BOOLEAN_TOKENS: &[&str] = &["true", "false", "t", "f", "yes", "no", "y", "n"];

/// Reader settings. Two scans with equal options produce comparable specs,
/// so they double as the configuration identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub delimiter: u8,
    pub has_headers: bool,
    /// Rows inspected per source; 0 reads everything.
    pub sample_rows: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            delimiter: b',',
            has_headers: true,
            sample_rows: 2000,
        }
    }
}

impl ScanOptions {
    pub fn config_id(&self) -> ConfigId {
        ConfigId::placeholder()
            .with("delimiter", printable_delimiter(self.delimiter))
            .with("has_headers", self.has_headers)
            .with("sample_rows", self.sample_rows)
    }
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    non_empty: usize,
    possible_boolean: bool,
    possible_integer: bool,
    possible_float: bool,
    possible_date: bool,
    possible_datetime: bool,
    possible_time: bool,
    possible_guid: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        TypeCandidate {
            non_empty: 0,
            possible_boolean: true,
            possible_integer: true,
            possible_float: true,
            possible_date: true,
            possible_datetime: true,
            possible_time: true,
            possible_guid: true,
        }
    }

    fn observe(&mut self, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        self.non_empty += 1;
        if self.possible_boolean {
            let lowered = value.to_ascii_lowercase();
            self.possible_boolean = BOOLEAN_TOKENS.contains(&lowered.as_str());
        }
        if self.possible_integer {
            self.possible_integer = value.parse::<i64>().is_ok();
        }
        if self.possible_float {
            self.possible_float = value.parse::<f64>().is_ok();
        }
        if self.possible_date {
            self.possible_date = DATE_FORMATS
                .iter()
                .any(|fmt| NaiveDate::parse_from_str(value, fmt).is_ok());
        }
        if self.possible_datetime {
            self.possible_datetime = DATETIME_FORMATS
                .iter()
                .any(|fmt| NaiveDateTime::parse_from_str(value, fmt).is_ok());
        }
        if self.possible_time {
            self.possible_time = TIME_FORMATS
                .iter()
                .any(|fmt| NaiveTime::parse_from_str(value, fmt).is_ok());
        }
        if self.possible_guid {
            let bare = value.trim_matches(|c| matches!(c, '{' | '}'));
            self.possible_guid = Uuid::parse_str(bare).is_ok();
        }
    }

    /// `None` when no value was seen.
    fn decide(&self) -> Option<ColumnType> {
        if self.non_empty == 0 {
            return None;
        }
        let decided = if self.possible_boolean {
            ColumnType::Boolean
        } else if self.possible_integer {
            ColumnType::Integer
        } else if self.possible_float {
            ColumnType::Float
        } else if self.possible_date {
            ColumnType::Date
        } else if self.possible_datetime {
            ColumnType::DateTime
        } else if self.possible_time {
            ColumnType::Time
        } else if self.possible_guid {
            ColumnType::Guid
        } else {
            ColumnType::String
        };
        Some(decided)
    }
}

/// Infers the column spec of one CSV file. Without headers the columns are
/// named `field_0`, `field_1`, ... up to the widest sampled row.
pub fn scan_source(path: &Path, options: &ScanOptions) -> Result<TableSpec<ColumnType>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(options.has_headers)
        .delimiter(options.delimiter)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Opening CSV file {path:?}"))?;

    let names: Option<Vec<String>> = if options.has_headers {
        let headers = reader
            .headers()
            .with_context(|| format!("Reading headers of {path:?}"))?;
        Some(headers.iter().map(|name| name.trim().to_string()).collect())
    } else {
        None
    };
    let mut candidates = vec![TypeCandidate::new(); names.as_ref().map_or(0, Vec::len)];

    let mut record = csv::StringRecord::new();
    let mut processed = 0usize;
    while options.sample_rows == 0 || processed < options.sample_rows {
        let more = reader
            .read_record(&mut record)
            .with_context(|| format!("Reading row {} of {path:?}", processed + 1))?;
        if !more {
            break;
        }
        if names.is_none() && record.len() > candidates.len() {
            candidates.resize(record.len(), TypeCandidate::new());
        }
        for (candidate, field) in candidates.iter_mut().zip(record.iter()) {
            candidate.observe(field);
        }
        processed += 1;
    }
    debug!(
        "Sampled {processed} row(s) across {} column(s) of {path:?}",
        candidates.len()
    );

    let columns = candidates
        .iter()
        .enumerate()
        .map(|(idx, candidate)| {
            let name = match &names {
                Some(names) => names.get(idx).cloned(),
                None => Some(format!("field_{idx}")),
            };
            match candidate.decide() {
                Some(column_type) => ColumnSpec {
                    name,
                    column_type,
                    has_type: true,
                },
                None => ColumnSpec {
                    name,
                    column_type: ColumnType::String,
                    has_type: false,
                },
            }
        })
        .collect();
    Ok(columns)
}

/// Scans every file, keyed by its path as given.
pub fn scan_sources(paths: &[PathBuf], options: &ScanOptions) -> Result<SourceSpecs<ColumnType>> {
    let mut specs = SourceSpecs::new();
    for path in paths {
        let spec = scan_source(path, options)?;
        specs.insert(source_item(path), spec);
    }
    Ok(specs)
}

pub fn source_item(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use tempfile::{TempDir, tempdir};

    use super::*;

    fn write_csv(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).expect("write csv");
        path
    }

    fn typed(name: &str, column_type: ColumnType) -> ColumnSpec<ColumnType> {
        ColumnSpec::new(name, column_type)
    }

    #[test]
    fn scan_infers_types_in_priority_order() {
        let dir = tempdir().expect("temp dir");
        let path = write_csv(
            &dir,
            "orders.csv",
            "flag,id,amount,ordered_on,shipped_at,cutoff,ref,note\n\
             yes,1,1.5,2024-01-02,2024-01-02 10:00:00,10:15,{67e55044-10b1-426f-9247-bb680e5fe0c8},hi\n\
             no,2,3,2024-02-03,2024-02-03T11:30:00,23:59:59,67e55044-10b1-426f-9247-bb680e5fe0c9,x\n",
        );
        let spec = scan_source(&path, &ScanOptions::default()).expect("scan");
        assert_eq!(
            spec.columns,
            vec![
                typed("flag", ColumnType::Boolean),
                typed("id", ColumnType::Integer),
                typed("amount", ColumnType::Float),
                typed("ordered_on", ColumnType::Date),
                typed("shipped_at", ColumnType::DateTime),
                typed("cutoff", ColumnType::Time),
                typed("ref", ColumnType::Guid),
                typed("note", ColumnType::String),
            ]
        );
    }

    #[test]
    fn columns_without_values_are_untyped() {
        let dir = tempdir().expect("temp dir");
        let path = write_csv(&dir, "sparse.csv", "id,comment\n1,\n2,  \n");
        let spec = scan_source(&path, &ScanOptions::default()).expect("scan");
        assert_eq!(spec.columns[1], ColumnSpec::untyped("comment", ColumnType::String));
        assert!(spec.columns[0].has_type);
    }

    #[test]
    fn sampling_stops_after_the_requested_rows() {
        let dir = tempdir().expect("temp dir");
        let path = write_csv(&dir, "late.csv", "value\n1\n2\nthree\n");
        let options = ScanOptions {
            sample_rows: 2,
            ..ScanOptions::default()
        };
        let spec = scan_source(&path, &options).expect("scan");
        assert_eq!(spec.columns[0].column_type, ColumnType::Integer);

        let full = ScanOptions {
            sample_rows: 0,
            ..ScanOptions::default()
        };
        let spec = scan_source(&path, &full).expect("scan");
        assert_eq!(spec.columns[0].column_type, ColumnType::String);
    }

    #[test]
    fn headerless_sources_get_positional_names() {
        let dir = tempdir().expect("temp dir");
        let path = write_csv(&dir, "raw.csv", "1;a\n2;b;true\n");
        let options = ScanOptions {
            delimiter: b';',
            has_headers: false,
            ..ScanOptions::default()
        };
        let spec = scan_source(&path, &options).expect("scan");
        assert_eq!(spec.len(), 3);
        assert_eq!(
            spec.names(),
            vec![
                Some("field_0".to_string()),
                Some("field_1".to_string()),
                Some("field_2".to_string())
            ]
        );
        assert_eq!(spec.columns[0].column_type, ColumnType::Integer);
        assert_eq!(spec.columns[2].column_type, ColumnType::Boolean);
    }

    #[test]
    fn scan_sources_keeps_argument_order() {
        let dir = tempdir().expect("temp dir");
        let b = write_csv(&dir, "b.csv", "x\n1\n");
        let a = write_csv(&dir, "a.csv", "y\nfoo\n");
        let specs = scan_sources(&[b.clone(), a.clone()], &ScanOptions::default()).expect("scan");
        assert_eq!(specs.items(), vec![source_item(&b).as_str(), source_item(&a).as_str()]);
    }

    #[test]
    fn config_id_reflects_reader_settings() {
        let comma = ScanOptions::default().config_id();
        let tab = ScanOptions {
            delimiter: b'\t',
            ..ScanOptions::default()
        }
        .config_id();
        assert_eq!(comma.get("delimiter"), Some(","));
        assert_eq!(tab.get("delimiter"), Some("\\t"));
        assert!(!comma.is_compatible(&tab));
        assert!(comma.is_compatible(&ScanOptions::default().config_id()));
    }
}
