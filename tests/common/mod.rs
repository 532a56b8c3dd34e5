#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use csv_table_spec::{
    spec::{ColumnSpec, RawSpec, SourceSpecs, TableSpec},
    types::ColumnType,
};
use proptest::prelude::*;
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch directory that is removed when dropped.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.join(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }

    /// Copies a fixture into the workspace so tests may rewrite it.
    pub fn copy_fixture(&self, name: &str) -> PathBuf {
        let path = self.join(name);
        fs::copy(fixture_path(name), &path).expect("copy fixture");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.join(name)).expect("read temp file")
    }
}

pub fn column(name: &str, column_type: ColumnType) -> ColumnSpec<ColumnType> {
    ColumnSpec::new(name, column_type)
}

pub fn table(columns: &[(&str, ColumnType)]) -> TableSpec<ColumnType> {
    columns
        .iter()
        .map(|(name, column_type)| column(name, *column_type))
        .collect()
}

pub fn sources(entries: &[(&str, &[(&str, ColumnType)])]) -> SourceSpecs<ColumnType> {
    entries
        .iter()
        .map(|(item, columns)| (*item, table(columns)))
        .collect()
}

pub fn raw(entries: &[(&str, &[(&str, ColumnType)])]) -> RawSpec<ColumnType> {
    RawSpec::from_sources(&sources(entries))
}

pub const NAMES: [&str; 6] = ["id", "name", "amount", "note", "created", "flag"];

/// Widest generated source: every name plus one unnamed column.
pub const MAX_COLUMNS: usize = NAMES.len() + 1;

fn column_strategy(idx: usize) -> impl Strategy<Value = ColumnSpec<ColumnType>> {
    (prop::sample::select(ColumnType::ALL.to_vec()), any::<bool>()).prop_map(
        move |(column_type, untyped)| ColumnSpec {
            name: NAMES.get(idx).map(|name| name.to_string()),
            column_type: if untyped { ColumnType::String } else { column_type },
            has_type: !untyped,
        },
    )
}

/// A shuffled subset of the known names, with random types and some
/// untyped or unnamed columns.
pub fn source_strategy() -> impl Strategy<Value = TableSpec<ColumnType>> {
    prop::sample::subsequence((0..MAX_COLUMNS).collect::<Vec<_>>(), 1..=MAX_COLUMNS)
        .prop_shuffle()
        .prop_flat_map(|indices| indices.into_iter().map(column_strategy).collect::<Vec<_>>())
        .prop_map(TableSpec::new)
}

pub fn sources_strategy() -> impl Strategy<Value = SourceSpecs<ColumnType>> {
    prop::collection::vec(source_strategy(), 1..4).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(idx, spec)| (format!("source_{idx}.csv"), spec))
            .collect()
    })
}
