//! Column specs observed in source items, and their union and intersection.
//!
//! The type parameter `T` is the reader's own type identifier. The core only
//! needs to compare, display and persist it, see [`ExternalType`].

use std::{collections::HashSet, fmt, hash::Hash};

use serde::{Serialize, de::DeserializeOwned};

use crate::error::SpecError;

pub trait ExternalType:
    Clone + Eq + Hash + fmt::Debug + fmt::Display + Serialize + DeserializeOwned
{
}

impl<T> ExternalType for T where
    T: Clone + Eq + Hash + fmt::Debug + fmt::Display + Serialize + DeserializeOwned
{
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnSpec<T> {
    pub name: Option<String>,
    pub column_type: T,
    /// `false` when the reader could not determine the type and `column_type`
    /// is only a placeholder.
    pub has_type: bool,
}

impl<T: ExternalType> ColumnSpec<T> {
    pub fn new(name: impl Into<String>, column_type: T) -> Self {
        ColumnSpec {
            name: Some(name.into()),
            column_type,
            has_type: true,
        }
    }

    pub fn untyped(name: impl Into<String>, column_type: T) -> Self {
        ColumnSpec {
            name: Some(name.into()),
            column_type,
            has_type: false,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    /// Identity used for matching: name and type, ignoring `has_type`.
    pub fn same_column(&self, other: &ColumnSpec<T>) -> bool {
        self.name == other.name && self.column_type == other.column_type
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableSpec<T> {
    pub columns: Vec<ColumnSpec<T>>,
}

impl<T: ExternalType> TableSpec<T> {
    pub fn new(columns: Vec<ColumnSpec<T>>) -> Self {
        TableSpec { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec<T>> {
        self.columns
            .iter()
            .find(|column| column.name.as_deref() == Some(name))
    }

    pub fn contains_name(&self, name: Option<&str>) -> bool {
        self.columns.iter().any(|column| column.name.as_deref() == name)
    }

    pub fn names(&self) -> Vec<Option<String>> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }
}

impl<T: ExternalType> FromIterator<ColumnSpec<T>> for TableSpec<T> {
    fn from_iter<I: IntoIterator<Item = ColumnSpec<T>>>(iter: I) -> Self {
        TableSpec::new(iter.into_iter().collect())
    }
}

/// Table specs keyed by source item id, in the order the sources were scanned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceSpecs<T> {
    entries: Vec<(String, TableSpec<T>)>,
}

impl<T: ExternalType> SourceSpecs<T> {
    pub fn new() -> Self {
        SourceSpecs {
            entries: Vec::new(),
        }
    }

    /// Adds or replaces the spec for `item`. A replaced item keeps its place.
    pub fn insert(&mut self, item: impl Into<String>, spec: TableSpec<T>) {
        let item = item.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == item) {
            Some((_, existing)) => *existing = spec,
            None => self.entries.push((item, spec)),
        }
    }

    pub fn get(&self, item: &str) -> Option<&TableSpec<T>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == item)
            .map(|(_, spec)| spec)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TableSpec<T>)> {
        self.entries.iter().map(|(item, spec)| (item.as_str(), spec))
    }

    pub fn items(&self) -> Vec<&str> {
        self.entries.iter().map(|(item, _)| item.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: ExternalType, S: Into<String>> FromIterator<(S, TableSpec<T>)> for SourceSpecs<T> {
    fn from_iter<I: IntoIterator<Item = (S, TableSpec<T>)>>(iter: I) -> Self {
        let mut specs = SourceSpecs::new();
        for (item, spec) in iter {
            specs.insert(item, spec);
        }
        specs
    }
}

/// First place where a source's spec differs from the first source's spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDisagreement {
    pub reference_item: String,
    pub source_item: String,
    pub column: String,
}

impl From<SourceDisagreement> for SpecError {
    fn from(disagreement: SourceDisagreement) -> Self {
        SpecError::SchemaMismatch {
            reference_item: disagreement.reference_item,
            source_item: disagreement.source_item,
            column: disagreement.column,
        }
    }
}

/// Union and intersection of the specs of all source items.
///
/// The union holds every column name once, in first-seen order across the
/// sources; when sources disagree on a column's type the first one wins. The
/// intersection keeps the union columns that every source contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSpec<T> {
    union: TableSpec<T>,
    intersection: TableSpec<T>,
    disagreement: Option<SourceDisagreement>,
}

impl<T: ExternalType> RawSpec<T> {
    pub fn from_sources(sources: &SourceSpecs<T>) -> Self {
        let mut seen: HashSet<Option<&str>> = HashSet::new();
        let mut union = Vec::new();
        for (_, spec) in sources.iter() {
            for column in &spec.columns {
                if seen.insert(column.name.as_deref()) {
                    union.push(column.clone());
                }
            }
        }

        let intersection = union
            .iter()
            .filter(|column| {
                sources
                    .iter()
                    .all(|(_, spec)| spec.contains_name(column.name.as_deref()))
            })
            .cloned()
            .collect();

        RawSpec {
            union: TableSpec::new(union),
            intersection: TableSpec::new(intersection),
            disagreement: first_disagreement(sources),
        }
    }

    pub fn union(&self) -> &TableSpec<T> {
        &self.union
    }

    pub fn intersection(&self) -> &TableSpec<T> {
        &self.intersection
    }

    pub fn in_intersection(&self, name: Option<&str>) -> bool {
        self.intersection.contains_name(name)
    }

    /// Positions of the intersection columns within the union.
    pub fn intersection_indices(&self) -> Vec<usize> {
        self.union
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| self.in_intersection(column.name.as_deref()))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// `Some` when at least two sources have differing specs.
    pub fn disagreement(&self) -> Option<&SourceDisagreement> {
        self.disagreement.as_ref()
    }

    pub fn ensure_identical_sources(&self) -> Result<(), SpecError> {
        match &self.disagreement {
            Some(disagreement) => Err(disagreement.clone().into()),
            None => Ok(()),
        }
    }
}

fn first_disagreement<T: ExternalType>(sources: &SourceSpecs<T>) -> Option<SourceDisagreement> {
    let mut entries = sources.iter();
    let (reference_item, reference) = entries.next()?;
    for (item, spec) in entries {
        if let Some(column) = first_difference(reference, spec) {
            return Some(SourceDisagreement {
                reference_item: reference_item.to_string(),
                source_item: item.to_string(),
                column,
            });
        }
    }
    None
}

fn first_difference<T: ExternalType>(left: &TableSpec<T>, right: &TableSpec<T>) -> Option<String> {
    let width = left.len().max(right.len());
    for idx in 0..width {
        match (left.columns.get(idx), right.columns.get(idx)) {
            (Some(a), Some(b)) if a.same_column(b) => continue,
            (Some(a), Some(b)) if a.name == b.name => {
                return Some(format!(
                    "column '{}' ({} vs {})",
                    a.display_name(),
                    a.column_type,
                    b.column_type
                ));
            }
            (Some(a), _) => {
                return Some(format!("column '{}' (position {})", a.display_name(), idx + 1));
            }
            (None, Some(b)) => {
                return Some(format!("column '{}' (position {})", b.display_name(), idx + 1));
            }
            (None, None) => unreachable!("index bounded by the longer spec"),
        }
    }
    None
}
