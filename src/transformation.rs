//! The user-editable mapping from raw columns to output columns.
//!
//! A [`TableTransformation`] holds one [`ColumnTransformation`] per union
//! column, stored in union order. The output order is given by each column's
//! `position`; `position_for_unknown_columns` marks the slot where columns
//! discovered later are inserted.

use std::{fmt, str::FromStr};

use anyhow::anyhow;

use crate::{
    error::SpecError,
    path::{ConversionPath, ConversionPathRegistry},
    reconcile::PreviousEntry,
    spec::{ColumnSpec, ExternalType, RawSpec},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Reject sources whose specs differ.
    Fail,
    #[default]
    Union,
    Intersection,
}

impl MergeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMode::Fail => "FAIL",
            MergeMode::Union => "UNION",
            MergeMode::Intersection => "INTERSECTION",
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "FAIL" => Ok(MergeMode::Fail),
            "UNION" => Ok(MergeMode::Union),
            "INTERSECTION" => Ok(MergeMode::Intersection),
            _ => Err(anyhow!(
                "Unknown merge mode '{value}'. Expected FAIL, UNION or INTERSECTION"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnTransformation<T> {
    pub external_spec: ColumnSpec<T>,
    pub conversion_path: ConversionPath<T>,
    pub keep: bool,
    /// Zero-based position in the output.
    pub position: usize,
    pub output_name: String,
}

impl<T: ExternalType> ColumnTransformation<T> {
    pub fn with_defaults(
        external_spec: ColumnSpec<T>,
        conversion_path: ConversionPath<T>,
        keep: bool,
        position: usize,
    ) -> Self {
        let output_name = external_spec.name.clone().unwrap_or_default();
        ColumnTransformation {
            external_spec,
            conversion_path,
            keep,
            position,
            output_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn<T> {
    pub name: String,
    pub source: ColumnSpec<T>,
    pub conversion_path: ConversionPath<T>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTransformation<T> {
    pub columns: Vec<ColumnTransformation<T>>,
    pub raw_spec: RawSpec<T>,
    pub merge_mode: MergeMode,
    pub position_for_unknown_columns: usize,
    pub keep_unknown_columns: bool,
    pub enforce_types: bool,
    pub skip_empty_columns: bool,
}

impl<T: ExternalType> TableTransformation<T> {
    /// Transformation a freshly configured reader starts from: every column
    /// kept under its own name with its default conversion, in union order.
    pub fn defaults<R>(raw_spec: RawSpec<T>, merge_mode: MergeMode, registry: &R) -> Self
    where
        R: ConversionPathRegistry<T> + ?Sized,
    {
        let columns: Vec<ColumnTransformation<T>> = raw_spec
            .union()
            .columns
            .iter()
            .enumerate()
            .map(|(position, column)| {
                let path = registry.default_path(&column.column_type);
                ColumnTransformation::with_defaults(column.clone(), path, true, position)
            })
            .collect();
        TableTransformation {
            position_for_unknown_columns: columns.len(),
            columns,
            raw_spec,
            merge_mode,
            keep_unknown_columns: true,
            enforce_types: false,
            skip_empty_columns: false,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnTransformation<T>> {
        self.columns
            .iter()
            .find(|column| column.external_spec.name.as_deref() == Some(name))
    }

    pub fn columns_by_position(&self) -> Vec<&ColumnTransformation<T>> {
        let mut ordered: Vec<&ColumnTransformation<T>> = self.columns.iter().collect();
        ordered.sort_by_key(|column| column.position);
        ordered
    }

    /// Whether a column takes part in the output under the current merge mode.
    pub fn is_selected(&self, column: &ColumnTransformation<T>) -> bool {
        column.keep
            && (self.merge_mode != MergeMode::Intersection
                || self.raw_spec.in_intersection(column.external_spec.name.as_deref()))
    }

    /// Columns of the output table, in output order.
    pub fn output_columns(&self) -> Vec<OutputColumn<T>> {
        self.columns_by_position()
            .into_iter()
            .filter(|column| self.is_selected(column))
            .map(|column| OutputColumn {
                name: column.output_name.clone(),
                source: column.external_spec.clone(),
                conversion_path: column.conversion_path.clone(),
            })
            .collect()
    }

    /// Flattens the transformation into the entry list the reconciler
    /// consumes: columns in output order with the unknown-columns placeholder
    /// at its slot.
    pub fn previous_entries(&self) -> Vec<PreviousEntry<T>> {
        let mut entries: Vec<PreviousEntry<T>> = self
            .columns_by_position()
            .into_iter()
            .map(PreviousEntry::from_transformation)
            .collect();
        let slot = self.position_for_unknown_columns.min(entries.len());
        entries.insert(
            slot,
            PreviousEntry::UnknownColumns {
                keep: self.keep_unknown_columns,
            },
        );
        entries
    }

    /// Checks that columns line up with the raw spec's union and that the
    /// positions form a permutation.
    pub fn validate(&self) -> Result<(), SpecError> {
        let union = &self.raw_spec.union().columns;
        if union.len() != self.columns.len() {
            return Err(SpecError::InvalidTransformation(format!(
                "{} column transformation(s) for {} union column(s)",
                self.columns.len(),
                union.len()
            )));
        }
        let mut seen_positions = vec![false; self.columns.len()];
        for (idx, (column, raw)) in self.columns.iter().zip(union).enumerate() {
            if !column.external_spec.same_column(raw) {
                return Err(SpecError::InvalidTransformation(format!(
                    "column {} is '{}' ({}) but the union has '{}' ({})",
                    idx + 1,
                    column.external_spec.display_name(),
                    column.external_spec.column_type,
                    raw.display_name(),
                    raw.column_type
                )));
            }
            if column.conversion_path.source_type() != &column.external_spec.column_type {
                return Err(SpecError::InvalidTransformation(format!(
                    "conversion path '{}' of column '{}' starts at {} instead of {}",
                    column.conversion_path.id(),
                    column.external_spec.display_name(),
                    column.conversion_path.source_type(),
                    column.external_spec.column_type
                )));
            }
            match seen_positions.get_mut(column.position) {
                Some(seen) if !*seen => *seen = true,
                _ => {
                    return Err(SpecError::InvalidTransformation(format!(
                        "position {} of column '{}' is out of range or duplicated",
                        column.position,
                        column.external_spec.display_name()
                    )));
                }
            }
        }
        if self.position_for_unknown_columns > self.columns.len() {
            return Err(SpecError::InvalidTransformation(format!(
                "position for unknown columns {} exceeds column count {}",
                self.position_for_unknown_columns,
                self.columns.len()
            )));
        }
        Ok(())
    }
}
