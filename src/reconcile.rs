//! Reconciliation of a saved transformation against a freshly scanned schema.
//!
//! Columns are matched by name and type. A match carries the user's choices
//! (keep, output name, conversion path) over verbatim; a name whose type
//! changed is treated as a new column, remembering the stale conversion path
//! for display only. Columns that vanished from the sources are dropped.
//! Newly seen columns are placed at the unknown-columns slot, which then moves
//! past them so later additions keep their discovery order.

use log::{debug, warn};

use crate::{
    error::{ReconcileWarning, SpecError},
    path::{ConversionPath, ConversionPathRegistry},
    spec::{ColumnSpec, ExternalType, RawSpec},
    transformation::{ColumnTransformation, MergeMode, TableTransformation},
};

/// One entry of a previously saved transformation, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviousEntry<T> {
    Column(PreviousColumn<T>),
    /// Placeholder for columns not seen yet. Its index among the entries is
    /// where such columns are inserted; `keep` is their default inclusion.
    UnknownColumns { keep: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousColumn<T> {
    pub name: Option<String>,
    pub column_type: T,
    pub keep: bool,
    pub output_name: String,
    pub conversion_path: ConversionPath<T>,
    /// Path the column had before its type last changed, copied to the
    /// report of a stable match. Saved transformations do not store it, so
    /// only entries built by a caller that still holds the previous reports
    /// carry one.
    pub original_conversion_path: Option<ConversionPath<T>>,
}

impl<T: ExternalType> PreviousEntry<T> {
    /// Entry for a saved column; `original_conversion_path` is left unset.
    pub fn from_transformation(column: &ColumnTransformation<T>) -> Self {
        PreviousEntry::Column(PreviousColumn {
            name: column.external_spec.name.clone(),
            column_type: column.external_spec.column_type.clone(),
            keep: column.keep,
            output_name: column.output_name.clone(),
            conversion_path: column.conversion_path.clone(),
            original_conversion_path: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnOrigin {
    /// Same name and type as a previous column; settings carried over.
    Stable,
    /// Same name as a previous column but a different type.
    TypeDrift,
    New,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnReport<T> {
    pub name: Option<String>,
    pub origin: ColumnOrigin,
    /// Conversion path the column had before its type drifted. Display only.
    pub original_conversion_path: Option<ConversionPath<T>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledColumns<T> {
    /// In union order.
    pub columns: Vec<ColumnTransformation<T>>,
    pub reports: Vec<ColumnReport<T>>,
    pub position_for_unknown_columns: usize,
    pub keep_unknown_columns: bool,
    pub warnings: Vec<ReconcileWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation<T> {
    pub transformation: TableTransformation<T>,
    pub reports: Vec<ColumnReport<T>>,
    pub warnings: Vec<ReconcileWarning>,
}

pub struct Reconciler<'a, R: ?Sized> {
    registry: &'a R,
}

impl<'a, R: ?Sized> Reconciler<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Reconciler { registry }
    }
}

impl<R: ?Sized> Reconciler<'_, R> {
    /// Produces the transformation for `raw_spec`, preserving as much of
    /// `previous` as still applies.
    ///
    /// When `existing_config_id_matches` is set and neither the raw spec nor
    /// the merge mode changed, `previous` is returned unchanged.
    pub fn reconcile<T>(
        &self,
        raw_spec: RawSpec<T>,
        previous: Option<&TableTransformation<T>>,
        merge_mode: MergeMode,
        existing_config_id_matches: bool,
    ) -> Result<Reconciliation<T>, SpecError>
    where
        T: ExternalType,
        R: ConversionPathRegistry<T>,
    {
        if merge_mode == MergeMode::Fail {
            raw_spec.ensure_identical_sources()?;
        }

        if let Some(previous) = previous
            && existing_config_id_matches
            && previous.raw_spec == raw_spec
            && previous.merge_mode == merge_mode
        {
            debug!("Raw spec unchanged for a compatible configuration; keeping transformation");
            let reports = previous
                .columns
                .iter()
                .map(|column| ColumnReport {
                    name: column.external_spec.name.clone(),
                    origin: ColumnOrigin::Stable,
                    original_conversion_path: None,
                })
                .collect();
            return Ok(Reconciliation {
                transformation: previous.clone(),
                reports,
                warnings: Vec::new(),
            });
        }

        let entries = previous
            .map(TableTransformation::previous_entries)
            .unwrap_or_default();
        let reconciled = self.reconcile_columns(&raw_spec, &entries, merge_mode)?;
        let transformation = TableTransformation {
            columns: reconciled.columns,
            raw_spec,
            merge_mode,
            position_for_unknown_columns: reconciled.position_for_unknown_columns,
            keep_unknown_columns: reconciled.keep_unknown_columns,
            enforce_types: previous.is_some_and(|previous| previous.enforce_types),
            skip_empty_columns: previous.is_some_and(|previous| previous.skip_empty_columns),
        };
        Ok(Reconciliation {
            transformation,
            reports: reconciled.reports,
            warnings: reconciled.warnings,
        })
    }

    /// Matches the union columns of `raw_spec` against `previous`, which is
    /// expected in output order with at most one unknown-columns placeholder.
    pub fn reconcile_columns<T>(
        &self,
        raw_spec: &RawSpec<T>,
        previous: &[PreviousEntry<T>],
        merge_mode: MergeMode,
    ) -> Result<ReconciledColumns<T>, SpecError>
    where
        T: ExternalType,
        R: ConversionPathRegistry<T>,
    {
        if merge_mode == MergeMode::Fail {
            raw_spec.ensure_identical_sources()?;
        }

        let placeholder_slot = previous
            .iter()
            .position(|entry| matches!(entry, PreviousEntry::UnknownColumns { .. }));
        let keep_unknown_columns = previous
            .iter()
            .find_map(|entry| match entry {
                PreviousEntry::UnknownColumns { keep } => Some(*keep),
                PreviousEntry::Column(_) => None,
            })
            .unwrap_or(true);

        let union = &raw_spec.union().columns;
        let mut consumed = vec![false; previous.len()];
        // Slot in `previous` for stable matches, `None` for columns placed at the unknown slot.
        let mut slots: Vec<Option<usize>> = Vec::with_capacity(union.len());
        let mut columns = Vec::with_capacity(union.len());
        let mut reports = Vec::with_capacity(union.len());
        let mut warnings = Vec::new();

        for column in union {
            if let Some(slot) = find_unconsumed(previous, &consumed, |entry| {
                entry.name == column.name && entry.column_type == column.column_type
            }) {
                consumed[slot] = true;
                let PreviousEntry::Column(entry) = &previous[slot] else {
                    unreachable!("find_unconsumed only yields columns");
                };
                let conversion_path =
                    self.checked_path(column, &entry.conversion_path, &mut warnings);
                columns.push(ColumnTransformation {
                    external_spec: column.clone(),
                    conversion_path,
                    keep: entry.keep,
                    position: 0,
                    output_name: entry.output_name.clone(),
                });
                reports.push(ColumnReport {
                    name: column.name.clone(),
                    origin: ColumnOrigin::Stable,
                    original_conversion_path: entry.original_conversion_path.clone(),
                });
                slots.push(Some(slot));
                continue;
            }

            let drifted = find_unconsumed(previous, &consumed, |entry| entry.name == column.name);
            let (origin, original_conversion_path) = match drifted {
                Some(slot) => {
                    consumed[slot] = true;
                    let PreviousEntry::Column(entry) = &previous[slot] else {
                        unreachable!("find_unconsumed only yields columns");
                    };
                    warn!(
                        "Column '{}' changed type from {} to {}",
                        column.display_name(),
                        entry.column_type,
                        column.column_type
                    );
                    warnings.push(ReconcileWarning::TypeDrift {
                        column: column.display_name().to_string(),
                        previous_type: entry.column_type.to_string(),
                        current_type: column.column_type.to_string(),
                    });
                    (ColumnOrigin::TypeDrift, Some(entry.conversion_path.clone()))
                }
                None => (ColumnOrigin::New, None),
            };
            let path = self.registry.default_path(&column.column_type);
            columns.push(ColumnTransformation::with_defaults(
                column.clone(),
                path,
                keep_unknown_columns,
                0,
            ));
            reports.push(ColumnReport {
                name: column.name.clone(),
                origin,
                original_conversion_path,
            });
            slots.push(None);
        }

        let unknown: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(idx, _)| idx)
            .collect();
        let mut stable: Vec<(usize, usize)> = slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.map(|slot| (slot, idx)))
            .collect();
        stable.sort_unstable();

        let insert_at = match placeholder_slot {
            Some(placeholder) => stable.iter().take_while(|(slot, _)| *slot < placeholder).count(),
            None => stable.len(),
        };
        let mut order: Vec<usize> = stable.iter().map(|(_, idx)| *idx).collect();
        order.splice(insert_at..insert_at, unknown.iter().copied());
        for (position, idx) in order.into_iter().enumerate() {
            columns[idx].position = position;
        }

        debug!(
            "Reconciled {} column(s): {} carried over, {} placed at slot {}",
            columns.len(),
            stable.len(),
            unknown.len(),
            insert_at
        );

        Ok(ReconciledColumns {
            columns,
            reports,
            position_for_unknown_columns: insert_at + unknown.len(),
            keep_unknown_columns,
            warnings,
        })
    }

    /// Returns `path` if the registry still knows it for this column's type,
    /// otherwise the type's default path plus a warning.
    fn checked_path<T>(
        &self,
        column: &ColumnSpec<T>,
        path: &ConversionPath<T>,
        warnings: &mut Vec<ReconcileWarning>,
    ) -> ConversionPath<T>
    where
        T: ExternalType,
        R: ConversionPathRegistry<T>,
    {
        match self.registry.resolve(path.id()) {
            Some(resolved) if resolved.source_type() == &column.column_type => path.clone(),
            _ => {
                let fallback = self.registry.default_path(&column.column_type);
                warn!(
                    "Conversion path '{}' of column '{}' is not registered; falling back to '{}'",
                    path.id(),
                    column.display_name(),
                    fallback.id()
                );
                warnings.push(ReconcileWarning::UnknownConversionPath {
                    column: column.display_name().to_string(),
                    path_id: path.id().to_string(),
                    fallback_id: fallback.id().to_string(),
                });
                fallback
            }
        }
    }
}

/// First entry not yet consumed that is a column satisfying `predicate`.
fn find_unconsumed<T, F>(
    previous: &[PreviousEntry<T>],
    consumed: &[bool],
    predicate: F,
) -> Option<usize>
where
    F: Fn(&PreviousColumn<T>) -> bool,
{
    previous.iter().enumerate().position(|(idx, entry)| {
        !consumed[idx] && matches!(entry, PreviousEntry::Column(column) if predicate(column))
    })
}
