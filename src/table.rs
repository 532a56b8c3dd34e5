//! Plain-text tables for printing transformations and output specs.

use std::fmt::{self, Write as _};

use crate::{
    reconcile::{ColumnOrigin, ColumnReport},
    spec::{ColumnSpec, ExternalType},
    transformation::{OutputColumn, TableTransformation},
};

const GAP: &str = "  ";

#[derive(Debug, Clone, Default)]
pub struct TextTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TextTable {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Cells beyond the header count are dropped; missing cells render empty.
    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| cell_width(h).max(3)).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell_width(cell));
            }
        }
        widths
    }
}

impl fmt::Display for TextTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();
        let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
        write_line(f, &self.headers, &widths)?;
        write_line(f, &rule, &widths)?;
        for row in &self.rows {
            write_line(f, row, &widths)?;
        }
        Ok(())
    }
}

fn write_line(f: &mut fmt::Formatter<'_>, cells: &[String], widths: &[usize]) -> fmt::Result {
    let mut line = String::new();
    for (idx, &width) in widths.iter().enumerate() {
        if idx > 0 {
            line.push_str(GAP);
        }
        let cell = cells.get(idx).map(|cell| single_line(cell)).unwrap_or_default();
        let _ = write!(line, "{cell:<width$}");
    }
    writeln!(f, "{}", line.trim_end())
}

fn single_line(value: &str) -> String {
    value.replace(['\n', '\r', '\t'], " ")
}

fn cell_width(value: &str) -> usize {
    value.chars().count()
}

/// One row per column in output order, with the unknown-columns slot shown
/// where newly discovered columns would go. `reports`, in union order as a
/// reconciliation returns them, annotates drifted and new columns.
pub fn transformation_table<T: ExternalType>(
    transformation: &TableTransformation<T>,
    reports: &[ColumnReport<T>],
) -> TextTable {
    let mut table = TextTable::new([
        "position", "column", "type", "conversion", "output", "keep", "note",
    ]);
    let mut order: Vec<usize> = (0..transformation.columns.len()).collect();
    order.sort_by_key(|idx| transformation.columns[*idx].position);
    let slot = transformation.position_for_unknown_columns.min(order.len());
    for (position, idx) in order.iter().enumerate() {
        if position == slot {
            table.push_row(unknown_slot_row(transformation.keep_unknown_columns));
        }
        let column = &transformation.columns[*idx];
        table.push_row(vec![
            position.to_string(),
            column.external_spec.display_name().to_string(),
            type_label(&column.external_spec),
            column.conversion_path.to_string(),
            column.output_name.clone(),
            yes_no(transformation.is_selected(column)),
            reports.get(*idx).map(note).unwrap_or_default(),
        ]);
    }
    if slot == order.len() {
        table.push_row(unknown_slot_row(transformation.keep_unknown_columns));
    }
    table
}

pub fn output_table<T: ExternalType>(columns: &[OutputColumn<T>]) -> TextTable {
    let mut table = TextTable::new(["output", "source column", "type", "conversion"]);
    for column in columns {
        table.push_row(vec![
            column.name.clone(),
            column.source.display_name().to_string(),
            type_label(&column.source),
            column.conversion_path.to_string(),
        ]);
    }
    table
}

pub fn spec_table<T: ExternalType>(columns: &[ColumnSpec<T>]) -> TextTable {
    let mut table = TextTable::new(["#", "column", "type"]);
    for (idx, column) in columns.iter().enumerate() {
        table.push_row(vec![
            idx.to_string(),
            column.display_name().to_string(),
            type_label(column),
        ]);
    }
    table
}

fn unknown_slot_row(keep: bool) -> Vec<String> {
    vec![
        "*".to_string(),
        "<unknown columns>".to_string(),
        String::new(),
        String::new(),
        String::new(),
        yes_no(keep),
    ]
}

fn type_label<T: ExternalType>(column: &ColumnSpec<T>) -> String {
    if column.has_type {
        column.column_type.to_string()
    } else {
        format!("({})", column.column_type)
    }
}

fn note<T: ExternalType>(report: &ColumnReport<T>) -> String {
    match (report.origin, &report.original_conversion_path) {
        (ColumnOrigin::Stable, _) => String::new(),
        (ColumnOrigin::New, _) => "new".to_string(),
        (ColumnOrigin::TypeDrift, Some(original)) => format!("type changed, was {original}"),
        (ColumnOrigin::TypeDrift, None) => "type changed".to_string(),
    }
}

fn yes_no(value: bool) -> String {
    let label = if value { "yes" } else { "no" };
    label.to_string()
}
