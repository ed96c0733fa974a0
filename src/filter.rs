//! Column filter model and the filter half of the sort/filter pipeline.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::column::ColumnDef;
use crate::row::Row;
use crate::value::CellValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combination {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOperator {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    StartsWith,
    EndsWith,
    Blank,
    NotBlank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Between,
    Blank,
    NotBlank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Between,
    Blank,
    NotBlank,
}

/// One filter condition; the evaluator dispatches on the variant.
#[derive(Debug, Clone)]
pub enum FilterCondition {
    Text {
        operator: TextOperator,
        value: Option<String>,
        selected_values: Option<Vec<String>>,
        include_blank: bool,
    },
    Number {
        operator: NumberOperator,
        value: Option<f64>,
        value_to: Option<f64>,
    },
    Date {
        operator: DateOperator,
        value: Option<DateTime<Utc>>,
        value_to: Option<DateTime<Utc>>,
    },
}

/// Per-column filter configuration: a set of conditions combined with AND or OR.
#[derive(Debug, Clone, Default)]
pub struct ColumnFilterModel {
    pub conditions: Vec<FilterCondition>,
    pub combination: Combination,
}

impl Default for Combination {
    fn default() -> Self {
        Combination::And
    }
}

/// The whole-grid filter model: one [`ColumnFilterModel`] per filtered column, keyed by `col_id`.
pub type FilterModel = HashMap<String, ColumnFilterModel>;

fn evaluate_text(op: TextOperator, cell: &CellValue, value: &Option<String>, selected: &Option<Vec<String>>, include_blank: bool) -> bool {
    let text = cell.to_display_string();
    let lower = text.to_lowercase();

    if let Some(values) = selected {
        if !values.is_empty() {
            let canonical = cell.to_canonical_string().to_lowercase();
            let matches_selected = values.iter().any(|v| v.to_lowercase() == canonical);
            let blank_ok = include_blank && cell.is_empty();
            return matches_selected || blank_ok;
        }
    }

    match op {
        TextOperator::Blank => cell.is_empty(),
        TextOperator::NotBlank => !cell.is_empty(),
        _ => {
            let Some(needle) = value.as_ref().map(|v| v.to_lowercase()) else {
                return true;
            };
            match op {
                TextOperator::Contains => lower.contains(&needle),
                TextOperator::NotContains => !lower.contains(&needle),
                TextOperator::Equals => lower == needle,
                TextOperator::NotEquals => lower != needle,
                TextOperator::StartsWith => lower.starts_with(&needle),
                TextOperator::EndsWith => lower.ends_with(&needle),
                TextOperator::Blank | TextOperator::NotBlank => unreachable!("handled above"),
            }
        }
    }
}

fn evaluate_number(op: NumberOperator, cell: &CellValue, value: Option<f64>, value_to: Option<f64>) -> bool {
    if matches!(op, NumberOperator::Blank) {
        return cell.is_empty();
    }
    if matches!(op, NumberOperator::NotBlank) {
        return !cell.is_empty();
    }
    let Some(n) = cell.parse_number() else { return false };
    match op {
        NumberOperator::Eq => value.is_some_and(|v| n == v),
        NumberOperator::Ne => value.is_some_and(|v| n != v),
        NumberOperator::Lt => value.is_some_and(|v| n < v),
        NumberOperator::Gt => value.is_some_and(|v| n > v),
        NumberOperator::Le => value.is_some_and(|v| n <= v),
        NumberOperator::Ge => value.is_some_and(|v| n >= v),
        NumberOperator::Between => match (value, value_to) {
            (Some(lo), Some(hi)) => n >= lo.min(hi) && n <= lo.max(hi),
            _ => false,
        },
        NumberOperator::Blank | NumberOperator::NotBlank => unreachable!("handled above"),
    }
}

fn evaluate_date(op: DateOperator, cell: &CellValue, value: Option<DateTime<Utc>>, value_to: Option<DateTime<Utc>>) -> bool {
    if matches!(op, DateOperator::Blank) {
        return cell.is_empty();
    }
    if matches!(op, DateOperator::NotBlank) {
        return !cell.is_empty();
    }
    let Some(instant) = cell.to_instant() else { return false };
    match op {
        DateOperator::Eq => value.is_some_and(|v| instant.date_naive() == v.date_naive()),
        DateOperator::Ne => value.is_some_and(|v| instant.date_naive() != v.date_naive()),
        DateOperator::Lt => value.is_some_and(|v| instant < v),
        DateOperator::Gt => value.is_some_and(|v| instant > v),
        DateOperator::Between => match (value, value_to) {
            (Some(lo), Some(hi)) => {
                let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
                instant >= lo && instant <= hi
            }
            _ => false,
        },
        DateOperator::Blank | DateOperator::NotBlank => unreachable!("handled above"),
    }
}

fn evaluate_condition(cell: &CellValue, condition: &FilterCondition) -> bool {
    match condition {
        FilterCondition::Text { operator, value, selected_values, include_blank } => {
            evaluate_text(*operator, cell, value, selected_values, *include_blank)
        }
        FilterCondition::Number { operator, value, value_to } => evaluate_number(*operator, cell, *value, *value_to),
        FilterCondition::Date { operator, value, value_to } => evaluate_date(*operator, cell, *value, *value_to),
    }
}

fn evaluate_column(cell: &CellValue, model: &ColumnFilterModel) -> bool {
    if model.conditions.is_empty() {
        return true;
    }
    match model.combination {
        Combination::And => model.conditions.iter().all(|c| evaluate_condition(cell, c)),
        Combination::Or => model.conditions.iter().any(|c| evaluate_condition(cell, c)),
    }
}

/// Resolves a `col_id` to the field path used to read the row. Columns with no conditions are
/// skipped entirely, so a missing column definition for a filter key with no conditions is
/// harmless.
fn field_for_col<'a>(columns: &'a [ColumnDef], col_id: &str) -> Option<&'a str> {
    columns.iter().find(|c| c.col_id == col_id).map(|c| c.field.as_str())
}

/// Applies every column's filter model to `rows`, AND-combined across columns, returning the
/// indices of rows that pass.
pub fn apply_filters(rows: &[Row], filter_model: &FilterModel, columns: &[ColumnDef]) -> Vec<usize> {
    let active: Vec<(&str, &ColumnFilterModel)> = filter_model
        .iter()
        .filter(|(_, model)| !model.conditions.is_empty())
        .filter_map(|(col_id, model)| field_for_col(columns, col_id).map(|field| (field, model)))
        .collect();

    if active.is_empty() {
        return (0..rows.len()).collect();
    }

    rows.iter()
        .enumerate()
        .filter_map(|(idx, row)| {
            let passes = active.iter().all(|(field, model)| {
                let cell = row.get_field(field);
                evaluate_column(&cell, model)
            });
            passes.then_some(idx)
        })
        .collect()
}
