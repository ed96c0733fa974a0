//! Highlight manager: memoized per-row/column/cell class lists driven by hover, active cell, and
//! selection state.

use ahash::HashMap;

use crate::column::ColumnDef;
use crate::instruction::Instruction;
use crate::row::Row;
use crate::selection::SelectionRange;

/// The context record handed to class-list callbacks.
pub struct HighlightContext<'a> {
    pub row_index: Option<i64>,
    pub col_index: Option<usize>,
    pub column: Option<&'a ColumnDef>,
    pub row_data: Option<&'a Row>,
    pub hover_position: Option<(i64, usize)>,
    pub active_cell: Option<(i64, usize)>,
    pub selection_range: Option<SelectionRange>,
    pub is_hovered: bool,
    pub is_active: bool,
    pub is_selected: bool,
}

pub type ClassCallback = dyn Fn(&HighlightContext) -> Vec<String> + Send + Sync;

fn selected_bounds(range: Option<SelectionRange>, active_cell: Option<(i64, usize)>) -> Option<(i64, i64, usize, usize)> {
    range.map(|r| r.normalized()).or(active_cell.map(|(r, c)| (r, r, c, c)))
}

/// Tracks hover/active/selection state and memoizes the derived class lists until the next
/// invalidation. Row-context `isHovered` is true for any cell in the hovered row, column-context
/// for any cell in the hovered column, cell-context only for the exact cell.
#[derive(Default)]
pub struct HighlightManager {
    hover: Option<(i64, usize)>,
    active_cell: Option<(i64, usize)>,
    selection_range: Option<SelectionRange>,

    row_cache: HashMap<i64, Vec<String>>,
    col_cache: HashMap<usize, Vec<String>>,
    cell_cache: HashMap<(i64, usize), Vec<String>>,
}

impl HighlightManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn invalidate(&mut self) {
        self.row_cache.clear();
        self.col_cache.clear();
        self.cell_cache.clear();
    }

    pub fn set_hover_position(&mut self, row: Option<i64>, col: Option<usize>) -> Instruction {
        self.hover = row.zip(col);
        self.invalidate();
        Instruction::SetHoverPosition { row, col }
    }

    /// Called by the façade whenever the active cell or selection range changes.
    pub fn sync_selection(&mut self, active_cell: Option<(i64, usize)>, selection_range: Option<SelectionRange>) {
        self.active_cell = active_cell;
        self.selection_range = selection_range;
        self.invalidate();
    }

    fn base_context<'a>(&self, row_index: Option<i64>, col_index: Option<usize>, column: Option<&'a ColumnDef>, row_data: Option<&'a Row>) -> HighlightContext<'a> {
        HighlightContext {
            row_index,
            col_index,
            column,
            row_data,
            hover_position: self.hover,
            active_cell: self.active_cell,
            selection_range: self.selection_range,
            is_hovered: false,
            is_active: false,
            is_selected: false,
        }
    }

    pub fn row_classes(&mut self, row_index: i64, row_data: &Row, callback: &ClassCallback) -> Vec<String> {
        if let Some(classes) = self.row_cache.get(&row_index) {
            return classes.clone();
        }
        let mut context = self.base_context(Some(row_index), None, None, Some(row_data));
        context.is_hovered = self.hover.is_some_and(|(r, _)| r == row_index);
        context.is_active = self.active_cell.is_some_and(|(r, _)| r == row_index);
        context.is_selected = selected_bounds(self.selection_range, self.active_cell)
            .is_some_and(|(min_row, max_row, _, _)| row_index >= min_row && row_index <= max_row);
        let classes = callback(&context);
        self.row_cache.insert(row_index, classes.clone());
        classes
    }

    pub fn column_classes(&mut self, col_index: usize, column: &ColumnDef, callback: &ClassCallback) -> Vec<String> {
        if let Some(classes) = self.col_cache.get(&col_index) {
            return classes.clone();
        }
        let mut context = self.base_context(None, Some(col_index), Some(column), None);
        context.is_hovered = self.hover.is_some_and(|(_, c)| c == col_index);
        context.is_active = self.active_cell.is_some_and(|(_, c)| c == col_index);
        context.is_selected = selected_bounds(self.selection_range, self.active_cell)
            .is_some_and(|(_, _, min_col, max_col)| col_index >= min_col && col_index <= max_col);
        let classes = callback(&context);
        self.col_cache.insert(col_index, classes.clone());
        classes
    }

    /// `override_callback`, when present, replaces the grid-level `default_callback` for this
    /// column entirely (caller-supplied callbacks are not composed).
    pub fn cell_classes(
        &mut self,
        row_index: i64,
        col_index: usize,
        row_data: &Row,
        column: &ColumnDef,
        default_callback: &ClassCallback,
        override_callback: Option<&ClassCallback>,
    ) -> Vec<String> {
        let key = (row_index, col_index);
        if let Some(classes) = self.cell_cache.get(&key) {
            return classes.clone();
        }
        let mut context = self.base_context(Some(row_index), Some(col_index), Some(column), Some(row_data));
        context.is_hovered = self.hover == Some((row_index, col_index));
        context.is_active = self.active_cell == Some((row_index, col_index));
        context.is_selected = selected_bounds(self.selection_range, self.active_cell).is_some_and(|(min_row, max_row, min_col, max_col)| {
            row_index >= min_row && row_index <= max_row && col_index >= min_col && col_index <= max_col
        });
        let callback = override_callback.unwrap_or(default_callback);
        let classes = callback(&context);
        self.cell_cache.insert(key, classes.clone());
        classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::CellDataType;
    use serde_json::json;

    fn no_classes(_: &HighlightContext) -> Vec<String> {
        Vec::new()
    }

    #[test]
    fn hover_changes_invalidate_cache_and_mark_row_hovered() {
        let mut mgr = HighlightManager::new();
        let row = Row::new(1, json!({}));
        let marker = |ctx: &HighlightContext| if ctx.is_hovered { vec!["hovered".to_string()] } else { vec![] };
        assert!(mgr.row_classes(5, &row, &marker).is_empty());
        mgr.set_hover_position(Some(5), Some(0));
        assert_eq!(mgr.row_classes(5, &row, &marker), vec!["hovered".to_string()]);
    }

    #[test]
    fn cell_hover_does_not_mark_a_different_cell_in_the_same_row() {
        let mut mgr = HighlightManager::new();
        let row = Row::new(1, json!({}));
        let column = ColumnDef::new("a", CellDataType::Text, 10.0);
        mgr.set_hover_position(Some(2), Some(0));
        let marker = |ctx: &HighlightContext| if ctx.is_hovered { vec!["hovered".to_string()] } else { vec![] };
        assert!(mgr.cell_classes(2, 1, &row, &column, &marker, None).is_empty());
    }

    #[test]
    fn selection_change_invalidates_previously_memoized_classes() {
        let mut mgr = HighlightManager::new();
        let row = Row::new(1, json!({}));
        let marker = |ctx: &HighlightContext| if ctx.is_active { vec!["active".to_string()] } else { vec![] };
        assert!(mgr.row_classes(0, &row, &marker).is_empty());
        mgr.sync_selection(Some((0, 0)), None);
        assert_eq!(mgr.row_classes(0, &row, &marker), vec!["active".to_string()]);
    }

    #[test]
    fn override_callback_replaces_rather_than_composes_default() {
        let mut mgr = HighlightManager::new();
        let row = Row::new(1, json!({}));
        let column = ColumnDef::new("a", CellDataType::Text, 10.0);
        let default_cb = |_: &HighlightContext| vec!["default".to_string()];
        let override_cb = |_: &HighlightContext| vec!["override".to_string()];
        assert_eq!(mgr.cell_classes(0, 0, &row, &column, &default_cb, Some(&override_cb)), vec!["override".to_string()]);
    }

    #[test]
    fn unhovered_cell_has_no_classes_from_default() {
        let mut mgr = HighlightManager::new();
        let row = Row::new(1, json!({}));
        let column = ColumnDef::new("a", CellDataType::Text, 10.0);
        assert!(mgr.cell_classes(0, 0, &row, &column, &no_classes, None).is_empty());
    }
}
