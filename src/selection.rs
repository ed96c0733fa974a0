//! Selection, focus movement, clipboard copy, and cell fill-drag.

use crate::column::ColumnDef;
use crate::instruction::{Direction, Instruction};
use crate::value::CellValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRange {
    pub start_row: i64,
    pub start_col: usize,
    pub end_row: i64,
    pub end_col: usize,
}

impl SelectionRange {
    /// Returns `(min_row, max_row, min_col, max_col)`, normalizing a range drawn in any
    /// direction.
    pub fn normalized(&self) -> (i64, i64, usize, usize) {
        let min_row = self.start_row.min(self.end_row);
        let max_row = self.start_row.max(self.end_row);
        let min_col = self.start_col.min(self.end_col);
        let max_col = self.start_col.max(self.end_col);
        (min_row, max_row, min_col, max_col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FillState {
    source_row: i64,
    source_col: usize,
    target_row: i64,
    target_col: usize,
}

/// Tracks the active cell, the current selection range, and any in-progress fill-drag.
#[derive(Default)]
pub struct SelectionManager {
    active_cell: Option<(i64, usize)>,
    range: Option<SelectionRange>,
    fill: Option<FillState>,
}

fn clamp_row(row: i64, total_rows: usize) -> i64 {
    if total_rows == 0 {
        0
    } else {
        row.clamp(0, total_rows as i64 - 1)
    }
}

fn clamp_col(col: usize, total_cols: usize) -> usize {
    if total_cols == 0 {
        0
    } else {
        col.min(total_cols - 1)
    }
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_cell(&self) -> Option<(i64, usize)> {
        self.active_cell
    }

    pub fn range(&self) -> Option<SelectionRange> {
        self.range
    }

    pub fn set_active_cell(&mut self, row: i64, col: usize, total_rows: usize, total_cols: usize) -> Instruction {
        let row = clamp_row(row, total_rows);
        let col = clamp_col(col, total_cols);
        self.active_cell = Some((row, col));
        self.range = None;
        Instruction::SetActiveCell { row, col }
    }

    pub fn set_selection_range(
        &mut self,
        start_row: i64,
        start_col: usize,
        end_row: i64,
        end_col: usize,
        total_rows: usize,
        total_cols: usize,
    ) -> Instruction {
        let range = SelectionRange {
            start_row: clamp_row(start_row, total_rows),
            start_col: clamp_col(start_col, total_cols),
            end_row: clamp_row(end_row, total_rows),
            end_col: clamp_col(end_col, total_cols),
        };
        self.range = Some(range);
        Instruction::SetSelectionRange {
            start_row: range.start_row,
            start_col: range.start_col,
            end_row: range.end_row,
            end_col: range.end_col,
        }
    }

    pub fn clear(&mut self) -> Instruction {
        self.active_cell = None;
        self.range = None;
        Instruction::ClearSelection
    }

    /// Moves the active cell one step in `direction`. When `extend` is set, grows (or seeds) the
    /// selection range instead of relocating the active cell.
    pub fn move_focus(&mut self, direction: Direction, extend: bool, total_rows: usize, total_cols: usize) -> Vec<Instruction> {
        let (row, col) = self.active_cell.unwrap_or((0, 0));
        let (delta_row, delta_col) = match direction {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        };
        let next_row = clamp_row(row + delta_row, total_rows);
        let next_col = clamp_col((col as i64 + delta_col).max(0) as usize, total_cols);

        if !extend {
            return vec![self.set_active_cell(next_row, next_col, total_rows, total_cols)];
        }

        let anchor = self.range.map_or((row, col), |r| (r.start_row, r.start_col));
        vec![self.set_selection_range(anchor.0, anchor.1, next_row, next_col, total_rows, total_cols)]
    }

    pub fn select_all(&mut self, total_rows: usize, total_cols: usize) -> Vec<Instruction> {
        if total_rows == 0 || total_cols == 0 {
            return vec![self.clear()];
        }
        vec![self.set_selection_range(0, 0, total_rows as i64 - 1, total_cols - 1, total_rows, total_cols)]
    }

    /// Serializes the current selection row-major, tab-separated columns, newline-separated
    /// rows. Falls back to the single active cell when no range is set.
    pub fn copy_selected_cells(&self, get_cell: impl Fn(i64, usize) -> CellValue) -> String {
        let (min_row, max_row, min_col, max_col) = match self.range {
            Some(range) => range.normalized(),
            None => match self.active_cell {
                Some((row, col)) => (row, row, col, col),
                None => return String::new(),
            },
        };

        let mut lines = Vec::with_capacity((max_row - min_row + 1).max(0) as usize);
        for row in min_row..=max_row {
            let cells: Vec<String> = (min_col..=max_col).map(|col| get_cell(row, col).to_display_string()).collect();
            lines.push(cells.join("\t"));
        }
        lines.join("\n")
    }

    pub fn start_fill(&mut self, row: i64, col: usize) -> Instruction {
        self.fill = Some(FillState { source_row: row, source_col: col, target_row: row, target_col: col });
        Instruction::FillStart { source_row: row, source_col: col }
    }

    pub fn update_fill_target(&mut self, row: i64, col: usize, total_rows: usize, total_cols: usize) -> Option<Instruction> {
        let fill = self.fill.as_mut()?;
        fill.target_row = clamp_row(row, total_rows);
        fill.target_col = clamp_col(col, total_cols);
        Some(Instruction::FillUpdate { row: fill.target_row, col: fill.target_col })
    }

    pub fn cancel_fill(&mut self) -> Instruction {
        self.fill = None;
        Instruction::FillCancel
    }

    /// Commits the fill, broadcasting the source column's value for its row into every other row
    /// of the rectangular hull. Returns `None` (discarding the fill, as if cancelled) when any
    /// column spanned by the fill is not editable.
    pub fn commit_fill(&mut self, columns: &[ColumnDef], get_cell: impl Fn(i64, usize) -> CellValue) -> Option<(Instruction, Vec<(i64, usize, CellValue)>)> {
        let fill = self.fill.take()?;
        let min_col = fill.source_col.min(fill.target_col);
        let max_col = fill.source_col.max(fill.target_col);
        if (min_col..=max_col).any(|c| !columns.get(c).is_some_and(|col| col.editable)) {
            return None;
        }

        let min_row = fill.source_row.min(fill.target_row);
        let max_row = fill.source_row.max(fill.target_row);
        let mut writes = Vec::new();
        for col in min_col..=max_col {
            let source_value = get_cell(fill.source_row, col);
            for row in min_row..=max_row {
                if row == fill.source_row {
                    continue;
                }
                writes.push((row, col, source_value.clone()));
            }
        }
        Some((Instruction::FillCommit, writes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(editable: bool) -> ColumnDef {
        let mut c = ColumnDef::new("f", crate::column::CellDataType::Text, 100.0);
        c.editable = editable;
        c
    }

    #[test]
    fn active_cell_clamps_to_bounds() {
        let mut sel = SelectionManager::new();
        let instruction = sel.set_active_cell(-5, 99, 10, 3);
        assert_eq!(instruction, Instruction::SetActiveCell { row: 0, col: 2 });
    }

    #[test]
    fn move_focus_extend_seeds_range_from_active_cell() {
        let mut sel = SelectionManager::new();
        sel.set_active_cell(2, 2, 10, 10);
        sel.move_focus(Direction::Right, true, 10, 10);
        let range = sel.range().unwrap();
        assert_eq!(range.normalized(), (2, 2, 2, 3));
    }

    #[test]
    fn copy_selected_cells_is_tab_and_newline_joined() {
        let mut sel = SelectionManager::new();
        sel.set_selection_range(0, 0, 1, 1, 5, 5);
        let grid = [["a", "b"], ["c", "d"]];
        let text = sel.copy_selected_cells(|r, c| CellValue::Text(grid[r as usize][c].to_string()));
        assert_eq!(text, "a\tb\nc\td");
    }

    #[test]
    fn fill_requires_every_spanned_column_editable() {
        let mut sel = SelectionManager::new();
        let columns = vec![col(true), col(false)];
        sel.start_fill(0, 0);
        sel.update_fill_target(3, 1, 10, 2);
        let result = sel.commit_fill(&columns, |_, _| CellValue::Int(1));
        assert!(result.is_none());
    }

    #[test]
    fn fill_broadcasts_source_column_value_down() {
        let mut sel = SelectionManager::new();
        let columns = vec![col(true)];
        sel.start_fill(0, 0);
        sel.update_fill_target(3, 0, 10, 1);
        let (instruction, writes) = sel.commit_fill(&columns, |_, _| CellValue::Int(7)).unwrap();
        assert_eq!(instruction, Instruction::FillCommit);
        assert_eq!(writes.len(), 3);
        assert!(writes.iter().all(|(_, _, v)| *v == CellValue::Int(7)));
    }

    proptest::proptest! {
        /// Invariant 10: for any `activeCell`, `0 <= row < totalRows` and `0 <= col < columnCount`.
        #[test]
        fn active_cell_always_clamped_into_bounds(
            row in -1_000_000i64..1_000_000,
            col in 0usize..10_000,
            total_rows in 1usize..10_000,
            total_cols in 1usize..100,
        ) {
            let mut sel = SelectionManager::new();
            sel.set_active_cell(row, col, total_rows, total_cols);
            let (r, c) = sel.active_cell().unwrap();
            proptest::prop_assert!(r >= 0 && (r as usize) < total_rows);
            proptest::prop_assert!(c < total_cols);
        }
    }
}
