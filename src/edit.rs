//! Cell edit lifecycle: start, live update, commit, cancel.

use crate::column::ColumnDef;
use crate::instruction::Instruction;
use crate::value::CellValue;

struct EditState {
    row: i64,
    col: usize,
    current_value: CellValue,
}

/// At most one cell is being edited at a time. Holding `EditState` here rather than threading an
/// `Option` through every call site keeps commit/cancel atomic: the state is taken exactly once,
/// either to write or to discard.
#[derive(Default)]
pub struct EditManager {
    state: Option<EditState>,
}

impl EditManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_editing(&self) -> bool {
        self.state.is_some()
    }

    pub fn editing_cell(&self) -> Option<(i64, usize)> {
        self.state.as_ref().map(|s| (s.row, s.col))
    }

    /// No-op (returns `None`) when the column is not editable or does not exist.
    pub fn start_edit(&mut self, row: i64, col: usize, columns: &[ColumnDef], current_value: CellValue) -> Option<Instruction> {
        if !columns.get(col).is_some_and(|c| c.editable) {
            return None;
        }
        self.state = Some(EditState { row, col, current_value: current_value.clone() });
        Some(Instruction::StartEdit { row, col, initial_value: current_value })
    }

    /// Updates the in-progress value. Emits nothing -- the presentation adapter owns the live
    /// rendering of the in-flight edit.
    pub fn update_edit_value(&mut self, value: CellValue) {
        if let Some(state) = &mut self.state {
            state.current_value = value;
        }
    }

    /// Takes the edit state, returning `(row, col, value)` to write back through the data store
    /// plus the `COMMIT_EDIT`, `STOP_EDIT` instruction pair. `None` when nothing was being edited.
    pub fn commit_edit(&mut self) -> Option<(i64, usize, CellValue, [Instruction; 2])> {
        let state = self.state.take()?;
        let instructions = [
            Instruction::CommitEdit { row: state.row, col: state.col, value: state.current_value.clone() },
            Instruction::StopEdit,
        ];
        Some((state.row, state.col, state.current_value, instructions))
    }

    /// Discards the in-progress edit without writing. `None` when nothing was being edited.
    pub fn cancel_edit(&mut self) -> Option<Instruction> {
        self.state.take()?;
        Some(Instruction::StopEdit)
    }
}
