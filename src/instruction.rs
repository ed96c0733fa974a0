//! The instruction bus: a tagged-union event stream with synchronous, ordered fan-out to
//! listeners.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::row::RowId;
use crate::value::CellValue;

pub type SlotId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// One discrete, declarative instruction for the presentation adapter to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    CreateSlot { slot_id: SlotId },
    DestroySlot { slot_id: SlotId },
    AssignSlot { slot_id: SlotId, row_index: i64 },
    MoveSlot { slot_id: SlotId, translate_y: f64 },

    SetActiveCell { row: i64, col: usize },
    SetSelectionRange { start_row: i64, start_col: usize, end_row: i64, end_col: usize },
    ClearSelection,
    SetHoverPosition { row: Option<i64>, col: Option<usize> },
    UpdateVisibleRange { start: i64, end: i64 },

    StartEdit { row: i64, col: usize, initial_value: CellValue },
    StopEdit,
    CommitEdit { row: i64, col: usize, value: CellValue },

    SetContentSize { virtual_height: f64, rows_wrapper_offset: f64 },
    UpdateHeader,
    ColumnsChanged,
    ColumnResized { col_id: String, width: f64 },
    ColumnMoved { col_id: String, new_index: usize },

    OpenFilterPopup { col_id: String },
    CloseFilterPopup,

    FillStart { source_row: i64, source_col: usize },
    FillUpdate { row: i64, col: usize },
    FillCommit,
    FillCancel,

    DataLoading,
    DataLoaded { total_rows: usize },
    DataError { message: String },

    RowsAdded { ids: Vec<RowId> },
    RowsRemoved { ids: Vec<RowId> },
    RowsUpdated { ids: Vec<RowId> },
    TransactionProcessed { added: usize, removed: usize, updated: usize },

    RowDragStarted { row: i64 },
    RowDragEnded,
}

pub type ListenerId = u64;

type SingleListener = Box<dyn FnMut(&Instruction) + Send>;
type BatchListener = Box<dyn FnMut(&[Instruction]) + Send>;

/// Fans a synchronous stream of [`Instruction`]s out to registered listeners.
///
/// Emission is synchronous and never re-entrant from inside the bus itself: a listener must not
/// call back into `emit`/`emit_batch` while being invoked. Listener panics are caught and logged
/// so one bad listener cannot corrupt delivery to the rest.
#[derive(Default)]
pub struct InstructionBus {
    next_id: ListenerId,
    single_listeners: Vec<(ListenerId, SingleListener)>,
    batch_listeners: Vec<(ListenerId, BatchListener)>,
}

impl InstructionBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_instruction(&mut self, listener: impl FnMut(&Instruction) + Send + 'static) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.single_listeners.push((id, Box::new(listener)));
        id
    }

    pub fn on_batch(&mut self, listener: impl FnMut(&[Instruction]) + Send + 'static) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.batch_listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unregister(&mut self, id: ListenerId) {
        self.single_listeners.retain(|(lid, _)| *lid != id);
        self.batch_listeners.retain(|(lid, _)| *lid != id);
    }

    /// Delivers one instruction to every single-instruction listener (registration order) and
    /// every batch listener as a one-element batch.
    pub fn emit(&mut self, instruction: Instruction) {
        self.emit_batch(vec![instruction]);
    }

    /// Delivers `instructions` intact to batch listeners and iterated to single-instruction
    /// listeners. Empty batches are suppressed entirely.
    pub fn emit_batch(&mut self, instructions: Vec<Instruction>) {
        if instructions.is_empty() {
            return;
        }
        for (_, listener) in &mut self.single_listeners {
            for instruction in &instructions {
                if catch_unwind(AssertUnwindSafe(|| listener(instruction))).is_err() {
                    tracing::error!("instruction bus listener panicked on single-instruction delivery");
                }
            }
        }
        for (_, listener) in &mut self.batch_listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&instructions))).is_err() {
                tracing::error!("instruction bus listener panicked on batch delivery");
            }
        }
    }
}
