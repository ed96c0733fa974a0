use thiserror::Error;

/// Errors raised by the grid core.
///
/// Bounds violations (bad row/column indices, empty ranges) are never represented here -- per the
/// core's error handling design they are clamped or turned into no-ops at the call site instead of
/// being surfaced as an error.
#[derive(Debug, Error, Clone)]
pub enum GridError {
    /// An inconsistent set of construction options (e.g. `on_cell_value_changed` without
    /// `get_row_id`). Reported synchronously; the grid is never constructed.
    #[error("invalid grid configuration: {0}")]
    Configuration(String),

    /// Propagated from a `DataSource::fetch` failure. The façade turns this into a
    /// `Instruction::DataError` rather than letting it escape a public method.
    #[error("data source error: {0}")]
    DataSource(String),

    /// A parallel-sort worker task failed. The pool respawns a replacement; the in-flight sort
    /// falls back to a synchronous comparator sort (numeric path) or is rethrown to the façade
    /// (string/multi-key paths), which then surfaces `Instruction::DataError`.
    #[error("sort worker error: {0}")]
    Worker(String),
}

pub type GridResult<T> = Result<T, GridError>;
