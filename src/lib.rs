//! A headless, framework-agnostic virtualized data-grid engine for very large tabular datasets.
//!
//! [`GridCore`] is the orchestrator: it owns the indexed row cache, the sort/filter pipeline, the
//! scroll/slot virtualization, selection, fill, inline editing and highlight state, and drives
//! them from a small set of public operations. Every state change is surfaced as an
//! [`Instruction`] on the grid's [`InstructionBus`] -- the core itself renders nothing; a
//! presentation layer subscribes to instructions and reacts to them.
//!
//! Rows are supplied through the [`DataSource`]/[`MutableDataSource`] boundary. [`InMemoryDataSource`]
//! is a ready-made implementation backed by the core's own [`IndexedDataStore`] and
//! [`TransactionManager`] for callers who don't need a remote backend.

mod column;
mod config;
mod datasource;
mod edit;
mod error;
mod facade;
mod filter;
mod highlight;
mod instruction;
mod parallel_sort;
mod row;
mod scroll;
mod selection;
mod slot_pool;
mod sort;
mod store;
mod transaction;
mod value;

pub use column::{CellDataType, ColumnDef};
pub use config::{GetRowId, GridConfig, GridConfigBuilder, OnCellValueChanged};
pub use datasource::{
    DataSource, FetchRequest, FetchResponse, InMemoryDataSource, MutableDataSource, Pagination,
    SourceChange, SubscriptionId,
};
pub use edit::EditManager;
pub use error::{GridError, GridResult};
pub use facade::GridCore;
pub use filter::{Combination, ColumnFilterModel, DateOperator, FilterCondition, FilterModel, NumberOperator, TextOperator, apply_filters};
pub use highlight::{ClassCallback, HighlightContext, HighlightManager};
pub use instruction::{Direction, Instruction, InstructionBus, ListenerId, SlotId};
pub use parallel_sort::{ParallelSortEngine, MIN_CHUNK_SIZE, PARALLEL_THRESHOLD, parallel_or_sequential_sort};
pub use row::{Row, RowId, json_to_value, value_to_json};
pub use scroll::{ContentGeometry, Viewport, MAX_SCROLL_HEIGHT};
pub use selection::{SelectionManager, SelectionRange};
pub use slot_pool::{Slot, SlotPool, DEFAULT_OVERSCAN};
pub use sort::{SortDirection, SortKey, SortModel, apply_sort};
pub use store::IndexedDataStore;
pub use transaction::{TransactionManager, TransactionSummary, DEFAULT_DEBOUNCE_MS};
pub use value::{CellValue, HASH_CHUNK_COUNT, compare_values, hash_text_chunks, locale_compare, to_sortable_number};
