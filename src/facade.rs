//! The grid façade: the single public entry point orchestrating every other component.

use crate::column::ColumnDef;
use crate::config::{GetRowId, GridConfig, OnCellValueChanged};
use crate::datasource::{FetchRequest, MutableDataSource, Pagination};
use crate::edit::EditManager;
use crate::error::{GridError, GridResult};
use crate::filter::FilterModel;
use crate::highlight::{ClassCallback, HighlightManager};
use crate::instruction::{Direction, Instruction, InstructionBus, ListenerId};
use crate::parallel_sort::{parallel_or_sequential_sort, ParallelSortEngine};
use crate::row::{Row, RowId};
use crate::scroll::{ContentGeometry, Viewport};
use crate::selection::SelectionManager;
use crate::slot_pool::SlotPool;
use crate::sort::SortModel;
use crate::transaction::TransactionSummary;
use crate::value::CellValue;

/// Orchestrates the data source, sort/filter/slot pipeline, and selection/edit/highlight
/// managers behind one public surface. Scheduling is single-threaded cooperative: every method
/// here runs to completion on the caller's thread before returning.
pub struct GridCore<D: MutableDataSource> {
    columns: Vec<ColumnDef>,
    data_source: D,
    row_height: f64,
    header_height: f64,
    overscan: usize,
    sorting_enabled: bool,

    viewport: Viewport,
    cached_rows: Vec<Row>,
    total_rows: usize,
    sort_model: SortModel,
    filter_model: FilterModel,
    open_filter_col: Option<String>,
    is_loading: bool,

    bus: InstructionBus,
    slot_pool: SlotPool,
    selection: SelectionManager,
    edit: EditManager,
    highlight: HighlightManager,
    sort_engine: ParallelSortEngine,

    get_row_id: Option<GetRowId>,
    on_cell_value_changed: Option<OnCellValueChanged>,
    default_row_class_callback: Option<Box<ClassCallback>>,
    default_column_class_callback: Option<Box<ClassCallback>>,
    default_cell_class_callback: Option<Box<ClassCallback>>,
}

impl<D: MutableDataSource> GridCore<D> {
    /// Validates column-id uniqueness (the one invariant `ColumnDef` itself cannot enforce) and
    /// builds the façade from a validated [`GridConfig`]. Does not fetch -- call
    /// [`GridCore::initialize`] to populate the grid.
    pub fn new(config: GridConfig<D>) -> GridResult<Self> {
        let mut seen = ahash::HashSet::default();
        for column in &config.columns {
            if !seen.insert(column.col_id.clone()) {
                return Err(GridError::Configuration(format!("duplicate column id {:?}", column.col_id)));
            }
        }

        Ok(Self {
            columns: config.columns,
            data_source: config.data_source,
            row_height: config.row_height,
            header_height: config.header_height,
            overscan: config.overscan,
            sorting_enabled: config.sorting_enabled,
            viewport: Viewport::default(),
            cached_rows: Vec::new(),
            total_rows: 0,
            sort_model: SortModel::new(),
            filter_model: FilterModel::default(),
            open_filter_col: None,
            is_loading: false,
            bus: InstructionBus::new(),
            slot_pool: SlotPool::new(),
            selection: SelectionManager::new(),
            edit: EditManager::new(),
            highlight: HighlightManager::new(),
            sort_engine: ParallelSortEngine::new(None),
            get_row_id: config.get_row_id,
            on_cell_value_changed: config.on_cell_value_changed,
            default_row_class_callback: config.default_row_class_callback,
            default_column_class_callback: config.default_column_class_callback,
            default_cell_class_callback: config.default_cell_class_callback,
        })
    }

    /// Class list for a row, via the grid-level default callback. Empty when none is configured.
    pub fn row_classes(&mut self, row_index: i64) -> Vec<String> {
        let Some(callback) = self.default_row_class_callback.as_deref() else { return Vec::new() };
        let Some(row) = self.cached_rows.get(row_index as usize) else { return Vec::new() };
        self.highlight.row_classes(row_index, row, callback)
    }

    /// Class list for a column, via the grid-level default callback. Empty when none is
    /// configured.
    pub fn column_classes(&mut self, col_index: usize) -> Vec<String> {
        let Some(callback) = self.default_column_class_callback.as_deref() else { return Vec::new() };
        let Some(column) = self.columns.get(col_index) else { return Vec::new() };
        self.highlight.column_classes(col_index, column, callback)
    }

    /// Class list for a cell. `override_callback`, when present, replaces the grid-level default
    /// entirely for this call.
    pub fn cell_classes(&mut self, row_index: i64, col_index: usize, override_callback: Option<&ClassCallback>) -> Vec<String> {
        let Some(default_callback) = self.default_cell_class_callback.as_deref() else { return Vec::new() };
        let (Some(row), Some(column)) = (self.cached_rows.get(row_index as usize), self.columns.get(col_index)) else {
            return Vec::new();
        };
        self.highlight.cell_classes(row_index, col_index, row, column, default_callback, override_callback)
    }

    fn notify_cell_value_changed(&self, row_id: RowId, field: &str, value: &CellValue) {
        let Some(callback) = &self.on_cell_value_changed else { return };
        let effective_id = self.get_row_id.as_ref().map_or(row_id, |extractor| extractor(value));
        callback(effective_id, field, value);
    }

    pub fn on_instruction(&mut self, listener: impl FnMut(&Instruction) + Send + 'static) -> ListenerId {
        self.bus.on_instruction(listener)
    }

    pub fn on_batch(&mut self, listener: impl FnMut(&[Instruction]) + Send + 'static) -> ListenerId {
        self.bus.on_batch(listener)
    }

    pub fn unregister_listener(&mut self, id: ListenerId) {
        self.bus.unregister(id);
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn cached_row(&self, row_index: usize) -> Option<&Row> {
        self.cached_rows.get(row_index)
    }

    fn fetch_request(&self) -> FetchRequest {
        FetchRequest {
            pagination: Pagination::default(),
            sort: (self.sorting_enabled && !self.sort_model.is_empty()).then(|| self.sort_model.clone()),
            filter: (!self.filter_model.is_empty()).then(|| self.filter_model.clone()),
        }
    }

    /// Runs the idle -> loading -> {success, error} -> idle state machine. A `fetch_data` call
    /// while already loading is a no-op (single-flight).
    fn fetch_data(&mut self) {
        let span = tracing::debug_span!("fetch");
        let _enter = span.enter();

        if self.is_loading {
            return;
        }
        self.is_loading = true;
        self.bus.emit(Instruction::DataLoading);

        let request = self.fetch_request();
        let outcome = self.data_source.fetch(&request);
        self.is_loading = false;

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                self.bus.emit(Instruction::DataError { message: e.to_string() });
                return;
            }
        };

        let mut rows = response.rows;
        if self.sorting_enabled && !self.sort_model.is_empty() {
            match parallel_or_sequential_sort(&self.sort_engine, &rows, &self.sort_model, &self.columns) {
                Ok(order) => rows = order.into_iter().map(|i| rows[i].clone()).collect(),
                Err(e) => {
                    self.bus.emit(Instruction::DataError { message: e.to_string() });
                    return;
                }
            }
        }

        self.cached_rows = rows;
        self.total_rows = response.total_rows;
        self.bus.emit(Instruction::DataLoaded { total_rows: self.total_rows });
        self.emit_content_size();
        self.bus.emit(Instruction::UpdateHeader);
        self.resync_slots();
    }

    fn emit_content_size(&mut self) {
        let geometry = ContentGeometry::new(self.total_rows, self.row_height);
        let rows_area_height = (self.viewport.height - self.header_height).max(0.0);
        let natural_scroll_top = geometry.effective_scroll_top(self.viewport.scroll_top);
        let rows_wrapper_offset = SlotPool::raw_visible_range(rows_area_height, self.row_height, natural_scroll_top, self.total_rows)
            .map(|(raw_start, _)| {
                let required_start = (raw_start - self.overscan as i64).max(0);
                required_start as f64 * self.row_height * geometry.scroll_ratio
            })
            .unwrap_or(0.0);
        self.bus.emit(Instruction::SetContentSize { virtual_height: geometry.virtual_height, rows_wrapper_offset });
    }

    fn resync_slots(&mut self) {
        let span = tracing::debug_span!("slot_sync");
        let _enter = span.enter();

        let geometry = ContentGeometry::new(self.total_rows, self.row_height);
        let rows_area_height = (self.viewport.height - self.header_height).max(0.0);
        let natural_scroll_top = geometry.effective_scroll_top(self.viewport.scroll_top);
        let cached_rows = &self.cached_rows;
        let instructions = self.slot_pool.sync_slots(rows_area_height, self.row_height, natural_scroll_top, self.total_rows, self.overscan, |row_index| {
            row_index >= 0 && (row_index as usize) < cached_rows.len()
        });
        self.bus.emit_batch(instructions);
    }

    /// The current overscanned visible row window, or `None` when nothing is visible.
    fn visible_range(&self) -> Option<(i64, i64)> {
        let geometry = ContentGeometry::new(self.total_rows, self.row_height);
        let rows_area_height = (self.viewport.height - self.header_height).max(0.0);
        let natural_scroll_top = geometry.effective_scroll_top(self.viewport.scroll_top);
        let (raw_start, raw_end) = SlotPool::raw_visible_range(rows_area_height, self.row_height, natural_scroll_top, self.total_rows)?;
        let max_index = self.total_rows as i64 - 1;
        let start = (raw_start - self.overscan as i64).max(0);
        let end = (raw_end + self.overscan as i64).min(max_index);
        Some((start, end))
    }

    /// Emits `TRANSACTION_PROCESSED` with the drain's aggregate counts, if a drain actually ran.
    fn emit_transaction_processed(&mut self, summary: Option<TransactionSummary>) {
        if let Some(summary) = summary {
            self.bus.emit(Instruction::TransactionProcessed { added: summary.added, removed: summary.removed, updated: summary.updated });
        }
    }

    pub fn initialize(&mut self) {
        self.fetch_data();
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.emit_content_size();
        self.resync_slots();
    }

    /// Dropped (no-op, no error) while a fetch is already in flight.
    pub fn set_sort(&mut self, sort_model: SortModel) {
        if self.is_loading {
            return;
        }
        self.sort_model = sort_model;
        self.fetch_data();
    }

    pub fn set_filter(&mut self, filter_model: FilterModel) {
        if self.is_loading {
            return;
        }
        self.filter_model = filter_model;
        self.fetch_data();
    }

    pub fn open_filter_popup(&mut self, col_id: impl Into<String>) {
        let col_id = col_id.into();
        self.open_filter_col = Some(col_id.clone());
        self.bus.emit(Instruction::OpenFilterPopup { col_id });
    }

    pub fn close_filter_popup(&mut self) {
        self.open_filter_col = None;
        self.bus.emit(Instruction::CloseFilterPopup);
    }

    pub fn open_filter_column(&self) -> Option<&str> {
        self.open_filter_col.as_deref()
    }

    pub fn set_column_width(&mut self, col_id: &str, desired_width: f64) {
        let Some(column) = self.columns.iter_mut().find(|c| c.col_id == col_id) else { return };
        let width = column.clamp_width(desired_width);
        column.width = width;
        self.bus.emit(Instruction::ColumnResized { col_id: col_id.to_string(), width });
    }

    pub fn move_column(&mut self, col_id: &str, new_index: usize) {
        let Some(current) = self.columns.iter().position(|c| c.col_id == col_id) else { return };
        let column = self.columns.remove(current);
        let new_index = new_index.min(self.columns.len());
        self.columns.insert(new_index, column);
        self.bus.emit(Instruction::ColumnMoved { col_id: col_id.to_string(), new_index });
        self.bus.emit(Instruction::ColumnsChanged);
    }

    pub fn set_columns(&mut self, columns: Vec<ColumnDef>) -> GridResult<()> {
        let mut seen = ahash::HashSet::default();
        for column in &columns {
            if !seen.insert(column.col_id.clone()) {
                return Err(GridError::Configuration(format!("duplicate column id {:?}", column.col_id)));
            }
        }
        self.columns = columns;
        self.bus.emit(Instruction::ColumnsChanged);
        Ok(())
    }

    /// Swaps the data source, cancels any active edit, clears selection, and re-fetches from
    /// scratch.
    pub fn set_data_source(&mut self, mut data_source: D) {
        if let Some(instruction) = self.edit.cancel_edit() {
            self.bus.emit(instruction);
        }
        let instruction = self.selection.clear();
        self.bus.emit(instruction);
        self.highlight.sync_selection(None, None);

        std::mem::swap(&mut self.data_source, &mut data_source);
        data_source.destroy();
        self.cached_rows.clear();
        self.total_rows = 0;
        self.fetch_data();
    }

    pub fn refresh(&mut self) {
        self.fetch_data();
    }

    /// Fast path after a transaction drain. Since `DataSource::fetch` always returns the entire
    /// filtered set in one page, this degenerates to a full [`GridCore::refresh`] under the
    /// pagination model this implementation chose; the method exists as the entry point the
    /// transaction manager's drain calls into. Re-emits the current visible range once the
    /// refetch lands.
    pub fn refresh_from_transaction(&mut self) {
        self.fetch_data();
        if let Some((start, end)) = self.visible_range() {
            self.bus.emit(Instruction::UpdateVisibleRange { start, end });
        }
    }

    fn row_id_at(&self, row_index: i64) -> Option<RowId> {
        self.cached_rows.get(usize::try_from(row_index).ok()?).map(|r| r.id)
    }

    pub fn add_rows(&mut self, rows: Vec<Row>, at_index: Option<usize>) {
        let ids: Vec<RowId> = rows.iter().map(|r| r.id).collect();
        self.data_source.add_rows(rows, at_index);
        let summary = self.data_source.flush_transactions();
        self.bus.emit(Instruction::RowsAdded { ids });
        self.emit_transaction_processed(summary);
        self.refresh_from_transaction();
    }

    pub fn delete_rows(&mut self, ids: &[RowId]) {
        self.data_source.remove_rows(ids);
        let summary = self.data_source.flush_transactions();
        self.bus.emit(Instruction::RowsRemoved { ids: ids.to_vec() });
        self.emit_transaction_processed(summary);
        self.refresh_from_transaction();
    }

    pub fn update_rows(&mut self, updates: Vec<(RowId, Vec<(String, CellValue)>)>) {
        let ids: Vec<RowId> = updates.iter().map(|(id, _)| *id).collect();
        for (id, patch) in updates {
            self.data_source.update_row(id, &patch);
        }
        let summary = self.data_source.flush_transactions();
        self.bus.emit(Instruction::RowsUpdated { ids });
        self.emit_transaction_processed(summary);
        self.refresh_from_transaction();
    }

    pub fn set_row(&mut self, id: RowId, patch: Vec<(String, CellValue)>) {
        self.update_rows(vec![(id, patch)]);
    }

    pub fn start_edit(&mut self, row: i64, col: usize) {
        let Some(row_data) = self.cached_rows.get(usize::try_from(row).unwrap_or(usize::MAX)) else { return };
        let Some(column) = self.columns.get(col) else { return };
        let value = row_data.get_field(&column.field);
        if let Some(instruction) = self.edit.start_edit(row, col, &self.columns, value) {
            self.bus.emit(instruction);
        }
    }

    pub fn update_edit_value(&mut self, value: CellValue) {
        self.edit.update_edit_value(value);
    }

    /// Writes the edited value through the data source, emits `COMMIT_EDIT` then `STOP_EDIT`,
    /// and requests a slot refresh for the edited row. The write is flushed immediately rather
    /// than left on the debounce timer, since an edit commit must be visible right away.
    pub fn commit_edit(&mut self) {
        let Some((row, col, value, instructions)) = self.edit.commit_edit() else { return };
        if let (Some(row_id), Some(field)) = (self.row_id_at(row), self.columns.get(col).map(|c| c.field.clone())) {
            self.data_source.update_cell(row_id, &field, value.clone());
            let summary = self.data_source.flush_transactions();
            self.emit_transaction_processed(summary);
            if let Some(cached) = self.cached_rows.get_mut(row as usize) {
                cached.set_field(&field, value.clone());
            }
            self.notify_cell_value_changed(row_id, &field, &value);
        }
        for instruction in instructions {
            self.bus.emit(instruction);
        }
        if let Some(instruction) = self.slot_pool.update_slot(row) {
            self.bus.emit(instruction);
        }
    }

    pub fn cancel_edit(&mut self) {
        if let Some(instruction) = self.edit.cancel_edit() {
            self.bus.emit(instruction);
        }
    }

    fn sync_highlight_selection(&mut self) {
        self.highlight.sync_selection(self.selection.active_cell(), self.selection.range());
    }

    pub fn set_active_cell(&mut self, row: i64, col: usize) {
        let instruction = self.selection.set_active_cell(row, col, self.cached_rows.len(), self.columns.len());
        self.bus.emit(instruction);
        self.sync_highlight_selection();
    }

    pub fn set_selection_range(&mut self, start_row: i64, start_col: usize, end_row: i64, end_col: usize) {
        let instruction = self.selection.set_selection_range(start_row, start_col, end_row, end_col, self.cached_rows.len(), self.columns.len());
        self.bus.emit(instruction);
        self.sync_highlight_selection();
    }

    pub fn clear_selection(&mut self) {
        let instruction = self.selection.clear();
        self.bus.emit(instruction);
        self.sync_highlight_selection();
    }

    pub fn move_focus(&mut self, direction: Direction, extend: bool) {
        let instructions = self.selection.move_focus(direction, extend, self.cached_rows.len(), self.columns.len());
        self.bus.emit_batch(instructions);
        self.sync_highlight_selection();
    }

    pub fn select_all(&mut self) {
        let instructions = self.selection.select_all(self.cached_rows.len(), self.columns.len());
        self.bus.emit_batch(instructions);
        self.sync_highlight_selection();
    }

    pub fn copy_selected_cells(&self) -> String {
        let columns = &self.columns;
        let cached_rows = &self.cached_rows;
        self.selection.copy_selected_cells(|row, col| {
            cached_rows
                .get(usize::try_from(row).unwrap_or(usize::MAX))
                .zip(columns.get(col))
                .map_or(CellValue::Null, |(r, c)| r.get_field(&c.field))
        })
    }

    pub fn set_hover_position(&mut self, row: Option<i64>, col: Option<usize>) {
        let instruction = self.highlight.set_hover_position(row, col);
        self.bus.emit(instruction);
    }

    pub fn highlight_manager_mut(&mut self) -> &mut HighlightManager {
        &mut self.highlight
    }

    pub fn start_fill(&mut self, row: i64, col: usize) {
        let instruction = self.selection.start_fill(row, col);
        self.bus.emit(instruction);
    }

    pub fn update_fill_target(&mut self, row: i64, col: usize) {
        if let Some(instruction) = self.selection.update_fill_target(row, col, self.cached_rows.len(), self.columns.len()) {
            self.bus.emit(instruction);
        }
    }

    pub fn cancel_fill(&mut self) {
        let instruction = self.selection.cancel_fill();
        self.bus.emit(instruction);
    }

    /// Commits the in-progress fill. A no-op (equivalent to cancel) when any spanned column is
    /// not editable.
    pub fn commit_fill(&mut self) {
        let columns = self.columns.clone();
        let cached_rows = &self.cached_rows;
        let Some((instruction, writes)) = self.selection.commit_fill(&columns, |row, col| {
            cached_rows
                .get(usize::try_from(row).unwrap_or(usize::MAX))
                .zip(columns.get(col))
                .map_or(CellValue::Null, |(r, c)| r.get_field(&c.field))
        }) else {
            return;
        };

        for (row, col, value) in writes {
            if let (Some(row_id), Some(field)) = (self.row_id_at(row), self.columns.get(col).map(|c| c.field.clone())) {
                self.data_source.update_cell(row_id, &field, value.clone());
                if let Some(cached) = self.cached_rows.get_mut(row as usize) {
                    cached.set_field(&field, value.clone());
                }
                self.notify_cell_value_changed(row_id, &field, &value);
            }
            if let Some(instruction) = self.slot_pool.update_slot(row) {
                self.bus.emit(instruction);
            }
        }
        let summary = self.data_source.flush_transactions();
        self.bus.emit(instruction);
        self.emit_transaction_processed(summary);
    }

    /// Releases the parallel sort engine's worker pool and the data source's own resources.
    pub fn destroy(&mut self) {
        self.sort_engine.terminate();
        self.data_source.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::CellDataType;
    use crate::datasource::InMemoryDataSource;
    use serde_json::json;

    fn grid_with_rows(n: i64) -> GridCore<InMemoryDataSource> {
        let columns = vec![ColumnDef::new("name", CellDataType::Text, 100.0).editable(true)];
        let mut source = InMemoryDataSource::new();
        source.set_columns(columns.clone());
        let config = crate::config::GridConfigBuilder::new(columns, source, 32.0).build().unwrap();
        let mut grid = GridCore::new(config).unwrap();
        let rows: Vec<Row> = (0..n).map(|i| Row::new(i, json!({"name": format!("row{i}")}))).collect();
        grid.add_rows(rows, None);
        grid
    }

    #[test]
    fn duplicate_column_ids_are_rejected_at_construction() {
        let columns = vec![
            ColumnDef::new("a", CellDataType::Text, 10.0),
            ColumnDef::new("a", CellDataType::Text, 10.0),
        ];
        let config = crate::config::GridConfigBuilder::new(columns, InMemoryDataSource::new(), 24.0).build().unwrap();
        assert!(matches!(GridCore::new(config), Err(GridError::Configuration(_))));
    }

    #[test]
    fn initialize_populates_total_rows_and_emits_data_loaded() {
        let mut grid = grid_with_rows(5);
        let seen = std::sync::Arc::new(std::sync::Mutex::new(false));
        let seen_clone = seen.clone();
        grid.on_instruction(move |i| {
            if matches!(i, Instruction::DataLoaded { total_rows: 5 }) {
                *seen_clone.lock().unwrap() = true;
            }
        });
        grid.initialize();
        assert_eq!(grid.total_rows(), 5);
        assert!(*seen.lock().unwrap());
    }

    #[test]
    fn set_sort_reorders_cached_rows() {
        let mut grid = grid_with_rows(3);
        grid.initialize();
        grid.set_sort(vec![crate::sort::SortKey { col_id: "name".into(), direction: crate::sort::SortDirection::Desc }]);
        let names: Vec<CellValue> = (0..3).map(|i| grid.cached_row(i).unwrap().get_field("name")).collect();
        assert_eq!(
            names,
            vec![CellValue::Text("row2".into()), CellValue::Text("row1".into()), CellValue::Text("row0".into())]
        );
    }

    #[test]
    fn commit_edit_writes_value_and_refreshes_cache() {
        let mut grid = grid_with_rows(2);
        grid.initialize();
        grid.start_edit(0, 0);
        grid.update_edit_value(CellValue::Text("changed".into()));
        grid.commit_edit();
        assert_eq!(grid.cached_row(0).unwrap().get_field("name"), CellValue::Text("changed".into()));
    }

    #[test]
    fn select_all_then_copy_round_trips_cell_text() {
        let mut grid = grid_with_rows(2);
        grid.initialize();
        grid.select_all();
        let copied = grid.copy_selected_cells();
        assert_eq!(copied, "row0\nrow1");
    }
}
