//! The `GridConfig` builder -- every `GridCore` constructor option, validated before the grid is
//! built.

use crate::column::ColumnDef;
use crate::datasource::MutableDataSource;
use crate::error::{GridError, GridResult};
use crate::highlight::ClassCallback;
use crate::row::RowId;
use crate::value::CellValue;

pub type GetRowId = Box<dyn Fn(&CellValue) -> RowId + Send + Sync>;
pub type OnCellValueChanged = Box<dyn Fn(RowId, &str, &CellValue) + Send + Sync>;

/// Builder for [`crate::facade::GridCore`]'s construction options. Call [`GridConfigBuilder::build`]
/// to validate and obtain a [`GridConfig`]; an inconsistent combination returns
/// `GridError::Configuration` rather than panicking.
pub struct GridConfigBuilder<D: MutableDataSource> {
    columns: Vec<ColumnDef>,
    data_source: Option<D>,
    row_height: f64,
    header_height: Option<f64>,
    overscan: usize,
    sorting_enabled: bool,
    get_row_id: Option<GetRowId>,
    on_cell_value_changed: Option<OnCellValueChanged>,
    default_row_class_callback: Option<Box<ClassCallback>>,
    default_column_class_callback: Option<Box<ClassCallback>>,
    default_cell_class_callback: Option<Box<ClassCallback>>,
}

impl<D: MutableDataSource> GridConfigBuilder<D> {
    pub fn new(columns: Vec<ColumnDef>, data_source: D, row_height: f64) -> Self {
        Self {
            columns,
            data_source: Some(data_source),
            row_height,
            header_height: None,
            overscan: crate::slot_pool::DEFAULT_OVERSCAN,
            sorting_enabled: true,
            get_row_id: None,
            on_cell_value_changed: None,
            default_row_class_callback: None,
            default_column_class_callback: None,
            default_cell_class_callback: None,
        }
    }

    #[must_use]
    pub fn header_height(mut self, height: f64) -> Self {
        self.header_height = Some(height);
        self
    }

    #[must_use]
    pub const fn overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    #[must_use]
    pub const fn sorting_enabled(mut self, enabled: bool) -> Self {
        self.sorting_enabled = enabled;
        self
    }

    #[must_use]
    pub fn get_row_id(mut self, f: GetRowId) -> Self {
        self.get_row_id = Some(f);
        self
    }

    #[must_use]
    pub fn on_cell_value_changed(mut self, f: OnCellValueChanged) -> Self {
        self.on_cell_value_changed = Some(f);
        self
    }

    #[must_use]
    pub fn default_row_class_callback(mut self, f: Box<ClassCallback>) -> Self {
        self.default_row_class_callback = Some(f);
        self
    }

    #[must_use]
    pub fn default_column_class_callback(mut self, f: Box<ClassCallback>) -> Self {
        self.default_column_class_callback = Some(f);
        self
    }

    #[must_use]
    pub fn default_cell_class_callback(mut self, f: Box<ClassCallback>) -> Self {
        self.default_cell_class_callback = Some(f);
        self
    }

    /// Validates the accumulated options into a [`GridConfig`].
    ///
    /// Rejects `on_cell_value_changed` supplied without `get_row_id`: without a row-id extractor
    /// there is no way to identify which row the callback fired for once the row order has
    /// changed underneath it.
    pub fn build(mut self) -> GridResult<GridConfig<D>> {
        if self.on_cell_value_changed.is_some() && self.get_row_id.is_none() {
            return Err(GridError::Configuration(
                "on_cell_value_changed requires get_row_id to identify the affected row".to_string(),
            ));
        }
        if self.columns.is_empty() {
            return Err(GridError::Configuration("at least one column is required".to_string()));
        }
        if self.row_height <= 0.0 {
            return Err(GridError::Configuration("row_height must be positive".to_string()));
        }

        let header_height = self.header_height.unwrap_or(self.row_height);
        Ok(GridConfig {
            columns: self.columns,
            data_source: self.data_source.take().expect("data_source set at construction"),
            row_height: self.row_height,
            header_height,
            overscan: self.overscan,
            sorting_enabled: self.sorting_enabled,
            get_row_id: self.get_row_id,
            on_cell_value_changed: self.on_cell_value_changed,
            default_row_class_callback: self.default_row_class_callback,
            default_column_class_callback: self.default_column_class_callback,
            default_cell_class_callback: self.default_cell_class_callback,
        })
    }
}

/// The validated configuration a [`crate::facade::GridCore`] is constructed from.
pub struct GridConfig<D: MutableDataSource> {
    pub columns: Vec<ColumnDef>,
    pub data_source: D,
    pub row_height: f64,
    pub header_height: f64,
    pub overscan: usize,
    pub sorting_enabled: bool,
    pub get_row_id: Option<GetRowId>,
    pub on_cell_value_changed: Option<OnCellValueChanged>,
    pub default_row_class_callback: Option<Box<ClassCallback>>,
    pub default_column_class_callback: Option<Box<ClassCallback>>,
    pub default_cell_class_callback: Option<Box<ClassCallback>>,
}
