//! Column definitions.

/// The declared data type of a column's cells, used by the presentation adapter to pick a
/// renderer/editor and by the filter pipeline to pick an operator family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellDataType {
    Text,
    Number,
    Boolean,
    Date,
    DateString,
    DateTime,
    DateTimeString,
    Object,
}

/// One column's static definition.
///
/// Column identifiers (`col_id`) must be unique within a grid; this invariant is enforced by
/// [`crate::facade::GridCore::set_columns`] rather than here, since a single `ColumnDef` has no
/// way to know about its siblings.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// Dot path into row data, e.g. `"address.city"`.
    pub field: String,
    /// Defaults to `field` when not supplied.
    pub col_id: String,
    pub cell_data_type: CellDataType,
    pub width: f64,
    pub header_name: Option<String>,
    pub editable: bool,
    pub sortable: bool,
    pub filterable: bool,
    pub hidden: bool,
    pub resizable: bool,
    pub movable: bool,
    pub min_width: Option<f64>,
    pub max_width: Option<f64>,
    pub row_drag: bool,
}

impl ColumnDef {
    /// Builds a column keyed on `field` with every other option defaulted
    /// (`sortable`/`filterable` default true, everything else boolean defaults to false).
    pub fn new(field: impl Into<String>, cell_data_type: CellDataType, width: f64) -> Self {
        let field = field.into();
        Self {
            col_id: field.clone(),
            field,
            cell_data_type,
            width,
            header_name: None,
            editable: false,
            sortable: true,
            filterable: true,
            hidden: false,
            resizable: true,
            movable: true,
            min_width: None,
            max_width: None,
            row_drag: false,
        }
    }

    #[must_use]
    pub fn with_col_id(mut self, col_id: impl Into<String>) -> Self {
        self.col_id = col_id.into();
        self
    }

    #[must_use]
    pub fn with_header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = Some(name.into());
        self
    }

    #[must_use]
    pub const fn editable(mut self, value: bool) -> Self {
        self.editable = value;
        self
    }

    #[must_use]
    pub const fn hidden(mut self, value: bool) -> Self {
        self.hidden = value;
        self
    }

    pub fn clamp_width(&self, desired: f64) -> f64 {
        let mut width = desired;
        if let Some(min) = self.min_width {
            width = width.max(min);
        }
        if let Some(max) = self.max_width {
            width = width.min(max);
        }
        width
    }
}
