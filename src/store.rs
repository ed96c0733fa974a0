//! The mutable indexed data store: row-by-id map + insertion-ordered sequence + on-demand
//! distinct-value scan.

use ahash::{HashMap, HashMapExt};

use crate::row::{Row, RowId};
use crate::value::CellValue;

/// Row-by-id map plus an insertion-ordered sequence of ids, always kept consistent with each
/// other.
#[derive(Default)]
pub struct IndexedDataStore {
    rows_by_id: HashMap<RowId, Row>,
    order: Vec<RowId>,
}

impl IndexedDataStore {
    pub fn new() -> Self {
        Self { rows_by_id: HashMap::new(), order: Vec::new() }
    }

    /// Replaces the entire store with `rows`, in the order given.
    pub fn replace_all(&mut self, rows: Vec<Row>) {
        self.clear();
        self.insert(rows, None);
    }

    pub fn get_all_rows(&self) -> Vec<&Row> {
        self.order.iter().filter_map(|id| self.rows_by_id.get(id)).collect()
    }

    pub fn get_row_by_id(&self, id: RowId) -> Option<&Row> {
        self.rows_by_id.get(&id)
    }

    pub fn get_row_by_index(&self, index: usize) -> Option<&Row> {
        self.order.get(index).and_then(|id| self.rows_by_id.get(id))
    }

    /// Inserts `rows` at `at_index` (end of the sequence when `None`), clamping an out-of-range
    /// index to the end.
    pub fn insert(&mut self, rows: Vec<Row>, at_index: Option<usize>) {
        let index = at_index.unwrap_or(self.order.len()).min(self.order.len());
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.id);
            self.rows_by_id.insert(row.id, row);
        }
        self.order.splice(index..index, ids);
    }

    /// Removes every row whose id is in `ids`. Ids with no matching row are ignored.
    pub fn remove(&mut self, ids: &[RowId]) -> usize {
        let before = self.order.len();
        let to_remove: ahash::HashSet<RowId> = ids.iter().copied().collect();
        self.order.retain(|id| !to_remove.contains(id));
        for id in ids {
            self.rows_by_id.remove(id);
        }
        before - self.order.len()
    }

    pub fn update_cell(&mut self, id: RowId, field: &str, value: CellValue) -> bool {
        if let Some(row) = self.rows_by_id.get_mut(&id) {
            row.set_field(field, value);
            true
        } else {
            false
        }
    }

    pub fn update_row(&mut self, id: RowId, patch: &[(String, CellValue)]) -> bool {
        if let Some(row) = self.rows_by_id.get_mut(&id) {
            row.apply_patch(patch);
            true
        } else {
            false
        }
    }

    /// Scans rows in insertion order collecting distinct values of `field`, keyed by their
    /// canonical string form. Stops as soon as `max_values` distinct entries have
    /// been found -- the distinct cap aborts iteration early rather than scanning every row.
    pub fn get_distinct_values(&self, field: &str, max_values: usize) -> Vec<CellValue> {
        let mut seen: HashMap<String, CellValue> = HashMap::new();
        for id in &self.order {
            if seen.len() >= max_values {
                break;
            }
            let Some(row) = self.rows_by_id.get(id) else { continue };
            let value = row.get_field(field);
            let key = value.to_canonical_string();
            seen.entry(key).or_insert(value);
        }
        seen.into_values().collect()
    }

    pub fn get_total_row_count(&self) -> usize {
        self.order.len()
    }

    pub fn clear(&mut self) {
        self.rows_by_id.clear();
        self.order.clear();
    }
}
