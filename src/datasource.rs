//! The caller-implementable data-source boundary.

use crate::column::ColumnDef;
use crate::error::GridResult;
use crate::filter::{apply_filters, FilterModel};
use crate::row::{Row, RowId};
use crate::sort::SortModel;
use crate::store::IndexedDataStore;
use crate::transaction::{TransactionManager, TransactionSummary, DEFAULT_DEBOUNCE_MS};
use crate::value::CellValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page_index: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub pagination: Pagination,
    pub sort: Option<SortModel>,
    pub filter: Option<FilterModel>,
}

impl Default for Pagination {
    fn default() -> Self {
        // The core always fetches the whole filtered set in one page.
        Self { page_index: 0, page_size: usize::MAX }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub rows: Vec<Row>,
    pub total_rows: usize,
}

/// The minimal surface the façade needs to populate the grid.
pub trait DataSource: Send {
    fn fetch(&mut self, request: &FetchRequest) -> GridResult<FetchResponse>;

    /// Releases any resource the source holds. Default no-op.
    fn destroy(&mut self) {}
}

pub type SubscriptionId = u64;

/// A change notification a mutable source pushes to subscribers after a transaction drain
/// completes, carrying the same aggregate counts the drain itself computed. Subscribers see one
/// notification per drain regardless of how many ops were coalesced into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceChange {
    TransactionProcessed(TransactionSummary),
}

/// Extends [`DataSource`] with the mutation surface a source backed by the core's own indexed
/// store (rather than a remote API) exposes.
pub trait MutableDataSource: DataSource {
    fn add_rows(&mut self, rows: Vec<Row>, at_index: Option<usize>);
    fn remove_rows(&mut self, ids: &[RowId]) -> usize;
    fn update_cell(&mut self, id: RowId, field: &str, value: CellValue) -> bool;
    fn update_row(&mut self, id: RowId, patch: &[(String, CellValue)]) -> bool;

    fn flush_transactions(&mut self) -> Option<TransactionSummary>;
    fn has_pending_transactions(&self) -> bool;

    fn get_distinct_values(&self, field: &str, max_values: usize) -> Vec<CellValue>;
    fn get_row_by_id(&self, id: RowId) -> Option<Row>;
    fn get_total_row_count(&self) -> usize;

    fn subscribe(&mut self, listener: Box<dyn FnMut(&SourceChange) + Send>) -> SubscriptionId;
    fn unsubscribe(&mut self, id: SubscriptionId);

    fn clear(&mut self);
}

/// A ready-made [`MutableDataSource`] backed directly by [`IndexedDataStore`] and
/// [`TransactionManager`], for callers who want the core's built-in store rather than proxying a
/// remote API. Sort and filter are applied here, against `columns` as last set by the façade via
/// [`InMemoryDataSource::set_columns`].
pub struct InMemoryDataSource {
    store: IndexedDataStore,
    transactions: TransactionManager,
    columns: Vec<ColumnDef>,
    subscribers: Vec<(SubscriptionId, Box<dyn FnMut(&SourceChange) + Send>)>,
    next_subscription_id: SubscriptionId,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::with_debounce(DEFAULT_DEBOUNCE_MS)
    }

    pub fn with_debounce(debounce_ms: u64) -> Self {
        Self {
            store: IndexedDataStore::new(),
            transactions: TransactionManager::new(debounce_ms),
            columns: Vec::new(),
            subscribers: Vec::new(),
            next_subscription_id: 0,
        }
    }

    pub fn set_columns(&mut self, columns: Vec<ColumnDef>) {
        self.columns = columns;
    }

    fn notify(&mut self, change: SourceChange) {
        for (_, listener) in &mut self.subscribers {
            listener(&change);
        }
    }

    /// Drains any drain-due signal from the debounce timer, notifying subscribers once if a
    /// drain actually happened.
    fn pump(&mut self) -> Option<TransactionSummary> {
        let summary = self.transactions.pump(&mut self.store);
        if let Some(summary) = summary {
            self.notify(SourceChange::TransactionProcessed(summary));
        }
        summary
    }

    /// Forces an immediate drain, notifying subscribers once if anything was pending.
    fn drain(&mut self) -> Option<TransactionSummary> {
        let summary = self.transactions.flush(&mut self.store);
        if let Some(summary) = summary {
            self.notify(SourceChange::TransactionProcessed(summary));
        }
        summary
    }
}

impl Default for InMemoryDataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSource for InMemoryDataSource {
    /// Applies `request.filter` (server-side, in this built-in implementation) and returns the
    /// filtered set unsorted -- final ordering is the core's own sort/filter pipeline's job
    /// (`crate::facade::GridCore`), which re-sorts every fetched page through
    /// [`crate::parallel_sort::parallel_or_sequential_sort`] regardless of backend, so a caller's
    /// custom `DataSource` never needs to honor `request.sort` for correctness.
    fn fetch(&mut self, request: &FetchRequest) -> GridResult<FetchResponse> {
        self.drain();

        let mut rows: Vec<Row> = self.store.get_all_rows().into_iter().cloned().collect();
        if let Some(filter) = &request.filter {
            let keep = apply_filters(&rows, filter, &self.columns);
            let keep_set: ahash::HashSet<usize> = keep.into_iter().collect();
            let mut idx = 0usize;
            rows.retain(|_| {
                let pass = keep_set.contains(&idx);
                idx += 1;
                pass
            });
        }
        let total_rows = rows.len();

        let start = request.pagination.page_index.saturating_mul(request.pagination.page_size.max(1)).min(rows.len());
        let end = start.saturating_add(request.pagination.page_size).min(rows.len());
        let page = if request.pagination.page_size == usize::MAX { rows } else { rows[start..end].to_vec() };

        Ok(FetchResponse { rows: page, total_rows })
    }
}

impl MutableDataSource for InMemoryDataSource {
    fn add_rows(&mut self, rows: Vec<Row>, at_index: Option<usize>) {
        self.pump();
        self.transactions.enqueue_add(rows, at_index);
    }

    fn remove_rows(&mut self, ids: &[RowId]) -> usize {
        self.pump();
        let ids = ids.to_vec();
        let count = ids.len();
        self.transactions.enqueue_remove(ids);
        count
    }

    fn update_cell(&mut self, id: RowId, field: &str, value: CellValue) -> bool {
        self.pump();
        self.transactions.enqueue_update_cell(id, field, value);
        true
    }

    fn update_row(&mut self, id: RowId, patch: &[(String, CellValue)]) -> bool {
        self.pump();
        self.transactions.enqueue_update_row(id, patch.to_vec());
        true
    }

    fn flush_transactions(&mut self) -> Option<TransactionSummary> {
        self.drain()
    }

    fn has_pending_transactions(&self) -> bool {
        self.transactions.has_pending()
    }

    fn get_distinct_values(&self, field: &str, max_values: usize) -> Vec<CellValue> {
        self.store.get_distinct_values(field, max_values)
    }

    fn get_row_by_id(&self, id: RowId) -> Option<Row> {
        self.store.get_row_by_id(id).cloned()
    }

    fn get_total_row_count(&self) -> usize {
        self.store.get_total_row_count()
    }

    fn subscribe(&mut self, listener: Box<dyn FnMut(&SourceChange) + Send>) -> SubscriptionId {
        let id = self.next_subscription_id;
        self.next_subscription_id += 1;
        self.subscribers.push((id, listener));
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|(sid, _)| *sid != id);
    }

    fn clear(&mut self) {
        self.store.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::CellDataType;
    use serde_json::json;

    #[test]
    fn default_pagination_covers_the_whole_set_in_one_page() {
        let pagination = Pagination::default();
        assert_eq!(pagination.page_index, 0);
        assert_eq!(pagination.page_size, usize::MAX);
    }

    #[test]
    fn in_memory_source_fetch_reflects_added_rows_after_flush() {
        let mut source = InMemoryDataSource::new();
        source.set_columns(vec![ColumnDef::new("name", CellDataType::Text, 100.0)]);
        source.add_rows(vec![Row::new(1, json!({"name": "a"})), Row::new(2, json!({"name": "b"}))], None);

        let response = source.fetch(&FetchRequest::default()).unwrap();
        assert_eq!(response.total_rows, 2);
        assert_eq!(response.rows.len(), 2);
    }

    #[test]
    fn subscribers_are_notified_once_per_drain_with_the_aggregate() {
        let mut source = InMemoryDataSource::new();
        source.add_rows(vec![Row::new(1, json!({})), Row::new(2, json!({}))], None);
        source.flush_transactions();

        let calls: std::sync::Arc<std::sync::Mutex<Vec<TransactionSummary>>> = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let calls_clone = calls.clone();
        source.subscribe(Box::new(move |change| {
            let SourceChange::TransactionProcessed(summary) = change;
            calls_clone.lock().unwrap().push(*summary);
        }));

        source.add_rows(vec![Row::new(3, json!({}))], None);
        source.update_cell(1, "name", CellValue::Text("a".into()));
        source.remove_rows(&[2]);
        let summary = source.flush_transactions().unwrap();

        assert_eq!(summary, TransactionSummary { added: 1, removed: 1, updated: 1 });
        let recorded = calls.lock().unwrap();
        assert_eq!(recorded.len(), 1, "subscribers must be invoked exactly once per drain");
        assert_eq!(recorded[0], summary);
    }
}
