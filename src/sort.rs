//! Sort model and the sequential half of the sort/filter pipeline.

use std::cmp::Ordering;

use crate::column::ColumnDef;
use crate::row::Row;
use crate::value::compare_values;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One entry in the sort model. Insertion order in the enclosing `Vec` is the tie-break
/// priority -- the first key is primary.
#[derive(Debug, Clone)]
pub struct SortKey {
    pub col_id: String,
    pub direction: SortDirection,
}

/// An ordered sequence of sort keys. A column may appear at most once; this is enforced by
/// [`crate::facade::GridCore::set_sort`] rather than here.
pub type SortModel = Vec<SortKey>;

fn resolve_fields<'a>(sort_model: &'a SortModel, columns: &'a [ColumnDef]) -> Vec<(&'a str, SortDirection)> {
    sort_model
        .iter()
        .filter_map(|key| {
            columns
                .iter()
                .find(|c| c.col_id == key.col_id)
                .map(|c| (c.field.as_str(), key.direction))
        })
        .collect()
}

fn compare_rows(a: &Row, b: &Row, fields: &[(&str, SortDirection)]) -> Ordering {
    for (field, direction) in fields {
        let ordering = compare_values(&a.get_field(field), &b.get_field(field));
        let ordering = match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Stably sorts `rows` by the key-vector comparison defined by `sort_model`, walking keys in
/// declared order. An empty sort model leaves `rows` in data-source order.
pub fn apply_sort(rows: &mut [Row], sort_model: &SortModel, columns: &[ColumnDef]) {
    if sort_model.is_empty() {
        return;
    }
    let fields = resolve_fields(sort_model, columns);
    rows.sort_by(|a, b| compare_rows(a, b, &fields));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::CellDataType;
    use serde_json::json;

    fn col(field: &str) -> ColumnDef {
        ColumnDef::new(field, CellDataType::Text, 100.0)
    }

    #[test]
    fn multi_key_sort_is_stable_and_tie_broken_by_first_key() {
        let mut rows = vec![
            Row::new(1, json!({"a": "Bob", "b": 30})),
            Row::new(2, json!({"a": "Alice", "b": 30})),
            Row::new(3, json!({"a": "Alice", "b": 25})),
        ];
        let sort_model = vec![
            SortKey { col_id: "b".into(), direction: SortDirection::Asc },
            SortKey { col_id: "a".into(), direction: SortDirection::Desc },
        ];
        let columns = vec![col("a"), col("b")];
        apply_sort(&mut rows, &sort_model, &columns);
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn empty_sort_model_preserves_order() {
        let mut rows = vec![Row::new(2, json!({})), Row::new(1, json!({}))];
        apply_sort(&mut rows, &SortModel::new(), &[]);
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    proptest::proptest! {
        /// Invariant 5: after `setSort`, `compareValues` across adjacent rows is monotone in the
        /// declared direction.
        #[test]
        fn single_key_sort_is_monotone(values in proptest::collection::vec(-1000i64..1000, 0..200), asc in proptest::bool::ANY) {
            let mut rows: Vec<Row> = values.iter().enumerate().map(|(i, v)| Row::new(i as i64, json!({"n": v}))).collect();
            let columns = vec![col("n")];
            let direction = if asc { SortDirection::Asc } else { SortDirection::Desc };
            let sort_model = vec![SortKey { col_id: "n".into(), direction }];
            apply_sort(&mut rows, &sort_model, &columns);

            for pair in rows.windows(2) {
                let a = pair[0].get_field("n");
                let b = pair[1].get_field("n");
                let ordering = compare_values(&a, &b);
                let expected = if asc { ordering != Ordering::Greater } else { ordering != Ordering::Less };
                proptest::prop_assert!(expected);
            }
        }
    }
}
