//! Slot pool: assigns a small, recyclable set of row slots to the visible row range and emits
//! slot lifecycle instructions.

use std::collections::BTreeMap;

use ahash::HashMap;

use crate::instruction::{Instruction, SlotId};

/// Default number of rows rendered beyond the strict visible range, on both ends, to hide
/// scroll-churn artifacts.
pub const DEFAULT_OVERSCAN: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct Slot {
    pub slot_id: SlotId,
    /// `-1` when the slot is not currently assigned to any row.
    pub row_index: i64,
    pub translate_y: f64,
}

/// Owns the recyclable slot set. Slot ids are stable across reassignments; `row_index -> slot_id`
/// is always the exact inverse of the slots whose `row_index >= 0`.
#[derive(Default)]
pub struct SlotPool {
    slots: BTreeMap<SlotId, Slot>,
    row_to_slot: HashMap<i64, SlotId>,
    next_id: SlotId,
}

impl SlotPool {
    pub fn new() -> Self {
        Self { slots: BTreeMap::new(), row_to_slot: HashMap::default(), next_id: 0 }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot_for_row(&self, row_index: i64) -> Option<SlotId> {
        self.row_to_slot.get(&row_index).copied()
    }

    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }

    fn destroy_all(&mut self) -> Vec<Instruction> {
        let instructions = self.slots.keys().map(|&slot_id| Instruction::DestroySlot { slot_id }).collect();
        self.slots.clear();
        self.row_to_slot.clear();
        instructions
    }

    /// Computes the raw (non-overscanned) visible row range from viewport geometry. Returns
    /// `None` when no rows are visible.
    pub fn raw_visible_range(
        rows_area_height: f64,
        row_height: f64,
        natural_scroll_top: f64,
        total_rows: usize,
    ) -> Option<(i64, i64)> {
        if total_rows == 0 || rows_area_height <= 0.0 || row_height <= 0.0 {
            return None;
        }
        let max_index = total_rows as i64 - 1;
        let start = ((natural_scroll_top / row_height).floor() as i64).clamp(0, max_index);
        let visible_count = (rows_area_height / row_height).ceil() as i64;
        let end = (start + (visible_count - 1).max(0)).min(max_index);
        Some((start, end))
    }

    /// Reconciles the slot set against the visible window. `row_available` reports
    /// whether a row index currently has cached data; rows without data are skipped (no
    /// emissions). Returns the full batch of instructions for this pass.
    pub fn sync_slots(
        &mut self,
        rows_area_height: f64,
        row_height: f64,
        natural_scroll_top: f64,
        total_rows: usize,
        overscan: usize,
        row_available: impl Fn(i64) -> bool,
    ) -> Vec<Instruction> {
        let Some((raw_start, raw_end)) = Self::raw_visible_range(rows_area_height, row_height, natural_scroll_top, total_rows) else {
            return self.destroy_all();
        };

        let max_index = total_rows as i64 - 1;
        let required_start = (raw_start - overscan as i64).max(0);
        let required_end = (raw_end + overscan as i64).min(max_index);
        if required_end < required_start {
            return self.destroy_all();
        }
        let first_visible = required_start;

        let mut out = Vec::new();
        let mut recycle: Vec<SlotId> = Vec::new();
        let mut retained_rows: ahash::HashSet<i64> = ahash::HashSet::default();

        for (&slot_id, slot) in &self.slots {
            if slot.row_index >= required_start && slot.row_index <= required_end {
                retained_rows.insert(slot.row_index);
            } else {
                if slot.row_index >= 0 {
                    self.row_to_slot.remove(&slot.row_index);
                }
                recycle.push(slot_id);
            }
        }

        let mut recycle_iter = recycle.into_iter();
        for r in required_start..=required_end {
            if retained_rows.contains(&r) {
                continue;
            }
            if !row_available(r) {
                continue;
            }
            let translate_y = (r - first_visible) as f64 * row_height;
            if let Some(slot_id) = recycle_iter.next() {
                let slot = self.slots.get_mut(&slot_id).expect("recycled slot id must exist");
                slot.row_index = r;
                slot.translate_y = translate_y;
                self.row_to_slot.insert(r, slot_id);
                out.push(Instruction::AssignSlot { slot_id, row_index: r });
                out.push(Instruction::MoveSlot { slot_id, translate_y });
            } else {
                let slot_id = self.next_id;
                self.next_id += 1;
                self.slots.insert(slot_id, Slot { slot_id, row_index: r, translate_y });
                self.row_to_slot.insert(r, slot_id);
                out.push(Instruction::CreateSlot { slot_id });
                out.push(Instruction::AssignSlot { slot_id, row_index: r });
                out.push(Instruction::MoveSlot { slot_id, translate_y });
            }
        }

        for slot_id in recycle_iter {
            self.slots.remove(&slot_id);
            out.push(Instruction::DestroySlot { slot_id });
        }

        for (&slot_id, slot) in &mut self.slots {
            if retained_rows.contains(&slot.row_index) {
                let new_translate_y = (slot.row_index - first_visible) as f64 * row_height;
                if (new_translate_y - slot.translate_y).abs() > f64::EPSILON {
                    slot.translate_y = new_translate_y;
                    out.push(Instruction::MoveSlot { slot_id, translate_y: new_translate_y });
                }
            }
        }

        out
    }

    /// Re-emits `ASSIGN_SLOT` + `MOVE_SLOT` for every currently-held slot still within
    /// `[required_start, required_end]`, then reconciles out-of-range slots via `sync_slots`.
    #[allow(clippy::too_many_arguments)]
    pub fn refresh_all_slots(
        &mut self,
        rows_area_height: f64,
        row_height: f64,
        natural_scroll_top: f64,
        total_rows: usize,
        overscan: usize,
        row_available: impl Fn(i64) -> bool,
    ) -> Vec<Instruction> {
        let mut out = Vec::new();
        for slot in self.slots.values() {
            if slot.row_index >= 0 {
                out.push(Instruction::AssignSlot { slot_id: slot.slot_id, row_index: slot.row_index });
                out.push(Instruction::MoveSlot { slot_id: slot.slot_id, translate_y: slot.translate_y });
            }
        }
        out.extend(self.sync_slots(rows_area_height, row_height, natural_scroll_top, total_rows, overscan, row_available));
        out
    }

    /// Emits a single `ASSIGN_SLOT` if `row_index` currently owns a slot.
    pub fn update_slot(&self, row_index: i64) -> Option<Instruction> {
        self.slot_for_row(row_index).map(|slot_id| Instruction::AssignSlot { slot_id, row_index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always_available(_: i64) -> bool {
        true
    }

    #[test]
    fn initial_viewport_creates_overscanned_slot_count() {
        let mut pool = SlotPool::new();
        let instructions = pool.sync_slots(560.0, 32.0, 0.0, 10_000, 3, always_available);
        let creates = instructions.iter().filter(|i| matches!(i, Instruction::CreateSlot { .. })).count();
        assert_eq!(creates, 21);
        assert_eq!(pool.slot_count(), 21);
    }

    #[test]
    fn translate_y_is_relative_to_first_visible_row() {
        let mut pool = SlotPool::new();
        pool.sync_slots(560.0, 32.0, 0.0, 10_000, 3, always_available);
        let row0 = pool.slot_for_row(0).unwrap();
        let slot = pool.slots().find(|s| s.slot_id == row0).unwrap();
        assert_eq!(slot.translate_y, 0.0);
    }

    #[test]
    fn no_visible_rows_destroys_every_slot() {
        let mut pool = SlotPool::new();
        pool.sync_slots(560.0, 32.0, 0.0, 10_000, 3, always_available);
        let instructions = pool.sync_slots(0.0, 32.0, 0.0, 10_000, 3, always_available);
        assert!(instructions.iter().all(|i| matches!(i, Instruction::DestroySlot { .. })));
        assert_eq!(pool.slot_count(), 0);
    }

    #[test]
    fn scroll_recycles_slots_without_create_or_destroy() {
        let mut pool = SlotPool::new();
        pool.sync_slots(560.0, 32.0, 0.0, 10_000, 3, always_available);
        let before: std::collections::BTreeSet<SlotId> = pool.slots().map(|s| s.slot_id).collect();

        let instructions = pool.sync_slots(560.0, 32.0, 320.0, 10_000, 3, always_available);
        let creates = instructions.iter().filter(|i| matches!(i, Instruction::CreateSlot { .. })).count();
        let destroys = instructions.iter().filter(|i| matches!(i, Instruction::DestroySlot { .. })).count();
        assert_eq!(creates, 0);
        assert_eq!(destroys, 0);

        let after: std::collections::BTreeSet<SlotId> = pool.slots().map(|s| s.slot_id).collect();
        assert_eq!(before, after, "slot ids are stable across reassignment");

        for row in 15..=25 {
            assert!(pool.slot_for_row(row).is_some(), "row {row} should be covered after scrolling");
        }
    }

    #[test]
    fn rows_without_cached_data_are_skipped() {
        let mut pool = SlotPool::new();
        let instructions = pool.sync_slots(560.0, 32.0, 0.0, 10_000, 3, |r| r != 5);
        assert!(pool.slot_for_row(5).is_none());
        let assigned_to_5 = instructions.iter().any(|i| matches!(i, Instruction::AssignSlot { row_index: 5, .. }));
        assert!(!assigned_to_5);
    }

    proptest::proptest! {
        /// Invariant 1: `row_to_slot` is always the exact inverse of the slots whose `row_index >= 0`.
        #[test]
        fn slot_row_mapping_is_always_inverse(
            total_rows in 1usize..5000,
            scroll_top in 0f64..200_000.0,
            overscan in 0usize..10,
        ) {
            let mut pool = SlotPool::new();
            pool.sync_slots(560.0, 32.0, scroll_top, total_rows, overscan, always_available);

            for slot in pool.slots() {
                if slot.row_index >= 0 {
                    proptest::prop_assert_eq!(pool.slot_for_row(slot.row_index), Some(slot.slot_id));
                }
            }
            for slot in pool.slots() {
                if slot.row_index >= 0 {
                    let count = pool.slots().filter(|s| s.row_index == slot.row_index).count();
                    proptest::prop_assert_eq!(count, 1);
                }
            }
        }

        /// Invariants 2 & 3: every row in the overscanned visible window has exactly one slot, no
        /// slot holds a row outside it, and the slot count stays within the documented bound.
        #[test]
        fn sync_slots_covers_overscanned_window_within_bound(
            total_rows in 1usize..5000,
            scroll_top in 0f64..200_000.0,
            overscan in 0usize..10,
        ) {
            let rows_area_height = 560.0;
            let row_height = 32.0;
            let mut pool = SlotPool::new();
            pool.sync_slots(rows_area_height, row_height, scroll_top, total_rows, overscan, always_available);

            if let Some((raw_start, raw_end)) = SlotPool::raw_visible_range(rows_area_height, row_height, scroll_top, total_rows) {
                let max_index = total_rows as i64 - 1;
                let required_start = (raw_start - overscan as i64).max(0);
                let required_end = (raw_end + overscan as i64).min(max_index);

                for r in required_start..=required_end {
                    proptest::prop_assert!(pool.slot_for_row(r).is_some());
                }
                for slot in pool.slots() {
                    if slot.row_index >= 0 {
                        proptest::prop_assert!(slot.row_index >= required_start && slot.row_index <= required_end);
                    }
                }

                let visible_count = (rows_area_height / row_height).ceil() as usize;
                let bound = visible_count + 2 * overscan + 1;
                proptest::prop_assert!(pool.slot_count() <= bound);
            }
        }
    }
}
