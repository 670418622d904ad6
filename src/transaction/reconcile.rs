//! Recovering statement-scoped outcomes from the engine's per-commit aggregates.
//!
//! The engine reports, per commit, the number of updated rows and a map of
//! table → last generated primary key. That map has no notion of statement
//! boundaries or insertion order across tables, so the last inserted key is
//! only known when it is unambiguous. Inserting into two or more
//! autoincrement tables without a before snapshot always yields
//! [`UNKNOWN_LAST_INSERT_ID`].

use std::collections::HashMap;

use crate::engine::CommitAggregate;

/// Sentinel reported when the last inserted key cannot be determined.
pub const UNKNOWN_LAST_INSERT_ID: i64 = -1;

/// Caller-visible outcome of one exec or commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    rows_affected: u64,
    last_insert_id: i64,
}

impl ExecResult {
    #[must_use]
    pub fn new(rows_affected: u64, last_insert_id: Option<i64>) -> Self {
        Self {
            rows_affected,
            last_insert_id: last_insert_id.unwrap_or(UNKNOWN_LAST_INSERT_ID),
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(0, None)
    }

    #[must_use]
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Last inserted key, or [`UNKNOWN_LAST_INSERT_ID`].
    #[must_use]
    pub fn last_insert_id(&self) -> i64 {
        self.last_insert_id
    }

    #[must_use]
    pub fn known_last_insert_id(&self) -> Option<i64> {
        (self.last_insert_id != UNKNOWN_LAST_INSERT_ID).then_some(self.last_insert_id)
    }
}

/// Best-effort last inserted key for the segment that produced `after`.
///
/// `before` is the map as it stood immediately prior to the segment, when the
/// caller had the chance to take one.
#[must_use]
pub fn last_insert_id(
    after: &HashMap<String, i64>,
    before: Option<&HashMap<String, i64>>,
) -> Option<i64> {
    match after.len() {
        0 => None,
        1 => after.values().next().copied(),
        _ => {
            let before = before?;
            let mut candidates = after
                .iter()
                .filter(|(table, id)| before.get(*table) != Some(*id))
                .map(|(_, id)| *id);
            match (candidates.next(), candidates.next()) {
                (Some(id), None) => Some(id),
                _ => None,
            }
        }
    }
}

/// Outcome of an autocommitted exec or an emulated commit.
///
/// Rows affected are summed over every engine commit; the key comes from the
/// last one, without a snapshot.
#[must_use]
pub fn from_aggregates(aggregates: &[CommitAggregate]) -> ExecResult {
    let rows_affected = aggregates.iter().map(|a| a.updated_rows).sum();
    let last_id = aggregates
        .last()
        .and_then(|a| last_insert_id(&a.last_inserted_pks, None));
    ExecResult::new(rows_affected, last_id)
}

/// Outcome of one statement run on a native transaction handle, from the
/// handle's running aggregate before and after the statement.
#[must_use]
pub fn from_snapshots(before: &CommitAggregate, after: &CommitAggregate) -> ExecResult {
    let rows_affected = after.updated_rows.saturating_sub(before.updated_rows);
    let last_id = last_insert_id(&after.last_inserted_pks, Some(&before.last_inserted_pks));
    ExecResult::new(rows_affected, last_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pks(entries: &[(&str, i64)]) -> HashMap<String, i64> {
        entries.iter().map(|(t, id)| ((*t).to_owned(), *id)).collect()
    }

    #[test]
    fn single_table_is_unambiguous() {
        assert_eq!(last_insert_id(&pks(&[("users", 7)]), None), Some(7));
    }

    #[test]
    fn no_table_is_unknown() {
        assert_eq!(last_insert_id(&pks(&[]), None), None);
        assert_eq!(last_insert_id(&pks(&[]), Some(&pks(&[("users", 1)]))), None);
    }

    #[test]
    fn two_tables_without_snapshot_are_unknown() {
        assert_eq!(last_insert_id(&pks(&[("users", 3), ("orders", 9)]), None), None);
    }

    #[test]
    fn snapshot_picks_the_single_changed_table() {
        let before = pks(&[("users", 3), ("orders", 9)]);
        let after = pks(&[("users", 3), ("orders", 10)]);
        assert_eq!(last_insert_id(&after, Some(&before)), Some(10));
    }

    #[test]
    fn snapshot_picks_a_newly_touched_table() {
        let before = pks(&[("users", 3)]);
        let after = pks(&[("users", 3), ("orders", 1)]);
        assert_eq!(last_insert_id(&after, Some(&before)), Some(1));
    }

    #[test]
    fn snapshot_with_two_changes_is_unknown() {
        let before = pks(&[("users", 3), ("orders", 9)]);
        let after = pks(&[("users", 4), ("orders", 10)]);
        assert_eq!(last_insert_id(&after, Some(&before)), None);
    }

    #[test]
    fn snapshot_with_no_change_is_unknown() {
        let before = pks(&[("users", 3), ("orders", 9)]);
        assert_eq!(last_insert_id(&before.clone(), Some(&before)), None);
    }

    #[test]
    fn aggregates_sum_rows_and_use_last_commit() {
        let aggs = vec![
            CommitAggregate::new(2, pks(&[("users", 2)])),
            CommitAggregate::new(1, pks(&[("orders", 5)])),
        ];
        let res = from_aggregates(&aggs);
        assert_eq!(res.rows_affected(), 3);
        assert_eq!(res.last_insert_id(), 5);
    }

    #[test]
    fn empty_aggregates_report_nothing() {
        let res = from_aggregates(&[]);
        assert_eq!(res, ExecResult::empty());
        assert_eq!(res.known_last_insert_id(), None);
    }

    #[test]
    fn snapshot_diff_counts_only_this_statement() {
        let before = CommitAggregate::new(2, pks(&[("users", 2)]));
        let after = CommitAggregate::new(3, pks(&[("users", 2), ("orders", 1)]));
        let res = from_snapshots(&before, &after);
        assert_eq!(res.rows_affected(), 1);
        assert_eq!(res.known_last_insert_id(), Some(1));
    }
}
