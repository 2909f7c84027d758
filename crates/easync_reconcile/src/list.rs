//! Bounded-list placement.
//!
//! Policy: incoming entries are deduplicated by key and truncated to the
//! list capacity. Each entry first claims an existing row with the same
//! key. Unmatched entries then overwrite existing unclaimed rows in
//! stored order, and only when none is left are new rows inserted into the
//! lowest free slot. Rows still unclaimed afterwards are stale.

use crate::diff::{normalize, same_values};
use crate::image::ListGroup;
use easync_store::{EntityRef, Operation, RowId, RowValues, SubRow};
use std::collections::{BTreeSet, HashSet};

/// Writes and reaffirmed rows for one list group.
#[derive(Debug, Default)]
pub(crate) struct ListPlan {
    pub(crate) writes: Vec<Operation>,
    pub(crate) reaffirmed: Vec<RowId>,
}

pub(crate) fn plan(group: &ListGroup, entity: EntityRef, existing: &[&SubRow]) -> ListPlan {
    let fold = |value: &str| {
        if group.fold_case {
            value.to_lowercase()
        } else {
            value.to_string()
        }
    };

    let mut incoming: Vec<(String, RowValues)> = Vec::new();
    let mut seen = HashSet::new();
    for entry in &group.entries {
        let entry = normalize(entry);
        let Some(key) = entry.get(&group.key).map(|k| fold(k)) else {
            continue;
        };
        if !seen.insert(key.clone()) {
            continue;
        }
        if group.capacity.is_some_and(|cap| incoming.len() >= cap) {
            tracing::debug!(kind = %group.kind, "dropping list entry beyond capacity");
            continue;
        }
        incoming.push((key, entry));
    }

    let mut plan = ListPlan::default();
    let mut claimed = vec![false; existing.len()];
    let mut unmatched = Vec::new();

    for (key, entry) in incoming {
        let found = existing.iter().enumerate().position(|(i, row)| {
            !claimed[i] && row.value(&group.key).map(|v| fold(v)).as_deref() == Some(key.as_str())
        });
        match found {
            Some(i) => {
                claimed[i] = true;
                let row = existing[i];
                plan.reaffirmed.push(row.id);
                if !same_without_key(&entry, &row.values, &group.key) {
                    plan.writes.push(write(group, entity, Some(row.id), row.slot, entry));
                }
            }
            None => unmatched.push(entry),
        }
    }

    let mut used: BTreeSet<u8> = existing.iter().filter_map(|r| r.slot).collect();
    for entry in unmatched {
        match claimed.iter().position(|c| !c) {
            Some(i) => {
                claimed[i] = true;
                let row = existing[i];
                plan.reaffirmed.push(row.id);
                let slot = row.slot.or_else(|| take_free_slot(&mut used));
                plan.writes.push(write(group, entity, Some(row.id), slot, entry));
            }
            None => {
                let slot = take_free_slot(&mut used);
                plan.writes.push(write(group, entity, None, slot, entry));
            }
        }
    }

    plan
}

fn same_without_key(a: &RowValues, b: &RowValues, key: &str) -> bool {
    let strip = |values: &RowValues| {
        let mut values = values.clone();
        values.remove(key);
        values
    };
    same_values(&strip(a), &strip(b))
}

fn take_free_slot(used: &mut BTreeSet<u8>) -> Option<u8> {
    let slot = (0..=u8::MAX).find(|s| !used.contains(s))?;
    used.insert(slot);
    Some(slot)
}

fn write(
    group: &ListGroup,
    entity: EntityRef,
    row: Option<RowId>,
    slot: Option<u8>,
    values: RowValues,
) -> Operation {
    Operation::UpsertRow {
        entity,
        row,
        kind: group.kind.clone(),
        subtype: group.subtype,
        slot,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::row_values;
    use easync_store::{LocalId, RowKind};

    const ENTITY: EntityRef = EntityRef::Existing(LocalId(1));

    fn email_row(id: u64, slot: u8, address: &str) -> SubRow {
        SubRow {
            id: RowId(id),
            kind: RowKind::Email,
            subtype: None,
            slot: Some(slot),
            values: row_values([("address", address)]),
        }
    }

    fn emails(values: &[&str]) -> ListGroup {
        let mut group = ListGroup::bounded(RowKind::Email, 3, "address").case_insensitive();
        for v in values {
            group.push_value(*v);
        }
        group
    }

    fn upsert(row: Option<u64>, slot: u8, address: &str) -> Operation {
        Operation::UpsertRow {
            entity: ENTITY,
            row: row.map(RowId),
            kind: RowKind::Email,
            subtype: None,
            slot: Some(slot),
            values: row_values([("address", address)]),
        }
    }

    #[test]
    fn matching_is_case_insensitive() {
        let a = email_row(1, 0, "Ada@X.com");
        let plan = plan(&emails(&["ada@x.com"]), ENTITY, &[&a]);
        assert!(plan.writes.is_empty());
        assert_eq!(plan.reaffirmed, vec![RowId(1)]);
    }

    #[test]
    fn unmatched_entry_overwrites_stale_row() {
        let a = email_row(1, 0, "a@x");
        let b = email_row(2, 1, "b@x");
        let plan = plan(&emails(&["c@x", "a@x"]), ENTITY, &[&a, &b]);
        assert_eq!(plan.writes, vec![upsert(Some(2), 1, "c@x")]);
        assert_eq!(plan.reaffirmed, vec![RowId(1), RowId(2)]);
    }

    #[test]
    fn inserts_take_lowest_free_slot() {
        let b = email_row(2, 1, "b@x");
        let plan = plan(&emails(&["b@x", "c@x", "d@x"]), ENTITY, &[&b]);
        assert_eq!(
            plan.writes,
            vec![upsert(None, 0, "c@x"), upsert(None, 2, "d@x")]
        );
    }

    #[test]
    fn overflow_is_dropped() {
        let plan = plan(&emails(&["a@x", "b@x", "c@x", "d@x"]), ENTITY, &[]);
        assert_eq!(plan.writes.len(), 3);
        assert_eq!(plan.writes[2], upsert(None, 2, "c@x"));
    }

    #[test]
    fn duplicates_count_once() {
        let plan = plan(&emails(&["a@x", "A@X", "b@x"]), ENTITY, &[]);
        assert_eq!(plan.writes, vec![upsert(None, 0, "a@x"), upsert(None, 1, "b@x")]);
    }

    #[test]
    fn stale_rows_stay_unclaimed() {
        let a = email_row(1, 0, "a@x");
        let b = email_row(2, 1, "b@x");
        let plan = plan(&emails(&["b@x"]), ENTITY, &[&a, &b]);
        assert!(plan.writes.is_empty());
        assert_eq!(plan.reaffirmed, vec![RowId(2)]);
    }

    #[test]
    fn case_sensitive_lists_do_not_fold() {
        let mut group = ListGroup::bounded(RowKind::Phone, 2, "number").with_subtype(1);
        group.push_value("555-ABC");
        let row = SubRow {
            id: RowId(4),
            kind: RowKind::Phone,
            subtype: Some(1),
            slot: Some(0),
            values: row_values([("number", "555-abc")]),
        };
        let plan = plan(&group, ENTITY, &[&row]);
        // no match, so the stale row is overwritten in place
        assert_eq!(plan.writes.len(), 1);
        assert!(matches!(
            &plan.writes[0],
            Operation::UpsertRow { row: Some(RowId(4)), slot: Some(0), subtype: Some(1), .. }
        ));
    }
}
