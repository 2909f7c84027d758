//! Compare-before-write for single rows.

use easync_store::{EntityRef, Operation, RowKind, RowValues, SubRow};

/// Drops empty columns so absent and empty compare equal.
#[must_use]
pub fn normalize(values: &RowValues) -> RowValues {
    values
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Returns true if two value maps are equal once empty columns are ignored.
#[must_use]
pub fn same_values(a: &RowValues, b: &RowValues) -> bool {
    normalize(a) == normalize(b)
}

/// Where a row write lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowTarget<'a> {
    /// Owning entity.
    pub entity: EntityRef,
    /// Row kind.
    pub kind: &'a RowKind,
    /// Subtype code.
    pub subtype: Option<i32>,
    /// Bounded-list slot.
    pub slot: Option<u8>,
}

/// Compares the new values of a row with the stored row.
///
/// Returns `None` when nothing needs writing: the values match, or the new
/// values are empty (the caller deletes the stale row instead). Otherwise
/// returns one upsert carrying the full new values, replacing `old` when
/// it exists.
#[must_use]
pub fn diff_row(target: RowTarget<'_>, new: &RowValues, old: Option<&SubRow>) -> Option<Operation> {
    let new = normalize(new);
    if new.is_empty() {
        return None;
    }
    if let Some(old) = old {
        if normalize(&old.values) == new && old.subtype == target.subtype && old.slot == target.slot
        {
            return None;
        }
    }
    Some(Operation::UpsertRow {
        entity: target.entity,
        row: old.map(|r| r.id),
        kind: target.kind.clone(),
        subtype: target.subtype,
        slot: target.slot,
        values: new,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::row_values;
    use easync_store::{LocalId, RowId};

    fn stored(values: RowValues) -> SubRow {
        SubRow {
            id: RowId(7),
            kind: RowKind::Organization,
            subtype: None,
            slot: None,
            values,
        }
    }

    fn target(kind: &RowKind) -> RowTarget<'_> {
        RowTarget {
            entity: EntityRef::Existing(LocalId(1)),
            kind,
            subtype: None,
            slot: None,
        }
    }

    #[test]
    fn absent_and_empty_are_equivalent() {
        let kind = RowKind::Organization;
        let old = stored(row_values([("company", "Acme"), ("title", "")]));
        let new = row_values([("company", "Acme"), ("department", "")]);
        assert_eq!(diff_row(target(&kind), &new, Some(&old)), None);
    }

    #[test]
    fn changed_values_replace_the_row() {
        let kind = RowKind::Organization;
        let old = stored(row_values([("company", "Acme")]));
        let new = row_values([("company", "Acme"), ("title", "Engineer")]);
        let op = diff_row(target(&kind), &new, Some(&old)).unwrap();
        assert_eq!(
            op,
            Operation::UpsertRow {
                entity: EntityRef::Existing(LocalId(1)),
                row: Some(RowId(7)),
                kind: RowKind::Organization,
                subtype: None,
                slot: None,
                values: new,
            }
        );
    }

    #[test]
    fn missing_row_is_inserted() {
        let kind = RowKind::Organization;
        let op = diff_row(target(&kind), &row_values([("company", "Acme")]), None).unwrap();
        assert!(matches!(op, Operation::UpsertRow { row: None, .. }));
    }

    #[test]
    fn empty_new_values_write_nothing() {
        let kind = RowKind::Organization;
        let old = stored(row_values([("company", "Acme")]));
        assert_eq!(diff_row(target(&kind), &row_values([("company", "")]), Some(&old)), None);
    }

    #[test]
    fn slot_change_is_a_write() {
        let kind = RowKind::Email;
        let mut old = stored(row_values([("address", "a@x")]));
        old.kind = RowKind::Email;
        old.slot = Some(1);
        let mut t = target(&kind);
        t.slot = Some(0);
        assert!(diff_row(t, &row_values([("address", "a@x")]), Some(&old)).is_some());
    }
}
