//! Record reconciliation.

use crate::diff::{diff_row, RowTarget};
use crate::image::{Group, RecordImage};
use crate::list;
use easync_store::{Batch, EntityRef, EntitySnapshot, Operation, RowId, SubRow};
use std::collections::HashSet;

/// Computes the operations that make `existing` match `image`.
///
/// See [`reconcile_into`].
#[must_use]
pub fn reconcile(image: &RecordImage, existing: Option<&EntitySnapshot>) -> Batch {
    let mut batch = Batch::new();
    reconcile_into(image, existing, &mut batch);
    batch
}

/// Appends the operations that make `existing` match `image` to `batch`
/// and returns how many were appended.
///
/// Without a snapshot the record is created first and every row write
/// refers back to that create. Singleton and typed groups are compared
/// against the stored row of the same kind (and subtype); list groups are
/// placed by the bounded-list policy. Every stored row of a managed kind
/// that no group reaffirmed is deleted, exactly once.
pub fn reconcile_into(
    image: &RecordImage,
    existing: Option<&EntitySnapshot>,
    batch: &mut Batch,
) -> usize {
    let start = batch.len();
    let entity = match existing {
        Some(snapshot) => EntityRef::Existing(snapshot.local_id),
        None => EntityRef::Created(batch.push(Operation::CreateEntity {
            server_id: image.server_id.clone(),
            dirty: false,
        })),
    };
    let rows: &[SubRow] = existing.map_or(&[], |s| s.rows.as_slice());
    let mut reaffirmed: HashSet<RowId> = HashSet::new();

    for group in &image.groups {
        match group {
            Group::Singleton { kind, values } => {
                let old = rows
                    .iter()
                    .find(|r| &r.kind == kind && !reaffirmed.contains(&r.id));
                if let Some(old) = old {
                    reaffirmed.insert(old.id);
                }
                let target = RowTarget {
                    entity,
                    kind,
                    subtype: None,
                    slot: None,
                };
                if let Some(op) = diff_row(target, values, old) {
                    batch.push(op);
                }
            }
            Group::Typed {
                kind,
                subtype,
                values,
            } => {
                let old = rows
                    .iter()
                    .find(|r| {
                        &r.kind == kind
                            && r.subtype == Some(*subtype)
                            && !reaffirmed.contains(&r.id)
                    });
                if let Some(old) = old {
                    reaffirmed.insert(old.id);
                }
                let target = RowTarget {
                    entity,
                    kind,
                    subtype: Some(*subtype),
                    slot: None,
                };
                if let Some(op) = diff_row(target, values, old) {
                    batch.push(op);
                }
            }
            Group::List(group) => {
                let candidates: Vec<&SubRow> = rows
                    .iter()
                    .filter(|r| r.kind == group.kind && r.subtype == group.subtype)
                    .collect();
                let plan = list::plan(group, entity, &candidates);
                reaffirmed.extend(plan.reaffirmed);
                for op in plan.writes {
                    batch.push(op);
                }
            }
        }
    }

    if let Some(snapshot) = existing {
        for row in &snapshot.rows {
            if image.manages(&row.kind) && !reaffirmed.contains(&row.id) {
                batch.push(Operation::DeleteRow {
                    entity: snapshot.local_id,
                    row: row.id,
                });
            }
        }
    }

    batch.len() - start
}
