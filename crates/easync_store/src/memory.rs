//! In-memory entity store.

use crate::batch::{Batch, EntityRef, Filter, OpResult, Operation};
use crate::error::{StoreError, StoreResult};
use crate::store::EntityStore;
use crate::types::{EntitySnapshot, LocalId, RowId, Scope, SubRow};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default)]
struct ScopeData {
    entities: BTreeMap<LocalId, EntitySnapshot>,
    sync_state: Option<Vec<u8>>,
}

/// An in-memory entity store.
///
/// Batches are applied to a copy of the scope and swapped in only when
/// every operation succeeds, which gives the atomicity the engine relies on.
///
/// # Example
///
/// ```rust
/// use easync_store::{Batch, EntityStore, Filter, InMemoryStore, Operation, Scope};
///
/// let store = InMemoryStore::new();
/// let scope = Scope::collection(1, "7");
/// let mut batch = Batch::new();
/// batch.push(Operation::CreateEntity { server_id: Some("7:1".into()), dirty: false });
/// batch.push(Operation::SetSyncState(b"42".to_vec()));
/// store.apply_batch(&scope, &batch).unwrap();
///
/// assert_eq!(store.query(&scope, &Filter::All).unwrap().len(), 1);
/// assert_eq!(store.sync_state(&scope).unwrap(), Some(b"42".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    scopes: RwLock<HashMap<Scope, ScopeData>>,
    next_id: AtomicU64,
    fail_next: Mutex<Option<String>>,
    batches_applied: AtomicU64,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `apply_batch` fail with [`StoreError::Rejected`].
    ///
    /// Useful for testing that sync keys do not advance past failed applies.
    pub fn fail_next_apply(&self, reason: impl Into<String>) {
        *self.fail_next.lock() = Some(reason.into());
    }

    /// Number of batches applied successfully.
    #[must_use]
    pub fn batches_applied(&self) -> u64 {
        self.batches_applied.load(Ordering::SeqCst)
    }

    /// Returns every entity of a scope.
    #[must_use]
    pub fn entities(&self, scope: &Scope) -> Vec<EntitySnapshot> {
        self.scopes
            .read()
            .get(scope)
            .map(|d| d.entities.values().cloned().collect())
            .unwrap_or_default()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn apply_op(
        &self,
        data: &mut ScopeData,
        op: &Operation,
        created: &[Option<LocalId>],
    ) -> StoreResult<OpResult> {
        match op {
            Operation::CreateEntity { server_id, dirty } => {
                let local_id = LocalId(self.next_id());
                data.entities.insert(
                    local_id,
                    EntitySnapshot {
                        local_id,
                        server_id: server_id.clone(),
                        dirty: *dirty,
                        deleted: false,
                        rows: Vec::new(),
                    },
                );
                Ok(OpResult::Created(local_id))
            }
            Operation::DeleteEntity { entity } => {
                data.entities
                    .remove(entity)
                    .ok_or(StoreError::EntityNotFound(*entity))?;
                Ok(OpResult::Done)
            }
            Operation::UpsertRow {
                entity,
                row,
                kind,
                subtype,
                slot,
                values,
            } => {
                let local_id = resolve(*entity, created)?;
                let snapshot = entity_mut(data, local_id)?;
                match row {
                    Some(row_id) => {
                        let existing = snapshot
                            .rows
                            .iter_mut()
                            .find(|r| r.id == *row_id)
                            .ok_or(StoreError::RowNotFound(*row_id))?;
                        existing.kind = kind.clone();
                        existing.subtype = *subtype;
                        existing.slot = *slot;
                        existing.values = values.clone();
                        Ok(OpResult::RowWritten(*row_id))
                    }
                    None => {
                        let row_id = RowId(self.next_id());
                        snapshot.rows.push(SubRow {
                            id: row_id,
                            kind: kind.clone(),
                            subtype: *subtype,
                            slot: *slot,
                            values: values.clone(),
                        });
                        Ok(OpResult::RowWritten(row_id))
                    }
                }
            }
            Operation::DeleteRow { entity, row } => {
                let snapshot = entity_mut(data, *entity)?;
                let before = snapshot.rows.len();
                snapshot.rows.retain(|r| r.id != *row);
                if snapshot.rows.len() == before {
                    return Err(StoreError::RowNotFound(*row));
                }
                Ok(OpResult::Done)
            }
            Operation::SetServerId { entity, server_id } => {
                let snapshot = entity_mut(data, *entity)?;
                snapshot.server_id = Some(server_id.clone());
                snapshot.dirty = false;
                Ok(OpResult::Done)
            }
            Operation::MarkClean { entity } => {
                entity_mut(data, *entity)?.dirty = false;
                Ok(OpResult::Done)
            }
            Operation::MarkDirty { entity } => {
                entity_mut(data, *entity)?.dirty = true;
                Ok(OpResult::Done)
            }
            Operation::MarkDeleted { entity } => {
                entity_mut(data, *entity)?.deleted = true;
                Ok(OpResult::Done)
            }
            Operation::ClearScope => {
                data.entities.clear();
                Ok(OpResult::Done)
            }
            Operation::SetSyncState(state) => {
                data.sync_state = Some(state.clone());
                Ok(OpResult::Done)
            }
        }
    }
}

fn resolve(entity: EntityRef, created: &[Option<LocalId>]) -> StoreResult<LocalId> {
    match entity {
        EntityRef::Existing(id) => Ok(id),
        EntityRef::Created(index) => created
            .get(index)
            .copied()
            .flatten()
            .ok_or(StoreError::BadReference { index }),
    }
}

fn entity_mut(data: &mut ScopeData, id: LocalId) -> StoreResult<&mut EntitySnapshot> {
    data.entities
        .get_mut(&id)
        .ok_or(StoreError::EntityNotFound(id))
}

fn matches(entity: &EntitySnapshot, filter: &Filter) -> bool {
    match filter {
        Filter::All => true,
        Filter::ServerId(id) => entity.server_id.as_deref() == Some(id.as_str()),
        Filter::LocalId(id) => entity.local_id == *id,
        Filter::Pending => entity.dirty || entity.deleted,
        Filter::RowValue { kind, key, value } => entity
            .rows_of(kind)
            .any(|r| r.value(key) == Some(value.as_str())),
    }
}

impl EntityStore for InMemoryStore {
    fn query(&self, scope: &Scope, filter: &Filter) -> StoreResult<Vec<EntitySnapshot>> {
        Ok(self
            .scopes
            .read()
            .get(scope)
            .map(|d| {
                d.entities
                    .values()
                    .filter(|e| matches(e, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn apply_batch(&self, scope: &Scope, batch: &Batch) -> StoreResult<Vec<OpResult>> {
        let mut scopes = self.scopes.write();
        if let Some(reason) = self.fail_next.lock().take() {
            return Err(StoreError::Rejected(reason));
        }

        let mut data = scopes.get(scope).cloned().unwrap_or_default();
        let mut created = Vec::with_capacity(batch.len());
        let mut results = Vec::with_capacity(batch.len());
        for op in batch {
            let result = self.apply_op(&mut data, op, &created)?;
            created.push(match result {
                OpResult::Created(id) => Some(id),
                _ => None,
            });
            results.push(result);
        }

        scopes.insert(scope.clone(), data);
        self.batches_applied.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(%scope, ops = batch.len(), "batch applied");
        Ok(results)
    }

    fn sync_state(&self, scope: &Scope) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .scopes
            .read()
            .get(scope)
            .and_then(|d| d.sync_state.clone()))
    }

    fn set_sync_state(&self, scope: &Scope, state: &[u8]) -> StoreResult<()> {
        self.scopes
            .write()
            .entry(scope.clone())
            .or_default()
            .sync_state = Some(state.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RowKind, RowValues};

    fn values(pairs: &[(&str, &str)]) -> RowValues {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn create_with_email(server_id: &str, email: &str) -> Batch {
        let mut batch = Batch::new();
        let idx = batch.push(Operation::CreateEntity {
            server_id: Some(server_id.into()),
            dirty: false,
        });
        batch.push(Operation::UpsertRow {
            entity: EntityRef::Created(idx),
            row: None,
            kind: RowKind::Email,
            subtype: None,
            slot: Some(0),
            values: values(&[("address", email)]),
        });
        batch
    }

    #[test]
    fn back_reference_targets_created_entity() {
        let store = InMemoryStore::new();
        let scope = Scope::collection(1, "2");
        let results = store
            .apply_batch(&scope, &create_with_email("2:1", "a@x.com"))
            .unwrap();
        let OpResult::Created(id) = results[0] else {
            panic!("expected create result");
        };

        let found = store.find_by_server_id(&scope, "2:1").unwrap().unwrap();
        assert_eq!(found.local_id, id);
        assert_eq!(found.rows.len(), 1);
        assert_eq!(found.rows[0].value("address"), Some("a@x.com"));
        assert_eq!(found.rows[0].slot, Some(0));
    }

    #[test]
    fn failed_batch_leaves_scope_untouched() {
        let store = InMemoryStore::new();
        let scope = Scope::collection(1, "2");
        store
            .apply_batch(&scope, &create_with_email("2:1", "a@x.com"))
            .unwrap();
        store.set_sync_state(&scope, b"1").unwrap();

        let mut batch = create_with_email("2:2", "b@x.com");
        batch.push(Operation::SetSyncState(b"2".to_vec()));
        batch.push(Operation::DeleteRow {
            entity: LocalId(999),
            row: RowId(999),
        });
        let err = store.apply_batch(&scope, &batch).unwrap_err();
        assert_eq!(err, StoreError::EntityNotFound(LocalId(999)));

        assert_eq!(store.entities(&scope).len(), 1);
        assert_eq!(store.sync_state(&scope).unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn injected_failure_is_one_shot() {
        let store = InMemoryStore::new();
        let scope = Scope::hierarchy(1);
        store.fail_next_apply("disk full");
        let batch = Batch::from(vec![Operation::SetSyncState(b"5".to_vec())]);
        assert!(matches!(
            store.apply_batch(&scope, &batch),
            Err(StoreError::Rejected(_))
        ));
        store.apply_batch(&scope, &batch).unwrap();
        assert_eq!(store.sync_state(&scope).unwrap(), Some(b"5".to_vec()));
        assert_eq!(store.batches_applied(), 1);
    }

    #[test]
    fn bad_back_reference_is_rejected() {
        let store = InMemoryStore::new();
        let scope = Scope::collection(1, "2");
        let batch = Batch::from(vec![Operation::UpsertRow {
            entity: EntityRef::Created(0),
            row: None,
            kind: RowKind::Note,
            subtype: None,
            slot: None,
            values: RowValues::new(),
        }]);
        assert_eq!(
            store.apply_batch(&scope, &batch),
            Err(StoreError::BadReference { index: 0 })
        );
    }

    #[test]
    fn filters_select_entities() {
        let store = InMemoryStore::new();
        let scope = Scope::hierarchy(1);
        let mut batch = Batch::new();
        for (id, name) in [("1", "Inbox"), ("2", "Sync Issues")] {
            let idx = batch.push(Operation::CreateEntity {
                server_id: Some(id.into()),
                dirty: false,
            });
            batch.push(Operation::UpsertRow {
                entity: EntityRef::Created(idx),
                row: None,
                kind: RowKind::Folder,
                subtype: None,
                slot: None,
                values: values(&[("display_name", name)]),
            });
        }
        store.apply_batch(&scope, &batch).unwrap();

        let found = store
            .query(
                &scope,
                &Filter::RowValue {
                    kind: RowKind::Folder,
                    key: "display_name".into(),
                    value: "Sync Issues".into(),
                },
            )
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].server_id.as_deref(), Some("2"));
        assert!(store.query(&scope, &Filter::Pending).unwrap().is_empty());

        let id = found[0].local_id;
        store
            .apply_batch(&scope, &Batch::from(vec![Operation::MarkDirty { entity: id }]))
            .unwrap();
        assert_eq!(store.query(&scope, &Filter::Pending).unwrap().len(), 1);
        assert_eq!(store.query(&scope, &Filter::LocalId(id)).unwrap().len(), 1);
    }

    #[test]
    fn clear_scope_keeps_other_scopes() {
        let store = InMemoryStore::new();
        let a = Scope::collection(1, "a");
        let b = Scope::collection(1, "b");
        store.apply_batch(&a, &create_with_email("a:1", "x@y")).unwrap();
        store.apply_batch(&b, &create_with_email("b:1", "x@y")).unwrap();
        store
            .apply_batch(&a, &Batch::from(vec![Operation::ClearScope]))
            .unwrap();
        assert!(store.entities(&a).is_empty());
        assert_eq!(store.entities(&b).len(), 1);
    }

    #[test]
    fn set_server_id_clears_dirty() {
        let store = InMemoryStore::new();
        let scope = Scope::collection(1, "2");
        let results = store
            .apply_batch(
                &scope,
                &Batch::from(vec![Operation::CreateEntity {
                    server_id: None,
                    dirty: true,
                }]),
            )
            .unwrap();
        let OpResult::Created(id) = results[0] else {
            panic!("expected create result");
        };
        store
            .apply_batch(
                &scope,
                &Batch::from(vec![Operation::SetServerId {
                    entity: id,
                    server_id: "2:9".into(),
                }]),
            )
            .unwrap();
        let entity = store.find_by_server_id(&scope, "2:9").unwrap().unwrap();
        assert!(!entity.dirty);
    }
}
