//! Store operations, batches, and query filters.

use crate::types::{LocalId, RowId, RowKind, RowValues};

/// Reference to the entity an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    /// An entity that already exists in the store.
    Existing(LocalId),
    /// The entity created by the `CreateEntity` at this index of the same batch.
    Created(usize),
}

/// One store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create a new entity.
    CreateEntity {
        /// Server identifier, if the server assigned the record.
        server_id: Option<String>,
        /// Whether the entity starts out locally modified.
        dirty: bool,
    },
    /// Delete an entity and all its rows.
    DeleteEntity {
        /// Target entity.
        entity: LocalId,
    },
    /// Insert (`row: None`) or replace a sub-row.
    UpsertRow {
        /// Target entity.
        entity: EntityRef,
        /// Existing row to replace.
        row: Option<RowId>,
        /// Row kind.
        kind: RowKind,
        /// Row subtype.
        subtype: Option<i32>,
        /// Slot index within a bounded list.
        slot: Option<u8>,
        /// Full column values.
        values: RowValues,
    },
    /// Delete one sub-row.
    DeleteRow {
        /// Owning entity.
        entity: LocalId,
        /// Row to delete.
        row: RowId,
    },
    /// Record the server identifier of a locally created entity and clear its dirty flag.
    SetServerId {
        /// Target entity.
        entity: LocalId,
        /// Server-assigned identifier.
        server_id: String,
    },
    /// Clear an entity's dirty flag.
    MarkClean {
        /// Target entity.
        entity: LocalId,
    },
    /// Flag an entity as locally modified.
    MarkDirty {
        /// Target entity.
        entity: LocalId,
    },
    /// Flag an entity as locally deleted, pending upload.
    MarkDeleted {
        /// Target entity.
        entity: LocalId,
    },
    /// Delete every entity in the scope.
    ClearScope,
    /// Persist the scope's sync state as part of the same atomic apply.
    SetSyncState(Vec<u8>),
}

/// Result of one applied operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpResult {
    /// An entity was created.
    Created(LocalId),
    /// A row was inserted or replaced.
    RowWritten(RowId),
    /// Any other operation succeeded.
    Done,
}

/// An ordered list of operations applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<Operation>,
}

impl Batch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation and returns its index.
    pub fn push(&mut self, op: Operation) -> usize {
        self.ops.push(op);
        self.ops.len() - 1
    }

    /// Appends another batch, rebasing its back-references.
    pub fn append(&mut self, other: Batch) {
        let offset = self.ops.len();
        self.ops.extend(other.ops.into_iter().map(|op| match op {
            Operation::UpsertRow {
                entity: EntityRef::Created(index),
                row,
                kind,
                subtype,
                slot,
                values,
            } => Operation::UpsertRow {
                entity: EntityRef::Created(index + offset),
                row,
                kind,
                subtype,
                slot,
                values,
            },
            op => op,
        }));
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if the batch has no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Iterates over the operations in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.ops.iter()
    }

    /// Returns the operations as a slice.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

impl From<Vec<Operation>> for Batch {
    fn from(ops: Vec<Operation>) -> Self {
        Self { ops }
    }
}

/// Selects entities in a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Every entity in the scope.
    All,
    /// The entity with this server identifier.
    ServerId(String),
    /// The entity with this local identifier.
    LocalId(LocalId),
    /// Entities pending upload (dirty or locally deleted).
    Pending,
    /// Entities with a row of `kind` whose column `key` equals `value`.
    RowValue {
        /// Row kind.
        kind: RowKind,
        /// Column name.
        key: String,
        /// Required value.
        value: String,
    },
}
