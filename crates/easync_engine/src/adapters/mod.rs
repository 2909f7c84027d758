//! Collection parsers.
//!
//! Each adapter turns the records of one collection type into store
//! operations. The session drives the response document and hands every
//! `Add`/`Change` record to the adapter with the parser positioned on its
//! `ApplicationData`; the adapter reads the fields and reconciles them
//! against the stored entity through an [`ApplyContext`].

mod calendar;
mod contacts;
mod email;
pub(crate) mod folders;

pub use calendar::CalendarAdapter;
pub use contacts::{
    contact_data, contact_image, phone, postal, relation, ContactField, ContactsAdapter,
};
pub use email::EmailAdapter;
pub use folders::FolderChanges;

use crate::error::SyncResult;
use easync_protocol::{ApplicationData, CollectionClass, CollectionRequest, Next, Parser};
use easync_reconcile::{reconcile_into, RecordImage};
use easync_store::{
    Batch, EntitySnapshot, EntityStore, Filter, LocalId, Operation, RowValues, Scope,
};
use easync_wbxml::Tag;
use std::collections::{HashMap, HashSet};
use std::io::Read;

/// Maps tags to the columns of one row.
pub(crate) type ColumnTable = &'static [(Tag, &'static str)];

/// Returns the column a tag maps to.
pub(crate) fn column(table: ColumnTable, tag: Tag) -> Option<&'static str> {
    table.iter().find(|(t, _)| *t == tag).map(|(_, c)| *c)
}

/// Reads the children of `end` into row values; unknown tags are skipped.
pub(crate) fn read_row<R: Read>(
    parser: &mut Parser<R>,
    end: Tag,
    table: ColumnTable,
) -> SyncResult<RowValues> {
    let mut values = RowValues::new();
    while let Next::Tag(tag) = parser.next_tag(end)? {
        match column(table, tag) {
            Some(column) => {
                if let Some(value) = parser.value_opt()? {
                    values.insert(column.to_string(), value);
                }
            }
            None => parser.skip_tag()?,
        }
    }
    Ok(values)
}

/// Reads a container of repeated single-value tags (categories, children).
pub(crate) fn read_values<R: Read>(
    parser: &mut Parser<R>,
    end: Tag,
    item: Tag,
) -> SyncResult<Vec<String>> {
    let mut values = Vec::new();
    while let Next::Tag(tag) = parser.next_tag(end)? {
        if tag == item {
            if let Some(value) = parser.value_opt()? {
                values.push(value);
            }
        } else {
            parser.skip_tag()?;
        }
    }
    Ok(values)
}

/// Per-collection record handling.
pub trait CollectionAdapter {
    /// Item class handled by this adapter.
    fn class(&self) -> CollectionClass;

    /// Applies a record the server added.
    ///
    /// The parser is positioned on the record's `ApplicationData` tag.
    fn add<R: Read>(
        &mut self,
        parser: &mut Parser<R>,
        server_id: &str,
        cx: &mut ApplyContext<'_>,
    ) -> SyncResult<()>;

    /// Applies a record the server changed. Defaults to [`add`](Self::add):
    /// the server sends the full record.
    fn change<R: Read>(
        &mut self,
        parser: &mut Parser<R>,
        server_id: &str,
        cx: &mut ApplyContext<'_>,
    ) -> SyncResult<()> {
        self.add(parser, server_id, cx)
    }

    /// Applies a record the server deleted.
    fn delete(&mut self, server_id: &str, cx: &mut ApplyContext<'_>) -> SyncResult<()> {
        cx.delete(server_id).map(|_| ())
    }

    /// Deletes every local record of the collection.
    fn wipe(&mut self, cx: &mut ApplyContext<'_>) {
        cx.push(Operation::ClearScope);
    }

    /// Builds the upsync payload of a locally modified record, or `None` if
    /// this collection does not send local changes.
    fn upsync(&self, _snapshot: &EntitySnapshot) -> Option<ApplicationData> {
        None
    }

    /// Adjusts the collection part of the request (filters, body options).
    fn options(&self, _request: &mut CollectionRequest) {}
}

/// Counts of records applied in one exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyCounts {
    /// Records added.
    pub added: u64,
    /// Records changed.
    pub changed: u64,
    /// Records deleted.
    pub deleted: u64,
    /// Records skipped (incomplete or duplicate).
    pub skipped: u64,
}

/// What the current response has done to a record so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staged<'b> {
    /// Not mentioned yet.
    Untouched,
    /// Added or changed; the image the record will be reconciled with.
    Image(&'b RecordImage),
    /// Deleted.
    Deleted,
}

enum Entry {
    Op(Operation),
    /// A record reconciled when the batch is built; `None` once deleted.
    Record {
        existing: Option<EntitySnapshot>,
        image: Option<RecordImage>,
    },
}

/// Accumulates the batch of one exchange.
///
/// Nothing touches the store until the session applies the batch. Commands
/// are applied in order: a record mentioned more than once in one response
/// is reconciled once, from the combined image, against the last committed
/// state.
pub struct ApplyContext<'a> {
    store: &'a dyn EntityStore,
    scope: &'a Scope,
    entries: Vec<Entry>,
    records: HashMap<String, usize>,
    removed: HashSet<LocalId>,
    counts: ApplyCounts,
}

impl<'a> ApplyContext<'a> {
    /// Creates an empty context for `scope`.
    pub fn new(store: &'a dyn EntityStore, scope: &'a Scope) -> Self {
        Self {
            store,
            scope,
            entries: Vec::new(),
            records: HashMap::new(),
            removed: HashSet::new(),
            counts: ApplyCounts::default(),
        }
    }

    /// The scope being synced.
    pub fn scope(&self) -> &Scope {
        self.scope
    }

    /// Looks up the stored entity with `server_id`.
    pub fn existing(&self, server_id: &str) -> SyncResult<Option<EntitySnapshot>> {
        Ok(self.store.find_by_server_id(self.scope, server_id)?)
    }

    /// Queries the last committed state of the scope.
    pub fn query(&self, filter: &Filter) -> SyncResult<Vec<EntitySnapshot>> {
        Ok(self.store.query(self.scope, filter)?)
    }

    /// Returns what this response has done to `server_id` so far.
    pub fn staged(&self, server_id: &str) -> Staged<'_> {
        match self.records.get(server_id).map(|&i| &self.entries[i]) {
            Some(Entry::Record {
                image: Some(image), ..
            }) => Staged::Image(image),
            Some(_) => Staged::Deleted,
            None => Staged::Untouched,
        }
    }

    /// Appends a raw operation.
    pub fn push(&mut self, op: Operation) {
        self.entries.push(Entry::Op(op));
    }

    /// Stages a record image for `server_id` and returns false if it was
    /// dropped.
    ///
    /// A later image of a record already staged in this response is laid
    /// over the earlier one. An image after a delete starts a new record.
    pub fn apply_image(&mut self, server_id: &str, image: &RecordImage) -> SyncResult<bool> {
        if let Some(&index) = self.records.get(server_id) {
            if let Some(Entry::Record {
                image: Some(staged),
                ..
            }) = self.entries.get_mut(index)
            {
                staged.overlay(image);
                self.counts.changed += 1;
                return Ok(true);
            }
            self.stage(server_id, None, image);
            self.counts.added += 1;
            return Ok(true);
        }

        let existing = self.existing(server_id)?;
        match &existing {
            Some(snapshot) if self.removed.contains(&snapshot.local_id) => {
                tracing::debug!(server_id, "record deleted earlier in this batch, skipped");
                self.counts.skipped += 1;
                return Ok(false);
            }
            Some(_) => self.counts.changed += 1,
            None => self.counts.added += 1,
        }
        self.stage(server_id, existing, image);
        Ok(true)
    }

    fn stage(&mut self, server_id: &str, existing: Option<EntitySnapshot>, image: &RecordImage) {
        self.records
            .insert(server_id.to_string(), self.entries.len());
        self.entries.push(Entry::Record {
            existing,
            image: Some(image.clone()),
        });
    }

    /// Deletes the record of `server_id`, staged or stored, and returns
    /// false if there was none.
    pub fn delete(&mut self, server_id: &str) -> SyncResult<bool> {
        let entity = match self.records.get(server_id).map(|&i| &mut self.entries[i]) {
            Some(Entry::Record { existing, image }) => {
                if image.take().is_none() {
                    tracing::debug!(server_id, "record already deleted in this batch");
                    return Ok(false);
                }
                match existing {
                    Some(snapshot) => snapshot.local_id,
                    None => {
                        tracing::debug!(server_id, "add withdrawn by a later delete");
                        self.counts.deleted += 1;
                        return Ok(true);
                    }
                }
            }
            Some(Entry::Op(_)) => return Ok(false),
            None => match self.existing(server_id)? {
                Some(snapshot) => {
                    let entity = snapshot.local_id;
                    self.records
                        .insert(server_id.to_string(), self.entries.len());
                    self.entries.push(Entry::Record {
                        existing: Some(snapshot),
                        image: None,
                    });
                    entity
                }
                None => {
                    tracing::debug!(server_id, "delete for unknown record ignored");
                    return Ok(false);
                }
            },
        };
        Ok(self.remove(entity))
    }

    /// Deletes an entity by local id; returns false if it was already
    /// deleted in this batch.
    pub fn remove(&mut self, entity: LocalId) -> bool {
        if !self.removed.insert(entity) {
            return false;
        }
        self.entries.push(Entry::Op(Operation::DeleteEntity { entity }));
        self.counts.deleted += 1;
        true
    }

    /// Returns true if the entity is deleted by this batch.
    pub fn is_removed(&self, entity: LocalId) -> bool {
        self.removed.contains(&entity)
    }

    /// Counts a record that was skipped.
    pub fn skip(&mut self) {
        self.counts.skipped += 1;
    }

    /// Counts collected so far.
    pub fn counts(&self) -> ApplyCounts {
        self.counts
    }

    /// Consumes the context and reconciles the staged records into one
    /// batch, in the order they were first mentioned.
    pub fn into_batch(self) -> Batch {
        let mut batch = Batch::new();
        for entry in self.entries {
            match entry {
                Entry::Op(op) => {
                    batch.push(op);
                }
                Entry::Record {
                    existing,
                    image: Some(image),
                } => {
                    reconcile_into(&image, existing.as_ref(), &mut batch);
                }
                Entry::Record { image: None, .. } => {}
            }
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easync_reconcile::row_values;
    use easync_store::{InMemoryStore, RowKind};

    fn image(first: &str) -> RecordImage {
        let mut image = RecordImage::new([RowKind::Name]).with_server_id("1:1");
        image.singleton(RowKind::Name, row_values([("first", first)]));
        image
    }

    fn first_name(store: &InMemoryStore, scope: &Scope) -> Option<String> {
        let entity = store.find_by_server_id(scope, "1:1").unwrap()?;
        entity
            .row(&RowKind::Name)
            .and_then(|r| r.value("first"))
            .map(str::to_string)
    }

    #[test]
    fn later_image_of_a_new_record_wins() {
        let store = InMemoryStore::new();
        let scope = Scope::collection(1, "1");
        let mut cx = ApplyContext::new(&store, &scope);
        assert!(cx.apply_image("1:1", &image("Ada")).unwrap());
        assert!(cx.apply_image("1:1", &image("Grace")).unwrap());
        assert!(matches!(cx.staged("1:1"), Staged::Image(_)));
        assert_eq!((cx.counts().added, cx.counts().changed), (1, 1));

        let batch = cx.into_batch();
        assert_eq!(batch.len(), 2);
        store.apply_batch(&scope, &batch).unwrap();
        assert_eq!(store.entities(&scope).len(), 1);
        assert_eq!(first_name(&store, &scope).as_deref(), Some("Grace"));
    }

    #[test]
    fn delete_withdraws_a_staged_add() {
        let store = InMemoryStore::new();
        let scope = Scope::collection(1, "1");
        let mut cx = ApplyContext::new(&store, &scope);
        cx.apply_image("1:1", &image("Ada")).unwrap();
        assert!(cx.delete("1:1").unwrap());
        assert!(!cx.delete("1:1").unwrap());
        assert_eq!(cx.staged("1:1"), Staged::Deleted);
        assert_eq!(cx.counts().deleted, 1);
        assert!(cx.into_batch().is_empty());
    }

    #[test]
    fn second_change_of_a_stored_record_wins() {
        let store = InMemoryStore::new();
        let scope = Scope::collection(1, "1");
        store
            .apply_batch(&scope, &easync_reconcile::reconcile(&image("Ada"), None))
            .unwrap();

        let mut cx = ApplyContext::new(&store, &scope);
        cx.apply_image("1:1", &image("Grace")).unwrap();
        cx.apply_image("1:1", &image("Mary")).unwrap();
        assert_eq!(cx.counts().changed, 2);
        store.apply_batch(&scope, &cx.into_batch()).unwrap();
        assert_eq!(store.entities(&scope).len(), 1);
        assert_eq!(first_name(&store, &scope).as_deref(), Some("Mary"));
    }

    #[test]
    fn deletes_are_deduplicated() {
        let store = InMemoryStore::new();
        let scope = Scope::collection(1, "1");
        let batch = easync_reconcile::reconcile(&image("Ada"), None);
        store.apply_batch(&scope, &batch).unwrap();

        let mut cx = ApplyContext::new(&store, &scope);
        cx.apply_image("1:1", &image("Grace")).unwrap();
        assert!(cx.delete("1:1").unwrap());
        assert!(!cx.delete("1:1").unwrap());
        assert!(!cx.delete("1:404").unwrap());
        assert_eq!(cx.counts().deleted, 1);
        store.apply_batch(&scope, &cx.into_batch()).unwrap();
        assert!(store.entities(&scope).is_empty());
    }

    #[test]
    fn add_after_delete_recreates_the_record() {
        let store = InMemoryStore::new();
        let scope = Scope::collection(1, "1");
        store
            .apply_batch(&scope, &easync_reconcile::reconcile(&image("Ada"), None))
            .unwrap();
        let old = store.find_by_server_id(&scope, "1:1").unwrap().unwrap().local_id;

        let mut cx = ApplyContext::new(&store, &scope);
        cx.delete("1:1").unwrap();
        cx.apply_image("1:1", &image("Grace")).unwrap();
        store.apply_batch(&scope, &cx.into_batch()).unwrap();

        let entities = store.entities(&scope);
        assert_eq!(entities.len(), 1);
        assert_ne!(entities[0].local_id, old);
        assert_eq!(first_name(&store, &scope).as_deref(), Some("Grace"));
    }
}
