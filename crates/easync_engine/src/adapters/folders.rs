//! Folder hierarchy parser.

use super::ApplyContext;
use crate::error::{SyncError, SyncResult};
use easync_protocol::{FolderDescriptor, FolderRole, Next, Parser, SYNC_ISSUES};
use easync_reconcile::{row_values, RecordImage};
use easync_store::{EntitySnapshot, Filter, LocalId, RowKind};
use easync_wbxml::pages::folder;
use easync_wbxml::Tag;
use std::collections::{HashMap, HashSet};
use std::io::Read;

/// One hierarchy change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FolderChange {
    Add(FolderDescriptor),
    Update(FolderDescriptor),
    Delete(String),
}

/// Parsed FolderSync response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FolderSyncResponse {
    pub status: Option<i32>,
    pub sync_key: Option<String>,
    pub changes: Vec<FolderChange>,
}

impl FolderSyncResponse {
    pub fn parse<R: Read>(parser: &mut Parser<R>) -> SyncResult<Self> {
        parser.expect_root(folder::FOLDER_SYNC)?;
        let mut response = Self::default();
        while let Next::Tag(tag) = parser.next_tag(folder::FOLDER_SYNC)? {
            match tag {
                folder::STATUS => response.status = Some(parser.value_int()?),
                folder::SYNC_KEY => response.sync_key = Some(parser.value()?),
                folder::CHANGES => {
                    while let Next::Tag(tag) = parser.next_tag(folder::CHANGES)? {
                        match tag {
                            folder::ADD => response
                                .changes
                                .push(FolderChange::Add(parse_folder(parser, tag)?)),
                            folder::UPDATE => response
                                .changes
                                .push(FolderChange::Update(parse_folder(parser, tag)?)),
                            folder::DELETE => {
                                if let Some(id) = parse_deleted(parser)? {
                                    response.changes.push(FolderChange::Delete(id));
                                }
                            }
                            _ => parser.skip_tag()?,
                        }
                    }
                }
                _ => parser.skip_tag()?,
            }
        }
        Ok(response)
    }
}

fn parse_folder<R: Read>(parser: &mut Parser<R>, end: Tag) -> SyncResult<FolderDescriptor> {
    let mut server_id = None;
    let mut parent_id = None;
    let mut display_name = String::new();
    let mut folder_type = 0u8;
    while let Next::Tag(tag) = parser.next_tag(end)? {
        match tag {
            folder::SERVER_ID => server_id = Some(parser.value()?),
            folder::PARENT_ID => parent_id = parser.value_opt()?,
            folder::DISPLAY_NAME => display_name = parser.value_opt()?.unwrap_or_default(),
            folder::TYPE => folder_type = u8::try_from(parser.value_int()?).unwrap_or(0),
            _ => parser.skip_tag()?,
        }
    }
    let server_id = server_id
        .ok_or_else(|| SyncError::structure(format!("folder {display_name:?} has no server id")))?;
    Ok(FolderDescriptor::new(server_id, parent_id, display_name, folder_type))
}

fn parse_deleted<R: Read>(parser: &mut Parser<R>) -> SyncResult<Option<String>> {
    let mut server_id = None;
    while let Next::Tag(tag) = parser.next_tag(folder::DELETE)? {
        match tag {
            folder::SERVER_ID => server_id = Some(parser.value()?),
            _ => parser.skip_tag()?,
        }
    }
    Ok(server_id)
}

/// Folders added, updated, and deleted by one folder sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderChanges {
    /// New folders.
    pub added: Vec<FolderDescriptor>,
    /// Renamed or moved folders.
    pub updated: Vec<FolderDescriptor>,
    /// Server ids of deleted folders, descendants included.
    pub deleted: Vec<String>,
}

impl FolderChanges {
    /// Returns true if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

fn role_name(role: FolderRole) -> &'static str {
    match role {
        FolderRole::Generic => "generic",
        FolderRole::Inbox => "inbox",
        FolderRole::Drafts => "drafts",
        FolderRole::Trash => "trash",
        FolderRole::Sent => "sent",
        FolderRole::Outbox => "outbox",
        FolderRole::Tasks => "tasks",
        FolderRole::Calendar => "calendar",
        FolderRole::Contacts => "contacts",
        FolderRole::Notes => "notes",
        FolderRole::Journal => "journal",
        FolderRole::Mail => "mail",
        FolderRole::Other => "other",
    }
}

fn image(folder: &FolderDescriptor) -> RecordImage {
    let mut image = RecordImage::new([RowKind::Folder]).with_server_id(folder.server_id.clone());
    image.singleton(
        RowKind::Folder,
        row_values([
            ("name", folder.display_name.clone()),
            ("parent", folder.parent_id.clone().unwrap_or_default()),
            ("type", folder.folder_type.to_string()),
            ("role", role_name(folder.role).to_string()),
            ("visible", if folder.visible { "1" } else { "0" }.to_string()),
        ]),
    );
    image
}

/// Rebuilds a descriptor from a stored folder entity.
pub(crate) fn descriptor(snapshot: &EntitySnapshot) -> Option<FolderDescriptor> {
    let server_id = snapshot.server_id.clone()?;
    let row = snapshot.row(&RowKind::Folder)?;
    Some(FolderDescriptor::new(
        server_id,
        row.value("parent").map(str::to_string),
        row.value("name").unwrap_or_default(),
        row.value("type").and_then(|t| t.parse().ok()).unwrap_or(0),
    ))
}

struct KnownFolder {
    /// `None` for a folder added by the response being applied.
    local_id: Option<LocalId>,
    parent: Option<String>,
}

/// Applies hierarchy changes to the folder scope.
///
/// The server's conflict folder ("Sync Issues") and everything under it is
/// noise: it is never stored, and any copy already stored is deleted.
pub(crate) struct FolderApplier {
    folders: HashMap<String, KnownFolder>,
    noise: HashSet<String>,
    changes: FolderChanges,
}

impl FolderApplier {
    pub fn load(cx: &ApplyContext<'_>) -> SyncResult<Self> {
        let mut folders = HashMap::new();
        let mut roots = Vec::new();
        for snapshot in cx.query(&Filter::All)? {
            let Some(folder) = descriptor(&snapshot) else {
                continue;
            };
            if folder.is_sync_issues() {
                roots.push(folder.server_id.clone());
            }
            folders.insert(
                folder.server_id,
                KnownFolder {
                    local_id: Some(snapshot.local_id),
                    parent: folder.parent_id,
                },
            );
        }
        let mut applier = Self {
            folders,
            noise: HashSet::new(),
            changes: FolderChanges::default(),
        };
        for root in roots {
            let subtree = applier.subtree(&root);
            applier.noise.extend(subtree);
        }
        Ok(applier)
    }

    /// Server ids of `root` and every known folder below it, stored or
    /// added earlier in this response.
    fn subtree(&self, root: &str) -> Vec<String> {
        let mut out = vec![root.to_string()];
        let mut i = 0;
        while i < out.len() {
            let children: Vec<String> = self
                .folders
                .iter()
                .filter(|(id, f)| f.parent.as_deref() == Some(out[i].as_str()) && !out.contains(id))
                .map(|(id, _)| id.clone())
                .collect();
            out.extend(children);
            i += 1;
        }
        out
    }

    fn is_noise(&self, folder: &FolderDescriptor) -> bool {
        folder.display_name == SYNC_ISSUES
            || folder
                .parent_id
                .as_ref()
                .is_some_and(|p| self.noise.contains(p))
    }

    fn track(&mut self, folder: &FolderDescriptor) {
        self.folders
            .entry(folder.server_id.clone())
            .and_modify(|f| f.parent.clone_from(&folder.parent_id))
            .or_insert_with(|| KnownFolder {
                local_id: None,
                parent: folder.parent_id.clone(),
            });
    }

    pub fn apply(&mut self, change: FolderChange, cx: &mut ApplyContext<'_>) -> SyncResult<()> {
        match change {
            FolderChange::Add(folder) | FolderChange::Update(folder) if self.is_noise(&folder) => {
                tracing::debug!(
                    server_id = %folder.server_id,
                    name = %folder.display_name,
                    "skipping sync issues folder"
                );
                let subtree = self.subtree(&folder.server_id);
                self.noise.extend(subtree);
                cx.skip();
            }
            FolderChange::Add(folder) => {
                cx.apply_image(&folder.server_id, &image(&folder))?;
                self.track(&folder);
                self.changes.added.push(folder);
            }
            FolderChange::Update(folder) => {
                cx.apply_image(&folder.server_id, &image(&folder))?;
                self.track(&folder);
                self.changes.updated.push(folder);
            }
            FolderChange::Delete(server_id) => self.delete_subtree(&server_id, cx)?,
        }
        Ok(())
    }

    fn delete_subtree(&mut self, root: &str, cx: &mut ApplyContext<'_>) -> SyncResult<()> {
        if !self.folders.contains_key(root) && !self.noise.contains(root) {
            tracing::debug!(server_id = %root, "delete for unknown folder ignored");
        }
        for id in self.subtree(root) {
            let Some(folder) = self.folders.remove(&id) else {
                continue;
            };
            let deleted = cx.delete(&id)?;
            match folder.local_id {
                Some(_) if deleted && !self.noise.contains(&id) => {
                    self.changes.added.retain(|f| f.server_id != id);
                    self.changes.updated.retain(|f| f.server_id != id);
                    self.changes.deleted.push(id);
                }
                Some(_) => {}
                None => {
                    // never stored; the caller never hears of it
                    self.changes.added.retain(|f| f.server_id != id);
                    self.changes.updated.retain(|f| f.server_id != id);
                }
            }
        }
        Ok(())
    }

    /// Deletes stored noise folders and returns the changes.
    pub fn finish(mut self, cx: &mut ApplyContext<'_>) -> FolderChanges {
        let stored_noise: Vec<LocalId> = self
            .noise
            .iter()
            .filter_map(|id| self.folders.get(id).and_then(|f| f.local_id))
            .collect();
        for local_id in stored_noise {
            cx.remove(local_id);
        }
        std::mem::take(&mut self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easync_reconcile::reconcile;
    use easync_store::{EntityStore, InMemoryStore, Scope};

    fn stored(store: &InMemoryStore, scope: &Scope, folders: &[FolderDescriptor]) {
        for folder in folders {
            store.apply_batch(scope, &reconcile(&image(folder), None)).unwrap();
        }
    }

    fn run(store: &InMemoryStore, scope: &Scope, changes: Vec<FolderChange>) -> FolderChanges {
        let mut cx = ApplyContext::new(store, scope);
        let mut applier = FolderApplier::load(&cx).unwrap();
        for change in changes {
            applier.apply(change, &mut cx).unwrap();
        }
        let result = applier.finish(&mut cx);
        store.apply_batch(scope, &cx.into_batch()).unwrap();
        result
    }

    fn names(store: &InMemoryStore, scope: &Scope) -> Vec<String> {
        let mut names: Vec<String> = store
            .entities(scope)
            .iter()
            .filter_map(descriptor)
            .map(|f| f.display_name)
            .collect();
        names.sort();
        names
    }

    #[test]
    fn adds_and_updates_folders() {
        let store = InMemoryStore::new();
        let scope = Scope::hierarchy(1);
        let changes = run(
            &store,
            &scope,
            vec![
                FolderChange::Add(FolderDescriptor::new("1", Some("0".into()), "Inbox", 2)),
                FolderChange::Add(FolderDescriptor::new("2", Some("0".into()), "Contacts", 9)),
            ],
        );
        assert_eq!(changes.added.len(), 2);

        let changes = run(
            &store,
            &scope,
            vec![FolderChange::Update(FolderDescriptor::new("1", None, "Posteingang", 2))],
        );
        assert_eq!(changes.updated.len(), 1);
        assert_eq!(names(&store, &scope), vec!["Contacts", "Posteingang"]);

        let snapshot = store.find_by_server_id(&scope, "2").unwrap().unwrap();
        let row = snapshot.row(&RowKind::Folder).unwrap();
        assert_eq!(row.value("role"), Some("contacts"));
        assert_eq!(row.value("visible"), Some("0"));
    }

    #[test]
    fn sync_issues_and_children_are_never_stored() {
        let store = InMemoryStore::new();
        let scope = Scope::hierarchy(1);
        let changes = run(
            &store,
            &scope,
            vec![
                FolderChange::Add(FolderDescriptor::new("1", None, "Inbox", 2)),
                FolderChange::Add(FolderDescriptor::new("9", None, SYNC_ISSUES, 12)),
                FolderChange::Add(FolderDescriptor::new("10", Some("9".into()), "Conflicts", 12)),
                FolderChange::Add(FolderDescriptor::new("11", Some("10".into()), "Deep", 12)),
            ],
        );
        assert_eq!(changes.added.len(), 1);
        assert_eq!(names(&store, &scope), vec!["Inbox"]);
    }

    #[test]
    fn stored_sync_issues_are_removed() {
        let store = InMemoryStore::new();
        let scope = Scope::hierarchy(1);
        stored(
            &store,
            &scope,
            &[
                FolderDescriptor::new("1", None, "Inbox", 2),
                FolderDescriptor::new("9", None, SYNC_ISSUES, 12),
                FolderDescriptor::new("10", Some("9".into()), "Local Failures", 12),
            ],
        );
        let changes = run(&store, &scope, Vec::new());
        assert!(changes.is_empty());
        assert_eq!(names(&store, &scope), vec!["Inbox"]);
    }

    #[test]
    fn deleting_a_folder_deletes_its_subtree() {
        let store = InMemoryStore::new();
        let scope = Scope::hierarchy(1);
        stored(
            &store,
            &scope,
            &[
                FolderDescriptor::new("1", None, "Inbox", 2),
                FolderDescriptor::new("5", Some("1".into()), "Receipts", 12),
                FolderDescriptor::new("6", Some("5".into()), "2024", 12),
            ],
        );
        let mut changes = run(&store, &scope, vec![FolderChange::Delete("5".into())]);
        changes.deleted.sort();
        assert_eq!(changes.deleted, vec!["5", "6"]);
        assert_eq!(names(&store, &scope), vec!["Inbox"]);

        // a later delete of the child is a no-op
        let changes = run(&store, &scope, vec![FolderChange::Delete("6".into())]);
        assert!(changes.deleted.is_empty());
    }

    #[test]
    fn deleting_a_parent_takes_children_added_in_the_same_response() {
        let store = InMemoryStore::new();
        let scope = Scope::hierarchy(1);
        let changes = run(
            &store,
            &scope,
            vec![
                FolderChange::Add(FolderDescriptor::new("1", None, "Inbox", 2)),
                FolderChange::Add(FolderDescriptor::new("5", Some("1".into()), "Projects", 12)),
                FolderChange::Add(FolderDescriptor::new("6", Some("5".into()), "Engine", 12)),
                FolderChange::Delete("5".into()),
            ],
        );
        assert_eq!(names(&store, &scope), vec!["Inbox"]);
        assert_eq!(changes.added.len(), 1);
        assert!(changes.deleted.is_empty());
    }

    #[test]
    fn deleting_a_stored_parent_takes_new_children() {
        let store = InMemoryStore::new();
        let scope = Scope::hierarchy(1);
        stored(
            &store,
            &scope,
            &[
                FolderDescriptor::new("1", None, "Inbox", 2),
                FolderDescriptor::new("5", Some("1".into()), "Receipts", 12),
            ],
        );
        let changes = run(
            &store,
            &scope,
            vec![
                FolderChange::Add(FolderDescriptor::new("6", Some("5".into()), "2024", 12)),
                FolderChange::Update(FolderDescriptor::new("5", Some("1".into()), "Bills", 12)),
                FolderChange::Delete("5".into()),
            ],
        );
        assert_eq!(names(&store, &scope), vec!["Inbox"]);
        assert_eq!(changes.deleted, vec!["5"]);
        assert!(changes.added.is_empty());
        assert!(changes.updated.is_empty());
    }

    #[test]
    fn parses_a_folder_sync_response() {
        use easync_wbxml::Serializer;
        let mut s = Serializer::new();
        s.start(folder::FOLDER_SYNC)
            .data(folder::STATUS, "1")
            .data(folder::SYNC_KEY, "k1")
            .start(folder::CHANGES)
            .data(folder::COUNT, "2")
            .start(folder::ADD)
            .data(folder::SERVER_ID, "1")
            .data(folder::PARENT_ID, "0")
            .data(folder::DISPLAY_NAME, "Inbox")
            .data(folder::TYPE, "2")
            .end()
            .start(folder::DELETE)
            .data(folder::SERVER_ID, "7")
            .end()
            .end()
            .end();
        let bytes = s.done().unwrap();
        let response = FolderSyncResponse::parse(&mut Parser::new(&bytes[..])).unwrap();
        assert_eq!(response.status, Some(1));
        assert_eq!(response.sync_key.as_deref(), Some("k1"));
        assert_eq!(
            response.changes,
            vec![
                FolderChange::Add(FolderDescriptor::new("1", None, "Inbox", 2)),
                FolderChange::Delete("7".into()),
            ]
        );
    }
}
