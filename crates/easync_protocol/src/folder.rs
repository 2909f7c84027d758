//! Folder types, roles, and the folder sync request.

use bytes::Bytes;
use easync_wbxml::pages::folder;
use easync_wbxml::{Serializer, WbxmlResult};
use serde::Serialize;
use std::fmt;

/// The parent id servers send for top-level folders.
pub const ROOT_PARENT_ID: &str = "0";

/// Display name of the server-generated conflict folder that is never kept.
pub const SYNC_ISSUES: &str = "Sync Issues";

/// Item class of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CollectionClass {
    /// Mail messages.
    Email,
    /// Contacts.
    Contacts,
    /// Calendar events.
    Calendar,
    /// Tasks.
    Tasks,
    /// Notes.
    Notes,
}

impl CollectionClass {
    /// The class name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionClass::Email => "Email",
            CollectionClass::Contacts => "Contacts",
            CollectionClass::Calendar => "Calendar",
            CollectionClass::Tasks => "Tasks",
            CollectionClass::Notes => "Notes",
        }
    }
}

impl fmt::Display for CollectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local classification of a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FolderRole {
    /// User-created folder of unspecified type.
    Generic,
    /// Default inbox.
    Inbox,
    /// Default drafts.
    Drafts,
    /// Deleted items.
    Trash,
    /// Sent items.
    Sent,
    /// Outbox.
    Outbox,
    /// Tasks, default or user-created.
    Tasks,
    /// Calendar, default or user-created.
    Calendar,
    /// Contacts, default or user-created.
    Contacts,
    /// Notes, default or user-created.
    Notes,
    /// Journal, default or user-created.
    Journal,
    /// User-created mail folder.
    Mail,
    /// Anything else (unknown, recipient cache).
    Other,
}

impl FolderRole {
    /// Maps a protocol folder type code.
    pub fn from_type(code: u8) -> Self {
        match code {
            1 => FolderRole::Generic,
            2 => FolderRole::Inbox,
            3 => FolderRole::Drafts,
            4 => FolderRole::Trash,
            5 => FolderRole::Sent,
            6 => FolderRole::Outbox,
            7 | 15 => FolderRole::Tasks,
            8 | 13 => FolderRole::Calendar,
            9 | 14 => FolderRole::Contacts,
            10 | 17 => FolderRole::Notes,
            11 | 16 => FolderRole::Journal,
            12 => FolderRole::Mail,
            _ => FolderRole::Other,
        }
    }

    /// Returns true for roles holding mail.
    pub fn is_mail(self) -> bool {
        matches!(
            self,
            FolderRole::Inbox
                | FolderRole::Drafts
                | FolderRole::Trash
                | FolderRole::Sent
                | FolderRole::Outbox
                | FolderRole::Mail
        )
    }

    /// Folders are shown by default only when they hold mail.
    pub fn is_visible(self) -> bool {
        self.is_mail()
    }

    /// The item class synced for this role, if it is syncable at all.
    pub fn class(self) -> Option<CollectionClass> {
        match self {
            r if r.is_mail() => Some(CollectionClass::Email),
            FolderRole::Contacts => Some(CollectionClass::Contacts),
            FolderRole::Calendar => Some(CollectionClass::Calendar),
            FolderRole::Tasks => Some(CollectionClass::Tasks),
            FolderRole::Notes => Some(CollectionClass::Notes),
            _ => None,
        }
    }
}

/// One folder as described by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderDescriptor {
    /// Server id.
    pub server_id: String,
    /// Parent server id; `None` at the root.
    pub parent_id: Option<String>,
    /// Display name.
    pub display_name: String,
    /// Protocol folder type code.
    pub folder_type: u8,
    /// Role derived from the type.
    pub role: FolderRole,
    /// Visibility derived from the role.
    pub visible: bool,
}

impl FolderDescriptor {
    /// Builds a descriptor, deriving role then visibility.
    ///
    /// A parent id of `"0"` or empty means the root.
    pub fn new(
        server_id: impl Into<String>,
        parent_id: Option<String>,
        display_name: impl Into<String>,
        folder_type: u8,
    ) -> Self {
        let role = FolderRole::from_type(folder_type);
        Self {
            server_id: server_id.into(),
            parent_id: parent_id.filter(|p| !p.is_empty() && p != ROOT_PARENT_ID),
            display_name: display_name.into(),
            folder_type,
            role,
            visible: role.is_visible(),
        }
    }

    /// Returns true for the server's conflict folder.
    pub fn is_sync_issues(&self) -> bool {
        self.display_name == SYNC_ISSUES
    }
}

/// Folder hierarchy sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSyncRequest {
    /// Hierarchy sync key; `"0"` for a full resync.
    pub sync_key: String,
}

impl FolderSyncRequest {
    /// Creates a request for the given key.
    pub fn new(sync_key: impl Into<String>) -> Self {
        Self {
            sync_key: sync_key.into(),
        }
    }

    /// Encodes the request document.
    pub fn encode(&self) -> WbxmlResult<Bytes> {
        let mut s = Serializer::new();
        s.start(folder::FOLDER_SYNC)
            .data(folder::SYNC_KEY, &self.sync_key)
            .end();
        s.done()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easync_wbxml::{decode, Event};

    #[test]
    fn roles_from_types() {
        assert_eq!(FolderRole::from_type(2), FolderRole::Inbox);
        assert_eq!(FolderRole::from_type(4), FolderRole::Trash);
        assert_eq!(FolderRole::from_type(12), FolderRole::Mail);
        assert_eq!(FolderRole::from_type(14), FolderRole::Contacts);
        assert_eq!(FolderRole::from_type(19), FolderRole::Other);
        assert_eq!(FolderRole::from_type(0), FolderRole::Other);
    }

    #[test]
    fn only_mail_roles_are_visible() {
        for code in 0..=20u8 {
            let role = FolderRole::from_type(code);
            let expected = matches!(code, 2..=6 | 12);
            assert_eq!(role.is_visible(), expected, "type {code}");
        }
    }

    #[test]
    fn syncable_classes() {
        assert_eq!(FolderRole::Sent.class(), Some(CollectionClass::Email));
        assert_eq!(FolderRole::Calendar.class(), Some(CollectionClass::Calendar));
        assert_eq!(FolderRole::Generic.class(), None);
        assert_eq!(FolderRole::Journal.class(), None);
    }

    #[test]
    fn root_parent_is_normalized() {
        let top = FolderDescriptor::new("1", Some("0".into()), "Inbox", 2);
        assert_eq!(top.parent_id, None);
        assert!(top.visible);
        let child = FolderDescriptor::new("5", Some("1".into()), "Receipts", 12);
        assert_eq!(child.parent_id.as_deref(), Some("1"));
        let contacts = FolderDescriptor::new("2", None, "Contacts", 9);
        assert!(!contacts.visible);
    }

    #[test]
    fn request_document() {
        let bytes = FolderSyncRequest::new("0").encode().unwrap();
        assert_eq!(
            decode(&bytes).unwrap(),
            vec![
                Event::Start(folder::FOLDER_SYNC),
                Event::Start(folder::SYNC_KEY),
                Event::Text("0".into()),
                Event::End(folder::SYNC_KEY),
                Event::End(folder::FOLDER_SYNC),
                Event::EndDocument,
            ]
        );
    }
}
