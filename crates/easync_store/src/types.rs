//! Entity, row, and scope types.

use std::collections::BTreeMap;
use std::fmt;

/// Field values of one sub-row, keyed by column name.
pub type RowValues = BTreeMap<String, String>;

/// Stable local identifier of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u64);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of one sub-row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}", self.0)
    }
}

/// The unit of synchronization: an account's folder hierarchy or one collection.
///
/// Sync keys, entity sets, and commit locks are all per scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope {
    account: u64,
    collection: Option<String>,
}

impl Scope {
    /// The folder hierarchy of an account.
    #[must_use]
    pub fn hierarchy(account: u64) -> Self {
        Self {
            account,
            collection: None,
        }
    }

    /// One server collection (folder) of an account.
    #[must_use]
    pub fn collection(account: u64, server_id: impl Into<String>) -> Self {
        Self {
            account,
            collection: Some(server_id.into()),
        }
    }

    /// Returns the account id.
    #[must_use]
    pub fn account(&self) -> u64 {
        self.account
    }

    /// Returns the collection server id, or `None` for the hierarchy.
    #[must_use]
    pub fn collection_id(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    /// Returns true for the folder hierarchy scope.
    #[must_use]
    pub fn is_hierarchy(&self) -> bool {
        self.collection.is_none()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.collection {
            Some(id) => write!(f, "account {}/collection {}", self.account, id),
            None => write!(f, "account {}/folders", self.account),
        }
    }
}

/// The kind of a sub-row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowKind {
    /// Structured name.
    Name,
    /// Company, department, title.
    Organization,
    /// Personal dates and family.
    Personal,
    /// Business identifiers.
    Business,
    /// Free-text note.
    Note,
    /// Nickname.
    Nickname,
    /// Web page.
    Webpage,
    /// Birthday.
    Birthday,
    /// Encoded picture.
    Photo,
    /// Children names.
    Children,
    /// Phone number, subtype selects home/work/mobile/...
    Phone,
    /// Postal address, subtype selects home/work/other.
    Postal,
    /// Related person, subtype selects assistant/manager/spouse.
    Relation,
    /// Email address.
    Email,
    /// Instant-messaging handle.
    Im,
    /// Category membership.
    Category,
    /// Folder descriptor.
    Folder,
    /// Calendar event core fields.
    Event,
    /// Calendar recurrence rule.
    Recurrence,
    /// Calendar attendee.
    Attendee,
    /// Mail message core fields.
    Message,
    /// Mail attachment.
    Attachment,
    /// Application-defined row the sync engine never manages.
    Custom(String),
}

impl RowKind {
    /// Returns a short name for logs.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Name => "name",
            Self::Organization => "organization",
            Self::Personal => "personal",
            Self::Business => "business",
            Self::Note => "note",
            Self::Nickname => "nickname",
            Self::Webpage => "webpage",
            Self::Birthday => "birthday",
            Self::Photo => "photo",
            Self::Children => "children",
            Self::Phone => "phone",
            Self::Postal => "postal",
            Self::Relation => "relation",
            Self::Email => "email",
            Self::Im => "im",
            Self::Category => "category",
            Self::Folder => "folder",
            Self::Event => "event",
            Self::Recurrence => "recurrence",
            Self::Attendee => "attendee",
            Self::Message => "message",
            Self::Attachment => "attachment",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for RowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed sub-row of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRow {
    /// Row identifier.
    pub id: RowId,
    /// Row kind.
    pub kind: RowKind,
    /// Optional subtype code (phone type, address type, ...).
    pub subtype: Option<i32>,
    /// Slot index within a bounded list.
    pub slot: Option<u8>,
    /// Column values.
    pub values: RowValues,
}

impl SubRow {
    /// Returns one column value.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// The locally stored representation of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySnapshot {
    /// Stable local identifier.
    pub local_id: LocalId,
    /// Server identifier, once the server has acknowledged the record.
    pub server_id: Option<String>,
    /// Modified locally and not yet sent.
    pub dirty: bool,
    /// Deleted locally and not yet sent.
    pub deleted: bool,
    /// Typed sub-rows.
    pub rows: Vec<SubRow>,
}

impl EntitySnapshot {
    /// Iterates over rows of one kind.
    pub fn rows_of<'a, 'k>(
        &'a self,
        kind: &'k RowKind,
    ) -> impl Iterator<Item = &'a SubRow> + use<'a, 'k> {
        self.rows.iter().filter(move |r| &r.kind == kind)
    }

    /// Returns the first row of a kind.
    #[must_use]
    pub fn row(&self, kind: &RowKind) -> Option<&SubRow> {
        self.rows_of(kind).next()
    }

    /// Returns the first row of a kind with the given subtype.
    #[must_use]
    pub fn typed_row(&self, kind: &RowKind, subtype: i32) -> Option<&SubRow> {
        self.rows_of(kind).find(|r| r.subtype == Some(subtype))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: u64, kind: RowKind, subtype: Option<i32>) -> SubRow {
        SubRow {
            id: RowId(id),
            kind,
            subtype,
            slot: None,
            values: RowValues::new(),
        }
    }

    #[test]
    fn scope_identity() {
        assert_ne!(Scope::hierarchy(1), Scope::collection(1, "5"));
        assert_ne!(Scope::collection(1, "5"), Scope::collection(2, "5"));
        assert!(Scope::hierarchy(1).is_hierarchy());
        assert_eq!(Scope::collection(1, "5").collection_id(), Some("5"));
        assert_eq!(Scope::collection(3, "5").to_string(), "account 3/collection 5");
    }

    #[test]
    fn snapshot_row_lookup() {
        let snapshot = EntitySnapshot {
            local_id: LocalId(1),
            server_id: None,
            dirty: false,
            deleted: false,
            rows: vec![
                row(1, RowKind::Phone, Some(2)),
                row(2, RowKind::Phone, Some(1)),
                row(3, RowKind::Name, None),
            ],
        };
        assert_eq!(snapshot.rows_of(&RowKind::Phone).count(), 2);
        assert_eq!(snapshot.typed_row(&RowKind::Phone, 1).map(|r| r.id), Some(RowId(2)));
        assert_eq!(snapshot.row(&RowKind::Name).map(|r| r.id), Some(RowId(3)));
        assert!(snapshot.row(&RowKind::Email).is_none());
    }

    #[test]
    fn custom_kind_name() {
        assert_eq!(RowKind::Custom("x-pin".into()).as_str(), "x-pin");
        assert_eq!(RowKind::Email.to_string(), "email");
    }
}
