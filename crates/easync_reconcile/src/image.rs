//! Record images: the grouped form of one incoming record.

use easync_store::{RowKind, RowValues};
use std::collections::BTreeSet;

/// A bounded (or unbounded) ordered list of untyped rows.
///
/// Entries are matched against existing rows by the `key` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListGroup {
    pub(crate) kind: RowKind,
    pub(crate) subtype: Option<i32>,
    pub(crate) capacity: Option<usize>,
    pub(crate) key: String,
    pub(crate) fold_case: bool,
    pub(crate) entries: Vec<RowValues>,
}

impl ListGroup {
    /// A list holding at most `capacity` rows.
    #[must_use]
    pub fn bounded(kind: RowKind, capacity: usize, key: impl Into<String>) -> Self {
        Self {
            kind,
            subtype: None,
            capacity: Some(capacity),
            key: key.into(),
            fold_case: false,
            entries: Vec::new(),
        }
    }

    /// A list with no capacity limit.
    #[must_use]
    pub fn unbounded(kind: RowKind, key: impl Into<String>) -> Self {
        Self {
            capacity: None,
            ..Self::bounded(kind, 0, key)
        }
    }

    /// Restricts the list to rows carrying this subtype.
    #[must_use]
    pub fn with_subtype(mut self, subtype: i32) -> Self {
        self.subtype = Some(subtype);
        self
    }

    /// Matches keys case-insensitively (addresses, handles).
    #[must_use]
    pub fn case_insensitive(mut self) -> Self {
        self.fold_case = true;
        self
    }

    /// Appends an entry with only the key column set.
    pub fn push_value(&mut self, value: impl Into<String>) -> &mut Self {
        let mut values = RowValues::new();
        values.insert(self.key.clone(), value.into());
        self.entries.push(values);
        self
    }

    /// Appends an entry with several columns.
    pub fn push(&mut self, values: RowValues) -> &mut Self {
        self.entries.push(values);
        self
    }

    /// Number of entries pushed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries were pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One group of rows within a record image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Group {
    /// At most one row of this kind.
    Singleton {
        /// Row kind.
        kind: RowKind,
        /// Full values.
        values: RowValues,
    },
    /// At most one row per (kind, subtype).
    Typed {
        /// Row kind.
        kind: RowKind,
        /// Subtype code.
        subtype: i32,
        /// Full values.
        values: RowValues,
    },
    /// An ordered list of rows.
    List(ListGroup),
}

/// Everything the server says one record should contain.
///
/// `managed` lists the row kinds the engine owns for this collection:
/// existing rows of those kinds that the image does not reaffirm are
/// deleted, rows of any other kind are left alone.
impl Group {
    fn kind(&self) -> &RowKind {
        match self {
            Group::Singleton { kind, .. } | Group::Typed { kind, .. } => kind,
            Group::List(list) => &list.kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordImage {
    pub(crate) server_id: Option<String>,
    pub(crate) managed: BTreeSet<RowKind>,
    pub(crate) groups: Vec<Group>,
}

impl RecordImage {
    /// Creates an empty image owning the given row kinds.
    pub fn new(managed: impl IntoIterator<Item = RowKind>) -> Self {
        Self {
            server_id: None,
            managed: managed.into_iter().collect(),
            groups: Vec::new(),
        }
    }

    /// Sets the server id used when the record has to be created.
    #[must_use]
    pub fn with_server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    /// Adds a singleton group. Groups whose values are all empty are absent;
    /// a later group of the same kind replaces an earlier one.
    pub fn singleton(&mut self, kind: RowKind, values: RowValues) -> &mut Self {
        self.groups
            .retain(|g| !matches!(g, Group::Singleton { kind: k, .. } if *k == kind));
        let values = crate::diff::normalize(&values);
        if !values.is_empty() {
            self.groups.push(Group::Singleton { kind, values });
        }
        self
    }

    /// Adds a typed-slot group. Groups whose values are all empty are absent;
    /// a later group of the same kind and subtype replaces an earlier one.
    pub fn typed(&mut self, kind: RowKind, subtype: i32, values: RowValues) -> &mut Self {
        self.groups.retain(|g| {
            !matches!(g, Group::Typed { kind: k, subtype: s, .. } if *k == kind && *s == subtype)
        });
        let values = crate::diff::normalize(&values);
        if !values.is_empty() {
            self.groups.push(Group::Typed {
                kind,
                subtype,
                values,
            });
        }
        self
    }

    /// Adds a list group. Empty lists are absent.
    pub fn list(&mut self, group: ListGroup) -> &mut Self {
        if !group.is_empty() {
            self.groups.push(Group::List(group));
        }
        self
    }

    /// Returns the groups in insertion order.
    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Returns true if the image carries no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Returns true if rows of this kind are owned by the engine.
    #[must_use]
    pub fn manages(&self, kind: &RowKind) -> bool {
        self.managed.contains(kind)
    }

    /// Values of the singleton group of `kind`, if present.
    #[must_use]
    pub fn singleton_values(&self, kind: &RowKind) -> Option<&RowValues> {
        self.groups.iter().find_map(|g| match g {
            Group::Singleton { kind: k, values } if k == kind => Some(values),
            _ => None,
        })
    }

    /// Lays a later image of the same record over this one.
    ///
    /// Kinds the later image manages take its groups; every other kind keeps
    /// what this image had.
    pub fn overlay(&mut self, later: &RecordImage) {
        self.groups.retain(|g| !later.managed.contains(g.kind()));
        self.groups.extend(later.groups.iter().cloned());
        self.managed.extend(later.managed.iter().cloned());
        if later.server_id.is_some() {
            self.server_id.clone_from(&later.server_id);
        }
    }
}

/// Builds a [`RowValues`] map from string pairs.
#[must_use]
pub fn row_values<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> RowValues
where
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
