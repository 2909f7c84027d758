//! Tags and code-page tables.

use crate::pages;
use std::fmt;

/// Lowest local id a tag may carry; ids below this collide with global tokens.
pub const MIN_TAG_ID: u8 = 0x05;

/// Highest local id a tag may carry (six bits).
pub const MAX_TAG_ID: u8 = 0x3F;

/// A tag identity: a local id within a numbered code page.
///
/// Two tags with the same local id on different pages are distinct; the
/// page is resolved by page-switch tokens in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    page: u8,
    id: u8,
}

impl Tag {
    /// Creates a tag from its page and local id.
    #[must_use]
    pub const fn new(page: u8, id: u8) -> Self {
        Self { page, id }
    }

    /// Returns the code page index.
    #[must_use]
    pub const fn page(self) -> u8 {
        self.page
    }

    /// Returns the local id within the page.
    #[must_use]
    pub const fn id(self) -> u8 {
        self.id
    }

    /// Returns the symbolic name from the default table, or `"Unknown"`.
    #[must_use]
    pub fn name(self) -> &'static str {
        CodePages::active_sync().name(self).unwrap_or("Unknown")
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pages = CodePages::active_sync();
        match (pages.namespace(self.page), pages.name(*self)) {
            (Some(ns), Some(name)) => write!(f, "{ns}:{name}"),
            (Some(ns), None) => write!(f, "{ns}:0x{:02x}", self.id),
            _ => write!(f, "{}:0x{:02x}", self.page, self.id),
        }
    }
}

/// One code page: its index, namespace, and the names of its tags.
#[derive(Debug)]
pub struct PageTable {
    /// Page index used by page-switch tokens.
    pub index: u8,
    /// Namespace name (e.g. `AirSync`).
    pub namespace: &'static str,
    /// `(local id, name)` pairs.
    pub names: &'static [(u8, &'static str)],
}

/// The page table shared by reader and writer.
///
/// A stream that switches to a page missing from the table is malformed.
#[derive(Debug)]
pub struct CodePages {
    pages: &'static [PageTable],
}

static ACTIVE_SYNC: CodePages = CodePages {
    pages: &[
        pages::airsync::TABLE,
        pages::contacts::TABLE,
        pages::email::TABLE,
        pages::calendar::TABLE,
        pages::move_items::TABLE,
        pages::folder::TABLE,
        pages::contacts2::TABLE,
        pages::ping::TABLE,
        pages::search::TABLE,
        pages::gal::TABLE,
        pages::base::TABLE,
    ],
};

impl CodePages {
    /// Creates a table from a static page list.
    #[must_use]
    pub const fn new(pages: &'static [PageTable]) -> Self {
        Self { pages }
    }

    /// The table for protocol versions 12.x and 14.x.
    #[must_use]
    pub fn active_sync() -> &'static CodePages {
        &ACTIVE_SYNC
    }

    /// Returns true if the page index is defined.
    #[must_use]
    pub fn contains_page(&self, page: u8) -> bool {
        self.page(page).is_some()
    }

    /// Returns the namespace for a page index.
    #[must_use]
    pub fn namespace(&self, page: u8) -> Option<&'static str> {
        self.page(page).map(|p| p.namespace)
    }

    /// Returns the symbolic name of a tag.
    #[must_use]
    pub fn name(&self, tag: Tag) -> Option<&'static str> {
        self.page(tag.page())?
            .names
            .iter()
            .find(|(id, _)| *id == tag.id())
            .map(|(_, name)| *name)
    }

    /// Resolves a qualified name such as `Contacts:Email1Address`.
    #[must_use]
    pub fn lookup(&self, qualified: &str) -> Option<Tag> {
        let (ns, name) = qualified.split_once(':')?;
        let page = self.pages.iter().find(|p| p.namespace == ns)?;
        page.names
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(id, _)| Tag::new(page.index, *id))
    }

    /// Iterates over all pages.
    pub fn pages(&self) -> impl Iterator<Item = &'static PageTable> {
        self.pages.iter()
    }

    fn page(&self, page: u8) -> Option<&'static PageTable> {
        self.pages.iter().find(|p| p.index == page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::{airsync, contacts, folder};

    #[test]
    fn same_local_id_on_different_pages_is_distinct() {
        assert_eq!(airsync::SYNC.id(), contacts::ANNIVERSARY.id());
        assert_ne!(airsync::SYNC, contacts::ANNIVERSARY);
    }

    #[test]
    fn names_and_display() {
        assert_eq!(airsync::SYNC_KEY.name(), "SyncKey");
        assert_eq!(folder::DISPLAY_NAME.to_string(), "FolderHierarchy:DisplayName");
        assert_eq!(Tag::new(0, 0x3E).to_string(), "AirSync:0x3e");
        assert_eq!(Tag::new(99, 0x05).name(), "Unknown");
    }

    #[test]
    fn lookup_qualified_name() {
        let pages = CodePages::active_sync();
        assert_eq!(pages.lookup("Contacts:Email1Address"), Some(contacts::EMAIL1_ADDRESS));
        assert_eq!(pages.lookup("Contacts:Nope"), None);
        assert_eq!(pages.lookup("Nope:Sync"), None);
    }

    #[test]
    fn unknown_page_is_not_contained() {
        let pages = CodePages::active_sync();
        assert!(pages.contains_page(0));
        assert!(pages.contains_page(17));
        assert!(!pages.contains_page(3));
        assert!(!pages.contains_page(200));
    }
}
