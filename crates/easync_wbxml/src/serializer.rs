//! Fluent tag-stream writer.

use crate::error::{WbxmlError, WbxmlResult};
use crate::tag::{CodePages, Tag, MAX_TAG_ID, MIN_TAG_ID};
use crate::token;
use bytes::Bytes;

/// Builds a tag-stream document.
///
/// Writer methods chain; the first error is remembered and reported by
/// [`done`](Serializer::done), so a request can be written as one expression.
///
/// ```
/// use easync_wbxml::{pages::folder, Serializer};
///
/// let mut s = Serializer::new();
/// s.start(folder::FOLDER_SYNC).data(folder::SYNC_KEY, "0").end();
/// let bytes = s.done().unwrap();
/// assert_eq!(&bytes[..4], &[0x03, 0x01, 0x6A, 0x00]);
/// ```
pub struct Serializer {
    buffer: Vec<u8>,
    pages: &'static CodePages,
    page: u8,
    pending: Option<Tag>,
    open: Vec<Tag>,
    error: Option<WbxmlError>,
}

impl Serializer {
    /// Create a serializer using the default code pages.
    pub fn new() -> Self {
        Self::with_pages(CodePages::active_sync())
    }

    /// Create a serializer with an explicit code-page table.
    pub fn with_pages(pages: &'static CodePages) -> Self {
        Self {
            buffer: vec![
                token::VERSION_1_3,
                token::PUBLIC_ID_UNKNOWN,
                token::CHARSET_UTF8,
                0x00, // empty string table
            ],
            pages,
            page: 0,
            pending: None,
            open: Vec::new(),
            error: None,
        }
    }

    /// Number of currently open tags.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Open a tag.
    pub fn start(&mut self, tag: Tag) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        if !self.pages.contains_page(tag.page()) {
            return self.fail(WbxmlError::UnknownPage { page: tag.page() });
        }
        if !(MIN_TAG_ID..=MAX_TAG_ID).contains(&tag.id()) {
            return self.fail(WbxmlError::InvalidTagId { id: tag.id() });
        }
        self.flush_pending(true);
        self.pending = Some(tag);
        self.open.push(tag);
        self
    }

    /// Close the innermost open tag.
    ///
    /// A tag closed with no content is written as an empty tag.
    pub fn end(&mut self) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        if self.open.pop().is_none() {
            return self.fail(WbxmlError::UnbalancedEnd);
        }
        if self.pending.is_some() {
            self.flush_pending(false);
        } else {
            self.buffer.push(token::END);
        }
        self
    }

    /// Write inline text inside the current tag.
    pub fn text(&mut self, value: &str) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        if self.open.is_empty() {
            return self.fail(WbxmlError::ContentOutsideRoot);
        }
        if value.as_bytes().contains(&0) {
            return self.fail(WbxmlError::EmbeddedNul);
        }
        self.flush_pending(true);
        self.buffer.push(token::STR_I);
        self.buffer.extend_from_slice(value.as_bytes());
        self.buffer.push(0x00);
        self
    }

    /// Write `<tag>value</tag>`.
    pub fn data(&mut self, tag: Tag, value: &str) -> &mut Self {
        self.start(tag).text(value).end()
    }

    /// Write `<tag/>`: the explicit "clear this field" signal.
    pub fn empty_tag(&mut self, tag: Tag) -> &mut Self {
        self.start(tag).end()
    }

    /// Write `<tag>` with an opaque payload.
    pub fn opaque(&mut self, tag: Tag, payload: &[u8]) -> &mut Self {
        self.start(tag);
        if self.error.is_some() {
            return self;
        }
        let Ok(len) = u32::try_from(payload.len()) else {
            return self.fail(WbxmlError::IntegerOverflow);
        };
        self.flush_pending(true);
        self.buffer.push(token::OPAQUE);
        self.write_mb_u32(len);
        self.buffer.extend_from_slice(payload);
        self.end()
    }

    /// Finish the document and return its bytes.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded while writing, or
    /// [`WbxmlError::UnclosedTags`] if tags remain open.
    pub fn done(self) -> WbxmlResult<Bytes> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if !self.open.is_empty() {
            return Err(WbxmlError::UnclosedTags {
                depth: self.open.len(),
            });
        }
        Ok(Bytes::from(self.buffer))
    }

    fn fail(&mut self, err: WbxmlError) -> &mut Self {
        self.error.get_or_insert(err);
        self
    }

    fn flush_pending(&mut self, with_content: bool) {
        let Some(tag) = self.pending.take() else {
            return;
        };
        if tag.page() != self.page {
            self.buffer.push(token::SWITCH_PAGE);
            self.buffer.push(tag.page());
            self.page = tag.page();
        }
        let content = if with_content { token::WITH_CONTENT } else { 0 };
        self.buffer.push(tag.id() | content);
    }

    fn write_mb_u32(&mut self, mut value: u32) {
        let mut tmp = [0u8; 5];
        let mut idx = tmp.len();
        loop {
            idx -= 1;
            tmp[idx] = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                break;
            }
        }
        let last = tmp.len() - 1;
        for (i, byte) in tmp.iter_mut().enumerate().skip(idx) {
            if i != last {
                *byte |= 0x80;
            }
        }
        self.buffer.extend_from_slice(&tmp[idx..]);
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}
