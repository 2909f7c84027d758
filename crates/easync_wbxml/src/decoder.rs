//! Streaming tag-stream decoder.

use crate::error::{WbxmlError, WbxmlResult};
use crate::tag::{CodePages, Tag};
use crate::token;
use std::io::{BufRead, BufReader, Read};

/// Maximum inline string length accepted from the wire.
/// This prevents allocation-based DoS from untrusted input.
const MAX_STRING_LENGTH: u32 = 16 * 1024 * 1024;

/// Maximum opaque payload or string table length.
const MAX_OPAQUE_LENGTH: u32 = 64 * 1024 * 1024;

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A tag opened. Empty tags are followed immediately by their `End`.
    Start(Tag),
    /// Inline, table, or entity text.
    Text(String),
    /// Opaque binary payload.
    Opaque(Vec<u8>),
    /// The innermost open tag closed.
    End(Tag),
    /// The root element closed and the input is exhausted.
    EndDocument,
}

/// Decodes a complete buffer into its event list, ending with `EndDocument`.
///
/// # Errors
///
/// Returns an error on truncated input, unknown pages, or unsupported tokens.
pub fn decode(bytes: &[u8]) -> WbxmlResult<Vec<Event>> {
    let mut decoder = Decoder::new(bytes);
    let mut events = Vec::new();
    loop {
        let event = decoder.next_event()?;
        let done = event == Event::EndDocument;
        events.push(event);
        if done {
            return Ok(events);
        }
    }
}

/// Pull decoder over any byte reader.
///
/// Reads block only on the underlying reader, so the decoder can sit
/// directly on a network body.
pub struct Decoder<R: Read> {
    reader: BufReader<R>,
    pages: &'static CodePages,
    page: u8,
    header_read: bool,
    version: u8,
    string_table: Vec<u8>,
    stack: Vec<Tag>,
    pending_end: bool,
    root_closed: bool,
    finished: bool,
}

impl<R: Read> Decoder<R> {
    /// Create a decoder using the default code pages.
    pub fn new(reader: R) -> Self {
        Self::with_pages(reader, CodePages::active_sync())
    }

    /// Create a decoder with an explicit code-page table.
    pub fn with_pages(reader: R, pages: &'static CodePages) -> Self {
        Self {
            reader: BufReader::new(reader),
            pages,
            page: 0,
            header_read: false,
            version: 0,
            string_table: Vec::new(),
            stack: Vec::new(),
            pending_end: false,
            root_closed: false,
            finished: false,
        }
    }

    /// Returns the WBXML version byte, once the header has been read.
    pub fn version(&self) -> Option<u8> {
        self.header_read.then_some(self.version)
    }

    /// Returns the number of currently open tags.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns the code-page table in use.
    pub fn pages(&self) -> &'static CodePages {
        self.pages
    }

    /// Decode the next event.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is malformed or the reader fails.
    pub fn next_event(&mut self) -> WbxmlResult<Event> {
        if self.finished {
            return Ok(Event::EndDocument);
        }
        if !self.header_read {
            self.read_header()?;
        }
        if self.pending_end {
            self.pending_end = false;
            return Ok(Event::End(self.close_tag()?));
        }

        loop {
            let Some(byte) = self.read_opt_byte()? else {
                if self.stack.is_empty() {
                    self.finished = true;
                    return Ok(Event::EndDocument);
                }
                return Err(WbxmlError::Truncated {
                    open: self.stack.len(),
                });
            };

            match byte {
                token::SWITCH_PAGE => {
                    let page = self.read_byte()?;
                    if !self.pages.contains_page(page) {
                        return Err(WbxmlError::UnknownPage { page });
                    }
                    self.page = page;
                }
                token::END => return Ok(Event::End(self.close_tag()?)),
                token::STR_I => {
                    self.require_open()?;
                    return Ok(Event::Text(self.read_inline_string()?));
                }
                token::STR_T => {
                    self.require_open()?;
                    let offset = self.read_mb_u32()?;
                    return Ok(Event::Text(self.table_string(offset)?));
                }
                token::ENTITY => {
                    self.require_open()?;
                    let code = self.read_mb_u32()?;
                    let ch = char::from_u32(code).ok_or(WbxmlError::InvalidEntity { code })?;
                    return Ok(Event::Text(ch.to_string()));
                }
                token::OPAQUE => {
                    self.require_open()?;
                    let len = self.read_length(MAX_OPAQUE_LENGTH)?;
                    return Ok(Event::Opaque(self.read_exact_vec(len)?));
                }
                t if token::is_unsupported(t) => {
                    return Err(WbxmlError::UnsupportedToken { token: t });
                }
                t => {
                    if t & token::WITH_ATTRIBUTES != 0 {
                        return Err(WbxmlError::AttributesUnsupported { token: t });
                    }
                    if self.root_closed {
                        return Err(WbxmlError::ContentOutsideRoot);
                    }
                    let tag = Tag::new(self.page, t & token::TAG_MASK);
                    self.stack.push(tag);
                    self.pending_end = t & token::WITH_CONTENT == 0;
                    return Ok(Event::Start(tag));
                }
            }
        }
    }

    fn read_header(&mut self) -> WbxmlResult<()> {
        self.version = self.read_byte()?;
        // Public id 0 means "string table reference follows".
        if self.read_mb_u32()? == 0 {
            self.read_mb_u32()?;
        }
        let _charset = self.read_mb_u32()?;
        let table_len = self.read_length(MAX_OPAQUE_LENGTH)?;
        self.string_table = self.read_exact_vec(table_len)?;
        self.header_read = true;
        Ok(())
    }

    fn close_tag(&mut self) -> WbxmlResult<Tag> {
        let tag = self.stack.pop().ok_or(WbxmlError::UnbalancedEnd)?;
        if self.stack.is_empty() {
            self.root_closed = true;
        }
        Ok(tag)
    }

    fn require_open(&self) -> WbxmlResult<()> {
        if self.stack.is_empty() {
            return Err(WbxmlError::ContentOutsideRoot);
        }
        Ok(())
    }

    fn read_opt_byte(&mut self) -> WbxmlResult<Option<u8>> {
        let buf = self.reader.fill_buf()?;
        let Some(&byte) = buf.first() else {
            return Ok(None);
        };
        self.reader.consume(1);
        Ok(Some(byte))
    }

    #[inline]
    fn read_byte(&mut self) -> WbxmlResult<u8> {
        self.read_opt_byte()?.ok_or(WbxmlError::UnexpectedEof)
    }

    /// Reads `len` bytes. The buffer grows with the data that arrives, not
    /// with the declared length.
    fn read_exact_vec(&mut self, len: usize) -> WbxmlResult<Vec<u8>> {
        let mut buf = Vec::new();
        (&mut self.reader).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() < len {
            return Err(WbxmlError::UnexpectedEof);
        }
        Ok(buf)
    }

    /// Multi-byte unsigned integer: 7 bits per byte, high bit continues.
    fn read_mb_u32(&mut self) -> WbxmlResult<u32> {
        let mut value: u32 = 0;
        for _ in 0..5 {
            let byte = self.read_byte()?;
            if value > (u32::MAX >> 7) {
                return Err(WbxmlError::IntegerOverflow);
            }
            value = (value << 7) | u32::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(WbxmlError::IntegerOverflow)
    }

    fn read_length(&mut self, limit: u32) -> WbxmlResult<usize> {
        let len = self.read_mb_u32()?;
        if len > limit {
            return Err(WbxmlError::SizeLimitExceeded { limit, actual: len });
        }
        Ok(len as usize)
    }

    fn read_inline_string(&mut self) -> WbxmlResult<String> {
        let mut buf = Vec::new();
        let limit = u64::from(MAX_STRING_LENGTH) + 1;
        (&mut self.reader).take(limit).read_until(0, &mut buf)?;
        match buf.pop() {
            Some(0) => String::from_utf8(buf).map_err(|_| WbxmlError::InvalidUtf8),
            _ if buf.len() as u64 >= u64::from(MAX_STRING_LENGTH) => {
                Err(WbxmlError::SizeLimitExceeded {
                    limit: MAX_STRING_LENGTH,
                    actual: u32::try_from(buf.len()).unwrap_or(u32::MAX),
                })
            }
            _ => Err(WbxmlError::UnexpectedEof),
        }
    }

    fn table_string(&self, offset: u32) -> WbxmlResult<String> {
        let start = offset as usize;
        let tail = self
            .string_table
            .get(start..)
            .filter(|t| !t.is_empty())
            .ok_or(WbxmlError::StringTableOffset { offset })?;
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        String::from_utf8(tail[..end].to_vec()).map_err(|_| WbxmlError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::{airsync, contacts, folder};

    const HEADER: [u8; 4] = [0x03, 0x01, 0x6A, 0x00];

    fn doc(body: &[u8]) -> Vec<u8> {
        let mut bytes = HEADER.to_vec();
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn decode_nested_document_with_text() {
        // <FolderSync><Status>1</Status></FolderSync> on page 7
        let bytes = doc(&[0x00, 0x07, 0x56, 0x4C, 0x03, b'1', 0x00, 0x01, 0x01]);
        let events = decode(&bytes).unwrap();
        assert_eq!(
            events,
            vec![
                Event::Start(folder::FOLDER_SYNC),
                Event::Start(folder::STATUS),
                Event::Text("1".into()),
                Event::End(folder::STATUS),
                Event::End(folder::FOLDER_SYNC),
                Event::EndDocument,
            ]
        );
    }

    #[test]
    fn empty_tag_synthesizes_end() {
        // <Sync><MoreAvailable/></Sync>
        let bytes = doc(&[0x45, 0x14, 0x01]);
        let events = decode(&bytes).unwrap();
        assert_eq!(
            events,
            vec![
                Event::Start(airsync::SYNC),
                Event::Start(airsync::MORE_AVAILABLE),
                Event::End(airsync::MORE_AVAILABLE),
                Event::End(airsync::SYNC),
                Event::EndDocument,
            ]
        );
    }

    #[test]
    fn page_switch_resolves_same_local_id() {
        // <Sync> (page 0, id 5) then page 1 id 5 = Anniversary
        let bytes = doc(&[0x45, 0x00, 0x01, 0x05, 0x01]);
        let events = decode(&bytes).unwrap();
        assert_eq!(events[1], Event::Start(contacts::ANNIVERSARY));
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let bytes = doc(&[0x45, 0x4B, 0x03, b'a']);
        assert!(matches!(decode(&bytes), Err(WbxmlError::UnexpectedEof)));

        let bytes = doc(&[0x45, 0x4B]);
        assert!(matches!(decode(&bytes), Err(WbxmlError::Truncated { open: 2 })));
    }

    #[test]
    fn truncated_header_is_rejected() {
        assert!(matches!(decode(&[0x03]), Err(WbxmlError::UnexpectedEof)));
    }

    #[test]
    fn unknown_page_is_rejected() {
        let bytes = doc(&[0x00, 0x03, 0x45, 0x01]);
        assert!(matches!(
            decode(&bytes),
            Err(WbxmlError::UnknownPage { page: 3 })
        ));
    }

    #[test]
    fn unsupported_tokens_are_rejected() {
        let bytes = doc(&[0x45, 0x04, 0x00, 0x01]);
        assert!(matches!(
            decode(&bytes),
            Err(WbxmlError::UnsupportedToken { token: 0x04 })
        ));
        let bytes = doc(&[0xC5, 0x01]);
        assert!(matches!(
            decode(&bytes),
            Err(WbxmlError::AttributesUnsupported { .. })
        ));
    }

    #[test]
    fn opaque_and_entity_payloads() {
        let bytes = doc(&[0x45, 0xC3, 0x03, 1, 2, 3, 0x02, 0x41, 0x01]);
        let events = decode(&bytes).unwrap();
        assert_eq!(events[1], Event::Opaque(vec![1, 2, 3]));
        assert_eq!(events[2], Event::Text("A".into()));
    }

    #[test]
    fn string_table_reference() {
        let bytes = vec![0x03, 0x01, 0x6A, 0x04, b'a', b'b', 0x00, b'c', 0x45, 0x83, 0x00, 0x01];
        let events = decode(&bytes).unwrap();
        assert_eq!(events[1], Event::Text("ab".into()));

        let bad = vec![0x03, 0x01, 0x6A, 0x01, b'a', 0x45, 0x83, 0x05, 0x01];
        assert!(matches!(
            decode(&bad),
            Err(WbxmlError::StringTableOffset { offset: 5 })
        ));
    }

    #[test]
    fn stray_end_and_trailing_content() {
        assert!(matches!(decode(&doc(&[0x01])), Err(WbxmlError::UnbalancedEnd)));
        assert!(matches!(
            decode(&doc(&[0x05, 0x05])),
            Err(WbxmlError::ContentOutsideRoot)
        ));
    }

    #[test]
    fn declared_length_beyond_the_data_is_truncation() {
        // opaque claims 60 MB, three bytes follow
        let bytes = doc(&[0x45, 0xC3, 0x9C, 0xCE, 0x8E, 0x00, 1, 2, 3]);
        assert!(matches!(decode(&bytes), Err(WbxmlError::UnexpectedEof)));

        // string table claims 60 MB
        let bytes = vec![0x03, 0x01, 0x6A, 0x9C, 0xCE, 0x8E, 0x00, b'a'];
        assert!(matches!(decode(&bytes), Err(WbxmlError::UnexpectedEof)));
    }

    #[test]
    fn multibyte_integer_overflow() {
        let bytes = doc(&[0x45, 0xC3, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]);
        assert!(matches!(decode(&bytes), Err(WbxmlError::IntegerOverflow)));
    }

    #[test]
    fn invalid_utf8_text() {
        let bytes = doc(&[0x45, 0x03, 0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(decode(&bytes), Err(WbxmlError::InvalidUtf8)));
    }

    #[test]
    fn header_only_document_is_empty() {
        assert_eq!(decode(&HEADER).unwrap(), vec![Event::EndDocument]);
    }

    #[test]
    fn end_document_is_sticky() {
        let bytes = doc(&[0x05]);
        let mut decoder = Decoder::new(bytes.as_slice());
        assert_eq!(decoder.next_event().unwrap(), Event::Start(airsync::SYNC));
        assert_eq!(decoder.next_event().unwrap(), Event::End(airsync::SYNC));
        assert_eq!(decoder.next_event().unwrap(), Event::EndDocument);
        assert_eq!(decoder.next_event().unwrap(), Event::EndDocument);
        assert_eq!(decoder.version(), Some(0x03));
    }
}
