//! Scope-based pull parser over a decoded tag stream.
//!
//! Every response parser is a recursive-descent loop:
//!
//! ```text
//! while let Next::Tag(tag) = parser.next_tag(SCOPE)? {
//!     match tag {
//!         KNOWN => value = parser.value()?,
//!         CONTAINER => parse_container(parser)?,
//!         _ => parser.skip_tag()?,
//!     }
//! }
//! ```
//!
//! A tag returned by [`Parser::next_tag`] that the caller neither reads,
//! enters, nor skips is skipped automatically on the next call, so unknown
//! content never leaks into the enclosing scope.

use crate::error::{ParseError, ParseResult};
use easync_wbxml::{CodePages, Decoder, Event, Tag};
use std::io::Read;

/// What [`Parser::next_tag`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// The next child tag of the current scope.
    Tag(Tag),
    /// The scope closed.
    End,
    /// The document ended.
    EndDocument,
}

/// Pull parser over any byte reader.
pub struct Parser<R: Read> {
    decoder: Decoder<R>,
    /// Tags open in the stream, outermost first.
    open: Vec<Tag>,
    /// The tag last returned by `next_tag`, not yet read, entered or skipped.
    current: Option<Tag>,
}

impl<R: Read> Parser<R> {
    /// Creates a parser using the default code pages.
    pub fn new(reader: R) -> Self {
        Self::with_decoder(Decoder::new(reader))
    }

    /// Creates a parser with an explicit code-page table.
    pub fn with_pages(reader: R, pages: &'static CodePages) -> Self {
        Self::with_decoder(Decoder::with_pages(reader, pages))
    }

    fn with_decoder(decoder: Decoder<R>) -> Self {
        Self {
            decoder,
            open: Vec::new(),
            current: None,
        }
    }

    /// Returns the number of open tags.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Reads the document root.
    ///
    /// Returns `None` for a document without a root element.
    pub fn next_document_tag(&mut self) -> ParseResult<Option<Tag>> {
        if !self.open.is_empty() || self.current.is_some() {
            return Err(ParseError::structure("document root already read"));
        }
        loop {
            match self.event()? {
                Event::Start(tag) => {
                    self.open.push(tag);
                    self.current = Some(tag);
                    return Ok(Some(tag));
                }
                Event::EndDocument => return Ok(None),
                Event::Text(_) | Event::Opaque(_) | Event::End(_) => {}
            }
        }
    }

    /// Reads the document root and checks it is `root`.
    pub fn expect_root(&mut self, root: Tag) -> ParseResult<()> {
        match self.next_document_tag()? {
            Some(tag) if tag == root => Ok(()),
            Some(tag) => Err(ParseError::WrongRoot {
                expected: root,
                found: tag.to_string(),
            }),
            None => Err(ParseError::WrongRoot {
                expected: root,
                found: "nothing".into(),
            }),
        }
    }

    /// Advances to the next child of the scope closed by `end`.
    ///
    /// Passing the tag just returned enters it; any other unconsumed tag,
    /// and any deeper scope the caller abandoned, is skipped first.
    pub fn next_tag(&mut self, end: Tag) -> ParseResult<Next> {
        if let Some(current) = self.current.take() {
            if current != end {
                self.skip_open()?;
            }
        }
        if !self.open.contains(&end) {
            return Err(ParseError::MissingScope { tag: end });
        }
        while self.open.last() != Some(&end) {
            self.skip_open()?;
        }

        loop {
            match self.event()? {
                Event::Start(tag) => {
                    self.open.push(tag);
                    self.current = Some(tag);
                    return Ok(Next::Tag(tag));
                }
                Event::End(_) => {
                    self.open.pop();
                    return Ok(Next::End);
                }
                Event::EndDocument => return Ok(Next::EndDocument),
                // stray content inside a container
                Event::Text(_) | Event::Opaque(_) => {}
            }
        }
    }

    /// Returns the text of the current tag.
    ///
    /// Fails with `UnexpectedStructure` if the tag is empty or has children.
    pub fn value(&mut self) -> ParseResult<String> {
        let tag = self.current_tag()?;
        self.value_opt()?
            .ok_or_else(|| ParseError::structure(format!("{tag} has no value")))
    }

    /// Returns the text of the current tag, or `None` if it is empty.
    pub fn value_opt(&mut self) -> ParseResult<Option<String>> {
        Ok(match self.raw_value()? {
            Some(bytes) => Some(
                String::from_utf8(bytes)
                    .map_err(|_| ParseError::structure("opaque value is not UTF-8"))?,
            ),
            None => None,
        })
    }

    /// Returns the current tag's value as an integer.
    pub fn value_int(&mut self) -> ParseResult<i32> {
        let tag = self.current_tag()?;
        let text = self.value()?;
        text.trim()
            .parse()
            .map_err(|_| ParseError::structure(format!("{tag} is not an integer: {text:?}")))
    }

    /// Returns the current tag's value as raw bytes (opaque or text).
    pub fn value_bytes(&mut self) -> ParseResult<Vec<u8>> {
        let tag = self.current_tag()?;
        self.raw_value()?
            .ok_or_else(|| ParseError::structure(format!("{tag} has no value")))
    }

    /// Discards the current tag and everything under it.
    pub fn skip_tag(&mut self) -> ParseResult<()> {
        let tag = self.current_tag()?;
        tracing::trace!(%tag, "skipping tag");
        self.current = None;
        self.skip_open()
    }

    fn current_tag(&self) -> ParseResult<Tag> {
        self.current
            .ok_or_else(|| ParseError::structure("no current tag"))
    }

    fn raw_value(&mut self) -> ParseResult<Option<Vec<u8>>> {
        let tag = self.current_tag()?;
        self.current = None;
        let mut value: Option<Vec<u8>> = None;
        loop {
            match self.event()? {
                Event::Text(text) => value
                    .get_or_insert_with(Vec::new)
                    .extend_from_slice(text.as_bytes()),
                Event::Opaque(bytes) => value.get_or_insert_with(Vec::new).extend(bytes),
                Event::End(_) => {
                    self.open.pop();
                    return Ok(value);
                }
                Event::Start(child) => {
                    self.open.push(child);
                    self.skip_to_depth(self.open.len() - 2)?;
                    return Err(ParseError::structure(format!(
                        "{tag} has child {child} where a value was expected"
                    )));
                }
                Event::EndDocument => {
                    return Err(ParseError::structure(format!("document ended inside {tag}")))
                }
            }
        }
    }

    /// Consumes events until the innermost open tag closes.
    fn skip_open(&mut self) -> ParseResult<()> {
        let target = self.open.len().saturating_sub(1);
        self.skip_to_depth(target)
    }

    fn skip_to_depth(&mut self, depth: usize) -> ParseResult<()> {
        while self.open.len() > depth {
            match self.event()? {
                Event::Start(tag) => self.open.push(tag),
                Event::End(_) => {
                    self.open.pop();
                }
                Event::Text(_) | Event::Opaque(_) => {}
                Event::EndDocument => {
                    return Err(ParseError::structure("document ended inside a tag"))
                }
            }
        }
        Ok(())
    }

    fn event(&mut self) -> ParseResult<Event> {
        Ok(self.decoder.next_event()?)
    }
}
