//! Directory (global address list) search.

use crate::error::{ParseError, ParseResult};
use crate::parser::{Next, Parser};
use bytes::Bytes;
use easync_wbxml::pages::{gal, search};
use easync_wbxml::{Serializer, WbxmlResult};
use serde::Serialize;
use std::io::Read;

/// Name of the directory store.
pub const GAL_STORE: &str = "GAL";

/// Directory search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Free-text query (name prefix, alias, address).
    pub query: String,
    /// First result index, inclusive.
    pub start: u32,
    /// Last result index, inclusive.
    pub end: u32,
}

impl SearchRequest {
    /// Requests results `start..=end` for `query`.
    pub fn new(query: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            query: query.into(),
            start,
            end: end.max(start),
        }
    }

    /// Encodes the request document.
    pub fn encode(&self) -> WbxmlResult<Bytes> {
        let mut s = Serializer::new();
        s.start(search::SEARCH)
            .start(search::STORE)
            .data(search::NAME, GAL_STORE)
            .data(search::QUERY, &self.query)
            .start(search::OPTIONS)
            .data(search::RANGE, &format!("{}-{}", self.start, self.end))
            .end()
            .end()
            .end();
        s.done()
    }
}

/// One directory entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GalEntry {
    /// Display name.
    pub display_name: Option<String>,
    /// Email address.
    pub email_address: Option<String>,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Company.
    pub company: Option<String>,
    /// Job title.
    pub title: Option<String>,
    /// Office.
    pub office: Option<String>,
    /// Alias.
    pub alias: Option<String>,
    /// Work phone.
    pub phone: Option<String>,
    /// Home phone.
    pub home_phone: Option<String>,
    /// Mobile phone.
    pub mobile_phone: Option<String>,
}

/// Parsed search response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResponse {
    /// Top-level status.
    pub status: i32,
    /// Store status, if a store element was present.
    pub store_status: Option<i32>,
    /// Matching entries.
    pub entries: Vec<GalEntry>,
    /// Returned range, inclusive.
    pub range: Option<(u32, u32)>,
    /// Total number of matches on the server.
    pub total: Option<u32>,
}

impl SearchResponse {
    /// Parses a search response document.
    pub fn parse<R: Read>(parser: &mut Parser<R>) -> ParseResult<Self> {
        parser.expect_root(search::SEARCH)?;
        let mut response = SearchResponse::default();
        let mut status = None;
        while let Next::Tag(tag) = parser.next_tag(search::SEARCH)? {
            match tag {
                search::STATUS => status = Some(parser.value_int()?),
                search::RESPONSE => {
                    while let Next::Tag(tag) = parser.next_tag(search::RESPONSE)? {
                        match tag {
                            search::STORE => parse_store(parser, &mut response)?,
                            _ => parser.skip_tag()?,
                        }
                    }
                }
                _ => parser.skip_tag()?,
            }
        }
        response.status = status.ok_or_else(|| ParseError::structure("search without status"))?;
        Ok(response)
    }

    /// Parses a complete response body.
    pub fn from_bytes(bytes: &[u8]) -> ParseResult<Self> {
        Self::parse(&mut Parser::new(bytes))
    }
}

fn parse_store<R: Read>(parser: &mut Parser<R>, response: &mut SearchResponse) -> ParseResult<()> {
    while let Next::Tag(tag) = parser.next_tag(search::STORE)? {
        match tag {
            search::STATUS => response.store_status = Some(parser.value_int()?),
            search::RESULT => {
                if let Some(entry) = parse_result(parser)? {
                    response.entries.push(entry);
                }
            }
            search::RANGE => response.range = parse_range(&parser.value()?),
            search::TOTAL => response.total = u32::try_from(parser.value_int()?).ok(),
            _ => parser.skip_tag()?,
        }
    }
    Ok(())
}

fn parse_result<R: Read>(parser: &mut Parser<R>) -> ParseResult<Option<GalEntry>> {
    let mut entry = None;
    while let Next::Tag(tag) = parser.next_tag(search::RESULT)? {
        if tag == search::PROPERTIES {
            entry = Some(parse_properties(parser)?);
        } else {
            parser.skip_tag()?;
        }
    }
    Ok(entry)
}

fn parse_properties<R: Read>(parser: &mut Parser<R>) -> ParseResult<GalEntry> {
    let mut entry = GalEntry::default();
    while let Next::Tag(tag) = parser.next_tag(search::PROPERTIES)? {
        let slot = match tag {
            gal::DISPLAY_NAME => &mut entry.display_name,
            gal::EMAIL_ADDRESS => &mut entry.email_address,
            gal::FIRST_NAME => &mut entry.first_name,
            gal::LAST_NAME => &mut entry.last_name,
            gal::COMPANY => &mut entry.company,
            gal::TITLE => &mut entry.title,
            gal::OFFICE => &mut entry.office,
            gal::ALIAS => &mut entry.alias,
            gal::PHONE => &mut entry.phone,
            gal::HOME_PHONE => &mut entry.home_phone,
            gal::MOBILE_PHONE => &mut entry.mobile_phone,
            _ => {
                parser.skip_tag()?;
                continue;
            }
        };
        *slot = parser.value_opt()?;
    }
    Ok(entry)
}

fn parse_range(text: &str) -> Option<(u32, u32)> {
    let (start, end) = text.split_once('-')?;
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_range_and_total() {
        let mut s = Serializer::new();
        s.start(search::SEARCH)
            .data(search::STATUS, "1")
            .start(search::RESPONSE)
            .start(search::STORE)
            .data(search::STATUS, "1")
            .start(search::RESULT)
            .start(search::PROPERTIES)
            .data(gal::DISPLAY_NAME, "Ada Lovelace")
            .data(gal::EMAIL_ADDRESS, "ada@x.com")
            .data(gal::MOBILE_PHONE, "555")
            .end()
            .end()
            .start(search::RESULT)
            .start(search::PROPERTIES)
            .data(gal::DISPLAY_NAME, "Charles Babbage")
            .end()
            .end()
            .data(search::RANGE, "0-1")
            .data(search::TOTAL, "14")
            .end()
            .end()
            .end();
        let r = SearchResponse::from_bytes(&s.done().unwrap()).unwrap();
        assert_eq!(r.status, 1);
        assert_eq!(r.store_status, Some(1));
        assert_eq!(r.entries.len(), 2);
        assert_eq!(r.entries[0].email_address.as_deref(), Some("ada@x.com"));
        assert_eq!(r.entries[1].mobile_phone, None);
        assert_eq!(r.range, Some((0, 1)));
        assert_eq!(r.total, Some(14));
    }

    #[test]
    fn results_without_properties_are_dropped() {
        let mut s = Serializer::new();
        s.start(search::SEARCH)
            .data(search::STATUS, "1")
            .start(search::RESPONSE)
            .start(search::STORE)
            .data(search::STATUS, "1")
            .empty_tag(search::RESULT)
            .end()
            .end()
            .end();
        let r = SearchResponse::from_bytes(&s.done().unwrap()).unwrap();
        assert!(r.entries.is_empty());
    }

    #[test]
    fn request_range() {
        let text = easync_wbxml::dump(&SearchRequest::new("ada", 0, 49).encode().unwrap()).unwrap();
        assert!(text.contains("<Search:Name>GAL</Search:Name>"), "{text}");
        assert!(text.contains("<Search:Range>0-49</Search:Range>"), "{text}");
    }

    #[test]
    fn malformed_ranges() {
        assert_eq!(parse_range("3-9"), Some((3, 9)));
        assert_eq!(parse_range("3"), None);
        assert_eq!(parse_range("a-b"), None);
    }
}
