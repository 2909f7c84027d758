//! # easync WBXML
//!
//! Code-paged binary tag-stream codec.
//!
//! The wire format is WBXML 1.3 without attributes: a short header followed
//! by tag tokens, inline strings, opaque payloads, and page-switch tokens.
//! A tag's identity is `(page, local id)`; the page in force is set by the
//! most recent page-switch token, so the same local id on two pages names
//! two different tags.
//!
//! ## Components
//!
//! - [`Decoder`]: pull decoder over any reader, yielding [`Event`]s
//! - [`Serializer`]: fluent writer (`start`, `end`, `data`, `empty_tag`)
//! - [`CodePages`]: the page table shared by reader and writer
//! - [`pages`]: tag constants per code page
//!
//! ## Usage
//!
//! ```
//! use easync_wbxml::{decode, pages::airsync, Event, Serializer};
//!
//! let mut s = Serializer::new();
//! s.start(airsync::SYNC).data(airsync::SYNC_KEY, "0").end();
//! let bytes = s.done().unwrap();
//!
//! let events = decode(&bytes).unwrap();
//! assert_eq!(events[0], Event::Start(airsync::SYNC));
//! assert_eq!(events[2], Event::Text("0".into()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod dump;
mod error;
pub mod pages;
mod serializer;
mod tag;
mod token;

pub use decoder::{decode, Decoder, Event};
pub use dump::{dump, tree, Node};
pub use error::{WbxmlError, WbxmlResult};
pub use serializer::Serializer;
pub use tag::{CodePages, PageTable, Tag, MAX_TAG_ID, MIN_TAG_ID};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tags() -> impl Strategy<Value = Tag> {
        let all: Vec<Tag> = CodePages::active_sync()
            .pages()
            .flat_map(|p| p.names.iter().map(move |(id, _)| Tag::new(p.index, *id)))
            .collect();
        proptest::sample::select(all)
    }

    proptest! {
        #[test]
        fn data_elements_survive_encode_decode(
            entries in proptest::collection::vec((tags(), "[a-zA-Z0-9 @._\\-éß日本]{0,40}"), 0..20)
        ) {
            let mut s = Serializer::new();
            s.start(pages::airsync::APPLICATION_DATA);
            for (tag, value) in &entries {
                s.data(*tag, value);
            }
            s.end();
            let events = decode(&s.done().unwrap()).unwrap();

            let mut expected = vec![Event::Start(pages::airsync::APPLICATION_DATA)];
            for (tag, value) in &entries {
                expected.push(Event::Start(*tag));
                expected.push(Event::Text(value.clone()));
                expected.push(Event::End(*tag));
            }
            expected.push(Event::End(pages::airsync::APPLICATION_DATA));
            expected.push(Event::EndDocument);
            prop_assert_eq!(events, expected);
        }
    }
}
