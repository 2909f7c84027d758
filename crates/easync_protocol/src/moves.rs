//! MoveItems request and response.

use crate::error::{ParseError, ParseResult};
use crate::parser::{Next, Parser};
use crate::status::MoveOutcome;
use bytes::Bytes;
use easync_wbxml::pages::move_items;
use easync_wbxml::{Serializer, WbxmlResult};
use std::io::Read;

/// One item to move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    /// Item server id.
    pub item_id: String,
    /// Folder the item is in.
    pub src_folder: String,
    /// Folder to move it to.
    pub dst_folder: String,
}

/// MoveItems request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveItemsRequest {
    /// Items to move.
    pub moves: Vec<MoveRequest>,
}

impl MoveItemsRequest {
    /// Encodes the request document.
    pub fn encode(&self) -> WbxmlResult<Bytes> {
        let mut s = Serializer::new();
        s.start(move_items::MOVE_ITEMS);
        for m in &self.moves {
            s.start(move_items::MOVE)
                .data(move_items::SRC_MSG_ID, &m.item_id)
                .data(move_items::SRC_FLD_ID, &m.src_folder)
                .data(move_items::DST_FLD_ID, &m.dst_folder)
                .end();
        }
        s.end();
        s.done()
    }
}

/// Result for one moved item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResult {
    /// Item id as sent.
    pub item_id: String,
    /// Raw status code.
    pub status: i32,
    /// Item id in the destination folder, when the server assigned one.
    pub new_item_id: Option<String>,
    /// Client-facing outcome.
    pub outcome: MoveOutcome,
}

impl MoveResult {
    /// The id the item has now: the new id if one was assigned.
    pub fn current_id(&self) -> &str {
        self.new_item_id.as_deref().unwrap_or(&self.item_id)
    }
}

/// Parsed MoveItems response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveItemsResponse {
    /// One result per item.
    pub results: Vec<MoveResult>,
}

impl MoveItemsResponse {
    /// Parses a MoveItems response document.
    pub fn parse<R: Read>(parser: &mut Parser<R>) -> ParseResult<Self> {
        parser.expect_root(move_items::MOVE_ITEMS)?;
        let mut results = Vec::new();
        while let Next::Tag(tag) = parser.next_tag(move_items::MOVE_ITEMS)? {
            if tag == move_items::RESPONSE {
                results.push(parse_result(parser)?);
            } else {
                parser.skip_tag()?;
            }
        }
        Ok(Self { results })
    }

    /// Parses a complete response body.
    pub fn from_bytes(bytes: &[u8]) -> ParseResult<Self> {
        Self::parse(&mut Parser::new(bytes))
    }
}

fn parse_result<R: Read>(parser: &mut Parser<R>) -> ParseResult<MoveResult> {
    let mut item_id = None;
    let mut status = None;
    let mut new_item_id = None;
    while let Next::Tag(tag) = parser.next_tag(move_items::RESPONSE)? {
        match tag {
            move_items::SRC_MSG_ID => item_id = Some(parser.value()?),
            move_items::STATUS => status = Some(parser.value_int()?),
            move_items::DST_MSG_ID => new_item_id = parser.value_opt()?,
            _ => parser.skip_tag()?,
        }
    }
    let item_id = item_id.ok_or_else(|| ParseError::structure("move response without SrcMsgId"))?;
    let status = status.ok_or_else(|| ParseError::structure("move response without Status"))?;
    Ok(MoveResult {
        item_id,
        status,
        new_item_id,
        outcome: MoveOutcome::from_status(status),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(entries: &[(&str, &str, Option<&str>)]) -> Bytes {
        let mut s = Serializer::new();
        s.start(move_items::MOVE_ITEMS);
        for (id, status, dst) in entries {
            s.start(move_items::RESPONSE)
                .data(move_items::SRC_MSG_ID, id)
                .data(move_items::STATUS, status);
            if let Some(dst) = dst {
                s.data(move_items::DST_MSG_ID, dst);
            }
            s.end();
        }
        s.end();
        s.done().unwrap()
    }

    #[test]
    fn outcomes_per_item() {
        let bytes = response(&[
            ("5:1", "3", Some("9:1")),
            ("5:2", "6", None),
            ("5:3", "7", None),
            ("5:4", "99", None),
        ]);
        let r = MoveItemsResponse::from_bytes(&bytes).unwrap();
        let outcomes: Vec<MoveOutcome> = r.results.iter().map(|m| m.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                MoveOutcome::Success,
                MoveOutcome::Success,
                MoveOutcome::Retry,
                MoveOutcome::Revert
            ]
        );
        assert_eq!(r.results[0].current_id(), "9:1");
        assert_eq!(r.results[1].current_id(), "5:2");
    }

    #[test]
    fn request_document() {
        let req = MoveItemsRequest {
            moves: vec![MoveRequest {
                item_id: "5:1".into(),
                src_folder: "5".into(),
                dst_folder: "9".into(),
            }],
        };
        let text = easync_wbxml::dump(&req.encode().unwrap()).unwrap();
        assert!(text.contains("<Move:DstFldId>9</Move:DstFldId>"), "{text}");
    }
}
