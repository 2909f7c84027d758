//! Long-poll (Ping) request and response.

use crate::error::ParseResult;
use crate::folder::CollectionClass;
use crate::parser::{Next, Parser};
use crate::status::PingStatus;
use bytes::Bytes;
use easync_wbxml::pages::ping;
use easync_wbxml::{Serializer, WbxmlResult};
use std::io::Read;

/// One folder to watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingFolder {
    /// Folder server id.
    pub id: String,
    /// Item class of the folder.
    pub class: CollectionClass,
}

/// Ping request: wait up to `heartbeat` seconds for changes in `folders`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingRequest {
    /// Heartbeat interval in seconds.
    pub heartbeat: u32,
    /// Folders to watch.
    pub folders: Vec<PingFolder>,
}

impl PingRequest {
    /// Encodes the request document.
    pub fn encode(&self) -> WbxmlResult<Bytes> {
        let mut s = Serializer::new();
        s.start(ping::PING)
            .data(ping::HEARTBEAT_INTERVAL, &self.heartbeat.to_string());
        if !self.folders.is_empty() {
            s.start(ping::FOLDERS);
            for folder in &self.folders {
                s.start(ping::FOLDER)
                    .data(ping::ID, &folder.id)
                    .data(ping::CLASS, folder.class.as_str())
                    .end();
            }
            s.end();
        }
        s.end();
        s.done()
    }
}

/// Parsed Ping response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingResponse {
    /// Decoded status.
    pub status: PingStatus,
    /// Ids of folders with changes.
    pub changed_folders: Vec<String>,
    /// Server heartbeat bound (sent with `HeartbeatOutOfRange`).
    pub heartbeat: Option<u32>,
    /// Server folder limit (sent with `TooManyFolders`).
    pub max_folders: Option<u32>,
}

impl PingResponse {
    /// Parses a Ping response document.
    pub fn parse<R: Read>(parser: &mut Parser<R>) -> ParseResult<Self> {
        parser.expect_root(ping::PING)?;
        let mut status = None;
        let mut changed_folders = Vec::new();
        let mut heartbeat = None;
        let mut max_folders = None;
        while let Next::Tag(tag) = parser.next_tag(ping::PING)? {
            match tag {
                ping::STATUS => status = Some(parser.value_int()?),
                ping::FOLDERS => {
                    while let Next::Tag(tag) = parser.next_tag(ping::FOLDERS)? {
                        match tag {
                            ping::FOLDER => changed_folders.push(parser.value()?),
                            _ => parser.skip_tag()?,
                        }
                    }
                }
                ping::HEARTBEAT_INTERVAL => heartbeat = Some(non_negative(parser.value_int()?)),
                ping::MAX_FOLDERS => max_folders = Some(non_negative(parser.value_int()?)),
                _ => parser.skip_tag()?,
            }
        }
        let status = status
            .ok_or_else(|| crate::error::ParseError::structure("Ping response has no status"))?;
        Ok(Self {
            status: PingStatus::from_code(status),
            changed_folders,
            heartbeat,
            max_folders,
        })
    }

    /// Parses a complete response body.
    pub fn from_bytes(bytes: &[u8]) -> ParseResult<Self> {
        Self::parse(&mut Parser::new(bytes))
    }
}

fn non_negative(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(build: impl FnOnce(&mut Serializer)) -> Bytes {
        let mut s = Serializer::new();
        s.start(ping::PING);
        build(&mut s);
        s.end();
        s.done().unwrap()
    }

    #[test]
    fn changes_found() {
        let bytes = response(|s| {
            s.data(ping::STATUS, "2")
                .start(ping::FOLDERS)
                .data(ping::FOLDER, "5")
                .data(ping::FOLDER, "9")
                .end();
        });
        let r = PingResponse::from_bytes(&bytes).unwrap();
        assert_eq!(r.status, PingStatus::ChangesFound);
        assert_eq!(r.changed_folders, vec!["5", "9"]);
    }

    #[test]
    fn heartbeat_bound() {
        let bytes = response(|s| {
            s.data(ping::STATUS, "5").data(ping::HEARTBEAT_INTERVAL, "900");
        });
        let r = PingResponse::from_bytes(&bytes).unwrap();
        assert_eq!(r.status, PingStatus::HeartbeatOutOfRange);
        assert_eq!(r.heartbeat, Some(900));
        assert!(r.changed_folders.is_empty());
    }

    #[test]
    fn missing_status_is_structure_error() {
        let bytes = response(|s| {
            s.data(ping::MAX_FOLDERS, "200");
        });
        assert!(PingResponse::from_bytes(&bytes).is_err());
    }

    #[test]
    fn request_lists_folders() {
        let req = PingRequest {
            heartbeat: 1500,
            folders: vec![PingFolder {
                id: "5".into(),
                class: CollectionClass::Email,
            }],
        };
        let bytes = req.encode().unwrap();
        let mut p = Parser::new(&bytes[..]);
        p.expect_root(ping::PING).unwrap();
        assert_eq!(p.next_tag(ping::PING).unwrap(), Next::Tag(ping::HEARTBEAT_INTERVAL));
        assert_eq!(p.value_int().unwrap(), 1500);
        assert_eq!(p.next_tag(ping::PING).unwrap(), Next::Tag(ping::FOLDERS));
        assert_eq!(p.next_tag(ping::FOLDERS).unwrap(), Next::Tag(ping::FOLDER));
        assert_eq!(p.next_tag(ping::FOLDER).unwrap(), Next::Tag(ping::ID));
        assert_eq!(p.value().unwrap(), "5");
        assert_eq!(p.next_tag(ping::FOLDER).unwrap(), Next::Tag(ping::CLASS));
        assert_eq!(p.value().unwrap(), "Email");
    }
}
