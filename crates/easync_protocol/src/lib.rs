//! # easync Protocol
//!
//! The Exchange ActiveSync command layer, without I/O.
//!
//! This crate provides:
//! - [`Parser`]: a scope-based pull parser over the tag stream
//! - [`FieldSet`] and the [`Field`] trait for per-collection field tables
//! - request builders for FolderSync, Sync, Ping, MoveItems and Search
//! - response parsers for Ping, MoveItems and Search
//! - status tables mapping per-command codes to a [`StatusClass`]
//! - folder types, roles and visibility
//!
//! Collection parsers (folders, contacts, calendar, email) live in the
//! engine, which owns the store they write to.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod error;
mod field_set;
mod folder;
mod moves;
mod parser;
mod ping;
mod search;
mod status;
mod sync;

pub use command::Command;
pub use error::{ParseError, ParseResult};
pub use field_set::{read_field_set, write_field_set, Field, FieldSet};
pub use folder::{
    CollectionClass, FolderDescriptor, FolderRole, FolderSyncRequest, ROOT_PARENT_ID, SYNC_ISSUES,
};
pub use moves::{MoveItemsRequest, MoveItemsResponse, MoveRequest, MoveResult};
pub use parser::{Next, Parser};
pub use ping::{PingFolder, PingRequest, PingResponse};
pub use search::{GalEntry, SearchRequest, SearchResponse, GAL_STORE};
pub use status::{
    classify, folder_sync_status, search_status, sync_status, MoveOutcome, PingStatus,
    StatusClass, STATUS_OK,
};
pub use sync::{
    write_application_data, ApplicationData, BodyPreference, CollectionRequest, Element,
    SyncRequest, UpsyncCommand, RESET_KEY,
};
