//! # easync Engine
//!
//! Sync session state machine and collection parsers.
//!
//! This crate provides:
//! - Session state machine (awaiting key → syncing → committed, or reset)
//! - Folder, contacts, calendar and email collection parsers
//! - Upsync of locally modified contacts
//! - Long-poll with heartbeat negotiation
//! - Item moves and directory search
//! - Transport abstraction with an HTTP transport and a scripted mock
//! - Per-scope commit locks
//!
//! ## Architecture
//!
//! Every exchange follows the same shape:
//! 1. Read the scope's sync key and post the command
//! 2. Stream the response through the pull parser; collection parsers turn
//!    each record into store operations via the reconciliation engine
//! 3. Apply the operations and the new key as one atomic batch
//!
//! ## Key Invariants
//!
//! - The sync key is persisted in the same batch as the data it describes
//! - A rejected key wipes the scope and resets its key to "0"
//! - Cancellation and store failures leave the key untouched
//! - Unknown tags are skipped, never errors
//! - No retry loop inside the engine; callers act on the error class

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapters;
mod config;
mod error;
mod heartbeat;
mod http;
mod locks;
mod session;
mod transport;

pub use adapters::{
    contact_data, contact_image, phone, postal, relation, ApplyContext, ApplyCounts,
    CalendarAdapter, CollectionAdapter, ContactField, ContactsAdapter, EmailAdapter,
    FolderChanges, Staged,
};
pub use config::{HeartbeatConfig, SyncConfig};
pub use error::{ErrorClass, SyncError, SyncResult};
pub use http::{HttpClient, HttpTransport, CONTENT_TYPE, DEFAULT_PATH};
pub use locks::ScopeLocks;
pub use session::{
    CollectionSummary, PingOutcome, SessionState, SessionStats, SyncOutcome, SyncSession,
};
pub use transport::{CancellableReader, MockTransport, Request, Response, Transport};
