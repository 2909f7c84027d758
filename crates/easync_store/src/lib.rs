//! # easync Store
//!
//! Entity store interface consumed by the sync engine, plus an in-memory
//! implementation for tests and tools.
//!
//! The store is an external collaborator: the engine only needs
//! query-by-filter, atomic batch apply, and per-scope sync state. Entities
//! are records (a contact, an event, a folder) made of typed sub-rows.
//!
//! ## Key Invariants
//!
//! - Batches apply atomically, sync state included
//! - Back-references (`EntityRef::Created`) point at an earlier
//!   `CreateEntity` in the same batch
//! - Scopes are independent: clearing one never touches another

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod error;
mod memory;
mod store;
mod types;

pub use batch::{Batch, EntityRef, Filter, OpResult, Operation};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use store::EntityStore;
pub use types::{EntitySnapshot, LocalId, RowId, RowKind, RowValues, Scope, SubRow};
