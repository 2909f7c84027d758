//! Entity store trait definition.

use crate::batch::{Batch, Filter, OpResult};
use crate::error::StoreResult;
use crate::types::{EntitySnapshot, Scope};

/// The local persistent store consumed by the sync engine.
///
/// # Invariants
///
/// - `apply_batch` is atomic: either every operation is applied, or none
///   is and an error is returned
/// - `Operation::SetSyncState` inside a batch is applied under the same
///   atomicity, so a sync key never runs ahead of the data it describes
/// - Implementations must be `Send + Sync`; the engine serializes commits
///   per scope but different scopes may apply concurrently
pub trait EntityStore: Send + Sync {
    /// Returns the entities of a scope matching the filter, ordered by local id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn query(&self, scope: &Scope, filter: &Filter) -> StoreResult<Vec<EntitySnapshot>>;

    /// Applies a batch atomically and returns one result per operation.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the scope untouched, if any operation fails.
    fn apply_batch(&self, scope: &Scope, batch: &Batch) -> StoreResult<Vec<OpResult>>;

    /// Returns the stored sync state of a scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn sync_state(&self, scope: &Scope) -> StoreResult<Option<Vec<u8>>>;

    /// Replaces the stored sync state of a scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set_sync_state(&self, scope: &Scope, state: &[u8]) -> StoreResult<()>;

    /// Returns the entity with the given server identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn find_by_server_id(
        &self,
        scope: &Scope,
        server_id: &str,
    ) -> StoreResult<Option<EntitySnapshot>> {
        Ok(self
            .query(scope, &Filter::ServerId(server_id.to_string()))?
            .into_iter()
            .next())
    }
}
