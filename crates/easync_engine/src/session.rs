//! Sync session state machine.

use crate::adapters::folders::{descriptor, FolderApplier, FolderSyncResponse};
use crate::adapters::{ApplyContext, ApplyCounts, CollectionAdapter, FolderChanges};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::heartbeat::HeartbeatNegotiator;
use crate::locks::ScopeLocks;
use crate::transport::{CancellableReader, Request, Transport};
use bytes::Bytes;
use easync_protocol::{
    folder_sync_status, search_status, sync_status, CollectionRequest, Command, FolderDescriptor,
    FolderSyncRequest, MoveItemsRequest, MoveItemsResponse, MoveOutcome, MoveRequest, MoveResult,
    Next, Parser, PingFolder, PingRequest, PingResponse, PingStatus, SearchRequest,
    SearchResponse, StatusClass, SyncRequest, UpsyncCommand, RESET_KEY, STATUS_OK,
};
use easync_store::{Batch, EntityStore, Filter, LocalId, Operation, Scope};
use easync_wbxml::pages::airsync;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

type Body = BufReader<CancellableReader<Box<dyn Read + Send>>>;

/// Where the session is in its current exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the response carrying the next sync key.
    AwaitingKey,
    /// The response status was good; records are being applied.
    Syncing,
    /// The batch and the new key were applied.
    Committed,
    /// The key was rejected; the scope was wiped and its key set to "0".
    Reset,
}

/// Result of a folder or collection sync that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome<T> {
    /// The exchange was committed.
    Synced(T),
    /// The server rejected the sync key. Local records of the scope were
    /// deleted and the key reset; the caller should sync the scope again.
    Reset,
}

impl<T> SyncOutcome<T> {
    /// Returns true for [`SyncOutcome::Reset`].
    pub fn is_reset(&self) -> bool {
        matches!(self, SyncOutcome::Reset)
    }

    /// Returns the committed value, if any.
    pub fn synced(self) -> Option<T> {
        match self {
            SyncOutcome::Synced(value) => Some(value),
            SyncOutcome::Reset => None,
        }
    }
}

/// What one collection exchange did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    /// Records the server added.
    pub added: u64,
    /// Records the server changed.
    pub changed: u64,
    /// Records the server deleted.
    pub deleted: u64,
    /// Records skipped (incomplete, repeated, or unknown).
    pub skipped: u64,
    /// Local changes sent with the request.
    pub upsynced: u64,
    /// The server has more changes; sync again.
    pub more_available: bool,
    /// The collection's key after the exchange.
    pub sync_key: String,
}

/// Result of a ping that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingOutcome {
    /// These folders changed; sync them.
    Changes(Vec<String>),
    /// The heartbeat expired without changes.
    NoChanges,
    /// The heartbeat was out of the server's range; the next ping uses
    /// this one.
    Renegotiate(u32),
    /// The folder list changed; run a folder sync first.
    FolderListStale,
}

/// Statistics about a session.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Commands posted.
    pub requests: u64,
    /// Batches committed.
    pub commits: u64,
    /// Scopes reset after an invalid key.
    pub resets: u64,
    /// Server records applied (added, changed, or deleted).
    pub records_applied: u64,
    /// Local changes sent.
    pub records_upsynced: u64,
    /// Last commit time.
    pub last_commit_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Local changes sent with one Sync request.
#[derive(Debug, Default)]
struct Upsync {
    commands: Vec<UpsyncCommand>,
    adds: HashMap<String, LocalId>,
    changes: HashMap<String, LocalId>,
    deletes: Vec<LocalId>,
    local_deletes: Vec<LocalId>,
}

/// The collection part of a parsed Sync response.
#[derive(Debug, Default)]
struct SyncReply {
    status: Option<i32>,
    collection_status: Option<i32>,
    sync_key: Option<String>,
    more_available: bool,
    add_acks: Vec<AddAck>,
    failed_changes: HashSet<String>,
}

#[derive(Debug)]
struct AddAck {
    client_id: String,
    server_id: Option<String>,
    status: i32,
}

/// One account's connection to the server.
///
/// A session runs one exchange at a time per caller; several sessions (or
/// threads sharing one) may work on different scopes concurrently. Each
/// exchange reads the scope's key, posts the request, applies the whole
/// response as one batch together with the new key, and only then reports
/// success. The key never runs ahead of the data it describes.
pub struct SyncSession<T: Transport, S: EntityStore> {
    config: SyncConfig,
    transport: Arc<T>,
    store: Arc<S>,
    locks: Arc<ScopeLocks>,
    cancelled: Arc<AtomicBool>,
    heartbeat: Mutex<HeartbeatNegotiator>,
    state: RwLock<SessionState>,
    stats: RwLock<SessionStats>,
}

impl<T: Transport, S: EntityStore> SyncSession<T, S> {
    /// Creates a session.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Config` if the configuration is invalid.
    pub fn new(config: SyncConfig, transport: T, store: Arc<S>) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            heartbeat: Mutex::new(HeartbeatNegotiator::new(&config.heartbeat)),
            config,
            transport: Arc::new(transport),
            store,
            locks: Arc::new(ScopeLocks::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
            state: RwLock::new(SessionState::Committed),
            stats: RwLock::new(SessionStats::default()),
        })
    }

    /// Shares scope locks with other sessions on the same store.
    pub fn with_locks(mut self, locks: Arc<ScopeLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Gets the current state.
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Heartbeat the next ping sends, in seconds.
    pub fn heartbeat(&self) -> u32 {
        self.heartbeat.lock().current()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SessionStats {
        self.stats.read().clone()
    }

    /// Cancels the exchange in progress and any later one.
    ///
    /// A read blocked on the response fails promptly; nothing of the
    /// interrupted exchange is committed.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Err(e) = self.transport.close() {
            tracing::debug!(error = %e, "closing transport on cancel failed");
        }
    }

    /// Returns true once [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
    }

    /// Scope of the folder hierarchy.
    pub fn hierarchy_scope(&self) -> Scope {
        Scope::hierarchy(self.config.account_id)
    }

    /// Scope of one collection.
    pub fn collection_scope(&self, collection_id: &str) -> Scope {
        Scope::collection(self.config.account_id, collection_id)
    }

    /// Returns the stored key of a scope, "0" if there is none.
    pub fn sync_key(&self, scope: &Scope) -> SyncResult<String> {
        Ok(match self.store.sync_state(scope)? {
            Some(state) => String::from_utf8_lossy(&state).into_owned(),
            None => RESET_KEY.to_string(),
        })
    }

    /// Folders stored by the last folder sync.
    pub fn folders(&self) -> SyncResult<Vec<FolderDescriptor>> {
        Ok(self
            .store
            .query(&self.hierarchy_scope(), &Filter::All)?
            .iter()
            .filter_map(descriptor)
            .collect())
    }

    /// Posts a command and opens the response for parsing.
    ///
    /// Returns `None` for an empty body.
    fn exchange(
        &self,
        command: Command,
        body: Bytes,
        timeout: Duration,
    ) -> SyncResult<Option<Parser<Body>>> {
        self.check_cancelled()?;
        tracing::debug!(%command, bytes = body.len(), "posting");
        self.stats.write().requests += 1;
        let response = self.transport.post(&Request {
            command,
            body,
            timeout,
        })?;
        if !response.is_success() {
            tracing::warn!(%command, status = response.status, "HTTP request failed");
            return Err(SyncError::Http {
                status: response.status,
            });
        }
        let mut reader = BufReader::new(CancellableReader::new(
            response.body,
            Arc::clone(&self.cancelled),
        ));
        let empty = match reader.fill_buf() {
            Ok(buf) => buf.is_empty(),
            Err(_) if self.is_cancelled() => return Err(SyncError::Cancelled),
            Err(e) => return Err(SyncError::transport_retryable(e.to_string())),
        };
        if empty {
            // a body cut short by cancel reads as EOF
            self.check_cancelled()?;
            tracing::debug!(%command, "empty response body");
            return Ok(None);
        }
        Ok(Some(Parser::new(reader)))
    }

    /// Maps any failure of an interrupted parse to `Cancelled`.
    fn guard<V>(&self, result: SyncResult<V>) -> SyncResult<V> {
        match result {
            Err(_) if self.is_cancelled() => Err(SyncError::Cancelled),
            other => other,
        }
    }

    fn commit(&self, scope: &Scope, batch: &Batch) -> SyncResult<()> {
        self.check_cancelled()?;
        if let Err(e) = self.store.apply_batch(scope, batch) {
            tracing::warn!(%scope, error = %e, "batch rejected, key not advanced");
            self.stats.write().last_error = Some(e.to_string());
            return Err(e.into());
        }
        let mut stats = self.stats.write();
        stats.commits += 1;
        stats.last_commit_time = Some(Instant::now());
        stats.last_error = None;
        Ok(())
    }

    /// Wipes a scope and sets its key back to "0".
    fn reset(&self, scope: &Scope, mut batch: Batch) -> SyncResult<()> {
        batch.push(Operation::SetSyncState(RESET_KEY.as_bytes().to_vec()));
        self.commit(scope, &batch)?;
        self.set_state(SessionState::Reset);
        self.stats.write().resets += 1;
        tracing::info!(%scope, "sync key rejected, scope reset");
        Ok(())
    }

    fn record_error(&self, error: &SyncError) {
        self.stats.write().last_error = Some(error.to_string());
    }

    /// Syncs the folder hierarchy.
    ///
    /// Collections of deleted folders are dropped after the hierarchy is
    /// committed.
    pub fn folder_sync(&self) -> SyncResult<SyncOutcome<FolderChanges>> {
        let scope = self.hierarchy_scope();
        let outcome = self
            .locks
            .with_scope(&scope, || self.folder_sync_locked(&scope))
            .inspect_err(|e| self.record_error(e))?;
        if let SyncOutcome::Synced(changes) = &outcome {
            for id in &changes.deleted {
                self.drop_collection(id)?;
            }
        }
        Ok(outcome)
    }

    fn folder_sync_locked(&self, scope: &Scope) -> SyncResult<SyncOutcome<FolderChanges>> {
        self.set_state(SessionState::AwaitingKey);
        let key = self.sync_key(scope)?;
        let body = FolderSyncRequest::new(key.as_str()).encode()?;
        let mut parser = self
            .exchange(Command::FolderSync, body, self.config.request_timeout())?
            .ok_or_else(|| SyncError::structure("empty FolderSync response"))?;
        let response = self.guard(FolderSyncResponse::parse(&mut parser))?;

        let status = response
            .status
            .ok_or_else(|| SyncError::structure("FolderSync response has no status"))?;
        match folder_sync_status(status) {
            StatusClass::Success => {}
            StatusClass::InvalidSyncKey => {
                self.reset(scope, Batch::from(vec![Operation::ClearScope]))?;
                return Ok(SyncOutcome::Reset);
            }
            _ => {
                tracing::warn!(status, "FolderSync failed");
                return Err(SyncError::Status {
                    command: Command::FolderSync,
                    code: status,
                });
            }
        }
        self.set_state(SessionState::Syncing);
        let new_key = response
            .sync_key
            .ok_or_else(|| SyncError::structure("FolderSync response has no sync key"))?;

        let mut cx = ApplyContext::new(&*self.store, scope);
        let mut applier = FolderApplier::load(&cx)?;
        for change in response.changes {
            applier.apply(change, &mut cx)?;
        }
        let changes = applier.finish(&mut cx);
        cx.push(Operation::SetSyncState(new_key.clone().into_bytes()));
        self.commit(scope, &cx.into_batch())?;
        self.set_state(SessionState::Committed);
        tracing::info!(
            added = changes.added.len(),
            updated = changes.updated.len(),
            deleted = changes.deleted.len(),
            sync_key = %new_key,
            "folder sync committed"
        );
        Ok(SyncOutcome::Synced(changes))
    }

    /// Deletes the local records and key of a collection whose folder is gone.
    pub fn drop_collection(&self, collection_id: &str) -> SyncResult<()> {
        let scope = self.collection_scope(collection_id);
        self.locks.with_scope(&scope, || {
            let batch = Batch::from(vec![
                Operation::ClearScope,
                Operation::SetSyncState(RESET_KEY.as_bytes().to_vec()),
            ]);
            self.store.apply_batch(&scope, &batch)?;
            tracing::info!(%scope, "collection dropped");
            Ok(())
        })
    }

    /// Runs one Sync exchange for a collection.
    ///
    /// Local changes are sent with the request unless the collection has no
    /// key yet. Call again while `more_available` is set.
    pub fn sync_collection<A: CollectionAdapter>(
        &self,
        collection_id: &str,
        adapter: &mut A,
    ) -> SyncResult<SyncOutcome<CollectionSummary>> {
        let scope = self.collection_scope(collection_id);
        self.locks
            .with_scope(&scope, || self.sync_collection_locked(&scope, collection_id, adapter))
            .inspect_err(|e| self.record_error(e))
    }

    fn sync_collection_locked<A: CollectionAdapter>(
        &self,
        scope: &Scope,
        collection_id: &str,
        adapter: &mut A,
    ) -> SyncResult<SyncOutcome<CollectionSummary>> {
        self.set_state(SessionState::AwaitingKey);
        let key = self.sync_key(scope)?;
        let mut request = CollectionRequest::new(collection_id, key.as_str());
        request.window_size = Some(self.config.window_size);
        adapter.options(&mut request);

        let upsync = if key == RESET_KEY {
            Upsync::default()
        } else {
            self.pending(scope, adapter)?
        };
        request.commands = upsync.commands.clone();
        let upsynced = upsync.commands.len() as u64;
        let body = SyncRequest::single(request).encode()?;

        let mut cx = ApplyContext::new(&*self.store, scope);
        let Some(mut parser) =
            self.exchange(Command::Sync, body, self.config.request_timeout())?
        else {
            // nothing changed on either side
            for local in &upsync.local_deletes {
                cx.remove(*local);
            }
            let batch = cx.into_batch();
            if !batch.is_empty() {
                self.commit(scope, &batch)?;
            }
            self.set_state(SessionState::Committed);
            return Ok(SyncOutcome::Synced(CollectionSummary {
                sync_key: key,
                ..CollectionSummary::default()
            }));
        };

        let reply = self.guard(read_sync_response(&mut parser, adapter, &mut cx))?;
        let status = reply
            .collection_status
            .or(reply.status)
            .unwrap_or(STATUS_OK);
        match sync_status(status) {
            StatusClass::Success => {}
            StatusClass::InvalidSyncKey => {
                drop(cx);
                let mut wipe = ApplyContext::new(&*self.store, scope);
                adapter.wipe(&mut wipe);
                self.reset(scope, wipe.into_batch())?;
                return Ok(SyncOutcome::Reset);
            }
            StatusClass::FolderListStale => {
                tracing::warn!(collection_id, status, "folder list is stale");
                return Err(SyncError::FolderListStale { status });
            }
            _ => {
                tracing::warn!(collection_id, status, "Sync failed");
                return Err(SyncError::Status {
                    command: Command::Sync,
                    code: status,
                });
            }
        }
        self.set_state(SessionState::Syncing);
        let new_key = reply
            .sync_key
            .clone()
            .ok_or_else(|| SyncError::structure("Sync response has no sync key"))?;

        let counts = cx.counts();
        settle_upsync(&upsync, &reply, &mut cx);
        cx.push(Operation::SetSyncState(new_key.clone().into_bytes()));
        self.commit(scope, &cx.into_batch())?;
        self.set_state(SessionState::Committed);

        let summary = summary(counts, upsynced, reply.more_available || key == RESET_KEY, new_key);
        {
            let mut stats = self.stats.write();
            stats.records_applied += summary.added + summary.changed + summary.deleted;
            stats.records_upsynced += upsynced;
        }
        tracing::info!(
            collection_id,
            added = summary.added,
            changed = summary.changed,
            deleted = summary.deleted,
            upsynced,
            more = summary.more_available,
            sync_key = %summary.sync_key,
            "sync committed"
        );
        Ok(SyncOutcome::Synced(summary))
    }

    /// Collects the local changes of a scope.
    fn pending<A: CollectionAdapter>(&self, scope: &Scope, adapter: &A) -> SyncResult<Upsync> {
        let mut upsync = Upsync::default();
        for snapshot in self.store.query(scope, &Filter::Pending)? {
            let local = snapshot.local_id;
            match (snapshot.deleted, snapshot.server_id.clone()) {
                (true, Some(server_id)) => {
                    upsync.commands.push(UpsyncCommand::Delete { server_id });
                    upsync.deletes.push(local);
                }
                // never reached the server
                (true, None) => upsync.local_deletes.push(local),
                (false, server_id) => {
                    let Some(data) = adapter.upsync(&snapshot) else {
                        tracing::debug!(entity = local.0, "local change not sent");
                        continue;
                    };
                    match server_id {
                        Some(server_id) => {
                            upsync.changes.insert(server_id.clone(), local);
                            upsync.commands.push(UpsyncCommand::Change { server_id, data });
                        }
                        None => {
                            let client_id = local.0.to_string();
                            upsync.adds.insert(client_id.clone(), local);
                            upsync.commands.push(UpsyncCommand::Add { client_id, data });
                        }
                    }
                }
            }
        }
        Ok(upsync)
    }

    /// Long-polls the server for changes in `folders`.
    ///
    /// Blocks for up to [`heartbeat`](Self::heartbeat) seconds, then adjusts
    /// the heartbeat from how the ping ended. [`cancel`](Self::cancel)
    /// interrupts it.
    pub fn ping(&self, folders: &[PingFolder]) -> SyncResult<PingOutcome> {
        let heartbeat = self.heartbeat();
        let result = self.ping_once(heartbeat, folders);
        let mut negotiator = self.heartbeat.lock();
        match &result {
            Ok(PingOutcome::Renegotiate(bound)) => {
                let next = negotiator.renegotiate(*bound);
                tracing::debug!(heartbeat, bound, next, "heartbeat out of range");
                return Ok(PingOutcome::Renegotiate(next));
            }
            Ok(PingOutcome::NoChanges) => {
                let next = negotiator.expired_without_changes();
                tracing::trace!(heartbeat, next, settled = negotiator.is_settled(), "ping expired");
            }
            Err(SyncError::Transport { .. }) if !self.is_cancelled() => {
                let next = negotiator.connection_dropped();
                tracing::debug!(heartbeat, next, "ping connection dropped");
            }
            _ => {}
        }
        result
    }

    fn ping_once(&self, heartbeat: u32, folders: &[PingFolder]) -> SyncResult<PingOutcome> {
        let body = PingRequest {
            heartbeat,
            folders: folders.to_vec(),
        }
        .encode()?;
        let Some(mut parser) =
            self.exchange(Command::Ping, body, self.config.ping_timeout(heartbeat))?
        else {
            return Ok(PingOutcome::NoChanges);
        };
        let response = self.guard(PingResponse::parse(&mut parser).map_err(SyncError::from))?;
        match response.status {
            PingStatus::NoChanges => Ok(PingOutcome::NoChanges),
            PingStatus::ChangesFound => {
                tracing::debug!(folders = ?response.changed_folders, "ping found changes");
                Ok(PingOutcome::Changes(response.changed_folders))
            }
            PingStatus::HeartbeatOutOfRange => response
                .heartbeat
                .map(PingOutcome::Renegotiate)
                .ok_or_else(|| SyncError::structure("heartbeat out of range without a bound")),
            PingStatus::FolderListStale => {
                tracing::warn!("ping reports a stale folder list");
                Ok(PingOutcome::FolderListStale)
            }
            status => {
                tracing::warn!(status = status.code(), max_folders = ?response.max_folders, "Ping failed");
                Err(SyncError::Status {
                    command: Command::Ping,
                    code: status.code(),
                })
            }
        }
    }

    /// Moves items between folders and returns one result per item.
    pub fn move_items(&self, moves: Vec<MoveRequest>) -> SyncResult<Vec<MoveResult>> {
        let body = MoveItemsRequest { moves }.encode()?;
        let mut parser = self
            .exchange(Command::MoveItems, body, self.config.request_timeout())?
            .ok_or_else(|| SyncError::structure("empty MoveItems response"))?;
        let response =
            self.guard(MoveItemsResponse::parse(&mut parser).map_err(SyncError::from))?;
        for result in &response.results {
            match result.outcome {
                MoveOutcome::Success => {
                    tracing::debug!(item = %result.item_id, new = ?result.new_item_id, "moved");
                }
                outcome => tracing::warn!(
                    item = %result.item_id,
                    status = result.status,
                    ?outcome,
                    "move not completed"
                ),
            }
        }
        Ok(response.results)
    }

    /// Searches the global address list.
    pub fn search_directory(
        &self,
        query: &str,
        start: u32,
        end: u32,
    ) -> SyncResult<SearchResponse> {
        let body = SearchRequest::new(query, start, end).encode()?;
        let mut parser = self
            .exchange(Command::Search, body, self.config.request_timeout())?
            .ok_or_else(|| SyncError::structure("empty Search response"))?;
        let response = self.guard(SearchResponse::parse(&mut parser).map_err(SyncError::from))?;
        for code in std::iter::once(response.status).chain(response.store_status) {
            if search_status(code) != StatusClass::Success {
                tracing::warn!(status = code, "Search failed");
                return Err(SyncError::Status {
                    command: Command::Search,
                    code,
                });
            }
        }
        Ok(response)
    }
}

fn summary(
    counts: ApplyCounts,
    upsynced: u64,
    more_available: bool,
    sync_key: String,
) -> CollectionSummary {
    CollectionSummary {
        added: counts.added,
        changed: counts.changed,
        deleted: counts.deleted,
        skipped: counts.skipped,
        upsynced,
        more_available,
        sync_key,
    }
}

/// Clears what the server accepted: assigns server ids to acknowledged
/// adds, marks sent changes clean, and deletes sent deletes.
fn settle_upsync(upsync: &Upsync, reply: &SyncReply, cx: &mut ApplyContext<'_>) {
    for ack in &reply.add_acks {
        let Some(&entity) = upsync.adds.get(&ack.client_id) else {
            tracing::debug!(client_id = %ack.client_id, "response for unknown add");
            continue;
        };
        match (&ack.server_id, ack.status) {
            (Some(server_id), STATUS_OK) => {
                cx.push(Operation::SetServerId {
                    entity,
                    server_id: server_id.clone(),
                });
            }
            (_, status) => {
                tracing::warn!(client_id = %ack.client_id, status, "add rejected, kept dirty");
            }
        }
    }
    for (server_id, &entity) in &upsync.changes {
        if reply.failed_changes.contains(server_id) {
            tracing::warn!(%server_id, "change rejected, kept dirty");
        } else if !cx.is_removed(entity) {
            cx.push(Operation::MarkClean { entity });
        }
    }
    for &entity in upsync.deletes.iter().chain(&upsync.local_deletes) {
        cx.remove(entity);
    }
}

fn read_sync_response<R: Read, A: CollectionAdapter>(
    parser: &mut Parser<R>,
    adapter: &mut A,
    cx: &mut ApplyContext<'_>,
) -> SyncResult<SyncReply> {
    parser.expect_root(airsync::SYNC)?;
    let mut reply = SyncReply::default();
    while let Next::Tag(tag) = parser.next_tag(airsync::SYNC)? {
        match tag {
            airsync::STATUS => reply.status = Some(parser.value_int()?),
            airsync::COLLECTIONS => {
                while let Next::Tag(tag) = parser.next_tag(airsync::COLLECTIONS)? {
                    if tag == airsync::COLLECTION {
                        read_collection(parser, adapter, cx, &mut reply)?;
                    }
                }
            }
            _ => parser.skip_tag()?,
        }
    }
    Ok(reply)
}

fn read_collection<R: Read, A: CollectionAdapter>(
    parser: &mut Parser<R>,
    adapter: &mut A,
    cx: &mut ApplyContext<'_>,
    reply: &mut SyncReply,
) -> SyncResult<()> {
    while let Next::Tag(tag) = parser.next_tag(airsync::COLLECTION)? {
        match tag {
            airsync::SYNC_KEY => reply.sync_key = Some(parser.value()?),
            airsync::STATUS => reply.collection_status = Some(parser.value_int()?),
            airsync::MORE_AVAILABLE => {
                reply.more_available = true;
                parser.skip_tag()?;
            }
            airsync::COMMANDS => {
                while let Next::Tag(tag) = parser.next_tag(airsync::COMMANDS)? {
                    match tag {
                        airsync::ADD | airsync::CHANGE => read_record(parser, tag, adapter, cx)?,
                        airsync::DELETE | airsync::SOFT_DELETE => {
                            if let Some(server_id) = read_server_id(parser, tag)? {
                                adapter.delete(&server_id, cx)?;
                            }
                        }
                        _ => parser.skip_tag()?,
                    }
                }
            }
            airsync::RESPONSES => read_responses(parser, reply)?,
            _ => parser.skip_tag()?,
        }
    }
    Ok(())
}

fn read_record<R: Read, A: CollectionAdapter>(
    parser: &mut Parser<R>,
    command: easync_wbxml::Tag,
    adapter: &mut A,
    cx: &mut ApplyContext<'_>,
) -> SyncResult<()> {
    let mut server_id = None;
    while let Next::Tag(tag) = parser.next_tag(command)? {
        match tag {
            airsync::SERVER_ID => server_id = Some(parser.value()?),
            airsync::APPLICATION_DATA => {
                let id: &str = server_id
                    .as_deref()
                    .ok_or_else(|| SyncError::structure("ApplicationData before ServerId"))?;
                if command == airsync::ADD {
                    adapter.add(parser, id, cx)?;
                } else {
                    adapter.change(parser, id, cx)?;
                }
            }
            _ => parser.skip_tag()?,
        }
    }
    Ok(())
}

fn read_server_id<R: Read>(
    parser: &mut Parser<R>,
    end: easync_wbxml::Tag,
) -> SyncResult<Option<String>> {
    let mut server_id = None;
    while let Next::Tag(tag) = parser.next_tag(end)? {
        match tag {
            airsync::SERVER_ID => server_id = Some(parser.value()?),
            _ => parser.skip_tag()?,
        }
    }
    Ok(server_id)
}

fn read_responses<R: Read>(parser: &mut Parser<R>, reply: &mut SyncReply) -> SyncResult<()> {
    while let Next::Tag(tag) = parser.next_tag(airsync::RESPONSES)? {
        let end = tag;
        let mut client_id = None;
        let mut server_id = None;
        let mut status = STATUS_OK;
        while let Next::Tag(tag) = parser.next_tag(end)? {
            match tag {
                airsync::CLIENT_ID => client_id = Some(parser.value()?),
                airsync::SERVER_ID => server_id = Some(parser.value()?),
                airsync::STATUS => status = parser.value_int()?,
                _ => parser.skip_tag()?,
            }
        }
        match end {
            airsync::ADD => match client_id {
                Some(client_id) => reply.add_acks.push(AddAck {
                    client_id,
                    server_id,
                    status,
                }),
                None => tracing::debug!("add response without client id"),
            },
            airsync::CHANGE if status != STATUS_OK => {
                if let Some(server_id) = server_id {
                    reply.failed_changes.insert(server_id);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ContactsAdapter;
    use crate::transport::MockTransport;
    use easync_store::InMemoryStore;
    use easync_wbxml::Serializer;

    fn session() -> SyncSession<MockTransport, InMemoryStore> {
        let config = SyncConfig::new(1, "https://mail.example.com", "ada");
        SyncSession::new(config, MockTransport::new(), Arc::new(InMemoryStore::new())).unwrap()
    }

    fn sync_doc(build: impl FnOnce(&mut Serializer)) -> Bytes {
        let mut s = Serializer::new();
        s.start(airsync::SYNC)
            .start(airsync::COLLECTIONS)
            .start(airsync::COLLECTION);
        build(&mut s);
        s.end().end().end();
        s.done().unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SyncConfig::new(1, "not a url", "ada");
        assert!(matches!(
            SyncSession::new(config, MockTransport::new(), Arc::new(InMemoryStore::new())),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn first_sync_implies_more_available() {
        let session = session();
        session.transport().push_ok(sync_doc(|s| {
            s.data(airsync::SYNC_KEY, "1")
                .data(airsync::COLLECTION_ID, "4")
                .data(airsync::STATUS, "1");
        }));
        let summary = session
            .sync_collection("4", &mut ContactsAdapter::new())
            .unwrap()
            .synced()
            .unwrap();
        assert!(summary.more_available);
        assert_eq!(summary.sync_key, "1");
        assert_eq!(session.state(), SessionState::Committed);
        assert_eq!(session.sync_key(&session.collection_scope("4")).unwrap(), "1");
    }

    #[test]
    fn unknown_sync_status_is_retryable() {
        let session = session();
        session.transport().push_ok(sync_doc(|s| {
            s.data(airsync::SYNC_KEY, "1").data(airsync::STATUS, "5");
        }));
        let err = session
            .sync_collection("4", &mut ContactsAdapter::new())
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(session.sync_key(&session.collection_scope("4")).unwrap(), "0");
        assert!(session.stats().last_error.is_some());
    }

    #[test]
    fn object_not_found_means_stale_folders() {
        let session = session();
        session.transport().push_ok(sync_doc(|s| {
            s.data(airsync::STATUS, "8");
        }));
        let err = session
            .sync_collection("4", &mut ContactsAdapter::new())
            .unwrap_err();
        assert!(matches!(err, SyncError::FolderListStale { status: 8 }));
    }

    #[test]
    fn http_errors_are_not_parsed() {
        let session = session();
        session.transport().push_response(503, Bytes::from_static(b"garbage"));
        let err = session.folder_sync().unwrap_err();
        assert!(matches!(err, SyncError::Http { status: 503 }));
        assert!(err.is_retryable());
    }

    #[test]
    fn cancelled_session_posts_nothing() {
        let session = session();
        session.cancel();
        assert!(matches!(session.folder_sync(), Err(SyncError::Cancelled)));
        assert_eq!(session.transport().request_count(), 0);
    }
}
