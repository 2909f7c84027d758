//! Status code tables.
//!
//! Each command family carries its own integer status codes. These tables
//! map them onto the small set of outcomes callers act on.

use crate::command::Command;
use serde::Serialize;
use std::fmt;

/// Status code meaning success in every command family.
pub const STATUS_OK: i32 = 1;

/// How a protocol status code should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// Carry on.
    Success,
    /// The sync key was rejected; reset the scope and start over.
    InvalidSyncKey,
    /// The folder list is out of date; run a folder sync first.
    FolderListStale,
    /// Retry the whole exchange later.
    Transient,
    /// Retry immediately with an adjusted parameter.
    Renegotiate,
    /// Give up; the local state is left as it was.
    Fatal,
}

impl StatusClass {
    /// Short label.
    pub fn as_str(self) -> &'static str {
        match self {
            StatusClass::Success => "success",
            StatusClass::InvalidSyncKey => "invalid_sync_key",
            StatusClass::FolderListStale => "folder_list_stale",
            StatusClass::Transient => "transient",
            StatusClass::Renegotiate => "renegotiate",
            StatusClass::Fatal => "fatal",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// FolderSync: 1 ok, 9 invalid key, anything else is retried.
pub fn folder_sync_status(code: i32) -> StatusClass {
    match code {
        1 => StatusClass::Success,
        9 => StatusClass::InvalidSyncKey,
        _ => StatusClass::Transient,
    }
}

/// Sync (top level and per collection).
///
/// 8 (object not found) and 12 (hierarchy changed) both mean the folder
/// list is stale.
pub fn sync_status(code: i32) -> StatusClass {
    match code {
        1 => StatusClass::Success,
        3 => StatusClass::InvalidSyncKey,
        8 | 12 => StatusClass::FolderListStale,
        _ => StatusClass::Transient,
    }
}

/// Ping status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingStatus {
    /// 1: heartbeat expired without changes.
    NoChanges,
    /// 2: at least one folder changed.
    ChangesFound,
    /// 3: the server needs the full parameter list.
    MissingParameters,
    /// 4 or 7: the folder list must be resynced.
    FolderListStale,
    /// 5: the heartbeat is outside the server's bounds.
    HeartbeatOutOfRange,
    /// 6: too many folders were monitored.
    TooManyFolders,
    /// 8: server error.
    ServerError,
    /// Anything else.
    Unknown(i32),
}

impl PingStatus {
    /// Decodes a Ping status code.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => PingStatus::NoChanges,
            2 => PingStatus::ChangesFound,
            3 => PingStatus::MissingParameters,
            4 | 7 => PingStatus::FolderListStale,
            5 => PingStatus::HeartbeatOutOfRange,
            6 => PingStatus::TooManyFolders,
            8 => PingStatus::ServerError,
            other => PingStatus::Unknown(other),
        }
    }

    /// The wire code. Stale folder lists report 7.
    pub fn code(self) -> i32 {
        match self {
            PingStatus::NoChanges => 1,
            PingStatus::ChangesFound => 2,
            PingStatus::MissingParameters => 3,
            PingStatus::FolderListStale => 7,
            PingStatus::HeartbeatOutOfRange => 5,
            PingStatus::TooManyFolders => 6,
            PingStatus::ServerError => 8,
            PingStatus::Unknown(code) => code,
        }
    }

    /// Classifies the status.
    pub fn class(self) -> StatusClass {
        match self {
            PingStatus::NoChanges | PingStatus::ChangesFound => StatusClass::Success,
            PingStatus::MissingParameters | PingStatus::ServerError => StatusClass::Transient,
            PingStatus::FolderListStale => StatusClass::FolderListStale,
            PingStatus::HeartbeatOutOfRange => StatusClass::Renegotiate,
            PingStatus::TooManyFolders | PingStatus::Unknown(_) => StatusClass::Fatal,
        }
    }
}

/// What the client does with one moved item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveOutcome {
    /// The item is at the destination (moved, already there, or already exists).
    Success,
    /// The item is locked; try again later.
    Retry,
    /// Put the item back in its original folder.
    Revert,
}

impl MoveOutcome {
    /// Maps a MoveItems status. Unrecognized codes revert.
    pub fn from_status(code: i32) -> Self {
        match code {
            // 3 moved, 4 source equals destination, 6 already exists
            3 | 4 | 6 => MoveOutcome::Success,
            7 => MoveOutcome::Retry,
            _ => MoveOutcome::Revert,
        }
    }

    fn class(self) -> StatusClass {
        match self {
            MoveOutcome::Success => StatusClass::Success,
            MoveOutcome::Retry => StatusClass::Transient,
            MoveOutcome::Revert => StatusClass::Fatal,
        }
    }
}

/// Search status, top level or per store.
pub fn search_status(code: i32) -> StatusClass {
    match code {
        1 => StatusClass::Success,
        // server error, connection failed, timed out
        3 | 7 | 10 => StatusClass::Transient,
        11 => StatusClass::FolderListStale,
        _ => StatusClass::Fatal,
    }
}

/// Classifies a status code for any command.
pub fn classify(command: Command, code: i32) -> StatusClass {
    match command {
        Command::FolderSync => folder_sync_status(code),
        Command::Sync => sync_status(code),
        Command::Ping => PingStatus::from_code(code).class(),
        Command::MoveItems => MoveOutcome::from_status(code).class(),
        Command::Search => search_status(code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_key_rejection_codes() {
        assert_eq!(folder_sync_status(9), StatusClass::InvalidSyncKey);
        assert_eq!(sync_status(3), StatusClass::InvalidSyncKey);
        // 3 is not a key error for folder sync
        assert_eq!(folder_sync_status(3), StatusClass::Transient);
    }

    #[test]
    fn stale_folder_list_codes() {
        assert_eq!(sync_status(8), StatusClass::FolderListStale);
        assert_eq!(sync_status(12), StatusClass::FolderListStale);
        assert_eq!(PingStatus::from_code(4), PingStatus::FolderListStale);
        assert_eq!(PingStatus::from_code(7), PingStatus::FolderListStale);
        assert_eq!(search_status(11), StatusClass::FolderListStale);
    }

    #[test]
    fn ping_classes() {
        assert_eq!(classify(Command::Ping, 1), StatusClass::Success);
        assert_eq!(classify(Command::Ping, 2), StatusClass::Success);
        assert_eq!(classify(Command::Ping, 3), StatusClass::Transient);
        assert_eq!(classify(Command::Ping, 5), StatusClass::Renegotiate);
        assert_eq!(classify(Command::Ping, 6), StatusClass::Fatal);
        assert_eq!(classify(Command::Ping, 8), StatusClass::Transient);
        assert_eq!(PingStatus::from_code(42), PingStatus::Unknown(42));
        assert_eq!(classify(Command::Ping, 42), StatusClass::Fatal);
    }

    #[test]
    fn move_outcomes() {
        assert_eq!(MoveOutcome::from_status(3), MoveOutcome::Success);
        assert_eq!(MoveOutcome::from_status(4), MoveOutcome::Success);
        assert_eq!(MoveOutcome::from_status(6), MoveOutcome::Success);
        assert_eq!(MoveOutcome::from_status(7), MoveOutcome::Retry);
        assert_eq!(MoveOutcome::from_status(99), MoveOutcome::Revert);
        assert_eq!(MoveOutcome::from_status(1), MoveOutcome::Revert);
        assert_eq!(classify(Command::MoveItems, 7), StatusClass::Transient);
    }

    #[test]
    fn other_failures_are_transient_for_sync() {
        for code in [2, 4, 5, 6, 7, 9, 13, 16] {
            assert_eq!(sync_status(code), StatusClass::Transient, "code {code}");
        }
        assert_eq!(search_status(2), StatusClass::Fatal);
        assert_eq!(search_status(10), StatusClass::Transient);
    }
}
