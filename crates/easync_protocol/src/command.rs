//! Protocol commands.

use easync_wbxml::pages::{airsync, folder, move_items, ping, search};
use easync_wbxml::Tag;
use std::fmt;

/// A protocol command, identified by its request name and document root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Folder hierarchy sync.
    FolderSync,
    /// Item sync for one or more collections.
    Sync,
    /// Long-poll for changes.
    Ping,
    /// Move items between folders.
    MoveItems,
    /// Directory (global address list) search.
    Search,
}

impl Command {
    /// Every command.
    pub const ALL: [Command; 5] = [
        Command::FolderSync,
        Command::Sync,
        Command::Ping,
        Command::MoveItems,
        Command::Search,
    ];

    /// The command name sent in the request URL.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::FolderSync => "FolderSync",
            Command::Sync => "Sync",
            Command::Ping => "Ping",
            Command::MoveItems => "MoveItems",
            Command::Search => "Search",
        }
    }

    /// The root tag of request and response documents.
    pub fn root(self) -> Tag {
        match self {
            Command::FolderSync => folder::FOLDER_SYNC,
            Command::Sync => airsync::SYNC,
            Command::Ping => ping::PING,
            Command::MoveItems => move_items::MOVE_ITEMS,
            Command::Search => search::SEARCH,
        }
    }

    /// Parses a command name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for command in Command::ALL {
            assert_eq!(Command::from_name(command.as_str()), Some(command));
        }
        assert_eq!(Command::from_name("ping"), Some(Command::Ping));
        assert_eq!(Command::from_name("Provision"), None);
    }
}
