//! Server response fixtures.
//!
//! Each builder writes the document a server would send, using the same
//! serializer the client encodes requests with.

use bytes::Bytes;
use easync_wbxml::pages::{airsync, folder, gal, move_items, ping, search};
use easync_wbxml::{Serializer, Tag};

fn finish(s: Serializer) -> Bytes {
    s.done().expect("fixture documents are balanced")
}

/// Writes `fields` as data tags; an empty value becomes an empty tag.
pub fn write_fields(s: &mut Serializer, fields: &[(Tag, &str)]) {
    for (tag, value) in fields {
        if value.is_empty() {
            s.empty_tag(*tag);
        } else {
            s.data(*tag, value);
        }
    }
}

/// Builds a FolderSync response.
#[derive(Debug, Clone)]
pub struct FolderSyncFixture {
    status: i32,
    sync_key: Option<String>,
    changes: Vec<(Tag, String, Option<(String, String, u8)>)>,
}

impl FolderSyncFixture {
    /// A successful response carrying `sync_key`.
    pub fn new(sync_key: &str) -> Self {
        Self {
            status: 1,
            sync_key: Some(sync_key.to_string()),
            changes: Vec::new(),
        }
    }

    /// A response with only a status.
    pub fn status(status: i32) -> Self {
        Self {
            status,
            sync_key: None,
            changes: Vec::new(),
        }
    }

    /// Adds a folder.
    pub fn add(mut self, id: &str, parent: &str, name: &str, folder_type: u8) -> Self {
        self.changes.push((
            folder::ADD,
            id.to_string(),
            Some((parent.to_string(), name.to_string(), folder_type)),
        ));
        self
    }

    /// Renames or moves a folder.
    pub fn update(mut self, id: &str, parent: &str, name: &str, folder_type: u8) -> Self {
        self.changes.push((
            folder::UPDATE,
            id.to_string(),
            Some((parent.to_string(), name.to_string(), folder_type)),
        ));
        self
    }

    /// Deletes a folder.
    pub fn delete(mut self, id: &str) -> Self {
        self.changes.push((folder::DELETE, id.to_string(), None));
        self
    }

    /// Encodes the document.
    pub fn build(&self) -> Bytes {
        let mut s = Serializer::new();
        s.start(folder::FOLDER_SYNC)
            .data(folder::STATUS, &self.status.to_string());
        if let Some(key) = &self.sync_key {
            s.data(folder::SYNC_KEY, key);
        }
        if !self.changes.is_empty() {
            s.start(folder::CHANGES)
                .data(folder::COUNT, &self.changes.len().to_string());
            for (command, id, details) in &self.changes {
                s.start(*command).data(folder::SERVER_ID, id);
                if let Some((parent, name, folder_type)) = details {
                    s.data(folder::PARENT_ID, parent)
                        .data(folder::DISPLAY_NAME, name)
                        .data(folder::TYPE, &folder_type.to_string());
                }
                s.end();
            }
            s.end();
        }
        s.end();
        finish(s)
    }
}

#[derive(Debug, Clone)]
enum SyncCommand {
    Record {
        command: Tag,
        server_id: String,
        fields: Vec<(Tag, String)>,
    },
    Delete(String),
}

#[derive(Debug, Clone)]
enum SyncAck {
    Add {
        client_id: String,
        server_id: Option<String>,
        status: i32,
    },
    Change {
        server_id: String,
        status: i32,
    },
}

/// Builds a Sync response for one collection.
#[derive(Debug, Clone)]
pub struct SyncFixture {
    collection_id: String,
    sync_key: String,
    status: i32,
    more_available: bool,
    commands: Vec<SyncCommand>,
    acks: Vec<SyncAck>,
}

impl SyncFixture {
    /// A successful response carrying `sync_key`.
    pub fn new(collection_id: &str, sync_key: &str) -> Self {
        Self {
            collection_id: collection_id.to_string(),
            sync_key: sync_key.to_string(),
            status: 1,
            more_available: false,
            commands: Vec::new(),
            acks: Vec::new(),
        }
    }

    /// Sets the collection status.
    pub fn status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }

    /// Marks that the server holds more changes.
    pub fn more_available(mut self) -> Self {
        self.more_available = true;
        self
    }

    /// Adds a server record.
    pub fn add(self, server_id: &str, fields: &[(Tag, &str)]) -> Self {
        self.record(airsync::ADD, server_id, fields)
    }

    /// Changes a server record.
    pub fn change(self, server_id: &str, fields: &[(Tag, &str)]) -> Self {
        self.record(airsync::CHANGE, server_id, fields)
    }

    fn record(mut self, command: Tag, server_id: &str, fields: &[(Tag, &str)]) -> Self {
        self.commands.push(SyncCommand::Record {
            command,
            server_id: server_id.to_string(),
            fields: fields.iter().map(|(t, v)| (*t, v.to_string())).collect(),
        });
        self
    }

    /// Deletes a server record.
    pub fn delete(mut self, server_id: &str) -> Self {
        self.commands.push(SyncCommand::Delete(server_id.to_string()));
        self
    }

    /// Acknowledges a client add.
    pub fn add_response(mut self, client_id: &str, server_id: Option<&str>, status: i32) -> Self {
        self.acks.push(SyncAck::Add {
            client_id: client_id.to_string(),
            server_id: server_id.map(str::to_string),
            status,
        });
        self
    }

    /// Reports the outcome of a client change.
    pub fn change_response(mut self, server_id: &str, status: i32) -> Self {
        self.acks.push(SyncAck::Change {
            server_id: server_id.to_string(),
            status,
        });
        self
    }

    /// Encodes the document.
    pub fn build(&self) -> Bytes {
        let mut s = Serializer::new();
        s.start(airsync::SYNC)
            .start(airsync::COLLECTIONS)
            .start(airsync::COLLECTION)
            .data(airsync::SYNC_KEY, &self.sync_key)
            .data(airsync::COLLECTION_ID, &self.collection_id)
            .data(airsync::STATUS, &self.status.to_string());
        if self.more_available {
            s.empty_tag(airsync::MORE_AVAILABLE);
        }
        if !self.commands.is_empty() {
            s.start(airsync::COMMANDS);
            for command in &self.commands {
                match command {
                    SyncCommand::Record {
                        command,
                        server_id,
                        fields,
                    } => {
                        let fields: Vec<(Tag, &str)> =
                            fields.iter().map(|(t, v)| (*t, v.as_str())).collect();
                        s.start(*command)
                            .data(airsync::SERVER_ID, server_id)
                            .start(airsync::APPLICATION_DATA);
                        write_fields(&mut s, &fields);
                        s.end().end();
                    }
                    SyncCommand::Delete(server_id) => {
                        s.start(airsync::DELETE)
                            .data(airsync::SERVER_ID, server_id)
                            .end();
                    }
                }
            }
            s.end();
        }
        if !self.acks.is_empty() {
            s.start(airsync::RESPONSES);
            for ack in &self.acks {
                match ack {
                    SyncAck::Add {
                        client_id,
                        server_id,
                        status,
                    } => {
                        s.start(airsync::ADD).data(airsync::CLIENT_ID, client_id);
                        if let Some(server_id) = server_id {
                            s.data(airsync::SERVER_ID, server_id);
                        }
                        s.data(airsync::STATUS, &status.to_string()).end();
                    }
                    SyncAck::Change { server_id, status } => {
                        s.start(airsync::CHANGE)
                            .data(airsync::SERVER_ID, server_id)
                            .data(airsync::STATUS, &status.to_string())
                            .end();
                    }
                }
            }
            s.end();
        }
        s.end().end().end();
        finish(s)
    }
}

/// A Sync response with only a top-level status.
pub fn sync_status_response(status: i32) -> Bytes {
    let mut s = Serializer::new();
    s.start(airsync::SYNC)
        .data(airsync::STATUS, &status.to_string())
        .end();
    finish(s)
}

/// A Ping response.
pub fn ping_response(status: i32, changed: &[&str], heartbeat: Option<u32>) -> Bytes {
    let mut s = Serializer::new();
    s.start(ping::PING).data(ping::STATUS, &status.to_string());
    if !changed.is_empty() {
        s.start(ping::FOLDERS);
        for id in changed {
            s.data(ping::FOLDER, id);
        }
        s.end();
    }
    if let Some(heartbeat) = heartbeat {
        s.data(ping::HEARTBEAT_INTERVAL, &heartbeat.to_string());
    }
    s.end();
    finish(s)
}

/// A MoveItems response: `(item id, status, new item id)` per item.
pub fn move_response(results: &[(&str, i32, Option<&str>)]) -> Bytes {
    let mut s = Serializer::new();
    s.start(move_items::MOVE_ITEMS);
    for (item, status, new_id) in results {
        s.start(move_items::RESPONSE)
            .data(move_items::SRC_MSG_ID, item)
            .data(move_items::STATUS, &status.to_string());
        if let Some(new_id) = new_id {
            s.data(move_items::DST_MSG_ID, new_id);
        }
        s.end();
    }
    s.end();
    finish(s)
}

/// A directory search response: `(display name, email address)` per entry.
pub fn search_response(status: i32, entries: &[(&str, &str)], total: u32) -> Bytes {
    let mut s = Serializer::new();
    s.start(search::SEARCH)
        .data(search::STATUS, "1")
        .start(search::RESPONSE)
        .start(search::STORE)
        .data(search::STATUS, &status.to_string());
    for (name, email) in entries {
        s.start(search::RESULT)
            .start(search::PROPERTIES)
            .data(gal::DISPLAY_NAME, name)
            .data(gal::EMAIL_ADDRESS, email)
            .end()
            .end();
    }
    if !entries.is_empty() {
        let last = entries.len() - 1;
        s.data(search::RANGE, &format!("0-{last}"));
    }
    s.data(search::TOTAL, &total.to_string());
    s.end().end().end();
    finish(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use easync_wbxml::pages::contacts;
    use easync_wbxml::tree;

    #[test]
    fn sync_fixture_nests_records() {
        let bytes = SyncFixture::new("4", "2")
            .add("4:1", &[(contacts::FIRST_NAME, "Ada"), (contacts::EMAIL2_ADDRESS, "")])
            .delete("4:9")
            .build();
        let root = tree(&bytes).unwrap().unwrap();
        assert_eq!(root.tag, "AirSync:Sync");
        let collection = &root.children[0].children[0];
        let commands = collection
            .children
            .iter()
            .find(|n| n.tag == "AirSync:Commands")
            .unwrap();
        assert_eq!(commands.children.len(), 2);
    }

    #[test]
    fn folder_fixture_counts_changes() {
        let bytes = FolderSyncFixture::new("k")
            .add("1", "0", "Inbox", 2)
            .delete("3")
            .build();
        let root = tree(&bytes).unwrap().unwrap();
        let changes = root
            .children
            .iter()
            .find(|n| n.tag == "FolderHierarchy:Changes")
            .unwrap();
        assert_eq!(changes.children[0].text.as_deref(), Some("2"));
    }
}
