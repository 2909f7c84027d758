//! Item sync requests.

use crate::field_set::{write_field_set, Field, FieldSet};
use crate::folder::CollectionClass;
use bytes::Bytes;
use easync_wbxml::pages::{airsync, base};
use easync_wbxml::{Serializer, Tag, WbxmlResult};

/// Sync key meaning "start from scratch".
pub const RESET_KEY: &str = "0";

/// One element of an upsynced record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// A tag with a text value.
    Data(Tag, String),
    /// An empty tag: the server clears the field.
    Empty(Tag),
    /// A container with nested elements.
    Container(Tag, Vec<Element>),
}

impl Element {
    fn write(&self, s: &mut Serializer) {
        match self {
            Element::Data(tag, value) => {
                s.data(*tag, value);
            }
            Element::Empty(tag) => {
                s.empty_tag(*tag);
            }
            Element::Container(tag, children) => {
                s.start(*tag);
                for child in children {
                    child.write(s);
                }
                s.end();
            }
        }
    }
}

/// The `ApplicationData` of an upsynced record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationData {
    elements: Vec<Element>,
}

impl ApplicationData {
    /// Creates empty application data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds application data from a field set.
    pub fn from_field_set<F: Field>(set: &FieldSet<F>) -> Self {
        let mut data = Self::new();
        let mut containers: Vec<(Tag, Vec<Element>)> = Vec::new();
        for (field, values) in set.iter() {
            let elements = values
                .iter()
                .map(|v| Element::Data(field.tag(), v.clone()));
            match field.container() {
                None => data.elements.extend(elements),
                Some(c) => match containers.iter_mut().find(|(t, _)| *t == c) {
                    Some((_, children)) => children.extend(elements),
                    None => containers.push((c, elements.collect())),
                },
            }
        }
        data.elements.extend(
            containers
                .into_iter()
                .map(|(tag, children)| Element::Container(tag, children)),
        );
        data
    }

    /// Appends a text element.
    pub fn data(&mut self, tag: Tag, value: impl Into<String>) -> &mut Self {
        self.elements.push(Element::Data(tag, value.into()));
        self
    }

    /// Appends an empty (clearing) element.
    pub fn empty(&mut self, tag: Tag) -> &mut Self {
        self.elements.push(Element::Empty(tag));
        self
    }

    /// Appends a container.
    pub fn container(&mut self, tag: Tag, children: Vec<Element>) -> &mut Self {
        self.elements.push(Element::Container(tag, children));
        self
    }

    /// Returns the elements in order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Returns true if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn write(&self, s: &mut Serializer) {
        s.start(airsync::APPLICATION_DATA);
        for element in &self.elements {
            element.write(s);
        }
        s.end();
    }
}

/// A local change sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsyncCommand {
    /// A record created locally; `client_id` pairs it with the response.
    Add {
        /// Client-chosen id.
        client_id: String,
        /// Record contents.
        data: ApplicationData,
    },
    /// A record changed locally.
    Change {
        /// Server id.
        server_id: String,
        /// Full record contents.
        data: ApplicationData,
    },
    /// A record deleted locally.
    Delete {
        /// Server id.
        server_id: String,
    },
}

impl UpsyncCommand {
    fn write(&self, s: &mut Serializer) {
        match self {
            UpsyncCommand::Add { client_id, data } => {
                s.start(airsync::ADD).data(airsync::CLIENT_ID, client_id);
                data.write(s);
                s.end();
            }
            UpsyncCommand::Change { server_id, data } => {
                s.start(airsync::CHANGE).data(airsync::SERVER_ID, server_id);
                data.write(s);
                s.end();
            }
            UpsyncCommand::Delete { server_id } => {
                s.start(airsync::DELETE)
                    .data(airsync::SERVER_ID, server_id)
                    .end();
            }
        }
    }
}

/// Preferred body format for downloaded items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyPreference {
    /// Body type (1 plain text, 2 HTML, 4 MIME).
    pub body_type: u8,
    /// Truncate bodies beyond this many bytes.
    pub truncation_size: Option<u32>,
}

/// The part of a Sync request addressing one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRequest {
    /// Item class; only sent to servers that still require it.
    pub class: Option<CollectionClass>,
    /// Current sync key of the collection.
    pub sync_key: String,
    /// Collection (folder) server id.
    pub collection_id: String,
    /// Ask for server changes.
    pub get_changes: bool,
    /// Ask for deletes to be moved to trash.
    pub deletes_as_moves: bool,
    /// Maximum number of changes per response.
    pub window_size: Option<u32>,
    /// Time filter for mail and calendar.
    pub filter_type: Option<u8>,
    /// Preferred body format.
    pub body_preference: Option<BodyPreference>,
    /// Local changes to upload.
    pub commands: Vec<UpsyncCommand>,
}

impl CollectionRequest {
    /// Creates a request for changes since `sync_key`.
    pub fn new(collection_id: impl Into<String>, sync_key: impl Into<String>) -> Self {
        Self {
            class: None,
            sync_key: sync_key.into(),
            collection_id: collection_id.into(),
            get_changes: true,
            deletes_as_moves: false,
            window_size: None,
            filter_type: None,
            body_preference: None,
            commands: Vec::new(),
        }
    }

    /// Returns true if this is the initial exchange for the collection.
    pub fn is_initial(&self) -> bool {
        self.sync_key == RESET_KEY
    }

    fn write(&self, s: &mut Serializer) {
        s.start(airsync::COLLECTION);
        if let Some(class) = self.class {
            s.data(airsync::CLASS, class.as_str());
        }
        s.data(airsync::SYNC_KEY, &self.sync_key)
            .data(airsync::COLLECTION_ID, &self.collection_id);
        // the initial exchange only fetches a key
        if !self.is_initial() {
            if self.deletes_as_moves {
                s.data(airsync::DELETES_AS_MOVES, "1");
            }
            if self.get_changes {
                s.empty_tag(airsync::GET_CHANGES);
            }
        }
        if let Some(window) = self.window_size {
            s.data(airsync::WINDOW_SIZE, &window.to_string());
        }
        if self.filter_type.is_some() || self.body_preference.is_some() {
            s.start(airsync::OPTIONS);
            if let Some(filter) = self.filter_type {
                s.data(airsync::FILTER_TYPE, &filter.to_string());
            }
            if let Some(pref) = self.body_preference {
                s.start(base::BODY_PREFERENCE)
                    .data(base::TYPE, &pref.body_type.to_string());
                if let Some(size) = pref.truncation_size {
                    s.data(base::TRUNCATION_SIZE, &size.to_string());
                }
                s.end();
            }
            s.end();
        }
        if !self.is_initial() && !self.commands.is_empty() {
            s.start(airsync::COMMANDS);
            for command in &self.commands {
                command.write(s);
            }
            s.end();
        }
        s.end();
    }
}

/// Sync request over one or more collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncRequest {
    /// Collections to sync.
    pub collections: Vec<CollectionRequest>,
}

impl SyncRequest {
    /// Creates a request for a single collection.
    pub fn single(collection: CollectionRequest) -> Self {
        Self {
            collections: vec![collection],
        }
    }

    /// Encodes the request document.
    pub fn encode(&self) -> WbxmlResult<Bytes> {
        let mut s = Serializer::new();
        s.start(airsync::SYNC).start(airsync::COLLECTIONS);
        for collection in &self.collections {
            collection.write(&mut s);
        }
        s.end().end();
        s.done()
    }
}

/// Writes a field set as `ApplicationData` directly into a serializer.
pub fn write_application_data<F: Field>(s: &mut Serializer, set: &FieldSet<F>) {
    s.start(airsync::APPLICATION_DATA);
    write_field_set(s, set);
    s.end();
}
