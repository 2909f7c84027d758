//! Mail collection parser.

use super::{
    column, read_row, read_values, ApplyContext, CollectionAdapter, ColumnTable, Staged,
};
use crate::error::SyncResult;
use easync_protocol::{BodyPreference, CollectionClass, CollectionRequest, Next, Parser};
use easync_reconcile::{normalize_note, ListGroup, RecordImage};
use easync_store::{RowKind, RowValues};
use easync_wbxml::pages::{airsync, base, email};
use std::io::Read;

const MESSAGE: ColumnTable = &[
    (email::SUBJECT, "subject"),
    (email::FROM, "from"),
    (email::TO, "to"),
    (email::CC, "cc"),
    (email::REPLY_TO, "reply_to"),
    (email::DISPLAY_TO, "display_to"),
    (email::DATE_RECEIVED, "received"),
    (email::IMPORTANCE, "importance"),
    (email::READ, "read"),
    (email::MESSAGE_CLASS, "message_class"),
    (email::THREAD_TOPIC, "thread_topic"),
];

const FLAG: ColumnTable = &[
    (email::FLAG_STATUS, "flag_status"),
    (email::FLAG_TYPE, "flag_type"),
    (email::COMPLETE_TIME, "flag_completed"),
];

const BODY: ColumnTable = &[
    (base::TYPE, "type"),
    (base::DATA, "text"),
    (base::TRUNCATED, "truncated"),
    (base::ESTIMATED_DATA_SIZE, "size"),
];

const ATTACHMENT: ColumnTable = &[
    (base::FILE_REFERENCE, "file_reference"),
    (base::DISPLAY_NAME, "name"),
    (base::METHOD, "method"),
    (base::ESTIMATED_DATA_SIZE, "size"),
    (base::CONTENT_ID, "content_id"),
    (base::IS_INLINE, "inline"),
];

/// Row kinds owned by the mail parser.
const MANAGED: [RowKind; 4] = [
    RowKind::Message,
    RowKind::Note,
    RowKind::Attachment,
    RowKind::Category,
];

/// One parsed message.
#[derive(Debug, Default)]
struct Mail {
    message: RowValues,
    body: Option<RowValues>,
    attachments: Option<Vec<RowValues>>,
    categories: Option<Vec<String>>,
}

impl Mail {
    fn parse<R: Read>(parser: &mut Parser<R>) -> SyncResult<Self> {
        let mut mail = Mail::default();
        while let Next::Tag(tag) = parser.next_tag(airsync::APPLICATION_DATA)? {
            match tag {
                email::FLAG => {
                    // an empty flag clears it
                    let flag = read_row(parser, email::FLAG, FLAG)?;
                    for (_, name) in FLAG {
                        let value = flag.get(*name).cloned().unwrap_or_default();
                        mail.message.insert((*name).to_string(), value);
                    }
                }
                base::BODY => mail.body = Some(read_row(parser, base::BODY, BODY)?),
                base::ATTACHMENTS => {
                    let mut attachments = Vec::new();
                    while let Next::Tag(tag) = parser.next_tag(base::ATTACHMENTS)? {
                        if tag == base::ATTACHMENT {
                            attachments.push(read_row(parser, base::ATTACHMENT, ATTACHMENT)?);
                        } else {
                            parser.skip_tag()?;
                        }
                    }
                    mail.attachments = Some(attachments);
                }
                email::CATEGORIES => {
                    mail.categories =
                        Some(read_values(parser, email::CATEGORIES, email::CATEGORY)?);
                }
                tag => match column(MESSAGE, tag) {
                    Some(name) => {
                        if let Some(value) = parser.value_opt()? {
                            mail.message.insert(name.to_string(), value);
                        }
                    }
                    None => parser.skip_tag()?,
                },
            }
        }
        Ok(mail)
    }

    fn categories(&self, image: &mut RecordImage) {
        if let Some(categories) = &self.categories {
            let mut group = ListGroup::unbounded(RowKind::Category, "name");
            for category in categories {
                group.push_value(category.as_str());
            }
            image.list(group);
        }
    }

    fn image(self, server_id: &str) -> RecordImage {
        let mut image = RecordImage::new(MANAGED).with_server_id(server_id);
        image.singleton(RowKind::Message, self.message.clone());
        if let Some(mut body) = self.body.clone() {
            if let Some(text) = body.remove("text").and_then(|t| normalize_note(&t)) {
                body.insert("text".into(), text);
            }
            image.singleton(RowKind::Note, body);
        }
        let mut attachments = ListGroup::unbounded(RowKind::Attachment, "file_reference");
        for attachment in self.attachments.iter().flatten() {
            attachments.push(attachment.clone());
        }
        image.list(attachments);
        self.categories(&mut image);
        image
    }
}

/// Parser for mail collections.
#[derive(Debug, Clone, Default)]
pub struct EmailAdapter {
    truncation: Option<u32>,
    filter_type: Option<u8>,
}

impl EmailAdapter {
    /// Creates a mail parser asking for plain-text bodies truncated at
    /// `truncation` bytes.
    pub fn new(truncation: Option<u32>) -> Self {
        Self {
            truncation,
            filter_type: None,
        }
    }

    /// Restricts the sync window (protocol filter type code).
    pub fn with_filter_type(mut self, filter_type: u8) -> Self {
        self.filter_type = Some(filter_type);
        self
    }
}

impl CollectionAdapter for EmailAdapter {
    fn class(&self) -> CollectionClass {
        CollectionClass::Email
    }

    fn add<R: Read>(
        &mut self,
        parser: &mut Parser<R>,
        server_id: &str,
        cx: &mut ApplyContext<'_>,
    ) -> SyncResult<()> {
        let image = Mail::parse(parser)?.image(server_id);
        let applied = cx.apply_image(server_id, &image)?;
        tracing::debug!(server_id, applied, "message applied");
        Ok(())
    }

    /// Changes carry only read state, flag, and categories; they are merged
    /// into the stored message.
    fn change<R: Read>(
        &mut self,
        parser: &mut Parser<R>,
        server_id: &str,
        cx: &mut ApplyContext<'_>,
    ) -> SyncResult<()> {
        let mail = Mail::parse(parser)?;
        let mut message = match cx.staged(server_id) {
            Staged::Image(staged) => staged
                .singleton_values(&RowKind::Message)
                .cloned()
                .unwrap_or_default(),
            Staged::Deleted => {
                tracing::debug!(server_id, "change for deleted message skipped");
                cx.skip();
                return Ok(());
            }
            Staged::Untouched => match cx.existing(server_id)? {
                Some(existing) => existing
                    .row(&RowKind::Message)
                    .map(|r| r.values.clone())
                    .unwrap_or_default(),
                None => {
                    tracing::debug!(server_id, "change for unknown message skipped");
                    cx.skip();
                    return Ok(());
                }
            },
        };
        message.extend(mail.message.clone());

        let mut managed = vec![RowKind::Message];
        if mail.categories.is_some() {
            managed.push(RowKind::Category);
        }
        let mut image = RecordImage::new(managed);
        image.singleton(RowKind::Message, message);
        mail.categories(&mut image);
        let applied = cx.apply_image(server_id, &image)?;
        tracing::debug!(server_id, applied, "message state merged");
        Ok(())
    }

    fn options(&self, request: &mut CollectionRequest) {
        request.filter_type = self.filter_type;
        request.body_preference = Some(BodyPreference {
            body_type: 1,
            truncation_size: self.truncation,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easync_reconcile::row_values;
    use easync_store::{EntityStore, InMemoryStore, Scope};
    use easync_wbxml::Serializer;

    fn message(pairs: &[(&str, &str)]) -> RowValues {
        row_values(pairs.iter().copied())
    }

    fn application_data(build: impl FnOnce(&mut Serializer)) -> bytes::Bytes {
        let mut s = Serializer::new();
        s.start(airsync::APPLICATION_DATA);
        build(&mut s);
        s.end();
        s.done().unwrap()
    }

    fn record(
        adapter: &mut EmailAdapter,
        cx: &mut ApplyContext<'_>,
        change: bool,
        build: impl FnOnce(&mut Serializer),
    ) {
        let bytes = application_data(build);
        let mut parser = Parser::new(&bytes[..]);
        parser.expect_root(airsync::APPLICATION_DATA).unwrap();
        if change {
            adapter.change(&mut parser, "5:1", cx).unwrap();
        } else {
            adapter.add(&mut parser, "5:1", cx).unwrap();
        }
    }

    fn apply(
        store: &InMemoryStore,
        scope: &Scope,
        change: bool,
        build: impl FnOnce(&mut Serializer),
    ) -> super::super::ApplyCounts {
        let mut cx = ApplyContext::new(store, scope);
        let mut adapter = EmailAdapter::new(Some(1024));
        record(&mut adapter, &mut cx, change, build);
        let counts = cx.counts();
        store.apply_batch(scope, &cx.into_batch()).unwrap();
        counts
    }

    fn add_message(store: &InMemoryStore, scope: &Scope) {
        apply(store, scope, false, |s| {
            s.data(email::SUBJECT, "Notes on the engine")
                .data(email::FROM, "ada@x.com")
                .data(email::READ, "0")
                .start(base::BODY)
                .data(base::TYPE, "1")
                .data(base::DATA, "Dear Charles,\r\nsee attached")
                .end()
                .start(base::ATTACHMENTS)
                .start(base::ATTACHMENT)
                .data(base::DISPLAY_NAME, "diagram.png")
                .data(base::FILE_REFERENCE, "5:1:0")
                .data(base::ESTIMATED_DATA_SIZE, "2048")
                .end()
                .end()
                .start(email::CATEGORIES)
                .data(email::CATEGORY, "Work")
                .end();
        });
    }

    #[test]
    fn add_stores_message_body_and_attachments() {
        let store = InMemoryStore::new();
        let scope = Scope::collection(1, "5");
        add_message(&store, &scope);

        let snapshot = store.find_by_server_id(&scope, "5:1").unwrap().unwrap();
        let msg = snapshot.row(&RowKind::Message).unwrap();
        assert_eq!(
            msg.values,
            message(&[("from", "ada@x.com"), ("read", "0"), ("subject", "Notes on the engine")])
        );
        let note = snapshot.row(&RowKind::Note).unwrap();
        assert_eq!(note.value("text"), Some("Dear Charles,\nsee attached"));
        let attachment = snapshot.row(&RowKind::Attachment).unwrap();
        assert_eq!(attachment.value("name"), Some("diagram.png"));
        assert_eq!(snapshot.rows_of(&RowKind::Category).count(), 1);
    }

    #[test]
    fn change_merges_read_and_flag_state() {
        let store = InMemoryStore::new();
        let scope = Scope::collection(1, "5");
        add_message(&store, &scope);

        let counts = apply(&store, &scope, true, |s| {
            s.data(email::READ, "1")
                .start(email::FLAG)
                .data(email::FLAG_STATUS, "2")
                .end();
        });
        assert_eq!(counts.changed, 1);

        let snapshot = store.find_by_server_id(&scope, "5:1").unwrap().unwrap();
        let msg = snapshot.row(&RowKind::Message).unwrap();
        assert_eq!(msg.value("read"), Some("1"));
        assert_eq!(msg.value("flag_status"), Some("2"));
        assert_eq!(msg.value("subject"), Some("Notes on the engine"));
        // untouched by a change without body or categories
        assert!(snapshot.row(&RowKind::Note).is_some());
        assert_eq!(snapshot.rows_of(&RowKind::Attachment).count(), 1);
        assert_eq!(snapshot.rows_of(&RowKind::Category).count(), 1);
    }

    #[test]
    fn change_with_empty_categories_clears_them() {
        let store = InMemoryStore::new();
        let scope = Scope::collection(1, "5");
        add_message(&store, &scope);
        apply(&store, &scope, true, |s| {
            s.empty_tag(email::CATEGORIES);
        });
        let snapshot = store.find_by_server_id(&scope, "5:1").unwrap().unwrap();
        assert_eq!(snapshot.rows_of(&RowKind::Category).count(), 0);
    }

    #[test]
    fn change_after_add_in_one_response_merges_into_the_add() {
        let store = InMemoryStore::new();
        let scope = Scope::collection(1, "5");
        let mut cx = ApplyContext::new(&store, &scope);
        let mut adapter = EmailAdapter::new(None);
        record(&mut adapter, &mut cx, false, |s| {
            s.data(email::SUBJECT, "Notes on the engine")
                .data(email::READ, "0")
                .start(base::BODY)
                .data(base::TYPE, "1")
                .data(base::DATA, "hello")
                .end();
        });
        record(&mut adapter, &mut cx, true, |s| {
            s.data(email::READ, "1");
        });
        store.apply_batch(&scope, &cx.into_batch()).unwrap();

        let entities = store.entities(&scope);
        assert_eq!(entities.len(), 1);
        let msg = entities[0].row(&RowKind::Message).unwrap();
        assert_eq!(msg.value("read"), Some("1"));
        assert_eq!(msg.value("subject"), Some("Notes on the engine"));
        assert!(entities[0].row(&RowKind::Note).is_some());
    }

    #[test]
    fn change_for_unknown_message_is_skipped() {
        let store = InMemoryStore::new();
        let scope = Scope::collection(1, "5");
        let counts = apply(&store, &scope, true, |s| {
            s.data(email::READ, "1");
        });
        assert_eq!(counts.skipped, 1);
        assert!(store.entities(&scope).is_empty());
    }

    #[test]
    fn options_ask_for_truncated_plain_text() {
        let mut request = CollectionRequest::new("5", "1");
        EmailAdapter::new(Some(1024))
            .with_filter_type(3)
            .options(&mut request);
        assert_eq!(request.filter_type, Some(3));
        assert_eq!(
            request.body_preference,
            Some(BodyPreference {
                body_type: 1,
                truncation_size: Some(1024),
            })
        );
    }
}
