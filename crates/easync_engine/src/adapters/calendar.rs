//! Calendar collection parser.

use super::{column, read_row, read_values, ApplyContext, CollectionAdapter, ColumnTable};
use crate::error::SyncResult;
use easync_protocol::{BodyPreference, CollectionClass, CollectionRequest, Next, Parser};
use easync_reconcile::{normalize_note, row_values, ListGroup, RecordImage};
use easync_store::{RowKind, RowValues};
use easync_wbxml::pages::{airsync, base, calendar};
use std::io::Read;

const EVENT: ColumnTable = &[
    (calendar::SUBJECT, "subject"),
    (calendar::LOCATION, "location"),
    (calendar::START_TIME, "start"),
    (calendar::END_TIME, "end"),
    (calendar::ALL_DAY_EVENT, "all_day"),
    (calendar::TIME_ZONE, "timezone"),
    (calendar::UID, "uid"),
    (calendar::ORGANIZER_NAME, "organizer_name"),
    (calendar::ORGANIZER_EMAIL, "organizer_email"),
    (calendar::BUSY_STATUS, "busy_status"),
    (calendar::SENSITIVITY, "sensitivity"),
    (calendar::REMINDER, "reminder"),
    (calendar::MEETING_STATUS, "meeting_status"),
    (calendar::DT_STAMP, "dtstamp"),
];

const RECURRENCE: ColumnTable = &[
    (calendar::RECURRENCE_TYPE, "type"),
    (calendar::RECURRENCE_INTERVAL, "interval"),
    (calendar::RECURRENCE_UNTIL, "until"),
    (calendar::RECURRENCE_OCCURRENCES, "occurrences"),
    (calendar::RECURRENCE_DAY_OF_WEEK, "day_of_week"),
    (calendar::RECURRENCE_DAY_OF_MONTH, "day_of_month"),
    (calendar::RECURRENCE_WEEK_OF_MONTH, "week_of_month"),
    (calendar::RECURRENCE_MONTH_OF_YEAR, "month_of_year"),
];

const ATTENDEE: ColumnTable = &[
    (calendar::ATTENDEE_EMAIL, "email"),
    (calendar::ATTENDEE_NAME, "name"),
    (calendar::ATTENDEE_STATUS, "status"),
    (calendar::ATTENDEE_TYPE, "type"),
];

const BODY: ColumnTable = &[(base::DATA, "text")];

const MANAGED: [RowKind; 5] = [
    RowKind::Event,
    RowKind::Note,
    RowKind::Recurrence,
    RowKind::Attendee,
    RowKind::Category,
];

/// Parser for calendar collections.
///
/// Events are stored as an `Event` row with the schedule and organizer, an
/// optional `Recurrence` row, one `Attendee` row per attendee keyed by
/// address, and categories. Recurrence exceptions are not stored.
#[derive(Debug, Clone, Default)]
pub struct CalendarAdapter {
    filter_type: Option<u8>,
}

impl CalendarAdapter {
    /// Creates a calendar parser without a time filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the sync window (protocol filter type code).
    pub fn with_filter_type(mut self, filter_type: u8) -> Self {
        self.filter_type = Some(filter_type);
        self
    }

    fn read_image<R: Read>(parser: &mut Parser<R>, server_id: &str) -> SyncResult<RecordImage> {
        let mut event = RowValues::new();
        let mut note = None;
        let mut recurrence = None;
        let mut attendees = ListGroup::unbounded(RowKind::Attendee, "email").case_insensitive();
        let mut categories = ListGroup::unbounded(RowKind::Category, "name");

        while let Next::Tag(tag) = parser.next_tag(airsync::APPLICATION_DATA)? {
            match tag {
                // older servers send the body inline
                calendar::BODY => note = parser.value_opt()?,
                base::BODY => {
                    let body = read_row(parser, base::BODY, BODY)?;
                    note = body.get("text").cloned();
                }
                calendar::RECURRENCE => {
                    recurrence = Some(read_row(parser, calendar::RECURRENCE, RECURRENCE)?);
                }
                calendar::ATTENDEES => {
                    while let Next::Tag(tag) = parser.next_tag(calendar::ATTENDEES)? {
                        if tag == calendar::ATTENDEE {
                            attendees.push(read_row(parser, calendar::ATTENDEE, ATTENDEE)?);
                        }
                    }
                }
                calendar::CATEGORIES => {
                    for category in read_values(parser, calendar::CATEGORIES, calendar::CATEGORY)? {
                        categories.push_value(category);
                    }
                }
                calendar::EXCEPTIONS => parser.skip_tag()?,
                tag => match column(EVENT, tag) {
                    Some(name) => {
                        if let Some(value) = parser.value_opt()? {
                            event.insert(name.to_string(), value);
                        }
                    }
                    None => parser.skip_tag()?,
                },
            }
        }

        let mut image = RecordImage::new(MANAGED).with_server_id(server_id);
        image.singleton(RowKind::Event, event);
        if let Some(text) = note.as_deref().and_then(normalize_note) {
            image.singleton(RowKind::Note, row_values([("text", text)]));
        }
        if let Some(recurrence) = recurrence {
            image.singleton(RowKind::Recurrence, recurrence);
        }
        image.list(attendees).list(categories);
        Ok(image)
    }
}

impl CollectionAdapter for CalendarAdapter {
    fn class(&self) -> CollectionClass {
        CollectionClass::Calendar
    }

    fn add<R: Read>(
        &mut self,
        parser: &mut Parser<R>,
        server_id: &str,
        cx: &mut ApplyContext<'_>,
    ) -> SyncResult<()> {
        let image = Self::read_image(parser, server_id)?;
        let applied = cx.apply_image(server_id, &image)?;
        tracing::debug!(server_id, applied, "event applied");
        Ok(())
    }

    fn options(&self, request: &mut CollectionRequest) {
        request.filter_type = self.filter_type;
        request.body_preference = Some(BodyPreference {
            body_type: 1,
            truncation_size: None,
        });
    }
}
