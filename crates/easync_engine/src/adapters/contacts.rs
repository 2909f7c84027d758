//! Contacts collection parser.

use super::{ApplyContext, CollectionAdapter};
use crate::error::SyncResult;
use easync_protocol::{read_field_set, ApplicationData, CollectionClass, Field, FieldSet, Parser};
use easync_reconcile::{normalize_note, row_values, ListGroup, RecordImage};
use easync_store::{EntitySnapshot, RowKind, RowValues, SubRow};
use easync_wbxml::pages::{airsync, base, contacts, contacts2};
use easync_wbxml::Tag;
use std::io::Read;

/// Every field of a contact record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
pub enum ContactField {
    FirstName,
    LastName,
    MiddleName,
    Suffix,
    Title,
    YomiFirstName,
    YomiLastName,
    CompanyName,
    Department,
    JobTitle,
    OfficeLocation,
    YomiCompanyName,
    Anniversary,
    FileAs,
    CustomerId,
    GovernmentId,
    AccountName,
    NickName,
    WebPage,
    Birthday,
    Picture,
    Email1Address,
    Email2Address,
    Email3Address,
    ImAddress,
    ImAddress2,
    ImAddress3,
    HomePhone,
    Home2Phone,
    BusinessPhone,
    Business2Phone,
    MobilePhone,
    CarPhone,
    Pager,
    RadioPhone,
    HomeFax,
    BusinessFax,
    CompanyMainPhone,
    AssistantPhone,
    Mms,
    HomeStreet,
    HomeCity,
    HomeState,
    HomePostalCode,
    HomeCountry,
    BusinessStreet,
    BusinessCity,
    BusinessState,
    BusinessPostalCode,
    BusinessCountry,
    OtherStreet,
    OtherCity,
    OtherState,
    OtherPostalCode,
    OtherCountry,
    AssistantName,
    ManagerName,
    Spouse,
    Child,
    Category,
    /// Plain-text body of older protocol versions.
    LegacyBody,
    BodyType,
    BodyData,
}

use ContactField as F;

impl Field for ContactField {
    const ALL: &'static [Self] = &[
        F::FirstName,
        F::LastName,
        F::MiddleName,
        F::Suffix,
        F::Title,
        F::YomiFirstName,
        F::YomiLastName,
        F::CompanyName,
        F::Department,
        F::JobTitle,
        F::OfficeLocation,
        F::YomiCompanyName,
        F::Anniversary,
        F::FileAs,
        F::CustomerId,
        F::GovernmentId,
        F::AccountName,
        F::NickName,
        F::WebPage,
        F::Birthday,
        F::Picture,
        F::Email1Address,
        F::Email2Address,
        F::Email3Address,
        F::ImAddress,
        F::ImAddress2,
        F::ImAddress3,
        F::HomePhone,
        F::Home2Phone,
        F::BusinessPhone,
        F::Business2Phone,
        F::MobilePhone,
        F::CarPhone,
        F::Pager,
        F::RadioPhone,
        F::HomeFax,
        F::BusinessFax,
        F::CompanyMainPhone,
        F::AssistantPhone,
        F::Mms,
        F::HomeStreet,
        F::HomeCity,
        F::HomeState,
        F::HomePostalCode,
        F::HomeCountry,
        F::BusinessStreet,
        F::BusinessCity,
        F::BusinessState,
        F::BusinessPostalCode,
        F::BusinessCountry,
        F::OtherStreet,
        F::OtherCity,
        F::OtherState,
        F::OtherPostalCode,
        F::OtherCountry,
        F::AssistantName,
        F::ManagerName,
        F::Spouse,
        F::Child,
        F::Category,
        F::LegacyBody,
        F::BodyType,
        F::BodyData,
    ];

    fn tag(self) -> Tag {
        match self {
            F::FirstName => contacts::FIRST_NAME,
            F::LastName => contacts::LAST_NAME,
            F::MiddleName => contacts::MIDDLE_NAME,
            F::Suffix => contacts::SUFFIX,
            F::Title => contacts::TITLE,
            F::YomiFirstName => contacts::YOMI_FIRST_NAME,
            F::YomiLastName => contacts::YOMI_LAST_NAME,
            F::CompanyName => contacts::COMPANY_NAME,
            F::Department => contacts::DEPARTMENT,
            F::JobTitle => contacts::JOB_TITLE,
            F::OfficeLocation => contacts::OFFICE_LOCATION,
            F::YomiCompanyName => contacts::YOMI_COMPANY_NAME,
            F::Anniversary => contacts::ANNIVERSARY,
            F::FileAs => contacts::FILE_AS,
            F::CustomerId => contacts2::CUSTOMER_ID,
            F::GovernmentId => contacts2::GOVERNMENT_ID,
            F::AccountName => contacts2::ACCOUNT_NAME,
            F::NickName => contacts2::NICK_NAME,
            F::WebPage => contacts::WEB_PAGE,
            F::Birthday => contacts::BIRTHDAY,
            F::Picture => contacts::PICTURE,
            F::Email1Address => contacts::EMAIL1_ADDRESS,
            F::Email2Address => contacts::EMAIL2_ADDRESS,
            F::Email3Address => contacts::EMAIL3_ADDRESS,
            F::ImAddress => contacts2::IM_ADDRESS,
            F::ImAddress2 => contacts2::IM_ADDRESS2,
            F::ImAddress3 => contacts2::IM_ADDRESS3,
            F::HomePhone => contacts::HOME_PHONE_NUMBER,
            F::Home2Phone => contacts::HOME2_PHONE_NUMBER,
            F::BusinessPhone => contacts::BUSINESS_PHONE_NUMBER,
            F::Business2Phone => contacts::BUSINESS2_PHONE_NUMBER,
            F::MobilePhone => contacts::MOBILE_PHONE_NUMBER,
            F::CarPhone => contacts::CAR_PHONE_NUMBER,
            F::Pager => contacts::PAGER_NUMBER,
            F::RadioPhone => contacts::RADIO_PHONE_NUMBER,
            F::HomeFax => contacts::HOME_FAX_NUMBER,
            F::BusinessFax => contacts::BUSINESS_FAX_NUMBER,
            F::CompanyMainPhone => contacts2::COMPANY_MAIN_PHONE,
            F::AssistantPhone => contacts::ASSISTANT_PHONE_NUMBER,
            F::Mms => contacts2::MMS,
            F::HomeStreet => contacts::HOME_STREET,
            F::HomeCity => contacts::HOME_CITY,
            F::HomeState => contacts::HOME_STATE,
            F::HomePostalCode => contacts::HOME_POSTAL_CODE,
            F::HomeCountry => contacts::HOME_COUNTRY,
            F::BusinessStreet => contacts::BUSINESS_STREET,
            F::BusinessCity => contacts::BUSINESS_CITY,
            F::BusinessState => contacts::BUSINESS_STATE,
            F::BusinessPostalCode => contacts::BUSINESS_POSTAL_CODE,
            F::BusinessCountry => contacts::BUSINESS_COUNTRY,
            F::OtherStreet => contacts::OTHER_STREET,
            F::OtherCity => contacts::OTHER_CITY,
            F::OtherState => contacts::OTHER_STATE,
            F::OtherPostalCode => contacts::OTHER_POSTAL_CODE,
            F::OtherCountry => contacts::OTHER_COUNTRY,
            F::AssistantName => contacts::ASSISTANT_NAME,
            F::ManagerName => contacts2::MANAGER_NAME,
            F::Spouse => contacts::SPOUSE,
            F::Child => contacts::CHILD,
            F::Category => contacts::CATEGORY,
            F::LegacyBody => contacts::BODY,
            F::BodyType => base::TYPE,
            F::BodyData => base::DATA,
        }
    }

    fn container(self) -> Option<Tag> {
        match self {
            F::Child => Some(contacts::CHILDREN),
            F::Category => Some(contacts::CATEGORIES),
            F::BodyType | F::BodyData => Some(base::BODY),
            _ => None,
        }
    }
}

type Columns = &'static [(ContactField, &'static str)];

const NAME: Columns = &[
    (F::FirstName, "first"),
    (F::LastName, "last"),
    (F::MiddleName, "middle"),
    (F::Suffix, "suffix"),
    (F::Title, "prefix"),
    (F::YomiFirstName, "phonetic_first"),
    (F::YomiLastName, "phonetic_last"),
];
const ORGANIZATION: Columns = &[
    (F::CompanyName, "company"),
    (F::Department, "department"),
    (F::JobTitle, "title"),
    (F::OfficeLocation, "office"),
    (F::YomiCompanyName, "phonetic_company"),
];
const PERSONAL: Columns = &[(F::Anniversary, "anniversary"), (F::FileAs, "file_as")];
const BUSINESS: Columns = &[
    (F::CustomerId, "customer_id"),
    (F::GovernmentId, "government_id"),
    (F::AccountName, "account_name"),
];

fn singletons() -> [(RowKind, Columns); 8] {
    [
        (RowKind::Name, NAME),
        (RowKind::Organization, ORGANIZATION),
        (RowKind::Personal, PERSONAL),
        (RowKind::Business, BUSINESS),
        (RowKind::Nickname, &[(F::NickName, "value")]),
        (RowKind::Webpage, &[(F::WebPage, "value")]),
        (RowKind::Birthday, &[(F::Birthday, "value")]),
        (RowKind::Photo, &[(F::Picture, "data")]),
    ]
}

/// Phone subtypes.
pub mod phone {
    /// Home numbers (two slots).
    pub const HOME: i32 = 1;
    /// Mobile.
    pub const MOBILE: i32 = 2;
    /// Work numbers (two slots).
    pub const WORK: i32 = 3;
    /// Work fax.
    pub const FAX_WORK: i32 = 4;
    /// Home fax.
    pub const FAX_HOME: i32 = 5;
    /// Pager.
    pub const PAGER: i32 = 6;
    /// Car.
    pub const CAR: i32 = 9;
    /// Company main line.
    pub const COMPANY_MAIN: i32 = 10;
    /// Radio.
    pub const RADIO: i32 = 14;
    /// Assistant.
    pub const ASSISTANT: i32 = 19;
    /// MMS.
    pub const MMS: i32 = 20;
}

/// Postal address subtypes.
pub mod postal {
    /// Home address.
    pub const HOME: i32 = 1;
    /// Work address.
    pub const WORK: i32 = 2;
    /// Other address.
    pub const OTHER: i32 = 3;
}

/// Relation subtypes.
pub mod relation {
    /// Assistant.
    pub const ASSISTANT: i32 = 1;
    /// Manager.
    pub const MANAGER: i32 = 7;
    /// Spouse or partner.
    pub const SPOUSE: i32 = 14;
}

fn typed() -> [(RowKind, i32, Columns); 15] {
    [
        (RowKind::Phone, phone::MOBILE, &[(F::MobilePhone, "number")]),
        (RowKind::Phone, phone::CAR, &[(F::CarPhone, "number")]),
        (RowKind::Phone, phone::PAGER, &[(F::Pager, "number")]),
        (RowKind::Phone, phone::RADIO, &[(F::RadioPhone, "number")]),
        (RowKind::Phone, phone::FAX_WORK, &[(F::BusinessFax, "number")]),
        (RowKind::Phone, phone::FAX_HOME, &[(F::HomeFax, "number")]),
        (RowKind::Phone, phone::COMPANY_MAIN, &[(F::CompanyMainPhone, "number")]),
        (RowKind::Phone, phone::ASSISTANT, &[(F::AssistantPhone, "number")]),
        (RowKind::Phone, phone::MMS, &[(F::Mms, "number")]),
        (
            RowKind::Postal,
            postal::HOME,
            &[
                (F::HomeStreet, "street"),
                (F::HomeCity, "city"),
                (F::HomeState, "state"),
                (F::HomePostalCode, "postcode"),
                (F::HomeCountry, "country"),
            ],
        ),
        (
            RowKind::Postal,
            postal::WORK,
            &[
                (F::BusinessStreet, "street"),
                (F::BusinessCity, "city"),
                (F::BusinessState, "state"),
                (F::BusinessPostalCode, "postcode"),
                (F::BusinessCountry, "country"),
            ],
        ),
        (
            RowKind::Postal,
            postal::OTHER,
            &[
                (F::OtherStreet, "street"),
                (F::OtherCity, "city"),
                (F::OtherState, "state"),
                (F::OtherPostalCode, "postcode"),
                (F::OtherCountry, "country"),
            ],
        ),
        (RowKind::Relation, relation::ASSISTANT, &[(F::AssistantName, "name")]),
        (RowKind::Relation, relation::MANAGER, &[(F::ManagerName, "name")]),
        (RowKind::Relation, relation::SPOUSE, &[(F::Spouse, "name")]),
    ]
}

/// A list carried by a fixed run of numbered fields.
struct SlotList {
    kind: RowKind,
    subtype: Option<i32>,
    key: &'static str,
    fields: &'static [ContactField],
    case_insensitive: bool,
    /// Unused slots are sent as empty tags so the server clears them.
    clear_unused: bool,
}

fn slot_lists() -> [SlotList; 4] {
    [
        SlotList {
            kind: RowKind::Email,
            subtype: None,
            key: "address",
            fields: &[F::Email1Address, F::Email2Address, F::Email3Address],
            case_insensitive: true,
            clear_unused: true,
        },
        SlotList {
            kind: RowKind::Im,
            subtype: None,
            key: "handle",
            fields: &[F::ImAddress, F::ImAddress2, F::ImAddress3],
            case_insensitive: true,
            clear_unused: true,
        },
        SlotList {
            kind: RowKind::Phone,
            subtype: Some(phone::HOME),
            key: "number",
            fields: &[F::HomePhone, F::Home2Phone],
            case_insensitive: false,
            clear_unused: false,
        },
        SlotList {
            kind: RowKind::Phone,
            subtype: Some(phone::WORK),
            key: "number",
            fields: &[F::BusinessPhone, F::Business2Phone],
            case_insensitive: false,
            clear_unused: false,
        },
    ]
}

/// Row kinds owned by the contacts parser.
pub const MANAGED: [RowKind; 16] = [
    RowKind::Name,
    RowKind::Organization,
    RowKind::Personal,
    RowKind::Business,
    RowKind::Note,
    RowKind::Nickname,
    RowKind::Webpage,
    RowKind::Birthday,
    RowKind::Photo,
    RowKind::Phone,
    RowKind::Postal,
    RowKind::Relation,
    RowKind::Email,
    RowKind::Im,
    RowKind::Children,
    RowKind::Category,
];

fn columns(set: &FieldSet<ContactField>, cols: Columns) -> RowValues {
    row_values(
        cols.iter()
            .filter_map(|(field, column)| set.get(*field).map(|v| (*column, v))),
    )
}

/// Builds the record image of a contact.
///
/// Returns `None` for a contact without first, last, or company name.
pub fn contact_image(set: &FieldSet<ContactField>, server_id: &str) -> Option<RecordImage> {
    if ![F::FirstName, F::LastName, F::CompanyName]
        .iter()
        .any(|f| set.get(*f).is_some_and(|v| !v.trim().is_empty()))
    {
        return None;
    }
    let mut image = RecordImage::new(MANAGED).with_server_id(server_id);
    for (kind, cols) in singletons() {
        image.singleton(kind, columns(set, cols));
    }
    for (kind, subtype, cols) in typed() {
        image.typed(kind, subtype, columns(set, cols));
    }
    for list in slot_lists() {
        let mut group = ListGroup::bounded(list.kind, list.fields.len(), list.key);
        if let Some(subtype) = list.subtype {
            group = group.with_subtype(subtype);
        }
        if list.case_insensitive {
            group = group.case_insensitive();
        }
        for field in list.fields {
            if let Some(value) = set.get(*field) {
                group.push_value(value);
            }
        }
        image.list(group);
    }
    for (kind, field) in [(RowKind::Children, F::Child), (RowKind::Category, F::Category)] {
        let mut group = ListGroup::unbounded(kind, "name");
        for value in set.all(field) {
            group.push_value(value.as_str());
        }
        image.list(group);
    }
    let note = set
        .get(F::BodyData)
        .or_else(|| set.get(F::LegacyBody))
        .and_then(normalize_note);
    if let Some(note) = note {
        image.singleton(RowKind::Note, row_values([("text", note)]));
    }
    Some(image)
}

fn ordered<'a>(
    snapshot: &'a EntitySnapshot,
    kind: &'a RowKind,
    subtype: Option<i32>,
) -> Vec<&'a SubRow> {
    let mut rows: Vec<&SubRow> = snapshot
        .rows_of(kind)
        .filter(|r| r.subtype == subtype)
        .collect();
    rows.sort_by_key(|r| (r.slot, r.id));
    rows
}

/// Builds the upsync payload of a stored contact.
pub fn contact_data(snapshot: &EntitySnapshot) -> ApplicationData {
    let mut set = FieldSet::new();
    let mut fill = |row: Option<&SubRow>, cols: Columns| {
        if let Some(row) = row {
            for (field, column) in cols {
                if let Some(value) = row.value(column) {
                    set.insert(*field, value);
                }
            }
        }
    };
    for (kind, cols) in singletons() {
        fill(snapshot.row(&kind), cols);
    }
    for (kind, subtype, cols) in typed() {
        fill(snapshot.typed_row(&kind, subtype), cols);
    }

    let mut cleared = Vec::new();
    for list in slot_lists() {
        let rows = ordered(snapshot, &list.kind, list.subtype);
        let mut values = rows.iter().filter_map(|r| r.value(list.key));
        for field in list.fields {
            match values.next() {
                Some(value) => {
                    set.insert(*field, value);
                }
                None if list.clear_unused => cleared.push(field.tag()),
                None => {}
            }
        }
    }
    for (kind, field) in [(RowKind::Children, F::Child), (RowKind::Category, F::Category)] {
        for row in ordered(snapshot, &kind, None) {
            if let Some(name) = row.value("name") {
                set.insert(field, name);
            }
        }
    }
    if let Some(text) = snapshot.row(&RowKind::Note).and_then(|r| r.value("text")) {
        set.insert(F::BodyType, "1").insert(F::BodyData, text);
    }

    let mut data = ApplicationData::from_field_set(&set);
    for tag in cleared {
        data.empty(tag);
    }
    data
}

/// Parser for contact collections.
#[derive(Debug, Default)]
pub struct ContactsAdapter;

impl ContactsAdapter {
    /// Creates a contacts parser.
    pub fn new() -> Self {
        Self
    }
}

impl CollectionAdapter for ContactsAdapter {
    fn class(&self) -> CollectionClass {
        CollectionClass::Contacts
    }

    fn add<R: Read>(
        &mut self,
        parser: &mut Parser<R>,
        server_id: &str,
        cx: &mut ApplyContext<'_>,
    ) -> SyncResult<()> {
        let set: FieldSet<ContactField> = read_field_set(parser, airsync::APPLICATION_DATA)?;
        match contact_image(&set, server_id) {
            Some(image) => {
                let applied = cx.apply_image(server_id, &image)?;
                tracing::debug!(server_id, applied, "contact applied");
            }
            None => {
                tracing::debug!(server_id, "contact without a name skipped");
                cx.skip();
            }
        }
        Ok(())
    }

    fn upsync(&self, snapshot: &EntitySnapshot) -> Option<ApplicationData> {
        Some(contact_data(snapshot))
    }
}
