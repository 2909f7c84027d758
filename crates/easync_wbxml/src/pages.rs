//! Code page definitions.
//!
//! Each module holds the tag constants for one page plus the `TABLE` used
//! by [`CodePages`](crate::CodePages) for name resolution.

macro_rules! code_page {
    ($(#[$meta:meta])* $module:ident, $index:expr, $namespace:expr, {
        $($name:ident = $id:expr => $label:expr),* $(,)?
    }) => {
        $(#[$meta])*
        pub mod $module {
            use crate::tag::{PageTable, Tag};

            /// Code page index.
            pub const PAGE: u8 = $index;

            /// Namespace name.
            pub const NAMESPACE: &str = $namespace;

            $(
                #[doc = $label]
                pub const $name: Tag = Tag::new($index, $id);
            )*

            /// Name table for this page.
            pub const TABLE: PageTable = PageTable {
                index: $index,
                namespace: $namespace,
                names: &[$(($id, $label)),*],
            };
        }
    };
}

code_page!(
    /// Page 0: item synchronization.
    airsync, 0, "AirSync", {
        SYNC = 0x05 => "Sync",
        RESPONSES = 0x06 => "Responses",
        ADD = 0x07 => "Add",
        CHANGE = 0x08 => "Change",
        DELETE = 0x09 => "Delete",
        FETCH = 0x0A => "Fetch",
        SYNC_KEY = 0x0B => "SyncKey",
        CLIENT_ID = 0x0C => "ClientId",
        SERVER_ID = 0x0D => "ServerId",
        STATUS = 0x0E => "Status",
        COLLECTION = 0x0F => "Collection",
        CLASS = 0x10 => "Class",
        COLLECTION_ID = 0x12 => "CollectionId",
        GET_CHANGES = 0x13 => "GetChanges",
        MORE_AVAILABLE = 0x14 => "MoreAvailable",
        WINDOW_SIZE = 0x15 => "WindowSize",
        COMMANDS = 0x16 => "Commands",
        OPTIONS = 0x17 => "Options",
        FILTER_TYPE = 0x18 => "FilterType",
        TRUNCATION = 0x19 => "Truncation",
        CONFLICT = 0x1B => "Conflict",
        COLLECTIONS = 0x1C => "Collections",
        APPLICATION_DATA = 0x1D => "ApplicationData",
        DELETES_AS_MOVES = 0x1E => "DeletesAsMoves",
        SUPPORTED = 0x20 => "Supported",
        SOFT_DELETE = 0x21 => "SoftDelete",
        MIME_SUPPORT = 0x22 => "MIMESupport",
        MIME_TRUNCATION = 0x23 => "MIMETruncation",
        WAIT = 0x24 => "Wait",
        LIMIT = 0x25 => "Limit",
        PARTIAL = 0x26 => "Partial",
        CONVERSATION_MODE = 0x27 => "ConversationMode",
        MAX_ITEMS = 0x28 => "MaxItems",
        HEARTBEAT_INTERVAL = 0x29 => "HeartbeatInterval",
    }
);

code_page!(
    /// Page 1: contacts.
    contacts, 1, "Contacts", {
        ANNIVERSARY = 0x05 => "Anniversary",
        ASSISTANT_NAME = 0x06 => "AssistantName",
        ASSISTANT_PHONE_NUMBER = 0x07 => "AssistantPhoneNumber",
        BIRTHDAY = 0x08 => "Birthday",
        BODY = 0x09 => "Body",
        BODY_SIZE = 0x0A => "BodySize",
        BODY_TRUNCATED = 0x0B => "BodyTruncated",
        BUSINESS2_PHONE_NUMBER = 0x0C => "Business2PhoneNumber",
        BUSINESS_CITY = 0x0D => "BusinessCity",
        BUSINESS_COUNTRY = 0x0E => "BusinessCountry",
        BUSINESS_POSTAL_CODE = 0x0F => "BusinessPostalCode",
        BUSINESS_STATE = 0x10 => "BusinessState",
        BUSINESS_STREET = 0x11 => "BusinessStreet",
        BUSINESS_FAX_NUMBER = 0x12 => "BusinessFaxNumber",
        BUSINESS_PHONE_NUMBER = 0x13 => "BusinessPhoneNumber",
        CAR_PHONE_NUMBER = 0x14 => "CarPhoneNumber",
        CATEGORIES = 0x15 => "Categories",
        CATEGORY = 0x16 => "Category",
        CHILDREN = 0x17 => "Children",
        CHILD = 0x18 => "Child",
        COMPANY_NAME = 0x19 => "CompanyName",
        DEPARTMENT = 0x1A => "Department",
        EMAIL1_ADDRESS = 0x1B => "Email1Address",
        EMAIL2_ADDRESS = 0x1C => "Email2Address",
        EMAIL3_ADDRESS = 0x1D => "Email3Address",
        FILE_AS = 0x1E => "FileAs",
        FIRST_NAME = 0x1F => "FirstName",
        HOME2_PHONE_NUMBER = 0x20 => "Home2PhoneNumber",
        HOME_CITY = 0x21 => "HomeCity",
        HOME_COUNTRY = 0x22 => "HomeCountry",
        HOME_POSTAL_CODE = 0x23 => "HomePostalCode",
        HOME_STATE = 0x24 => "HomeState",
        HOME_STREET = 0x25 => "HomeStreet",
        HOME_FAX_NUMBER = 0x26 => "HomeFaxNumber",
        HOME_PHONE_NUMBER = 0x27 => "HomePhoneNumber",
        JOB_TITLE = 0x28 => "JobTitle",
        LAST_NAME = 0x29 => "LastName",
        MIDDLE_NAME = 0x2A => "MiddleName",
        MOBILE_PHONE_NUMBER = 0x2B => "MobilePhoneNumber",
        OFFICE_LOCATION = 0x2C => "OfficeLocation",
        OTHER_CITY = 0x2D => "OtherCity",
        OTHER_COUNTRY = 0x2E => "OtherCountry",
        OTHER_POSTAL_CODE = 0x2F => "OtherPostalCode",
        OTHER_STATE = 0x30 => "OtherState",
        OTHER_STREET = 0x31 => "OtherStreet",
        PAGER_NUMBER = 0x32 => "PagerNumber",
        RADIO_PHONE_NUMBER = 0x33 => "RadioPhoneNumber",
        SPOUSE = 0x34 => "Spouse",
        SUFFIX = 0x35 => "Suffix",
        TITLE = 0x36 => "Title",
        WEB_PAGE = 0x37 => "WebPage",
        YOMI_COMPANY_NAME = 0x38 => "YomiCompanyName",
        YOMI_FIRST_NAME = 0x39 => "YomiFirstName",
        YOMI_LAST_NAME = 0x3A => "YomiLastName",
        COMPRESSED_RTF = 0x3B => "CompressedRTF",
        PICTURE = 0x3C => "Picture",
        ALIAS = 0x3D => "Alias",
        WEIGHTED_RANK = 0x3E => "WeightedRank",
    }
);

code_page!(
    /// Page 2: email.
    email, 2, "Email", {
        ATTACHMENT = 0x05 => "Attachment",
        ATTACHMENTS = 0x06 => "Attachments",
        ATT_NAME = 0x07 => "AttName",
        ATT_SIZE = 0x08 => "AttSize",
        ATT0_ID = 0x09 => "Att0Id",
        ATT_METHOD = 0x0A => "AttMethod",
        ATT_REMOVED = 0x0B => "AttRemoved",
        BODY = 0x0C => "Body",
        BODY_SIZE = 0x0D => "BodySize",
        BODY_TRUNCATED = 0x0E => "BodyTruncated",
        DATE_RECEIVED = 0x0F => "DateReceived",
        DISPLAY_NAME = 0x10 => "DisplayName",
        DISPLAY_TO = 0x11 => "DisplayTo",
        IMPORTANCE = 0x12 => "Importance",
        MESSAGE_CLASS = 0x13 => "MessageClass",
        SUBJECT = 0x14 => "Subject",
        READ = 0x15 => "Read",
        TO = 0x16 => "To",
        CC = 0x17 => "Cc",
        FROM = 0x18 => "From",
        REPLY_TO = 0x19 => "ReplyTo",
        ALL_DAY_EVENT = 0x1A => "AllDayEvent",
        CATEGORIES = 0x1B => "Categories",
        CATEGORY = 0x1C => "Category",
        DT_STAMP = 0x1D => "DtStamp",
        END_TIME = 0x1E => "EndTime",
        INSTANCE_TYPE = 0x1F => "InstanceType",
        BUSY_STATUS = 0x20 => "BusyStatus",
        LOCATION = 0x21 => "Location",
        MEETING_REQUEST = 0x22 => "MeetingRequest",
        ORGANIZER = 0x23 => "Organizer",
        RECURRENCE_ID = 0x24 => "RecurrenceId",
        REMINDER = 0x25 => "Reminder",
        RESPONSE_REQUESTED = 0x26 => "ResponseRequested",
        RECURRENCES = 0x27 => "Recurrences",
        RECURRENCE = 0x28 => "Recurrence",
        START_TIME = 0x31 => "StartTime",
        SENSITIVITY = 0x32 => "Sensitivity",
        TIME_ZONE = 0x33 => "TimeZone",
        GLOBAL_OBJ_ID = 0x34 => "GlobalObjId",
        THREAD_TOPIC = 0x35 => "ThreadTopic",
        MIME_DATA = 0x36 => "MIMEData",
        MIME_TRUNCATED = 0x37 => "MIMETruncated",
        MIME_SIZE = 0x38 => "MIMESize",
        INTERNET_CPID = 0x39 => "InternetCPID",
        FLAG = 0x3A => "Flag",
        FLAG_STATUS = 0x3B => "FlagStatus",
        CONTENT_CLASS = 0x3C => "ContentClass",
        FLAG_TYPE = 0x3D => "FlagType",
        COMPLETE_TIME = 0x3E => "CompleteTime",
    }
);

code_page!(
    /// Page 4: calendar.
    calendar, 4, "Calendar", {
        TIME_ZONE = 0x05 => "TimeZone",
        ALL_DAY_EVENT = 0x06 => "AllDayEvent",
        ATTENDEES = 0x07 => "Attendees",
        ATTENDEE = 0x08 => "Attendee",
        ATTENDEE_EMAIL = 0x09 => "Email",
        ATTENDEE_NAME = 0x0A => "Name",
        BODY = 0x0B => "Body",
        BODY_TRUNCATED = 0x0C => "BodyTruncated",
        BUSY_STATUS = 0x0D => "BusyStatus",
        CATEGORIES = 0x0E => "Categories",
        CATEGORY = 0x0F => "Category",
        COMPRESSED_RTF = 0x10 => "CompressedRTF",
        DT_STAMP = 0x11 => "DtStamp",
        END_TIME = 0x12 => "EndTime",
        EXCEPTION = 0x13 => "Exception",
        EXCEPTIONS = 0x14 => "Exceptions",
        EXCEPTION_IS_DELETED = 0x15 => "Deleted",
        EXCEPTION_START_TIME = 0x16 => "ExceptionStartTime",
        LOCATION = 0x17 => "Location",
        MEETING_STATUS = 0x18 => "MeetingStatus",
        ORGANIZER_EMAIL = 0x19 => "OrganizerEmail",
        ORGANIZER_NAME = 0x1A => "OrganizerName",
        RECURRENCE = 0x1B => "Recurrence",
        RECURRENCE_TYPE = 0x1C => "Type",
        RECURRENCE_UNTIL = 0x1D => "Until",
        RECURRENCE_OCCURRENCES = 0x1E => "Occurrences",
        RECURRENCE_INTERVAL = 0x1F => "Interval",
        RECURRENCE_DAY_OF_WEEK = 0x20 => "DayOfWeek",
        RECURRENCE_DAY_OF_MONTH = 0x21 => "DayOfMonth",
        RECURRENCE_WEEK_OF_MONTH = 0x22 => "WeekOfMonth",
        RECURRENCE_MONTH_OF_YEAR = 0x23 => "MonthOfYear",
        REMINDER = 0x24 => "Reminder",
        SENSITIVITY = 0x25 => "Sensitivity",
        SUBJECT = 0x26 => "Subject",
        START_TIME = 0x27 => "StartTime",
        UID = 0x28 => "UID",
        ATTENDEE_STATUS = 0x29 => "AttendeeStatus",
        ATTENDEE_TYPE = 0x2A => "AttendeeType",
    }
);

code_page!(
    /// Page 5: item moves.
    move_items, 5, "Move", {
        MOVE_ITEMS = 0x05 => "MoveItems",
        MOVE = 0x06 => "Move",
        SRC_MSG_ID = 0x07 => "SrcMsgId",
        SRC_FLD_ID = 0x08 => "SrcFldId",
        DST_FLD_ID = 0x09 => "DstFldId",
        RESPONSE = 0x0A => "Response",
        STATUS = 0x0B => "Status",
        DST_MSG_ID = 0x0C => "DstMsgId",
    }
);

code_page!(
    /// Page 7: folder hierarchy.
    folder, 7, "FolderHierarchy", {
        FOLDERS = 0x05 => "Folders",
        FOLDER = 0x06 => "Folder",
        DISPLAY_NAME = 0x07 => "DisplayName",
        SERVER_ID = 0x08 => "ServerId",
        PARENT_ID = 0x09 => "ParentId",
        TYPE = 0x0A => "Type",
        STATUS = 0x0C => "Status",
        CHANGES = 0x0E => "Changes",
        ADD = 0x0F => "Add",
        DELETE = 0x10 => "Delete",
        UPDATE = 0x11 => "Update",
        SYNC_KEY = 0x12 => "SyncKey",
        FOLDER_CREATE = 0x13 => "FolderCreate",
        FOLDER_DELETE = 0x14 => "FolderDelete",
        FOLDER_UPDATE = 0x15 => "FolderUpdate",
        FOLDER_SYNC = 0x16 => "FolderSync",
        COUNT = 0x17 => "Count",
    }
);

code_page!(
    /// Page 12: contacts, second page.
    contacts2, 12, "Contacts2", {
        CUSTOMER_ID = 0x05 => "CustomerId",
        GOVERNMENT_ID = 0x06 => "GovernmentId",
        IM_ADDRESS = 0x07 => "IMAddress",
        IM_ADDRESS2 = 0x08 => "IMAddress2",
        IM_ADDRESS3 = 0x09 => "IMAddress3",
        MANAGER_NAME = 0x0A => "ManagerName",
        COMPANY_MAIN_PHONE = 0x0B => "CompanyMainPhone",
        ACCOUNT_NAME = 0x0C => "AccountName",
        NICK_NAME = 0x0D => "NickName",
        MMS = 0x0E => "MMS",
    }
);

code_page!(
    /// Page 13: long-poll ping.
    ping, 13, "Ping", {
        PING = 0x05 => "Ping",
        AUTD_STATE = 0x06 => "AutdState",
        STATUS = 0x07 => "Status",
        HEARTBEAT_INTERVAL = 0x08 => "HeartbeatInterval",
        FOLDERS = 0x09 => "Folders",
        FOLDER = 0x0A => "Folder",
        ID = 0x0B => "Id",
        CLASS = 0x0C => "Class",
        MAX_FOLDERS = 0x0D => "MaxFolders",
    }
);

code_page!(
    /// Page 15: search.
    search, 15, "Search", {
        SEARCH = 0x05 => "Search",
        STORE = 0x07 => "Store",
        NAME = 0x08 => "Name",
        QUERY = 0x09 => "Query",
        OPTIONS = 0x0A => "Options",
        RANGE = 0x0B => "Range",
        STATUS = 0x0C => "Status",
        RESPONSE = 0x0D => "Response",
        RESULT = 0x0E => "Result",
        PROPERTIES = 0x0F => "Properties",
        TOTAL = 0x10 => "Total",
        EQUAL_TO = 0x11 => "EqualTo",
        VALUE = 0x12 => "Value",
        AND = 0x13 => "And",
        OR = 0x14 => "Or",
        FREE_TEXT = 0x15 => "FreeText",
        DEEP_TRAVERSAL = 0x17 => "DeepTraversal",
        LONG_ID = 0x18 => "LongId",
        REBUILD_RESULTS = 0x19 => "RebuildResults",
        LESS_THAN = 0x1A => "LessThan",
        GREATER_THAN = 0x1B => "GreaterThan",
        USER_NAME = 0x1E => "UserName",
        PASSWORD = 0x1F => "Password",
        CONVERSATION_ID = 0x20 => "ConversationId",
    }
);

code_page!(
    /// Page 16: global address list entries.
    gal, 16, "GAL", {
        DISPLAY_NAME = 0x05 => "DisplayName",
        PHONE = 0x06 => "Phone",
        OFFICE = 0x07 => "Office",
        TITLE = 0x08 => "Title",
        COMPANY = 0x09 => "Company",
        ALIAS = 0x0A => "Alias",
        FIRST_NAME = 0x0B => "FirstName",
        LAST_NAME = 0x0C => "LastName",
        HOME_PHONE = 0x0D => "HomePhone",
        MOBILE_PHONE = 0x0E => "MobilePhone",
        EMAIL_ADDRESS = 0x0F => "EmailAddress",
    }
);

code_page!(
    /// Page 17: structured bodies and attachments.
    base, 17, "AirSyncBase", {
        BODY_PREFERENCE = 0x05 => "BodyPreference",
        TYPE = 0x06 => "Type",
        TRUNCATION_SIZE = 0x07 => "TruncationSize",
        ALL_OR_NONE = 0x08 => "AllOrNone",
        BODY = 0x0A => "Body",
        DATA = 0x0B => "Data",
        ESTIMATED_DATA_SIZE = 0x0C => "EstimatedDataSize",
        TRUNCATED = 0x0D => "Truncated",
        ATTACHMENTS = 0x0E => "Attachments",
        ATTACHMENT = 0x0F => "Attachment",
        DISPLAY_NAME = 0x10 => "DisplayName",
        FILE_REFERENCE = 0x11 => "FileReference",
        METHOD = 0x12 => "Method",
        CONTENT_ID = 0x13 => "ContentId",
        CONTENT_LOCATION = 0x14 => "ContentLocation",
        IS_INLINE = 0x15 => "IsInline",
        NATIVE_BODY_TYPE = 0x16 => "NativeBodyType",
        CONTENT_TYPE = 0x17 => "ContentType",
    }
);
