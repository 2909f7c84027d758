//! Property-based test generators using proptest.
//!
//! Strategies produce the field values a server would plausibly send, so
//! generated records survive parsing and exercise the reconciliation paths.

use easync_store::RowValues;
use easync_wbxml::pages::contacts;
use easync_wbxml::Tag;
use proptest::prelude::*;

/// Strategy for person names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{1,11}").expect("Invalid regex")
}

/// Strategy for email addresses, in mixed case.
pub fn email_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9.]{0,10}@[a-z]{2,8}\\.(com|org|net)")
        .expect("Invalid regex")
}

/// Strategy for phone numbers.
pub fn phone_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("\\+?[0-9]{6,12}").expect("Invalid regex")
}

/// Strategy for a list of distinct (case-insensitively) addresses.
pub fn email_list_strategy(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(email_strategy(), 0..=max).prop_map(|mut list| {
        let mut seen = std::collections::HashSet::new();
        list.retain(|e| seen.insert(e.to_lowercase()));
        list
    })
}

/// Strategy for note text with mixed line endings.
pub fn note_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::string::string_regex("[a-zA-Z0-9 ,.]{1,20}").expect("Invalid regex"),
        1..4,
    )
    .prop_map(|lines| lines.join("\r\n"))
}

/// Strategy for sync keys as servers issue them.
pub fn sync_key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        (1u32..10_000).prop_map(|n| n.to_string()),
        prop::string::string_regex("\\{[0-9a-f]{8}\\}[0-9]{1,4}").expect("Invalid regex"),
    ]
}

/// Strategy for a row of column values with no empty entries.
pub fn row_values_strategy() -> impl Strategy<Value = RowValues> {
    prop::collection::btree_map(
        prop::string::string_regex("[a-z_]{1,10}").expect("Invalid regex"),
        prop::string::string_regex("[a-zA-Z0-9]{1,12}").expect("Invalid regex"),
        0..6,
    )
}

/// A generated contact, as the fields of a server record.
#[derive(Debug, Clone)]
pub struct ContactRecord {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Up to three addresses.
    pub emails: Vec<String>,
    /// Mobile number, if any.
    pub mobile: Option<String>,
}

impl ContactRecord {
    /// Returns the record as `(tag, value)` pairs, email slots in order.
    pub fn fields(&self) -> Vec<(Tag, String)> {
        let mut fields = vec![
            (contacts::FIRST_NAME, self.first_name.clone()),
            (contacts::LAST_NAME, self.last_name.clone()),
        ];
        let slots = [
            contacts::EMAIL1_ADDRESS,
            contacts::EMAIL2_ADDRESS,
            contacts::EMAIL3_ADDRESS,
        ];
        for (slot, email) in slots.iter().zip(&self.emails) {
            fields.push((*slot, email.clone()));
        }
        if let Some(mobile) = &self.mobile {
            fields.push((contacts::MOBILE_PHONE_NUMBER, mobile.clone()));
        }
        fields
    }
}

/// Strategy for contact records.
pub fn contact_strategy() -> impl Strategy<Value = ContactRecord> {
    (
        name_strategy(),
        name_strategy(),
        email_list_strategy(3),
        prop::option::of(phone_strategy()),
    )
        .prop_map(|(first_name, last_name, emails, mobile)| ContactRecord {
            first_name,
            last_name,
            emails,
            mobile,
        })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn email_list_is_case_insensitively_unique(list in email_list_strategy(3)) {
            let mut lowered: Vec<_> = list.iter().map(|e| e.to_lowercase()).collect();
            lowered.sort();
            lowered.dedup();
            prop_assert_eq!(lowered.len(), list.len());
            prop_assert!(list.len() <= 3);
        }

        #[test]
        fn contact_fields_fill_slots_in_order(contact in contact_strategy()) {
            let fields = contact.fields();
            prop_assert_eq!(fields[0].0, contacts::FIRST_NAME);
            if let Some(first) = contact.emails.first() {
                prop_assert_eq!(&fields[2], &(contacts::EMAIL1_ADDRESS, first.clone()));
            }
        }

        #[test]
        fn row_values_have_no_empty_entries(row in row_values_strategy()) {
            prop_assert!(row.values().all(|v| !v.is_empty()));
        }
    }
}
