//! Field sets: the values of one record, keyed by a closed field enum.

use crate::error::ParseResult;
use crate::parser::{Next, Parser};
use easync_wbxml::{Serializer, Tag};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::io::Read;

/// A closed set of record fields for one collection type.
///
/// Each field is carried by one tag, optionally nested inside a container
/// tag (for example the body text inside a structured body).
pub trait Field: Copy + Ord + Debug + 'static {
    /// Every field, in declaration order.
    const ALL: &'static [Self];

    /// The tag carrying this field's value.
    fn tag(self) -> Tag;

    /// The container the tag sits in, if any.
    fn container(self) -> Option<Tag> {
        None
    }

    /// Resolves a tag found inside `container` (or directly in the record).
    fn from_tag(tag: Tag, container: Option<Tag>) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.tag() == tag && f.container() == container)
    }

    /// Returns true if `tag` is a container holding some field.
    fn is_container(tag: Tag) -> bool {
        Self::ALL.iter().any(|f| f.container() == Some(tag))
    }
}

/// Values accumulated for one record.
///
/// Equality ignores the order in which different fields arrived; repeated
/// values of one field keep their order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet<F: Field> {
    values: BTreeMap<F, Vec<String>>,
}

impl<F: Field> Default for FieldSet<F> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }
}

impl<F: Field> FieldSet<F> {
    /// Creates an empty field set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value for `field`.
    pub fn insert(&mut self, field: F, value: impl Into<String>) -> &mut Self {
        self.values.entry(field).or_default().push(value.into());
        self
    }

    /// Returns the first value of `field`.
    pub fn get(&self, field: F) -> Option<&str> {
        self.values
            .get(&field)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Returns every value of `field`.
    pub fn all(&self, field: F) -> &[String] {
        self.values.get(&field).map_or(&[], Vec::as_slice)
    }

    /// Returns true if `field` has a value.
    pub fn contains(&self, field: F) -> bool {
        self.values.contains_key(&field)
    }

    /// Removes and returns every value of `field`.
    pub fn remove(&mut self, field: F) -> Vec<String> {
        self.values.remove(&field).unwrap_or_default()
    }

    /// Number of distinct fields present.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no field has a value.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates fields with their values, in field order.
    pub fn iter(&self) -> impl Iterator<Item = (F, &[String])> {
        self.values.iter().map(|(f, v)| (*f, v.as_slice()))
    }
}

/// Reads the fields of one record until `end` closes.
///
/// Empty tags carry no value and are left out. Unknown tags are skipped.
pub fn read_field_set<F: Field, R: Read>(
    parser: &mut Parser<R>,
    end: Tag,
) -> ParseResult<FieldSet<F>> {
    let mut set = FieldSet::new();
    read_into(parser, end, None, &mut set)?;
    Ok(set)
}

fn read_into<F: Field, R: Read>(
    parser: &mut Parser<R>,
    end: Tag,
    container: Option<Tag>,
    set: &mut FieldSet<F>,
) -> ParseResult<()> {
    while let Next::Tag(tag) = parser.next_tag(end)? {
        if let Some(field) = F::from_tag(tag, container) {
            if let Some(value) = parser.value_opt()? {
                set.insert(field, value);
            }
        } else if container.is_none() && F::is_container(tag) {
            read_into(parser, tag, Some(tag), set)?;
        } else {
            tracing::debug!(%tag, "skipping unknown field");
            parser.skip_tag()?;
        }
    }
    Ok(())
}

/// Writes a field set: plain fields first, then each container with its
/// fields, in field order.
pub fn write_field_set<F: Field>(serializer: &mut Serializer, set: &FieldSet<F>) {
    let mut containers: Vec<Tag> = Vec::new();
    for (field, values) in set.iter() {
        match field.container() {
            None => {
                for value in values {
                    serializer.data(field.tag(), value);
                }
            }
            Some(c) if !containers.contains(&c) => containers.push(c),
            Some(_) => {}
        }
    }
    for container in containers {
        serializer.start(container);
        for (field, values) in set.iter() {
            if field.container() == Some(container) {
                for value in values {
                    serializer.data(field.tag(), value);
                }
            }
        }
        serializer.end();
    }
}
