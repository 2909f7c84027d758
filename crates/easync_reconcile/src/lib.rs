//! # easync Reconcile
//!
//! Turns the server's image of one record into the minimal set of store
//! operations that bring the local copy in line with it.
//!
//! A [`RecordImage`] groups incoming values by row kind:
//!
//! - singleton groups hold at most one row (name, organization, note)
//! - typed groups hold one row per subtype (mobile phone, home address)
//! - list groups hold an ordered list, optionally bounded (email addresses)
//!
//! [`reconcile`] compares the image with the stored [`EntitySnapshot`] and
//! emits only the writes that change something, followed by deletes for
//! stale rows of the kinds the image manages.
//!
//! ```
//! use easync_reconcile::{reconcile, row_values, ListGroup, RecordImage};
//! use easync_store::RowKind;
//!
//! let mut image = RecordImage::new([RowKind::Name, RowKind::Email]).with_server_id("1:7");
//! image.singleton(RowKind::Name, row_values([("first", "Ada")]));
//! let mut emails = ListGroup::bounded(RowKind::Email, 3, "address").case_insensitive();
//! emails.push_value("ada@example.com");
//! image.list(emails);
//!
//! // create + name + one email
//! assert_eq!(reconcile(&image, None).len(), 3);
//! ```
//!
//! [`EntitySnapshot`]: easync_store::EntitySnapshot

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod diff;
mod image;
mod list;
mod note;
mod reconcile;

pub use diff::{diff_row, normalize, same_values, RowTarget};
pub use image::{row_values, Group, ListGroup, RecordImage};
pub use note::normalize_note;
pub use reconcile::{reconcile, reconcile_into};
