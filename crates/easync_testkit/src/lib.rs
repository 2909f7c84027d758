//! # easync Testkit
//!
//! Test utilities for easync.
//!
//! This crate provides:
//! - Server response fixtures built with the crate's own serializer
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use easync_testkit::prelude::*;
//! use easync_wbxml::pages::contacts;
//!
//! let body = SyncFixture::new("4", "2")
//!     .add("4:1", &[(contacts::FIRST_NAME, "Ada"), (contacts::LAST_NAME, "Lovelace")])
//!     .build();
//! assert!(!body.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
