//! Photo Map Organizer core
//!
//! This crate implements the filesystem-backed domain of the Photo Map
//! Organizer: a directory tree keyed by year/country/city in which photos
//! are stored, listed, moved, sorted and aggregated into map pins.
//!
//! ## Storage model
//!
//! The directory structure itself is the database. There is no manifest or
//! index file:
//!
//! ```text
//! <storage root>/
//! ├── static/              # served as-is by the HTTP layer
//! └── <year>/              # numeric directory name
//!     └── <country>/
//!         └── <city>/
//!             ├── 3f9ab2….jpg   # uploads get a random name + original extension
//!             └── 001_beach.png # sorted files carry a NNN_ sequence prefix
//! ```
//!
//! Deleting a directory out-of-band simply removes the corresponding
//! location from all future query results.
//!
//! ## Design principles
//!
//! - Configuration is resolved once at startup and injected as a
//!   [`StoreConfig`]; no service reads environment variables.
//! - Client-supplied path segments are validated before touching the
//!   filesystem; operations never escape the storage root.
//! - Mutating operations on a folder serialise on a per-folder advisory
//!   lock; reads are uncoordinated and re-read the tree on every call.

#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod location;
pub mod pins;
pub mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use location::LocationKey;
pub use pins::{Pin, PinAggregator};
pub use store::{FolderStore, ImageEntry, UploadedFile, IMAGE_EXTENSIONS};
