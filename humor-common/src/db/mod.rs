//! Database bootstrap
//!
//! Opens the SQLite pool and creates the images / captions / caption_votes
//! tables when they are missing. Column names used by the service at runtime
//! are inferred, so these tables are only the default layout.

pub mod init;

pub use init::{init_database, init_memory_database, init_schema};

/// Table holding registered images
pub const IMAGES_TABLE: &str = "images";

/// Table holding human-written and machine-generated captions
pub const CAPTIONS_TABLE: &str = "captions";

/// Append-only vote table
pub const VOTES_TABLE: &str = "caption_votes";
