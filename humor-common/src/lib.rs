//! # Humor Project Common Library
//!
//! Shared code for the caption service:
//! - Error and result types
//! - Bootstrap configuration loading
//! - Database pool and schema initialization
//! - Domain models (images, captions, votes, ranked entries)

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
