//! Core types for the Jotnal local data store.
//!
//! This crate holds the entity shapes of the relational schema and the
//! preferences file. It knows nothing about SQLite or encryption; the
//! `jotnal-store-sqlite` crate owns those.

pub mod entity;
pub mod error;
pub mod fs;
pub mod preferences;

pub use error::{Error, Result};
pub use preferences::{Preferences, PreferencesDocument, PreferencesStore};
