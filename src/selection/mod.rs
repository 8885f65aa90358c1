//! Persistent selection list: which discovered units take part in backups.
//!
//! The file is line oriented and meant to be edited by hand. Recognized
//! `name=true|false` lines become entries; everything else (comments, blank
//! lines, external path lines) is kept verbatim and written back first.

pub mod store;

pub use store::{SelectionStore, SyncChanges};
