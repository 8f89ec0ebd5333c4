//! cellsnake-io: Filesystem I/O for cellsnake.
//!
//! Loads images and session scripts from disk and persists summary
//! records to the append-only CSV store. Everything here wraps the
//! sans-IO crates; no analysis happens in this crate.

pub mod loader;
pub mod script;
pub mod store;

pub use loader::{LoadError, LoadedImage, load_image};
pub use script::{Action, ScriptError, load_script, parse_script};
pub use store::{AppendOutcome, CsvStore, DEFAULT_STORE_PATH, StoreError, append};
