//! tempdata - read-once flash data for request/response pipelines
//!
//! Values written during one request stay readable through the next one and
//! are dropped after they have been read, unless the reader keeps them.
//!
//! Core modules:
//! - `dictionary`: The read-tracked dictionary and its save-time survivor selection
//! - `persistence`: Backend trait plus an in-memory session store
//! - `settings`: Serde-configurable knobs
//! - `error`: Error types

pub mod dictionary;
pub mod error;
mod key;
pub mod persistence;
pub mod settings;

pub use dictionary::{Entries, TempData};
pub use error::TempDataError;
pub use persistence::{Backend, MemoryBackend, MemoryBackendError, TempMap};
pub use settings::Settings;

/// Opaque payload stored under each key
pub use serde_json::Value;
