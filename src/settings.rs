//! Temp data settings
//!
//! Usually deserialized from the embedding application's JSON config.

use serde::{Deserialize, Serialize};

/// Temp data configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Whether `peek` hydrates the dictionary from the backend first.
    ///
    /// When disabled, `peek` only sees what is already resident, which is
    /// nothing until some other accessor has triggered a load.
    pub peek_loads: bool,

    /// Session slot that [`MemoryBackend`](crate::MemoryBackend) stores temp data under
    pub session_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            peek_loads: true,
            session_key: Self::DEFAULT_SESSION_KEY.to_string(),
        }
    }
}

impl Settings {
    /// Default session slot name
    pub const DEFAULT_SESSION_KEY: &'static str = "__TempData";

    /// Parse settings from JSON. Missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let settings: Self = serde_json::from_str(json)?;
        log::debug!("Loaded temp data settings: {:?}", settings);
        Ok(settings)
    }
}
