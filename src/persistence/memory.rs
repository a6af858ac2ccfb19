//! In-process session store backend
//!
//! Each session is a bag of values. Temp data occupies one reserved slot in
//! the bag (see [`Settings::session_key`]); the remaining slots belong to the
//! embedding application.
//!
//! Loading takes the temp data out of the session so a concurrent request on
//! the same session cannot observe it a second time. Saving an empty map
//! clears the slot instead of storing an empty object.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use thiserror::Error;

use super::{Backend, TempMap};
use crate::Settings;

/// Errors raised by [`MemoryBackend`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryBackendError {
    /// The reserved slot holds something other than a JSON object.
    #[error("session `{session}` holds a non-object value under `{slot}`")]
    Corrupt { session: String, slot: String },
}

/// Session store kept in memory, shared by every request that uses it
#[derive(Debug)]
pub struct MemoryBackend {
    sessions: Mutex<HashMap<String, HashMap<String, Value>>>,
    session_key: String,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty store using the default session slot
    pub fn new() -> Self {
        Self::with_settings(&Settings::default())
    }

    /// Create an empty store using the configured session slot
    pub fn with_settings(settings: &Settings) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            session_key: settings.session_key.clone(),
        }
    }

    /// Name of the slot temp data lives under
    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    /// Number of sessions holding at least one value
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Stored temp data for a session, without taking it out
    pub fn snapshot(&self, session: &str) -> Option<TempMap> {
        let sessions = self.sessions.lock();
        match sessions.get(session)?.get(&self.session_key)? {
            Value::Object(map) => Some(map.clone().into_iter().collect()),
            _ => None,
        }
    }

    /// Store an application value in a session slot
    pub fn set_session_value(&self, session: &str, slot: &str, value: Value) {
        self.sessions
            .lock()
            .entry(session.to_string())
            .or_default()
            .insert(slot.to_string(), value);
    }

    /// Read an application value from a session slot
    pub fn session_value(&self, session: &str, slot: &str) -> Option<Value> {
        self.sessions.lock().get(session)?.get(slot).cloned()
    }
}

impl Backend for MemoryBackend {
    type Context = String;
    type Error = MemoryBackendError;

    fn load_temp_data(&self, session: &String) -> Result<Option<TempMap>, Self::Error> {
        let mut sessions = self.sessions.lock();
        let Some(bag) = sessions.get_mut(session) else {
            return Ok(None);
        };

        let values = match bag.remove(&self.session_key) {
            None => return Ok(None),
            Some(Value::Object(map)) => map,
            Some(other) => {
                // Leave the session as it was
                bag.insert(self.session_key.clone(), other);
                return Err(MemoryBackendError::Corrupt {
                    session: session.clone(),
                    slot: self.session_key.clone(),
                });
            }
        };

        if bag.is_empty() {
            sessions.remove(session);
        }

        log::debug!("Took {} temp data entries from session {}", values.len(), session);
        Ok(Some(values.into_iter().collect()))
    }

    fn save_temp_data(&self, session: &String, values: TempMap) -> Result<(), Self::Error> {
        let mut sessions = self.sessions.lock();

        if values.is_empty() {
            if let Some(bag) = sessions.get_mut(session) {
                bag.remove(&self.session_key);
                if bag.is_empty() {
                    sessions.remove(session);
                }
            }
            log::debug!("Cleared temp data for session {}", session);
            return Ok(());
        }

        log::debug!("Stored {} temp data entries for session {}", values.len(), session);
        let object: Map<String, Value> = values.into_iter().collect();
        sessions
            .entry(session.clone())
            .or_default()
            .insert(self.session_key.clone(), Value::Object(object));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> String {
        "session-1".to_string()
    }

    #[test]
    fn test_load_missing_session() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.load_temp_data(&session()).unwrap(), None);
    }

    #[test]
    fn test_save_then_load_takes_data() {
        let backend = MemoryBackend::new();
        let values = TempMap::from([("Notice".to_string(), json!("saved"))]);
        backend.save_temp_data(&session(), values.clone()).unwrap();
        assert_eq!(backend.snapshot("session-1"), Some(values.clone()));

        assert_eq!(backend.load_temp_data(&session()).unwrap(), Some(values));
        // Taken out on load
        assert_eq!(backend.load_temp_data(&session()).unwrap(), None);
        assert_eq!(backend.session_count(), 0);
    }

    #[test]
    fn test_save_empty_clears_slot() {
        let backend = MemoryBackend::new();
        backend
            .save_temp_data(&session(), TempMap::from([("a".to_string(), json!(1))]))
            .unwrap();
        backend.set_session_value("session-1", "user", json!("alice"));

        backend.save_temp_data(&session(), TempMap::new()).unwrap();
        assert_eq!(backend.snapshot("session-1"), None);
        // Other session values are untouched
        assert_eq!(backend.session_value("session-1", "user"), Some(json!("alice")));
        assert_eq!(backend.session_count(), 1);
    }

    #[test]
    fn test_save_empty_on_unknown_session() {
        let backend = MemoryBackend::new();
        backend.save_temp_data(&session(), TempMap::new()).unwrap();
        assert_eq!(backend.session_count(), 0);
    }

    #[test]
    fn test_load_keeps_other_session_values() {
        let backend = MemoryBackend::new();
        backend.set_session_value("session-1", "user", json!("alice"));
        backend
            .save_temp_data(&session(), TempMap::from([("a".to_string(), json!(1))]))
            .unwrap();

        backend.load_temp_data(&session()).unwrap();
        assert_eq!(backend.session_value("session-1", "user"), Some(json!("alice")));
        assert_eq!(backend.session_count(), 1);
    }

    #[test]
    fn test_corrupt_slot() {
        let backend = MemoryBackend::new();
        backend.set_session_value("session-1", Settings::DEFAULT_SESSION_KEY, json!([1, 2]));

        let err = backend.load_temp_data(&session()).unwrap_err();
        assert_eq!(
            err,
            MemoryBackendError::Corrupt {
                session: "session-1".to_string(),
                slot: "__TempData".to_string(),
            }
        );
        // Slot restored
        assert_eq!(
            backend.session_value("session-1", Settings::DEFAULT_SESSION_KEY),
            Some(json!([1, 2]))
        );
    }

    #[test]
    fn test_custom_session_key() {
        let settings = Settings {
            session_key: "flash".to_string(),
            ..Default::default()
        };
        let backend = MemoryBackend::with_settings(&settings);
        assert_eq!(backend.session_key(), "flash");

        backend
            .save_temp_data(&session(), TempMap::from([("a".to_string(), json!(1))]))
            .unwrap();
        assert_eq!(backend.session_value("session-1", "flash"), Some(json!({ "a": 1 })));
        assert_eq!(backend.session_value("session-1", "__TempData"), None);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let backend = MemoryBackend::new();
        backend
            .save_temp_data(&"one".to_string(), TempMap::from([("a".to_string(), json!(1))]))
            .unwrap();
        assert_eq!(backend.load_temp_data(&"two".to_string()).unwrap(), None);
        assert!(backend.snapshot("one").is_some());
    }
}
