//! Read-tracked temp data dictionary
//!
//! A [`TempData`] is created per request, bound to a backend and a context.
//! It tracks two key sets next to the values themselves:
//! - unread keys: loaded from the backend or written this cycle, and not yet
//!   observed by `get`, a typed get, or enumeration
//! - retained keys: explicitly kept with `keep` / `keep_all`
//!
//! On `save` only entries in either set survive. A value set in cycle N and
//! read in cycle N+1 is therefore gone in cycle N+2 unless it was kept.
//!
//! Keys are case-insensitive everywhere.

mod entries;

pub use entries::Entries;

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TempDataError;
use crate::key::FoldedKey;
use crate::persistence::{Backend, TempMap};
use crate::settings::Settings;

/// Stored value plus the key spelling it was last written with
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub(crate) key: String,
    pub(crate) value: Value,
}

/// Flash data for one request lifecycle
///
/// Owned by a single lifecycle; every mutation goes through `&mut self` and
/// there is no internal locking. Operations that need the previous cycle's
/// data load it on first use, so they surface backend failures as `Err`.
pub struct TempData<B: Backend> {
    backend: B,
    context: B::Context,
    settings: Settings,
    data: HashMap<FoldedKey, Slot>,
    unread: HashSet<FoldedKey>,
    retained: HashSet<FoldedKey>,
    loaded: bool,
}

impl<B: Backend> TempData<B> {
    /// Bind a new, not yet loaded dictionary to a backend and context
    pub fn new(backend: B, context: B::Context) -> Self {
        Self::with_settings(backend, context, Settings::default())
    }

    pub fn with_settings(backend: B, context: B::Context, settings: Settings) -> Self {
        Self {
            backend,
            context,
            settings,
            data: HashMap::new(),
            unread: HashSet::new(),
            retained: HashSet::new(),
            loaded: false,
        }
    }

    pub fn context(&self) -> &B::Context {
        &self.context
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Whether `load` has completed for this instance
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Hydrate from the backend. Only the first successful call has an effect.
    ///
    /// Every loaded key starts out unread; nothing is retained.
    pub fn load(&mut self) -> Result<(), B::Error> {
        if self.loaded {
            return Ok(());
        }

        let values = self
            .backend
            .load_temp_data(&self.context)?
            .unwrap_or_default();

        // Sorted so that keys differing only by case resolve the same way
        // every time: the ordinally greatest spelling wins.
        let mut values: Vec<_> = values.into_iter().collect();
        values.sort_by(|a, b| a.0.cmp(&b.0));

        self.data.clear();
        self.unread.clear();
        self.retained.clear();
        for (key, value) in values {
            let folded = FoldedKey::new(&key);
            self.unread.insert(folded.clone());
            if let Some(shadowed) = self.data.insert(folded, Slot { key, value }) {
                log::warn!(
                    "Temp data key {} differs from another loaded key only by case, dropping it",
                    shadowed.key
                );
            }
        }
        self.loaded = true;

        log::debug!("Loaded {} temp data entries", self.data.len());
        Ok(())
    }

    /// Read a value and mark it as consumed
    pub fn get(&mut self, key: &str) -> Result<Option<&Value>, B::Error> {
        self.load()?;
        let folded = FoldedKey::new(key);
        match self.data.get(&folded) {
            Some(slot) => {
                self.unread.remove(&folded);
                Ok(Some(&slot.value))
            }
            None => Ok(None),
        }
    }

    /// Read a value and deserialize it, marking it as consumed
    pub fn get_as<T: DeserializeOwned>(
        &mut self,
        key: &str,
    ) -> Result<Option<T>, TempDataError<B::Error>> {
        let value = self.get(key).map_err(TempDataError::Backend)?;
        convert(key, value)
    }

    /// Read a value without consuming it
    ///
    /// Loads first unless [`Settings::peek_loads`] is disabled, in which case
    /// only resident state is consulted.
    pub fn peek(&mut self, key: &str) -> Result<Option<&Value>, B::Error> {
        if self.settings.peek_loads {
            self.load()?;
        }
        Ok(self.data.get(&FoldedKey::new(key)).map(|slot| &slot.value))
    }

    /// Deserialize a value without consuming it
    pub fn peek_as<T: DeserializeOwned>(
        &mut self,
        key: &str,
    ) -> Result<Option<T>, TempDataError<B::Error>> {
        let value = self.peek(key).map_err(TempDataError::Backend)?;
        convert(key, value)
    }

    /// Insert or overwrite a value. The new value counts as unread.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), B::Error> {
        self.load()?;
        self.insert_unread(key.into(), value.into());
        Ok(())
    }

    /// Serialize and store a value. The new value counts as unread.
    pub fn set_as<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), TempDataError<B::Error>> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|source| TempDataError::Conversion {
            key: key.clone(),
            source,
        })?;
        self.set(key, value).map_err(TempDataError::Backend)
    }

    /// Insert a value that must not already exist
    pub fn add(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), TempDataError<B::Error>> {
        self.load().map_err(TempDataError::Backend)?;
        let key = key.into();
        if self.data.contains_key(&FoldedKey::new(&key)) {
            return Err(TempDataError::DuplicateKey { key });
        }
        self.insert_unread(key, value.into());
        Ok(())
    }

    /// Mark every current entry to survive the next save
    pub fn keep_all(&mut self) -> Result<(), B::Error> {
        self.load()?;
        self.retained.extend(self.data.keys().cloned());
        Ok(())
    }

    /// Mark one entry to survive the next save. Absent keys are ignored.
    pub fn keep(&mut self, key: &str) -> Result<(), B::Error> {
        self.load()?;
        let folded = FoldedKey::new(key);
        if self.data.contains_key(&folded) {
            self.retained.insert(folded);
        }
        Ok(())
    }

    /// Delete an entry. Returns whether anything was removed.
    pub fn remove(&mut self, key: &str) -> Result<bool, B::Error> {
        self.load()?;
        let folded = FoldedKey::new(key);
        self.unread.remove(&folded);
        self.retained.remove(&folded);
        Ok(self.data.remove(&folded).is_some())
    }

    pub fn contains_key(&mut self, key: &str) -> Result<bool, B::Error> {
        self.load()?;
        Ok(self.data.contains_key(&FoldedKey::new(key)))
    }

    pub fn contains_value(&mut self, value: &Value) -> Result<bool, B::Error> {
        self.load()?;
        Ok(self.data.values().any(|slot| slot.value == *value))
    }

    pub fn clear(&mut self) -> Result<(), B::Error> {
        self.load()?;
        self.data.clear();
        self.unread.clear();
        self.retained.clear();
        Ok(())
    }

    pub fn len(&mut self) -> Result<usize, B::Error> {
        self.load()?;
        Ok(self.data.len())
    }

    pub fn is_empty(&mut self) -> Result<bool, B::Error> {
        self.load()?;
        Ok(self.data.is_empty())
    }

    /// Keys in the spelling they were written with. Does not consume.
    pub fn keys(&mut self) -> Result<impl Iterator<Item = &str> + '_, B::Error> {
        self.load()?;
        Ok(self.data.values().map(|slot| slot.key.as_str()))
    }

    /// Stored values. Does not consume.
    pub fn values(&mut self) -> Result<impl Iterator<Item = &Value> + '_, B::Error> {
        self.load()?;
        Ok(self.data.values().map(|slot| &slot.value))
    }

    /// Iterate key/value pairs, consuming each entry as it is yielded
    pub fn entries(&mut self) -> Result<Entries<'_>, B::Error> {
        self.load()?;
        Ok(Entries::new(self.data.iter(), &mut self.unread))
    }

    /// Persist unread and retained entries, dropping everything else.
    ///
    /// Does nothing when the dictionary was never loaded. After a successful
    /// save the resident state matches what the backend received; if the
    /// backend fails nothing is dropped, so the save can be retried.
    pub fn save(&mut self) -> Result<(), B::Error> {
        if !self.loaded {
            log::debug!("Temp data never loaded, skipping save");
            return Ok(());
        }

        let unread = &self.unread;
        let retained = &self.retained;
        let survives = |folded: &FoldedKey| unread.contains(folded) || retained.contains(folded);

        let values: TempMap = self
            .data
            .iter()
            .filter(|&(folded, _)| survives(folded))
            .map(|(_, slot)| (slot.key.clone(), slot.value.clone()))
            .collect();
        log::debug!(
            "Saving {} temp data entries ({} dropped)",
            values.len(),
            self.data.len() - values.len()
        );
        self.backend.save_temp_data(&self.context, values)?;

        self.data.retain(|folded, slot| {
            let keep = survives(folded);
            if !keep {
                log::trace!("Dropped consumed temp data entry {}", slot.key);
            }
            keep
        });
        Ok(())
    }

    fn insert_unread(&mut self, key: String, value: Value) {
        let folded = FoldedKey::new(&key);
        self.unread.insert(folded.clone());
        self.data.insert(folded, Slot { key, value });
    }
}

fn convert<T: DeserializeOwned, E>(
    key: &str,
    value: Option<&Value>,
) -> Result<Option<T>, TempDataError<E>> {
    value
        .map(T::deserialize)
        .transpose()
        .map_err(|source| TempDataError::Conversion {
            key: key.to_string(),
            source,
        })
}
