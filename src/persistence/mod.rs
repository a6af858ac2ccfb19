//! Temp data persistence
//!
//! A [`Backend`] loads the previous cycle's values for a context and stores
//! the survivors once the current cycle ends. The dictionary never looks
//! inside the values it hands over.
//!
//! Provided backends:
//! - [`MemoryBackend`]: in-process session store

pub mod memory;

pub use memory::{MemoryBackend, MemoryBackendError};

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

/// Values exchanged with a backend, keyed by the spelling they were written with
pub type TempMap = HashMap<String, Value>;

/// Storage for temp data between cycles
pub trait Backend {
    /// Identifies the request or session the data belongs to
    type Context;
    /// Failure raised by the underlying store
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the values saved by the previous cycle, if any
    fn load_temp_data(&self, context: &Self::Context) -> Result<Option<TempMap>, Self::Error>;

    /// Replace whatever is stored for `context` with `values`
    fn save_temp_data(&self, context: &Self::Context, values: TempMap) -> Result<(), Self::Error>;
}

impl<B: Backend + ?Sized> Backend for &B {
    type Context = B::Context;
    type Error = B::Error;

    fn load_temp_data(&self, context: &Self::Context) -> Result<Option<TempMap>, Self::Error> {
        (**self).load_temp_data(context)
    }

    fn save_temp_data(&self, context: &Self::Context, values: TempMap) -> Result<(), Self::Error> {
        (**self).save_temp_data(context, values)
    }
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    type Context = B::Context;
    type Error = B::Error;

    fn load_temp_data(&self, context: &Self::Context) -> Result<Option<TempMap>, Self::Error> {
        (**self).load_temp_data(context)
    }

    fn save_temp_data(&self, context: &Self::Context, values: TempMap) -> Result<(), Self::Error> {
        (**self).save_temp_data(context, values)
    }
}
