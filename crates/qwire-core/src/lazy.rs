//! Single-flight lazy cell.
//!
//! States: empty, filled(value). A failed fill leaves the cell empty so the
//! next caller retries from scratch; errors are never cached.
//!
//! Readers of a filled cell never take the lock. Concurrent first readers
//! serialize on `fill`, and only the first one runs the initializer.

use std::sync::{Mutex, OnceLock, PoisonError};

pub struct LazyCell<T> {
    value: OnceLock<T>,
    fill: Mutex<()>,
}

impl<T> Default for LazyCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LazyCell<T> {
    pub const fn new() -> Self {
        Self {
            value: OnceLock::new(),
            fill: Mutex::new(()),
        }
    }

    /// Cached value, if already filled.
    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    pub fn is_filled(&self) -> bool {
        self.value.get().is_some()
    }

    /// Return the cached value, or run `init` once and cache its `Ok` result.
    pub fn get_or_try_init<E, F>(&self, init: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(v) = self.value.get() {
            return Ok(v);
        }

        // A panicking initializer leaves the cell empty; the guard holds no data.
        let _guard = self.fill.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(v) = self.value.get() {
            return Ok(v);
        }

        let v = init()?;
        Ok(self.value.get_or_init(|| v))
    }
}
