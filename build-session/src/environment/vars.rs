//! Access to environment variables
//!
//! The process environment is global mutable state; routing reads and
//! writes through [`Environment`] lets a host substitute an in-memory map.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::sync::{Arc, Mutex};

/// Shared reference to an environment
pub type SharedEnvironment = Arc<dyn Environment>;

/// Read/write access to a set of environment variables
pub trait Environment: Send + Sync {
    fn var(&self, key: &str) -> Option<OsString>;

    fn set_var(&self, key: &str, value: &OsStr);

    fn remove_var(&self, key: &str);
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<OsString> {
        std::env::var_os(key)
    }

    fn set_var(&self, key: &str, value: &OsStr) {
        std::env::set_var(key, value);
    }

    fn remove_var(&self, key: &str) {
        std::env::remove_var(key);
    }
}

/// In-memory environment for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryEnvironment {
    vars: Mutex<HashMap<String, OsString>>,
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(self, key: &str, value: impl Into<OsString>) -> Self {
        self.set_var(key, &value.into());
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Environment for MemoryEnvironment {
    fn var(&self, key: &str) -> Option<OsString> {
        self.vars
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set_var(&self, key: &str, value: &OsStr) {
        self.vars
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_os_string());
    }

    fn remove_var(&self, key: &str) {
        self.vars
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }
}
