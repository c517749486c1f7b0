//! Helpers for unit tests that touch process state
//!
//! Integration tests in the workspace root cannot see this module; they
//! build their fixtures in tests/common/mod.rs.

use once_cell::sync::Lazy;
use std::env;

/// Held by every test that reads or writes environment variables
pub static ENV_LOCK: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

/// Environment overrides undone when the value is dropped
#[derive(Default)]
pub struct ScopedEnv {
    saved: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    /// Start with no overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Override `key` until drop
    pub fn set(mut self, key: &str, value: &str) -> Self {
        self.saved.push((key.to_string(), env::var(key).ok()));
        // SAFETY: callers hold ENV_LOCK, so no other test reads the environment concurrently
        unsafe { env::set_var(key, value) };
        self
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        while let Some((key, previous)) = self.saved.pop() {
            // SAFETY: see ScopedEnv::set
            unsafe {
                match previous {
                    Some(value) => env::set_var(&key, value),
                    None => env::remove_var(&key),
                }
            }
        }
    }
}
