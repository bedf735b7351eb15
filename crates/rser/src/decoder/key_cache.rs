//! Bounded cache of short decoded keys.
//!
//! Object keys, template keys and path segments repeat a lot. A hit skips
//! UTF-8 validation of the raw bytes.

use std::collections::HashMap;

use crate::config::KeyCacheConfig;
use crate::error::{DecodeError, DecodeErrorKind};

pub(crate) struct KeyCache {
    entries: HashMap<Box<[u8]>, String>,
    capacity: usize,
    max_key_len: usize,
}

impl KeyCache {
    pub(crate) fn new(config: KeyCacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: config.capacity,
            max_key_len: config.max_key_len,
        }
    }

    /// Returns the key for `bytes`, read at `offset`.
    pub(crate) fn key(&mut self, bytes: &[u8], offset: usize) -> Result<String, DecodeError> {
        let cacheable = self.capacity > 0 && bytes.len() <= self.max_key_len;
        if cacheable {
            if let Some(key) = self.entries.get(bytes) {
                return Ok(key.clone());
            }
        }
        let key = std::str::from_utf8(bytes)
            .map_err(|_| DecodeError::new(offset, DecodeErrorKind::InvalidUtf8))?
            .to_owned();
        if cacheable && self.entries.len() < self.capacity {
            self.entries.insert(bytes.into(), key.clone());
        }
        Ok(key)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}
