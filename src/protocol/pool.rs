//! Bump allocator backing the values of name/value pairs.
//!
//! A [`MemoryPool`] is bound to a buffer owned by the caller. Every inserted
//! value is copied into the next free bytes of that buffer, NUL-terminated,
//! and handed back as a `&'buf str`. The pool never reclaims space; the only
//! way to get the bytes back is to [`release`](MemoryPool::release) the pool
//! and bind it again.
//!
//! Values are carved off the free tail of the buffer with `split_at_mut`, so
//! each returned slice is disjoint from the bytes the pool may still write.
//! A message holding those slices cannot outlive the buffer.
//!
//! # Example
//! ```rust
//! use frontapi::protocol::{MemoryPool, NameValue};
//!
//! let mut buffer = [0_u8; 64];
//! let mut pool = MemoryPool::default();
//! pool.init(&mut buffer).unwrap();
//!
//! let mut pair = NameValue::default();
//! pool.insert_named_value(&mut pair, "Device.WiFi.Enable", Some("true")).unwrap();
//!
//! assert_eq!(pair.value, "true");
//! assert_eq!(pool.offset(), 5);
//! ```
use std::mem;

use log::{trace, warn};

use super::{
    FrontApiError,
    message::{NVP_MAX_NAME_LEN, NameValue, bounded},
};

/// Buffers of this size or smaller are rejected by [`MemoryPool::init`].
pub const MIN_POOL_SIZE: usize = 16;

#[derive(Debug, Default)]
pub struct MemoryPool<'buf> {
    free: &'buf mut [u8],
    capacity: usize,
    offset: usize,
    initialized: bool,
}

impl<'buf> MemoryPool<'buf> {
    /// Binds the pool to `buffer`, zeroing it.
    pub fn init(&mut self, buffer: &'buf mut [u8]) -> Result<(), FrontApiError> {
        if buffer.len() <= MIN_POOL_SIZE {
            return Err(FrontApiError::bad_input(format!(
                "memory pool buffer of {} bytes is too small (must exceed {MIN_POOL_SIZE})",
                buffer.len()
            )));
        }

        buffer.fill(0);
        self.capacity = buffer.len();
        self.offset = 0;
        self.free = buffer;
        self.initialized = true;
        Ok(())
    }

    /// Forgets the buffer binding. The buffer itself stays with the caller.
    pub fn release(&mut self) {
        *self = Self::default();
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.offset
    }

    pub(crate) fn ensure_initialized(&self, context: &str) -> Result<(), FrontApiError> {
        if self.initialized {
            Ok(())
        } else {
            Err(FrontApiError::bad_input(format!(
                "message memory pool is not initialized for {context}"
            )))
        }
    }

    /// Copies `value` into the pool and returns the stored slice.
    ///
    /// The stored bytes are followed by a NUL terminator that counts against
    /// the capacity. On failure the offset is left untouched.
    pub fn alloc_str(&mut self, value: &str) -> Result<&'buf str, FrontApiError> {
        self.ensure_initialized("value insertion")?;

        let len = value.len();
        let needed = len + 1;
        let available = self.remaining();
        if available < needed {
            warn!("no space in message pool (value length {len}, {available} bytes left)");
            return Err(FrontApiError::NotEnoughMemory { needed, available });
        }

        let free = mem::take(&mut self.free);
        let (slot, rest) = free.split_at_mut(needed);
        self.free = rest;
        self.offset += needed;

        slot[..len].copy_from_slice(value.as_bytes());
        slot[len] = 0;
        trace!("message pool offset now {}", self.offset);

        let slot: &'buf [u8] = slot;
        std::str::from_utf8(&slot[..len])
            .map_err(|e| FrontApiError::General(format!("pool value is not valid UTF-8: {e}")))
    }

    /// Stores `value` (or the empty string) as the value of `slot`.
    pub fn insert_value(
        &mut self,
        slot: &mut NameValue<'buf>,
        value: Option<&str>,
    ) -> Result<(), FrontApiError> {
        slot.value = self.alloc_str(value.unwrap_or_default())?;
        Ok(())
    }

    /// Stores both the name and the value of `slot`.
    ///
    /// Names longer than the name field are truncated with a warning.
    pub fn insert_named_value(
        &mut self,
        slot: &mut NameValue<'buf>,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), FrontApiError> {
        self.ensure_initialized("name/value insertion")?;
        if name.is_empty() {
            return Err(FrontApiError::bad_input("parameter name is empty"));
        }

        self.insert_value(slot, value)?;

        let (name, truncated) = bounded(name, NVP_MAX_NAME_LEN);
        if truncated {
            warn!("parameter name {name}.. is truncated (permitted length is {NVP_MAX_NAME_LEN} bytes)");
        }
        slot.name = name;
        Ok(())
    }

    /// Builds a new pair from `name` and `value`.
    pub fn pair(&mut self, name: &str, value: &str) -> Result<NameValue<'buf>, FrontApiError> {
        let mut slot = NameValue::default();
        self.insert_named_value(&mut slot, name, Some(value))?;
        Ok(slot)
    }
}
