//! Native handles and the table that tracks which ones the binding holds.
//!
//! The native library reference-counts every object behind a `VixHandle`
//! and may hand out the same raw value more than once. The table mirrors
//! that model: each acquisition is counted, each [`HandleTable::release`]
//! gives one back, and only acquisitions the table knows about ever reach
//! `Vix_ReleaseHandle`. Releasing more often than acquiring is a no-op on
//! the native side.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::backend::Backend;

/// Opaque reference to a native object.
///
/// Equality is on the raw value. The binding never looks inside it, only
/// passes it back to the library.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Handle(i32);

impl Handle {
    /// `VIX_INVALID_HANDLE`.
    pub const INVALID: Handle = Handle(0);

    /// Wrap a raw `VixHandle`.
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// The raw `VixHandle`.
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Check if this handle is not the invalid sentinel.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const SHARDS: usize = 16;

/// Live-handle bookkeeping shared by everything that talks to one backend.
///
/// Sharded by raw value so that unrelated handles do not contend on one lock.
pub struct HandleTable {
    backend: Arc<dyn Backend>,
    shards: [Mutex<HashMap<Handle, usize>>; SHARDS],
}

impl HandleTable {
    /// Create an empty table releasing through `backend`.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            shards: std::array::from_fn(|_| Mutex::new(HashMap::new())),
        }
    }

    fn shard(&self, handle: Handle) -> MutexGuard<'_, HashMap<Handle, usize>> {
        let idx = handle.0.unsigned_abs() as usize % SHARDS;
        self.shards[idx]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one acquisition of `handle`.
    ///
    /// Tracking a value that is already live bumps its count.
    pub fn track(&self, handle: Handle) {
        if !handle.is_valid() {
            return;
        }
        let mut shard = self.shard(handle);
        let refs = shard.entry(handle).or_insert(0);
        *refs += 1;
        trace!(%handle, refs = *refs, "tracking handle");
    }

    /// Take an extra native reference on `handle` and track it.
    pub fn add_ref(&self, handle: Handle) {
        if !handle.is_valid() {
            return;
        }
        self.backend.add_ref(handle);
        self.track(handle);
    }

    /// Give back one acquisition of `handle`.
    ///
    /// Returns `true` if a native release was issued. The invalid handle and
    /// values with no outstanding acquisition are ignored.
    pub fn release(&self, handle: Handle) -> bool {
        if !handle.is_valid() {
            return false;
        }
        {
            let mut shard = self.shard(handle);
            match shard.get_mut(&handle) {
                Some(refs) if *refs > 1 => *refs -= 1,
                Some(_) => {
                    shard.remove(&handle);
                }
                None => {
                    warn!(%handle, "ignoring release of untracked handle");
                    return false;
                }
            }
        }
        debug!(%handle, "Vix_ReleaseHandle");
        self.backend.release(handle);
        true
    }

    /// Stop tracking `handle` without telling the native side.
    ///
    /// Used after calls that destroy the object themselves, such as
    /// `VixHost_Disconnect`.
    pub fn forget(&self, handle: Handle) -> bool {
        self.shard(handle).remove(&handle).is_some()
    }

    /// Check if the binding holds at least one acquisition of `handle`.
    pub fn is_live(&self, handle: Handle) -> bool {
        self.shard(handle).contains_key(&handle)
    }

    /// Outstanding acquisitions of `handle`.
    pub fn references(&self, handle: Handle) -> usize {
        self.shard(handle).get(&handle).copied().unwrap_or(0)
    }

    /// Number of distinct live handle values.
    pub fn live_count(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }
}

impl fmt::Debug for HandleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleTable")
            .field("live", &self.live_count())
            .finish()
    }
}

/// One tracked acquisition of a handle, released when dropped.
///
/// Every job and every long-lived result handle the binding hands out is
/// wrapped in one of these, so release happens on every exit path.
pub struct OwnedHandle {
    raw: Handle,
    table: Arc<HandleTable>,
}

impl OwnedHandle {
    /// Wrap an acquisition that `table` already tracks.
    pub(crate) fn new(table: Arc<HandleTable>, raw: Handle) -> Self {
        Self { raw, table }
    }

    /// The raw handle.
    #[inline]
    pub fn get(&self) -> Handle {
        self.raw
    }

    /// Release now instead of at drop.
    pub fn release(mut self) -> bool {
        let raw = std::mem::replace(&mut self.raw, Handle::INVALID);
        self.table.release(raw)
    }

    /// Stop managing the handle and return it.
    ///
    /// The acquisition stays tracked; the caller owes one
    /// [`HandleTable::release`] for it.
    pub fn into_raw(mut self) -> Handle {
        std::mem::replace(&mut self.raw, Handle::INVALID)
    }
}

impl PartialEq for OwnedHandle {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for OwnedHandle {}

impl fmt::Debug for OwnedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnedHandle").field(&self.raw).finish()
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        self.table.release(self.raw);
    }
}
