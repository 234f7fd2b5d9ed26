//! An explicit guest arena.
//!
//! `Arena` models a guest's linear memory together with its allocator as a plain value, so the
//! bridge can be driven without a wasm runtime, e.g. for bundled/native builds and in tests.
//! The allocator is first-fit over released ranges with a bump pointer for fresh memory.

use crate::guest::GuestMemory;
use crate::prelude::*;
use parking_lot::Mutex;
use parking_lot::MutexGuard;
use std::collections::BTreeMap;
use std::sync::Arc;

/// first address the arena hands out
/// keeps null and `EMPTY_ADDRESS` from ever naming a real allocation
pub const ARENA_BASE: GuestPtr = 8;

/// 16 MiB
pub const DEFAULT_ARENA_CAPACITY: Len = 16 * 1024 * 1024;

#[derive(Debug)]
pub struct Arena {
    memory: Vec<u8>,
    /// everything at or above top has never been handed out (or was released back into it)
    top: GuestPtr,
    live: BTreeMap<GuestPtr, Len>,
    /// released ranges below top, always coalesced
    free: BTreeMap<GuestPtr, Len>,
    allocations: u64,
}

impl Default for Arena {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ARENA_CAPACITY)
    }
}

impl Arena {
    pub fn with_capacity(capacity: Len) -> Self {
        Self {
            memory: vec![0; capacity as usize],
            top: ARENA_BASE.min(capacity),
            live: BTreeMap::new(),
            free: BTreeMap::new(),
            allocations: 0,
        }
    }

    pub fn capacity(&self) -> Len {
        self.memory.len() as Len
    }

    /// bytes that could still be allocated, ignoring fragmentation
    pub fn available(&self) -> Len {
        self.capacity() - self.top + self.free.values().sum::<Len>()
    }

    pub fn live_bytes(&self) -> Len {
        self.live.values().sum()
    }

    pub fn live_ranges(&self) -> impl Iterator<Item = (GuestPtr, Len)> + '_ {
        self.live.iter().map(|(ptr, len)| (*ptr, *len))
    }

    /// number of successful allocations over the lifetime of the arena
    pub fn allocation_count(&self) -> u64 {
        self.allocations
    }

    /// reserve `len` zeroed bytes that do not overlap any live range
    pub fn allocate(&mut self, len: Len) -> Result<GuestPtr, AllocationFailure> {
        if len == 0 {
            return Err(AllocationFailure::ZeroSized);
        }
        let ptr = match self.take_free(len) {
            Some(ptr) => ptr,
            None => self.bump(len)?,
        };
        self.memory[ptr as usize..(ptr + len) as usize].fill(0);
        self.live.insert(ptr, len);
        self.allocations += 1;
        Ok(ptr)
    }

    /// release a range previously returned by `allocate` with the same length
    pub fn deallocate(&mut self, ptr: GuestPtr, len: Len) -> Result<(), AllocationFailure> {
        match self.live.get(&ptr) {
            Some(live_len) if *live_len == len => {
                self.live.remove(&ptr);
                self.release(ptr, len);
                Ok(())
            }
            _ => Err(AllocationFailure::NotAnAllocation { ptr, len }),
        }
    }

    /// the guest's own view of a handle
    pub fn slice(&self, handle: MemoryHandle) -> Option<&[u8]> {
        if handle.is_empty() {
            return Some(&[]);
        }
        let end = handle.end()?;
        self.memory.get(handle.address() as usize..end as usize)
    }

    fn take_free(&mut self, len: Len) -> Option<GuestPtr> {
        let (ptr, size) = self
            .free
            .iter()
            .find(|(_, size)| **size >= len)
            .map(|(ptr, size)| (*ptr, *size))?;
        self.free.remove(&ptr);
        if size > len {
            self.free.insert(ptr + len, size - len);
        }
        Some(ptr)
    }

    fn bump(&mut self, len: Len) -> Result<GuestPtr, AllocationFailure> {
        match self.top.checked_add(len) {
            Some(end) if end <= self.capacity() => {
                let ptr = self.top;
                self.top = end;
                Ok(ptr)
            }
            _ => Err(AllocationFailure::OutOfMemory {
                requested: len,
                available: self.available(),
            }),
        }
    }

    fn release(&mut self, mut ptr: GuestPtr, mut len: Len) {
        if let Some((prev_ptr, prev_len)) = self
            .free
            .range(..ptr)
            .next_back()
            .map(|(p, l)| (*p, *l))
        {
            if prev_ptr + prev_len == ptr {
                self.free.remove(&prev_ptr);
                ptr = prev_ptr;
                len += prev_len;
            }
        }
        if let Some(next_len) = self.free.remove(&(ptr + len)) {
            len += next_len;
        }
        if ptr + len == self.top {
            self.top = ptr;
        } else {
            self.free.insert(ptr, len);
        }
    }

    /// the live range containing the whole of `[ptr, ptr + len)`, if any
    fn live_containing(&self, ptr: GuestPtr, len: Len) -> Option<(GuestPtr, Len)> {
        let (start, size) = self.live.range(..=ptr).next_back()?;
        let end = ptr.checked_add(len)?;
        (end <= start + size).then_some((*start, *size))
    }

    fn check_bounds(&self, ptr: GuestPtr, len: Len) -> BridgeResult<std::ops::Range<usize>> {
        match ptr.checked_add(len) {
            Some(end) if end <= self.capacity() => Ok(ptr as usize..end as usize),
            _ => Err(BridgeError::Memory { ptr, len }),
        }
    }
}

impl GuestMemory for Arena {
    fn allocate(&mut self, len: Len) -> BridgeResult<GuestPtr> {
        Ok(Arena::allocate(self, len)?)
    }

    fn deallocate(&mut self, ptr: GuestPtr, len: Len) -> BridgeResult<()> {
        Ok(Arena::deallocate(self, ptr, len)?)
    }

    fn read_bytes(&self, ptr: GuestPtr, len: Len) -> BridgeResult<Vec<u8>> {
        let range = self.check_bounds(ptr, len)?;
        Ok(self.memory[range].to_vec())
    }

    /// the host may only write inside a range the allocator reserved
    fn write_bytes(&mut self, ptr: GuestPtr, bytes: &[u8]) -> BridgeResult<()> {
        let len = Len::try_from(bytes.len()).map_err(|_| BridgeError::PointerMap(bytes.len() as u64))?;
        if self.live_containing(ptr, len).is_none() {
            return Err(BridgeError::Memory { ptr, len });
        }
        let range = self.check_bounds(ptr, len)?;
        self.memory[range].copy_from_slice(bytes);
        Ok(())
    }
}

/// An arena shared between concurrent requests.
///
/// Every operation takes the lock for its own duration only, so requests suspended in a fetch never
/// hold it. Ranges from different requests are disjoint, which is all the writers need.
#[derive(Debug, Clone, Default)]
pub struct SharedArena(Arc<Mutex<Arena>>);

impl SharedArena {
    pub fn new(arena: Arena) -> Self {
        Self(Arc::new(Mutex::new(arena)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Arena> {
        self.0.lock()
    }
}

impl GuestMemory for SharedArena {
    fn allocate(&mut self, len: Len) -> BridgeResult<GuestPtr> {
        GuestMemory::allocate(&mut *self.0.lock(), len)
    }

    fn deallocate(&mut self, ptr: GuestPtr, len: Len) -> BridgeResult<()> {
        GuestMemory::deallocate(&mut *self.0.lock(), ptr, len)
    }

    fn read_bytes(&self, ptr: GuestPtr, len: Len) -> BridgeResult<Vec<u8>> {
        self.0.lock().read_bytes(ptr, len)
    }

    fn write_bytes(&mut self, ptr: GuestPtr, bytes: &[u8]) -> BridgeResult<()> {
        self.0.lock().write_bytes(ptr, bytes)
    }
}
