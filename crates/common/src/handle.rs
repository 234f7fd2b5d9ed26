use crate::merge_u64;
use crate::split_u64;
use crate::GuestPtr;
use crate::GuestPtrLen;
use crate::Len;

/// address handed out for zero length transfers
///
/// an empty `Vec<u8>` in the guest points at its alignment rather than null, so a guest can
/// rebuild an empty vector from this address without the allocator ever being involved
pub const EMPTY_ADDRESS: GuestPtr = 1;

/// MemoryHandle is an address/length pair naming a contiguous range of guest linear memory
///
/// the address always represents a position in wasm linear memory _never_ on the host
/// the length always represents u8 bytes _not_ items
///
/// a handle returned by the host names a range that is fully written and owned by the guest from
/// that point on. the host never writes to it again and never frees it, so the guest MUST release
/// it with its `__deallocate` export (or rebuild a `Vec<u8>` from it) once it is done reading,
/// otherwise the range leaks for the lifetime of the instance.
///
/// handles cross the wasm boundary as a single u64, see `merge_u64`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryHandle {
    address: GuestPtr,
    length: Len,
}

impl MemoryHandle {
    pub fn new(address: GuestPtr, length: Len) -> Self {
        Self { address, length }
    }

    /// the handle for a valid zero length transfer
    pub fn empty() -> Self {
        Self {
            address: EMPTY_ADDRESS,
            length: 0,
        }
    }

    pub fn address(&self) -> GuestPtr {
        self.address
    }

    pub fn length(&self) -> Len {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// null is never a valid handle, not even for an empty payload
    pub fn is_null(&self) -> bool {
        self.address == 0
    }

    /// one past the last byte of the range, None if the range overflows wasm32
    pub fn end(&self) -> Option<GuestPtr> {
        self.address.checked_add(self.length)
    }
}

impl From<MemoryHandle> for GuestPtrLen {
    fn from(handle: MemoryHandle) -> Self {
        merge_u64(handle.address, handle.length)
    }
}

impl From<GuestPtrLen> for MemoryHandle {
    fn from(guest_ptr_len: GuestPtrLen) -> Self {
        let (address, length) = split_u64(guest_ptr_len);
        Self { address, length }
    }
}

impl From<(GuestPtr, Len)> for MemoryHandle {
    fn from((address, length): (GuestPtr, Len)) -> Self {
        Self { address, length }
    }
}
