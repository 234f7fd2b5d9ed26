use asset_bridge_common::*;
use std::mem;

#[no_mangle]
/// allocate a length of bytes that won't be dropped by the allocator
/// return the pointer to it so the host can write to the allocation
///
/// panics (which traps in wasm) rather than hand back a short or shared range
pub extern "C" fn __allocate(len: Len) -> GuestPtr {
    allocate(len as usize) as GuestPtr
}

#[no_mangle]
/// release an allocation previously returned by `__allocate`
///
/// every handle the host returns to the guest is an `__allocate` range, this is how the guest
/// gives it back once it has finished reading
pub extern "C" fn __deallocate(ptr: GuestPtr, len: Len) {
    unsafe { deallocate(ptr as usize as *mut u8, len as usize) }
}

/// reserve `len` zeroed bytes and leak them so the host can write into the range
pub fn allocate(len: usize) -> *mut u8 {
    assert!(len > 0, "zero sized allocation");
    // vec![0; len] allocates with capacity exactly len, which deallocate relies on
    let mut bytes = mem::ManuallyDrop::new(vec![0_u8; len]);
    bytes.as_mut_ptr()
}

/// restore an allocation so that it is dropped immediately
///
/// # Safety
/// `ptr` and `len` must be exactly a range returned by `allocate` that has not been released yet
pub unsafe fn deallocate(ptr: *mut u8, len: usize) {
    drop(reclaim(ptr, len));
}

/// take ownership of an `allocate` range as a vector, which frees it when dropped
///
/// # Safety
/// same as `deallocate`
pub unsafe fn reclaim(ptr: *mut u8, len: usize) -> Vec<u8> {
    if len == 0 {
        return Vec::new();
    }
    Vec::from_raw_parts(ptr, len, len)
}

/// take ownership of a range the host handed over
///
/// # Safety
/// the handle must come straight from a host import and must not be consumed twice
pub unsafe fn consume(handle: MemoryHandle) -> Vec<u8> {
    reclaim(handle.address() as usize as *mut u8, handle.length() as usize)
}
