use crate::prelude::*;
use wasmer::Memory;
use wasmer::StoreMut;
use wasmer::TypedFunction;

/// Everything the bridge needs from a guest: its allocator and a view of its memory.
///
/// Implemented by the in-process `Arena` and by `WasmerGuest` for a live wasm instance.
pub trait GuestMemory {
    /// reserve `len` bytes of guest memory via the guest's own allocator
    fn allocate(&mut self, len: Len) -> BridgeResult<GuestPtr>;

    /// hand a range back to the guest allocator
    fn deallocate(&mut self, ptr: GuestPtr, len: Len) -> BridgeResult<()>;

    fn read_bytes(&self, ptr: GuestPtr, len: Len) -> BridgeResult<Vec<u8>>;

    fn write_bytes(&mut self, ptr: GuestPtr, bytes: &[u8]) -> BridgeResult<()>;

    /// copy `bytes` into a fresh guest allocation of exactly the same length
    ///
    /// this is the only way the bridge hands bytes to a guest. the handle is only returned once
    /// every byte is written, a failed write releases the range again before the error is returned.
    /// empty payloads get the empty handle and never reach the allocator.
    fn transfer(&mut self, bytes: &[u8]) -> BridgeResult<MemoryHandle> {
        if bytes.is_empty() {
            return Ok(MemoryHandle::empty());
        }
        let len =
            Len::try_from(bytes.len()).map_err(|_| BridgeError::PointerMap(bytes.len() as u64))?;
        let ptr = self.allocate(len)?;
        if ptr == 0 {
            return Err(AllocationFailure::Guest("allocator returned null".into()).into());
        }
        if let Err(e) = self.write_bytes(ptr, bytes) {
            if let Err(dealloc_error) = self.deallocate(ptr, len) {
                tracing::error!(ptr, len, %dealloc_error, "failed to release unwritten allocation");
            }
            return Err(e);
        }
        Ok(MemoryHandle::new(ptr, len))
    }

    /// copy the bytes named by a handle out of guest memory
    fn read_handle(&self, handle: MemoryHandle) -> BridgeResult<Vec<u8>> {
        if handle.is_empty() {
            return Ok(Vec::new());
        }
        self.read_bytes(handle.address(), handle.length())
    }

    /// decode a guest utf-8 string, all or nothing
    fn decode_str(&self, handle: MemoryHandle) -> BridgeResult<String> {
        let bytes = self.read_handle(handle)?;
        String::from_utf8(bytes).map_err(|e| BridgeError::Decode(e.utf8_error()))
    }
}

/// A live wasmer instance seen through its exported memory and allocator.
///
/// Borrows the store for as long as it exists, so build one per host call.
pub struct WasmerGuest<'a> {
    store: StoreMut<'a>,
    memory: &'a Memory,
    allocate: &'a TypedFunction<Len, GuestPtr>,
    deallocate: &'a TypedFunction<(GuestPtr, Len), ()>,
}

impl<'a> WasmerGuest<'a> {
    pub fn new(
        store: StoreMut<'a>,
        memory: &'a Memory,
        allocate: &'a TypedFunction<Len, GuestPtr>,
        deallocate: &'a TypedFunction<(GuestPtr, Len), ()>,
    ) -> Self {
        Self {
            store,
            memory,
            allocate,
            deallocate,
        }
    }
}

impl GuestMemory for WasmerGuest<'_> {
    fn allocate(&mut self, len: Len) -> BridgeResult<GuestPtr> {
        if len == 0 {
            return Err(AllocationFailure::ZeroSized.into());
        }
        self.allocate
            .call(&mut self.store, len)
            .map_err(|e| AllocationFailure::Guest(e.message()).into())
    }

    fn deallocate(&mut self, ptr: GuestPtr, len: Len) -> BridgeResult<()> {
        self.deallocate
            .call(&mut self.store, ptr, len)
            .map_err(|e| BridgeError::Guest(e.message()))
    }

    /// wasmer checks the whole range against the current memory size before copying anything, so
    /// a bogus guest pointer fails here instead of reading host memory
    fn read_bytes(&self, ptr: GuestPtr, len: Len) -> BridgeResult<Vec<u8>> {
        let mut bytes = vec![0; len as usize];
        self.memory
            .view(&self.store)
            .read(ptr as u64, &mut bytes)
            .map_err(|_| BridgeError::Memory { ptr, len })?;
        Ok(bytes)
    }

    fn write_bytes(&mut self, ptr: GuestPtr, bytes: &[u8]) -> BridgeResult<()> {
        self.memory
            .view(&self.store)
            .write(ptr as u64, bytes)
            .map_err(|_| BridgeError::Memory {
                ptr,
                len: bytes.len() as Len,
            })
    }
}
