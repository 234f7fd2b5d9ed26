use crate::GuestPtr;
use crate::Len;
use thiserror::Error;

/// Ways the guest allocator can refuse a request.
///
/// None of these are recoverable by the bridge: handing out a truncated or overlapping range would
/// corrupt whatever the guest reads next, so the request fails instead.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Error)]
pub enum AllocationFailure {
    /// zero sized allocations have no address the guest could free later
    #[error("zero sized allocation")]
    ZeroSized,
    /// the arena has no free range large enough for the request
    #[error("out of memory: requested {requested} bytes with {available} bytes available")]
    OutOfMemory { requested: Len, available: Len },
    /// a deallocation named a range that was never handed out (or was already released)
    #[error("{len} bytes at {ptr} is not a live allocation")]
    NotAnAllocation { ptr: GuestPtr, len: Len },
    /// the guest allocator itself failed, e.g. the export trapped or returned null
    #[error("guest allocator failed: {0}")]
    Guest(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Allocation(#[from] AllocationFailure),
    /// the guest handed us path bytes that are not valid utf-8
    /// nothing is decoded in this case, not even the valid prefix
    #[error("path is not valid utf-8: {0}")]
    Decode(#[from] std::str::Utf8Error),
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    /// the backing store failed for a reason other than the resource being missing
    #[error("transport error fetching {path}: {message}")]
    Transport { path: String, message: String },
    /// the path decoded fine but tries to escape the asset root
    #[error("invalid asset path: {0}")]
    InvalidPath(String),
    #[error("asset manifest: {0}")]
    Manifest(String),
    /// reading or writing guest memory went out of bounds
    /// whatever this is it is very bad and probably not recoverable
    #[error("guest memory access out of bounds: {len} bytes at {ptr}")]
    Memory { ptr: GuestPtr, len: Len },
    /// a length does not fit in the 32 bit wasm address space
    #[error("length {0} does not fit in wasm32")]
    PointerMap(u64),
    /// calling into the guest failed
    #[error("guest call failed: {0}")]
    Guest(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Manifest(e.to_string())
    }
}

impl BridgeError {
    pub fn transport(path: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// true for the failures of the external fetch rather than the bridge itself
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::ResourceNotFound(_) | Self::Transport { .. })
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
