pub mod handle;
pub mod manifest;
pub mod result;

pub use handle::*;
pub use manifest::*;
pub use result::*;

/// something like usize for wasm
/// wasm32 has a memory limit of 4GB so offsets and lengths fit in u32
///
/// the host reads and writes the guest's memory directly so both sides need to agree on a fixed
/// number of bytes for offsets and lengths, regardless of the host's `usize`
pub type WasmSize = u32;

pub type Len = WasmSize;
pub type GuestPtr = WasmSize;

/// a GuestPtr and Len packed into a single u64 so it can be returned from a single wasm call
pub type GuestPtrLen = u64;

/// pack a ptr and len into a u64 with the ptr in the high bits
pub fn merge_u64(a: u32, b: u32) -> u64 {
    ((a as u64) << 32) | b as u64
}

/// inverse of merge_u64
pub fn split_u64(u: u64) -> (u32, u32) {
    ((u >> 32) as u32, u as u32)
}
