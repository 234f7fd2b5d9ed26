//! Host side of the asset bridge.
//!
//! The host fetches asset bytes from an [`source::AssetSource`] and copies them into guest memory
//! through the guest's own allocator, handing back a packed `(address, length)` handle. Guest
//! memory is always an explicit [`guest::GuestMemory`] value: the in-process [`arena::Arena`] or a
//! live wasmer instance.

pub mod arena;
pub mod bridge;
pub mod config;
pub mod env;
pub mod error;
pub mod guest;
pub mod import;
pub mod instance;
pub mod prelude;
pub mod source;
