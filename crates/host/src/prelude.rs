pub use crate::arena::Arena;
pub use crate::arena::SharedArena;
pub use crate::bridge::Bridge;
pub use crate::env::Env;
pub use crate::error::HostError;
pub use crate::guest::GuestMemory;
pub use crate::instance::GuestInstance;
pub use crate::source::AssetSource;
pub use crate::source::BundledSource;
pub use crate::source::FsSource;
pub use crate::source::HttpSource;
pub use crate::source::Source;
pub use asset_bridge_common::*;
