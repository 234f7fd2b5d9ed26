//! Guest side of the asset bridge.
//!
//! Link this into a wasm guest to export the `__allocate`/`__deallocate` pair the host needs and to
//! get safe wrappers over the `env.__load_asset_index` and `env.__load_asset_file` imports.
//!
//! Every byte range the host hands over is owned by the guest. The wrappers here turn it into a
//! `Vec<u8>` straight away so it is freed by the normal drop rules. Code that calls the raw imports
//! itself must call `__deallocate` on every returned handle.
//!
//! A failed load never returns. The host traps the guest with the error attached, so there is
//! no handle to a half written or missing range for the guest to misread.

pub mod allocation;

pub use asset_bridge_common::*;

#[cfg(target_arch = "wasm32")]
#[link(wasm_import_module = "env")]
extern "C" {
    fn __load_asset_index() -> GuestPtrLen;
    fn __load_asset_file(guest_ptr: GuestPtr, len: Len) -> GuestPtrLen;
}

/// the asset index as compact json bytes
#[cfg(target_arch = "wasm32")]
pub fn load_index() -> Vec<u8> {
    let handle = MemoryHandle::from(unsafe { __load_asset_index() });
    unsafe { allocation::consume(handle) }
}

#[cfg(target_arch = "wasm32")]
pub fn load_manifest() -> Result<AssetManifest, serde_json::Error> {
    let manifest = AssetManifest::from_slice(&load_index())?;
    tracing::debug!(assets = manifest.assets().len(), "loaded asset index");
    Ok(manifest)
}

/// the raw bytes of the asset at `path`
///
/// the path stays in guest memory, the host only reads it
#[cfg(target_arch = "wasm32")]
pub fn load_file(path: &str) -> Vec<u8> {
    let handle =
        MemoryHandle::from(unsafe { __load_asset_file(path.as_ptr() as GuestPtr, path.len() as Len) });
    unsafe { allocation::consume(handle) }
}

/// load every asset listed in the manifest, in manifest order
#[cfg(target_arch = "wasm32")]
pub fn load_assets(manifest: &AssetManifest) -> Vec<(Asset, Vec<u8>)> {
    load_assets_with(manifest, load_file)
}

/// same as `load_assets` with the loader supplied by the caller
pub fn load_assets_with<F>(manifest: &AssetManifest, mut load: F) -> Vec<(Asset, Vec<u8>)>
where
    F: FnMut(&str) -> Vec<u8>,
{
    manifest
        .assets()
        .iter()
        .map(|asset| {
            let bytes = load(&asset.path);
            tracing::trace!(path = %asset.path, len = bytes.len(), "loaded asset");
            (asset.clone(), bytes)
        })
        .collect()
}
