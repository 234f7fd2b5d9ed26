use crate::env::with_guest;
use crate::env::Env;
use crate::error::HostError;
use crate::prelude::*;
use wasmer::imports;
use wasmer::AsStoreMut;
use wasmer::Function;
use wasmer::FunctionEnv;
use wasmer::FunctionEnvMut;
use wasmer::Imports;
use wasmer::RuntimeError;

fn trap(context: &str, bridge_error: BridgeError) -> RuntimeError {
    tracing::error!(error = %bridge_error, "{}", context);
    HostError(bridge_error).into()
}

/// Move the asset index into the guest and return its packed handle.
pub fn __load_asset_index<S>(env: FunctionEnvMut<Env<S>>) -> Result<GuestPtrLen, RuntimeError>
where
    S: AssetSource + Send + Sync + 'static,
{
    with_guest(env, |env, guest| {
        env.runtime().block_on(env.bridge().load_index(guest))
    })
    .map(GuestPtrLen::from)
    .map_err(|e| trap("asset index load failed", e))
}

/// Load the asset named by the utf-8 path at `[ptr, ptr + len)` into the guest.
///
/// The path stays owned by the guest, the host only reads it.
pub fn __load_asset_file<S>(
    env: FunctionEnvMut<Env<S>>,
    ptr: GuestPtr,
    len: Len,
) -> Result<GuestPtrLen, RuntimeError>
where
    S: AssetSource + Send + Sync + 'static,
{
    with_guest(env, |env, guest| {
        env.runtime()
            .block_on(env.bridge().load_file(guest, MemoryHandle::new(ptr, len)))
    })
    .map(GuestPtrLen::from)
    .map_err(|e| trap("asset file load failed", e))
}

pub fn imports<S>(store: &mut impl AsStoreMut, env: &FunctionEnv<Env<S>>) -> Imports
where
    S: AssetSource + Send + Sync + 'static,
{
    imports! {
        "env" => {
            "__load_asset_index" => Function::new_typed_with_env(store, env, __load_asset_index::<S>),
            "__load_asset_file" => Function::new_typed_with_env(store, env, __load_asset_file::<S>),
        },
    }
}
