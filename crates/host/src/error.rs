use asset_bridge_common::BridgeError;
use thiserror::Error;
use wasmer::RuntimeError;

/// A bridge error on its way through a wasm trap.
///
/// Host imports can't return a `BridgeError` to the guest, so it rides along as the user payload
/// of the trap and is recovered by whoever called into the guest.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HostError(pub BridgeError);

impl From<BridgeError> for HostError {
    fn from(bridge_error: BridgeError) -> HostError {
        HostError(bridge_error)
    }
}

impl From<HostError> for RuntimeError {
    fn from(host_error: HostError) -> RuntimeError {
        RuntimeError::user(Box::new(host_error))
    }
}

/// Recover the bridge error from a guest call that trapped.
///
/// Traps that didn't come from a host import (unreachable, out of bounds, ...) become
/// `BridgeError::Guest`.
pub fn bridge_error(runtime_error: RuntimeError) -> BridgeError {
    match runtime_error.downcast::<HostError>() {
        Ok(HostError(bridge_error)) => bridge_error,
        Err(runtime_error) => BridgeError::Guest(runtime_error.message()),
    }
}
