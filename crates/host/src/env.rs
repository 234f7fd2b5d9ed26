use crate::bridge::Bridge;
use crate::guest::WasmerGuest;
use crate::prelude::*;
use std::sync::Arc;
use tokio::runtime::Handle;
use wasmer::FunctionEnvMut;
use wasmer::Memory;
use wasmer::TypedFunction;

/// Per-instance state behind the host imports.
///
/// The guest exports are filled in once the instance exists, the imports are built before that.
pub struct Env<S> {
    pub memory: Option<Memory>,
    pub allocate: Option<TypedFunction<Len, GuestPtr>>,
    pub deallocate: Option<TypedFunction<(GuestPtr, Len), ()>>,
    bridge: Arc<Bridge<S>>,
    runtime: Handle,
}

impl<S> Env<S> {
    /// `runtime` drives the bridge futures from inside synchronous host imports. It must be a
    /// multi thread runtime and the guest must not be called from one of its async tasks.
    pub fn new(bridge: Arc<Bridge<S>>, runtime: Handle) -> Self {
        Self {
            memory: None,
            allocate: None,
            deallocate: None,
            bridge,
            runtime,
        }
    }

    pub fn bridge(&self) -> &Arc<Bridge<S>> {
        &self.bridge
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn guest<'a>(&'a self, store: wasmer::StoreMut<'a>) -> BridgeResult<WasmerGuest<'a>> {
        let missing = |export: &str| BridgeError::Guest(format!("{} not initialized", export));
        Ok(WasmerGuest::new(
            store,
            self.memory.as_ref().ok_or_else(|| missing("memory"))?,
            self.allocate.as_ref().ok_or_else(|| missing("__allocate"))?,
            self.deallocate
                .as_ref()
                .ok_or_else(|| missing("__deallocate"))?,
        ))
    }
}

/// Run `f` against the guest behind a function env.
pub fn with_guest<S, R>(
    mut env: FunctionEnvMut<'_, Env<S>>,
    f: impl FnOnce(&Env<S>, &mut WasmerGuest<'_>) -> BridgeResult<R>,
) -> BridgeResult<R>
where
    S: Send + Sync + 'static,
{
    let (data, store) = env.data_and_store_mut();
    let data: &Env<S> = data;
    let mut guest = data.guest(store)?;
    f(data, &mut guest)
}
