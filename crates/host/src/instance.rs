use crate::bridge::Bridge;
use crate::env::with_guest;
use crate::env::Env;
use crate::error::bridge_error;
use crate::import::imports;
use crate::prelude::*;
use std::sync::Arc;
use tokio::runtime::Handle;
use wasmer::FunctionEnv;
use wasmer::Instance;
use wasmer::Module;
use wasmer::Store;
use wasmer::Value;

fn guest_error(e: impl std::fmt::Display) -> BridgeError {
    BridgeError::Guest(e.to_string())
}

/// A compiled and instantiated guest wired to a bridge.
///
/// Besides calling guest exports this can push data into the guest from the host side, which is
/// how preloading works. Every handle it returns belongs to the guest.
pub struct GuestInstance<S> {
    store: Store,
    instance: Instance,
    env: FunctionEnv<Env<S>>,
}

impl<S> GuestInstance<S>
where
    S: AssetSource + Send + Sync + 'static,
{
    /// `wasm` may be a binary module or wat text.
    pub fn new(wasm: &[u8], bridge: Arc<Bridge<S>>, runtime: Handle) -> BridgeResult<Self> {
        let mut store = Store::default();
        let module = Module::new(&store, wasm).map_err(guest_error)?;
        let env = FunctionEnv::new(&mut store, Env::new(bridge, runtime));
        let built_imports = imports(&mut store, &env);
        let instance = Instance::new(&mut store, &module, &built_imports).map_err(guest_error)?;

        let memory = instance
            .exports
            .get_memory("memory")
            .map_err(guest_error)?
            .clone();
        let allocate = instance
            .exports
            .get_typed_function(&store, "__allocate")
            .map_err(guest_error)?;
        let deallocate = instance
            .exports
            .get_typed_function(&store, "__deallocate")
            .map_err(guest_error)?;
        {
            let data = env.as_mut(&mut store);
            data.memory = Some(memory);
            data.allocate = Some(allocate);
            data.deallocate = Some(deallocate);
        }

        tracing::debug!("guest instantiated");
        Ok(Self {
            store,
            instance,
            env,
        })
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Call a guest export. A trap raised by a host import comes back as the bridge error that
    /// caused it.
    pub fn call(&mut self, name: &str, params: &[Value]) -> BridgeResult<Box<[Value]>> {
        self.instance
            .exports
            .get_function(name)
            .map_err(guest_error)?
            .call(&mut self.store, params)
            .map_err(bridge_error)
    }

    /// Call a `() -> i64` export that returns a packed handle.
    pub fn call_handle(&mut self, name: &str) -> BridgeResult<MemoryHandle> {
        let function = self
            .instance
            .exports
            .get_typed_function::<(), GuestPtrLen>(&self.store, name)
            .map_err(guest_error)?;
        function
            .call(&mut self.store)
            .map(MemoryHandle::from)
            .map_err(bridge_error)
    }

    /// Push the asset index into the guest.
    pub fn load_index(&mut self) -> BridgeResult<MemoryHandle> {
        with_guest(self.env.clone().into_mut(&mut self.store), |env, guest| {
            env.runtime().block_on(env.bridge().load_index(guest))
        })
    }

    /// Push the asset at `path` into the guest.
    ///
    /// The path is staged in guest memory the same way a guest would pass it and released again
    /// afterwards, whether or not the load worked. A failed release is logged and never replaces
    /// the load result.
    pub fn load_file_path(&mut self, path: &str) -> BridgeResult<MemoryHandle> {
        with_guest(self.env.clone().into_mut(&mut self.store), |env, guest| {
            let path_handle = guest.transfer(path.as_bytes())?;
            let loaded = env
                .runtime()
                .block_on(env.bridge().load_file(&mut *guest, path_handle));
            if !path_handle.is_empty() {
                if let Err(dealloc_error) =
                    guest.deallocate(path_handle.address(), path_handle.length())
                {
                    tracing::error!(%path, %dealloc_error, "failed to release staged path");
                }
            }
            loaded
        })
    }

    /// Copy a guest range out to the host.
    pub fn read_handle(&mut self, handle: MemoryHandle) -> BridgeResult<Vec<u8>> {
        with_guest(self.env.clone().into_mut(&mut self.store), |_, guest| {
            guest.read_handle(handle)
        })
    }

    /// Release a handle on the guest's behalf.
    pub fn deallocate(&mut self, handle: MemoryHandle) -> BridgeResult<()> {
        if handle.is_empty() {
            return Ok(());
        }
        with_guest(self.env.clone().into_mut(&mut self.store), |_, guest| {
            guest.deallocate(handle.address(), handle.length())
        })
    }

    pub fn global_value(&mut self, name: &str) -> BridgeResult<Value> {
        Ok(self
            .instance
            .exports
            .get_global(name)
            .map_err(guest_error)?
            .get(&mut self.store))
    }
}
