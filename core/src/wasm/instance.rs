//! Loaded wasm cores and the loader that instantiates them

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use wasmtime::{Linker, Store, TypedFunc};

use super::engine::WasmEngine;
use super::host::{self, HostState};
use crate::controller::commands::DIRECT_METHODS;
use crate::module::{CoreLoader, CoreModule, HandlerRegistry, ModuleConfig};
use crate::options::ResolvedCore;
use crate::surface::{EventKind, HostEvent};
use crate::vfs::{CoreFileSystem, MemFs};

/// Linear memory cap for a core (512MB).
pub const DEFAULT_MEMORY_LIMIT: usize = 512 * 1024 * 1024;

/// Frame pacing for the host-driven loop (~60 Hz).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

const KEY_DOWN: u32 = 0;
const KEY_UP: u32 = 1;

/// A core instantiated from a wasm binary
pub struct WasmCore {
    store: Mutex<Store<HostState>>,
    alloc_fn: TypedFunc<u32, u32>,
    main_fn: TypedFunc<(u32, u32), ()>,
    frame_fn: Option<TypedFunc<(), ()>>,
    resize_fn: Option<TypedFunc<(u32, u32), ()>>,
    on_key_fn: Option<TypedFunc<(u32, u32), ()>>,
    on_gamepad_fn: Option<TypedFunc<u32, ()>>,
    methods: HashMap<&'static str, TypedFunc<(), ()>>,
    fs: Arc<MemFs>,
    exited: Arc<std::sync::atomic::AtomicBool>,
    frame_interval: Duration,
    pump: Mutex<Option<JoinHandle<()>>>,
    this: Weak<WasmCore>,
}

impl WasmCore {
    fn lock(&self) -> MutexGuard<'_, Store<HostState>> {
        self.store.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// Run one iteration of the core's loop.
    pub fn frame(&self) -> Result<()> {
        if let Some(frame) = &self.frame_fn {
            frame
                .call(&mut *self.lock(), ())
                .context("core frame() trapped")?;
        }
        Ok(())
    }

    fn key(&self, event: &HostEvent) {
        let (kind, code) = match event {
            HostEvent::KeyDown { key_code } => (KEY_DOWN, *key_code),
            HostEvent::KeyUp { key_code } => (KEY_UP, *key_code),
            HostEvent::GamepadConnected { .. } => return,
        };
        if let Some(on_key) = &self.on_key_fn
            && let Err(e) = on_key.call(&mut *self.lock(), (kind, code))
        {
            tracing::warn!(error = %e, code, "core on_key() trapped");
        }
    }

    fn gamepad(&self, event: &HostEvent) {
        if let HostEvent::GamepadConnected { gamepad } = event
            && let Some(on_gamepad) = &self.on_gamepad_fn
            && let Err(e) = on_gamepad.call(&mut *self.lock(), gamepad.index)
        {
            tracing::warn!(error = %e, index = gamepad.index, "core on_gamepad() trapped");
        }
    }

    /// Expose the core's input exports through the handler registry.
    fn register_handlers(&self, registry: &HandlerRegistry) {
        if self.on_key_fn.is_some() {
            for kind in [EventKind::KeyDown, EventKind::KeyUp] {
                let core = self.this.clone();
                registry.register(
                    kind,
                    Arc::new(move |event: &HostEvent| {
                        if let Some(core) = core.upgrade() {
                            core.key(event);
                        }
                    }),
                );
            }
        }
        if self.on_gamepad_fn.is_some() {
            let core = self.this.clone();
            registry.register(
                EventKind::GamepadConnected,
                Arc::new(move |event: &HostEvent| {
                    if let Some(core) = core.upgrade() {
                        core.gamepad(event);
                    }
                }),
            );
        }
    }

    /// Drive `frame()` on the current tokio runtime until the core exits or
    /// is dropped.
    fn start_frame_pump(&self) {
        if self.frame_fn.is_none() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime; core frames will not be driven");
            return;
        };

        let weak = self.this.clone();
        let interval = self.frame_interval;
        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(core) = weak.upgrade() else {
                    break;
                };
                if core.has_exited() {
                    break;
                }
                if let Err(e) = core.frame() {
                    tracing::warn!(error = %e, "stopping frame loop");
                    core.exited.store(true, Ordering::SeqCst);
                    break;
                }
            }
        });
        if let Some(previous) = self.pump.lock().unwrap_or_else(|p| p.into_inner()).replace(task) {
            previous.abort();
        }
    }

    fn stop_frame_pump(&self) {
        if let Some(task) = self.pump.lock().unwrap_or_else(|p| p.into_inner()).take() {
            task.abort();
        }
    }
}

impl Drop for WasmCore {
    fn drop(&mut self) {
        self.stop_frame_pump();
    }
}

impl CoreModule for WasmCore {
    /// Arguments are copied into core memory NUL-separated, via the core's
    /// `alloc` export.
    fn call_main(&self, args: &[String]) -> Result<()> {
        let mut argv = Vec::new();
        for arg in args {
            argv.extend_from_slice(arg.as_bytes());
            argv.push(0);
        }

        {
            let mut store = self.lock();
            let memory = store.data().memory.context("core exports no memory")?;
            let ptr = self
                .alloc_fn
                .call(&mut *store, argv.len() as u32)
                .context("core alloc() trapped")?;
            memory
                .write(&mut *store, ptr as usize, &argv)
                .context("argument buffer out of bounds")?;
            self.main_fn
                .call(&mut *store, (ptr, argv.len() as u32))
                .context("core main() trapped")?;
        }

        self.start_frame_pump();
        Ok(())
    }

    fn fs(&self) -> Arc<dyn CoreFileSystem> {
        self.fs.clone()
    }

    fn is_runtime_initialized(&self) -> bool {
        // Instantiation runs the module's start section synchronously.
        true
    }

    fn set_canvas_size(&self, width: u32, height: u32) {
        if let Some(resize) = &self.resize_fn
            && let Err(e) = resize.call(&mut *self.lock(), (width, height))
        {
            tracing::warn!(error = %e, width, height, "core resize() trapped");
        }
    }

    fn exit(&self, code: i32) -> Result<()> {
        tracing::debug!(code, "stopping core");
        self.exited.store(true, Ordering::SeqCst);
        self.stop_frame_pump();
        Ok(())
    }

    fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    fn call_method(&self, name: &str) -> Result<()> {
        let method = self
            .methods
            .get(name)
            .with_context(|| format!("core has no method {}", name))?;
        method
            .call(&mut *self.lock(), ())
            .with_context(|| format!("core {}() trapped", name))
    }
}

/// Compiles and instantiates wasm cores.
///
/// Only the wasm half of a core is used; the script half is carried for
/// loaders that host a script runtime.
pub struct WasmCoreLoader {
    engine: WasmEngine,
    memory_limit: usize,
    frame_interval: Duration,
}

impl WasmCoreLoader {
    pub fn new() -> Result<Self> {
        Ok(Self {
            engine: WasmEngine::new()?,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            frame_interval: DEFAULT_FRAME_INTERVAL,
        })
    }

    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = limit;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Instantiate a core, returning the concrete handle.
    pub async fn load_core(&self, core: &ResolvedCore, config: ModuleConfig) -> Result<Arc<WasmCore>> {
        config.run_dependencies.add();
        let result = self.instantiate(core, &config).await;
        config.run_dependencies.remove();
        result
    }

    async fn instantiate(&self, core: &ResolvedCore, config: &ModuleConfig) -> Result<Arc<WasmCore>> {
        let bytes = core
            .wasm
            .load()
            .await
            .with_context(|| format!("Failed to read core binary {}", core.wasm.name()))?;
        tracing::debug!(
            core = %core.name,
            wasm = core.wasm.name(),
            js = core.js.name(),
            bytes = bytes.len(),
            "compiling core"
        );

        let module = self.engine.load_module(&bytes)?;
        WasmEngine::validate_module_memory(&module, self.memory_limit)?;

        let mut linker = Linker::new(self.engine.engine());
        host::register(&mut linker)?;

        let fs = Arc::new(MemFs::new());
        let state = HostState::new(config.clone(), fs.clone(), self.memory_limit);
        let exited = state.exited.clone();
        let mut store = Store::new(self.engine.engine(), state);
        store.limiter(|state| &mut state.limits);

        let instance = linker
            .instantiate(&mut store, &module)
            .context("Failed to instantiate core")?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .context("core exports no memory")?;
        store.data_mut().memory = Some(memory);

        let alloc_fn = instance
            .get_typed_func::<u32, u32>(&mut store, "alloc")
            .context("core exports no alloc()")?;
        let main_fn = instance
            .get_typed_func::<(u32, u32), ()>(&mut store, "main")
            .context("core exports no main()")?;

        let frame_fn = instance.get_typed_func::<(), ()>(&mut store, "frame").ok();
        let resize_fn = instance
            .get_typed_func::<(u32, u32), ()>(&mut store, "resize")
            .ok();
        let on_key_fn = instance
            .get_typed_func::<(u32, u32), ()>(&mut store, "on_key")
            .ok();
        let on_gamepad_fn = instance
            .get_typed_func::<u32, ()>(&mut store, "on_gamepad")
            .ok();

        let mut methods = HashMap::new();
        for (_, method) in DIRECT_METHODS {
            if let Ok(func) = instance.get_typed_func::<(), ()>(&mut store, method) {
                methods.insert(*method, func);
            }
        }

        let wasm_core = Arc::new_cyclic(|this| WasmCore {
            store: Mutex::new(store),
            alloc_fn,
            main_fn,
            frame_fn,
            resize_fn,
            on_key_fn,
            on_gamepad_fn,
            methods,
            fs,
            exited,
            frame_interval: self.frame_interval,
            pump: Mutex::new(None),
            this: this.clone(),
        });
        wasm_core.register_handlers(&config.handlers);

        tracing::info!(
            core = %core.name,
            direct_methods = wasm_core.methods.len(),
            "core instantiated"
        );
        Ok(wasm_core)
    }
}

impl CoreLoader for WasmCoreLoader {
    fn load<'a>(
        &'a self,
        core: &'a ResolvedCore,
        config: ModuleConfig,
    ) -> BoxFuture<'a, Result<Arc<dyn CoreModule>>> {
        async move {
            let core: Arc<dyn CoreModule> = self.load_core(core, config).await?;
            Ok(core)
        }
        .boxed()
    }
}
