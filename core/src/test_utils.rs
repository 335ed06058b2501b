//! Shared test utilities for integration and unit tests

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use retrolaunch_shared::{core_full_name, ini, layout};
use tokio::task::JoinHandle;

use crate::controller::commands;
use crate::input::Blob;
use crate::module::{CoreLoader, CoreModule, ModuleConfig};
use crate::options::{CacheOptions, CoreSource, LaunchOptions, ResolvedCore};
use crate::surface::{Document, EventKind, HostEvent, Size, Surface};
use crate::vfs::{CoreFileSystem, MemFs, PollConfig};

/// Canvas size the mock core asks for while starting.
pub const MOCK_PREFERRED_SIZE: Size = Size::new(1024, 768);

/// Delay before the mock core's output files appear.
const OUTPUT_DELAY: Duration = Duration::from_millis(3);

/// Polling tuned for in-memory cores.
pub fn fast_poll() -> PollConfig {
    PollConfig {
        ready_interval: Duration::from_millis(1),
        ready_timeout: Duration::from_secs(2),
        initial_interval: Duration::from_millis(1),
        max_interval: Duration::from_millis(4),
        max_retries: 200,
    }
}

/// Launch options for an `fceumm` mock core with every cache disabled.
pub fn test_options() -> LaunchOptions {
    LaunchOptions {
        core: Some(CoreSource::Explicit {
            name: "fceumm".to_string(),
            js: Blob::named("fceumm_libretro.js", b"// core".to_vec()).into(),
            wasm: Blob::named("fceumm_libretro.wasm", b"\0asm".to_vec()).into(),
        }),
        loader: Some(Arc::new(MockLoader::new())),
        poll: Some(fast_poll()),
        cache: CacheOptions::none(),
        ..LaunchOptions::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

// ============================================================================
// Mock Core
// ============================================================================

/// How a command reached the mock core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Direct,
    Queue,
}

/// A scripted core that behaves like a frontend running one piece of content.
///
/// Its whole emulated state is a counter. Output files (states, battery
/// saves, screenshots) appear a few milliseconds after the command that asks
/// for them, the way a real core writes them from its own loop.
pub struct MockCore {
    name: String,
    config: ModuleConfig,
    memfs: Arc<MemFs>,
    fs: Arc<dyn CoreFileSystem>,
    initialized: AtomicBool,
    direct_methods: bool,
    exited: AtomicBool,
    exit_code: Mutex<Option<i32>>,
    counter: AtomicU32,
    paused: AtomicBool,
    args: Mutex<Option<Vec<String>>>,
    commands: Mutex<Vec<(Channel, String)>>,
    keys: Mutex<Vec<HostEvent>>,
    gamepads: Mutex<Vec<u32>>,
    canvas: Mutex<Option<Size>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    this: Weak<MockCore>,
}

impl MockCore {
    pub fn new(name: &str) -> Arc<Self> {
        let config = ModuleConfig::new(name, Surface::new(), Document::new());
        Self::build(name, config, None, false)
    }

    /// A mock core whose filesystem is `fs` instead of a fresh [`MemFs`].
    pub fn with_fs(name: &str, fs: Arc<dyn CoreFileSystem>) -> Arc<Self> {
        let config = ModuleConfig::new(name, Surface::new(), Document::new());
        Self::build(name, config, Some(fs), false)
    }

    fn build(
        name: &str,
        config: ModuleConfig,
        fs: Option<Arc<dyn CoreFileSystem>>,
        direct_methods: bool,
    ) -> Arc<Self> {
        let memfs = Arc::new(MemFs::new());
        let fs: Arc<dyn CoreFileSystem> = match fs {
            Some(fs) => fs,
            None => memfs.clone(),
        };
        Arc::new_cyclic(|this| Self {
            name: name.to_string(),
            config,
            memfs,
            fs,
            initialized: AtomicBool::new(true),
            direct_methods,
            exited: AtomicBool::new(false),
            exit_code: Mutex::new(None),
            counter: AtomicU32::new(0),
            paused: AtomicBool::new(false),
            args: Mutex::new(None),
            commands: Mutex::new(Vec::new()),
            keys: Mutex::new(Vec::new()),
            gamepads: Mutex::new(Vec::new()),
            canvas: Mutex::new(None),
            pump: Mutex::new(None),
            this: this.clone(),
        })
    }

    /// The in-memory filesystem (unused when built with [`MockCore::with_fs`]).
    pub fn memfs(&self) -> Arc<MemFs> {
        self.memfs.clone()
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.initialized.store(initialized, Ordering::SeqCst);
    }

    pub fn counter(&self) -> u32 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Advance the emulated state.
    pub fn tick(&self, frames: u32) {
        self.counter.fetch_add(frames, Ordering::SeqCst);
    }

    pub fn set_counter(&self, value: u32) {
        self.counter.store(value, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn args(&self) -> Option<Vec<String>> {
        lock(&self.args).clone()
    }

    pub fn commands(&self) -> Vec<(Channel, String)> {
        lock(&self.commands).clone()
    }

    pub fn keys(&self) -> Vec<HostEvent> {
        lock(&self.keys).clone()
    }

    pub fn gamepads(&self) -> Vec<u32> {
        lock(&self.gamepads).clone()
    }

    pub fn canvas_size(&self) -> Option<Size> {
        *lock(&self.canvas)
    }

    pub fn exit_code(&self) -> Option<i32> {
        *lock(&self.exit_code)
    }

    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    pub fn module_config(&self) -> &ModuleConfig {
        &self.config
    }

    /// Wait until the mock has handled `count` commands.
    pub async fn wait_for_commands(&self, count: usize) {
        for _ in 0..2000 {
            if lock(&self.commands).len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    fn register_handlers(&self) {
        for kind in [EventKind::KeyDown, EventKind::KeyUp] {
            let core = self.this.clone();
            self.config.handlers.register(
                kind,
                Arc::new(move |event: &HostEvent| {
                    if let Some(core) = core.upgrade() {
                        lock(&core.keys).push(event.clone());
                    }
                }),
            );
        }
        let core = self.this.clone();
        self.config.handlers.register(
            EventKind::GamepadConnected,
            Arc::new(move |event: &HostEvent| {
                if let (Some(core), HostEvent::GamepadConnected { gamepad }) = (core.upgrade(), event) {
                    lock(&core.gamepads).push(gamepad.index);
                }
            }),
        );
    }

    /// Base name of the content passed to main, if any.
    fn content_base_name(&self) -> Option<String> {
        let args = lock(&self.args).clone()?;
        let content = args.first()?.strip_prefix(layout::CONTENT_DIR)?;
        let file = content.trim_start_matches('/');
        let base = file.rsplit_once('.').map_or(file, |(base, _)| base);
        Some(base.to_string())
    }

    fn thumbnails_enabled(&self) -> bool {
        self.fs
            .read_file(layout::CONFIG_PATH)
            .map(|config| ini::parse(&String::from_utf8_lossy(&config)))
            .is_ok_and(|config| {
                config
                    .get("savestate_thumbnail_enable")
                    .is_some_and(|value| value == "true")
            })
    }

    fn state_bytes(&self) -> Vec<u8> {
        let mut state = b"MOCKSTATE".to_vec();
        state.extend_from_slice(&self.counter().to_le_bytes());
        state
    }

    fn handle(&self, channel: Channel, command: &str) {
        lock(&self.commands).push((channel, command.to_string()));

        let paths = core_full_name(&self.name).zip(self.content_base_name());
        match (command, paths) {
            (commands::PAUSE_TOGGLE, _) => {
                self.paused.fetch_xor(true, Ordering::SeqCst);
            }
            (commands::RESET, _) => self.set_counter(0),
            (commands::SAVE_STATE, Some((full_name, base))) => {
                let mut outputs = vec![(layout::state_path(full_name, &base), self.state_bytes())];
                if self.thumbnails_enabled() {
                    outputs.push((
                        layout::state_thumbnail_path(full_name, &base),
                        b"\x89PNGthumb".to_vec(),
                    ));
                }
                self.write_later(outputs);
            }
            (commands::LOAD_STATE, Some((full_name, base))) => {
                if let Ok(state) = self.fs.read_file(&layout::state_path(full_name, &base))
                    && let Some(counter) = state.strip_prefix(b"MOCKSTATE")
                    && let Ok(counter) = <[u8; 4]>::try_from(counter)
                {
                    self.set_counter(u32::from_le_bytes(counter));
                }
            }
            (commands::SAVE_FILES, Some((full_name, base))) => {
                let mut sram = b"SRAM".to_vec();
                sram.extend_from_slice(&self.counter().to_le_bytes());
                self.write_later(vec![(layout::sram_path(full_name, &base), sram)]);
            }
            (commands::SCREENSHOT, Some((_, base))) => {
                let file_name = layout::screenshot_file_name(&base, &chrono::Local::now());
                self.write_later(vec![(
                    layout::screenshot_path(&file_name),
                    b"\x89PNGscreen".to_vec(),
                )]);
            }
            _ => {}
        }
    }

    fn write_later(&self, outputs: Vec<(String, Vec<u8>)>) {
        let fs = self.fs.clone();
        let write = move || {
            for (path, data) in outputs {
                let _ = crate::vfs::mkdir_tree(fs.as_ref(), layout::parent(&path));
                let _ = fs.write_file(&path, &data);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::time::sleep(OUTPUT_DELAY).await;
                    write();
                });
            }
            Err(_) => write(),
        }
    }

    /// Read the command queue the way a core's stdin callback would.
    fn start_pump(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let weak = self.this.clone();
        let task = runtime.spawn(async move {
            let mut line = Vec::new();
            loop {
                tokio::time::sleep(Duration::from_millis(1)).await;
                let Some(core) = weak.upgrade() else {
                    break;
                };
                if core.has_exited() {
                    break;
                }
                while let Some(byte) = core.config.commands.next_byte() {
                    if byte == b'\n' {
                        let command = String::from_utf8_lossy(&line).into_owned();
                        core.handle(Channel::Queue, &command);
                        line.clear();
                    } else {
                        line.push(byte);
                    }
                }
            }
        });
        if let Some(previous) = lock(&self.pump).replace(task) {
            previous.abort();
        }
    }
}

impl Drop for MockCore {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.pump).take() {
            task.abort();
        }
    }
}

impl CoreModule for MockCore {
    fn call_main(&self, args: &[String]) -> anyhow::Result<()> {
        *lock(&self.args) = Some(args.to_vec());
        self.config.surface.set_size(MOCK_PREFERRED_SIZE);
        self.start_pump();
        Ok(())
    }

    fn fs(&self) -> Arc<dyn CoreFileSystem> {
        self.fs.clone()
    }

    fn is_runtime_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn set_canvas_size(&self, width: u32, height: u32) {
        *lock(&self.canvas) = Some(Size::new(width, height));
    }

    fn exit(&self, code: i32) -> anyhow::Result<()> {
        *lock(&self.exit_code) = Some(code);
        self.exited.store(true, Ordering::SeqCst);
        if let Some(task) = lock(&self.pump).take() {
            task.abort();
        }
        Ok(())
    }

    fn has_method(&self, name: &str) -> bool {
        self.direct_methods && commands::command_for(name).is_some()
    }

    fn call_method(&self, name: &str) -> anyhow::Result<()> {
        let command = commands::command_for(name)
            .filter(|_| self.direct_methods)
            .ok_or_else(|| anyhow::anyhow!("mock core has no method {}", name))?;
        self.handle(Channel::Direct, command);
        Ok(())
    }
}

// ============================================================================
// Mock Loader
// ============================================================================

/// Loader producing [`MockCore`]s and remembering each one.
#[derive(Default)]
pub struct MockLoader {
    direct_methods: bool,
    loaded: Mutex<Vec<Arc<MockCore>>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cores from this loader export every direct method.
    pub fn with_direct_methods() -> Self {
        Self {
            direct_methods: true,
            ..Self::default()
        }
    }

    pub fn last(&self) -> Option<Arc<MockCore>> {
        lock(&self.loaded).last().cloned()
    }

    pub fn load_count(&self) -> usize {
        lock(&self.loaded).len()
    }
}

impl CoreLoader for MockLoader {
    fn load<'a>(
        &'a self,
        core: &'a ResolvedCore,
        config: ModuleConfig,
    ) -> BoxFuture<'a, anyhow::Result<Arc<dyn CoreModule>>> {
        async move {
            core.wasm.load().await?;
            let mock = MockCore::build(&core.name, config, None, self.direct_methods);
            mock.register_handlers();
            lock(&self.loaded).push(mock.clone());
            let module: Arc<dyn CoreModule> = mock;
            Ok(module)
        }
        .boxed()
    }
}
