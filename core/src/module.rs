//! The contract between the host and a loaded emulator core
//!
//! A core is a black box. The host hands it a [`ModuleConfig`] when loading
//! it and from then on only talks to it through [`CoreModule`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::options::ResolvedCore;
use crate::surface::{Document, EventKind, HostEvent, Listener, Surface};
use crate::vfs::CoreFileSystem;

/// A loaded, instantiated core.
pub trait CoreModule: Send + Sync {
    /// Run the core's main entry. Returns once the core has started its loop.
    fn call_main(&self, args: &[String]) -> anyhow::Result<()>;

    /// The core's private filesystem.
    fn fs(&self) -> Arc<dyn CoreFileSystem>;

    /// Whether low-level runtime initialization has finished.
    fn is_runtime_initialized(&self) -> bool;

    fn set_canvas_size(&self, width: u32, height: u32);

    /// Ask the core to shut down.
    fn exit(&self, code: i32) -> anyhow::Result<()>;

    /// Whether the core exports the named direct method.
    fn has_method(&self, name: &str) -> bool;

    fn call_method(&self, name: &str) -> anyhow::Result<()>;
}

/// Instantiates cores from resolved binaries.
pub trait CoreLoader: Send + Sync {
    fn load<'a>(
        &'a self,
        core: &'a ResolvedCore,
        config: ModuleConfig,
    ) -> BoxFuture<'a, anyhow::Result<Arc<dyn CoreModule>>>;
}

/// Routes core console output into the host log.
#[derive(Debug, Clone)]
pub struct CoreOutput {
    core: String,
}

impl CoreOutput {
    pub fn new(core: impl Into<String>) -> Self {
        Self { core: core.into() }
    }

    pub fn stdout(&self, line: &str) {
        tracing::info!(target: "core", core = %self.core, "{}", line);
    }

    pub fn stderr(&self, line: &str) {
        tracing::warn!(target: "core", core = %self.core, "{}", line);
    }
}

/// Records exit requests instead of letting the core end the host process.
#[derive(Debug, Clone, Default)]
pub struct ExitRecorder {
    code: Arc<Mutex<Option<i32>>>,
}

impl ExitRecorder {
    pub fn record(&self, code: i32) {
        tracing::info!(code, "core requested exit");
        *self.code.lock().unwrap_or_else(|p| p.into_inner()) = Some(code);
    }

    /// The first or latest recorded exit code.
    pub fn code(&self) -> Option<i32> {
        *self.code.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Count of outstanding asynchronous preparation steps inside a core.
///
/// Main must not run until the count drops back to zero.
#[derive(Debug, Clone)]
pub struct RunDependencies {
    count: Arc<watch::Sender<usize>>,
}

impl Default for RunDependencies {
    fn default() -> Self {
        Self {
            count: Arc::new(watch::Sender::new(0)),
        }
    }
}

impl RunDependencies {
    pub fn add(&self) {
        self.count.send_modify(|n| *n += 1);
    }

    pub fn remove(&self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
    }

    pub fn pending(&self) -> usize {
        *self.count.borrow()
    }

    pub async fn wait_idle(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in self, so the channel cannot close while waiting.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

#[derive(Debug, Default)]
struct QueueState {
    bytes: VecDeque<u8>,
    disarmed: bool,
}

/// FIFO of command bytes read by the core's character input callback.
///
/// Written only by the controller, read one byte per poll by the core.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    state: Arc<Mutex<QueueState>>,
}

impl CommandQueue {
    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Queue `command` followed by a newline. Ignored once disarmed.
    pub fn push_command(&self, command: &str) -> bool {
        let mut state = self.lock();
        if state.disarmed {
            return false;
        }
        state.bytes.extend(command.bytes());
        state.bytes.push_back(b'\n');
        true
    }

    /// Next byte for the core, if any.
    pub fn next_byte(&self) -> Option<u8> {
        let mut state = self.lock();
        if state.disarmed {
            return None;
        }
        state.bytes.pop_front()
    }

    /// Stop serving bytes and drop whatever is still queued.
    pub fn disarm(&self) {
        let mut state = self.lock();
        state.disarmed = true;
        state.bytes.clear();
    }

    pub fn is_armed(&self) -> bool {
        !self.lock().disarmed
    }

    pub fn len(&self) -> usize {
        self.lock().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keyboard handlers a core registered, enumerable so the host can re-target
/// them and call them directly.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<Mutex<Vec<(EventKind, Listener)>>>,
}

impl HandlerRegistry {
    pub fn register(&self, kind: EventKind, handler: Listener) {
        self.handlers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((kind, handler));
    }

    pub fn handlers(&self) -> Vec<(EventKind, Listener)> {
        self.handlers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Invoke every handler registered for the event's kind.
    pub fn dispatch(&self, event: &HostEvent) -> usize {
        let matching: Vec<Listener> = self
            .handlers()
            .into_iter()
            .filter(|(kind, _)| *kind == event.kind())
            .map(|(_, handler)| handler)
            .collect();
        for handler in &matching {
            handler(event);
        }
        matching.len()
    }
}

/// Everything a core receives from the host at load time.
#[derive(Clone)]
pub struct ModuleConfig {
    pub output: CoreOutput,
    pub exit: ExitRecorder,
    pub run_dependencies: RunDependencies,
    pub commands: CommandQueue,
    pub handlers: HandlerRegistry,
    pub surface: Arc<Surface>,
    pub document: Arc<Document>,
}

impl ModuleConfig {
    pub fn new(core: &str, surface: Arc<Surface>, document: Arc<Document>) -> Self {
        Self {
            output: CoreOutput::new(core),
            exit: ExitRecorder::default(),
            run_dependencies: RunDependencies::default(),
            commands: CommandQueue::default(),
            handlers: HandlerRegistry::default(),
            surface,
            document,
        }
    }
}
