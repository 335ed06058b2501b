//! Launch options and their resolved form
//!
//! [`LaunchOptions`] is what callers pass in: every field optional, inputs
//! still in descriptor form. [`resolve_options`] turns it into
//! [`RuntimeOptions`], where every file is a [`ResolvableInput`] and every
//! default has been filled in.

pub mod cache;
pub mod defaults;
pub mod global;
mod resolver;

pub use cache::{Field, clear_cache};
pub use resolver::resolve_options;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use retrolaunch_shared::ConfigMap;
use serde::{Deserialize, Serialize};

use crate::abort::AbortSignal;
use crate::input::{InputDescriptor, ResolvableInput};
use crate::module::CoreLoader;
use crate::surface::{Document, Size, Surface};
use crate::vfs::PollConfig;

/// Async callback run around launch.
pub type Hook = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
/// Resolves once the user has interacted with the page.
pub type Gate = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;
/// Turns a core id into its script and binary.
pub type CoreResolver = Arc<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<CoreFiles>> + Send + Sync>;
/// Turns a content, firmware or shader name into zero or more descriptors.
pub type InputResolver =
    Arc<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<Vec<InputDescriptor>>> + Send + Sync>;

pub fn hook<F, Fut>(f: F) -> Hook
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

pub fn gate<F, Fut>(f: F) -> Gate
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

pub fn core_resolver<F, Fut>(f: F) -> CoreResolver
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<CoreFiles>> + Send + 'static,
{
    Arc::new(move |name| f(name).boxed())
}

pub fn input_resolver<F, Fut>(f: F) -> InputResolver
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<InputDescriptor>>> + Send + 'static,
{
    Arc::new(move |name| f(name).boxed())
}

/// Script and binary halves of a core, unresolved.
#[derive(Debug, Clone)]
pub struct CoreFiles {
    pub js: InputDescriptor,
    pub wasm: InputDescriptor,
}

/// How a launch names its core.
#[derive(Debug, Clone)]
pub enum CoreSource {
    /// A core id such as `fceumm`, or a path/URL to the core binary
    Id(String),
    Explicit {
        name: String,
        js: InputDescriptor,
        wasm: InputDescriptor,
    },
}

impl From<&str> for CoreSource {
    fn from(id: &str) -> Self {
        CoreSource::Id(id.to_string())
    }
}

impl From<String> for CoreSource {
    fn from(id: String) -> Self {
        CoreSource::Id(id)
    }
}

/// A core with both halves resolved.
#[derive(Debug, Clone)]
pub struct ResolvedCore {
    pub name: String,
    pub js: ResolvableInput,
    pub wasm: ResolvableInput,
}

/// Where the surface comes from.
#[derive(Clone)]
pub enum ElementSource {
    Existing(Arc<Surface>),
    /// Looked up in the document; must name a surface
    Id(String),
}

/// Per-field switches for the identity cache. Unset means disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    pub core: Option<bool>,
    pub rom: Option<bool>,
    pub bios: Option<bool>,
    pub shader: Option<bool>,
    pub state: Option<bool>,
    pub sram: Option<bool>,
}

impl CacheOptions {
    /// Every field enabled.
    pub fn all() -> Self {
        Self::uniform(true)
    }

    /// Every field disabled.
    pub fn none() -> Self {
        Self::uniform(false)
    }

    fn uniform(on: bool) -> Self {
        Self {
            core: Some(on),
            rom: Some(on),
            bios: Some(on),
            shader: Some(on),
            state: Some(on),
            sram: Some(on),
        }
    }

    pub fn enabled(&self, field: Field) -> bool {
        let flag = match field {
            Field::Core => self.core,
            Field::Rom => self.rom,
            Field::Bios => self.bios,
            Field::Shader => self.shader,
            Field::State => self.state,
            Field::Sram => self.sram,
        };
        flag.unwrap_or(false)
    }

    /// Fields set in `over` win.
    pub fn merge(self, over: Self) -> Self {
        Self {
            core: over.core.or(self.core),
            rom: over.rom.or(self.rom),
            bios: over.bios.or(self.bios),
            shader: over.shader.or(self.shader),
            state: over.state.or(self.state),
            sram: over.sram.or(self.sram),
        }
    }
}

/// A launch request. Every field is optional and layered over the global
/// configuration with [`LaunchOptions::merge`].
#[derive(Clone, Default)]
pub struct LaunchOptions {
    pub core: Option<CoreSource>,
    pub rom: Vec<InputDescriptor>,
    pub bios: Vec<InputDescriptor>,
    pub shader: Vec<InputDescriptor>,
    pub state: Option<InputDescriptor>,
    pub sram: Option<InputDescriptor>,
    pub retroarch_config: ConfigMap,
    pub retroarch_core_config: ConfigMap,
    pub element: Option<ElementSource>,
    pub size: Option<Size>,
    pub cache: CacheOptions,
    pub respond_to_global_events: Option<bool>,
    pub signal: Option<AbortSignal>,
    pub before_launch: Option<Hook>,
    pub on_launch: Option<Hook>,
    pub wait_for_interaction: Option<Gate>,
    pub resolve_core: Option<CoreResolver>,
    pub resolve_rom: Option<InputResolver>,
    pub resolve_bios: Option<InputResolver>,
    pub resolve_shader: Option<InputResolver>,
    pub loader: Option<Arc<dyn CoreLoader>>,
    pub document: Option<Arc<Document>>,
    pub poll: Option<PollConfig>,
    pub client: Option<reqwest::Client>,
}

impl fmt::Debug for LaunchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchOptions")
            .field("core", &self.core)
            .field("rom", &self.rom)
            .field("bios", &self.bios)
            .field("shader", &self.shader)
            .field("state", &self.state)
            .field("sram", &self.sram)
            .field("retroarch_config", &self.retroarch_config)
            .field("retroarch_core_config", &self.retroarch_core_config)
            .field("size", &self.size)
            .field("cache", &self.cache)
            .field("respond_to_global_events", &self.respond_to_global_events)
            .finish_non_exhaustive()
    }
}

fn merge_map(mut base: ConfigMap, over: ConfigMap) -> ConfigMap {
    base.extend(over);
    base
}

fn concat<T>(mut base: Vec<T>, over: Vec<T>) -> Vec<T> {
    base.extend(over);
    base
}

impl LaunchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer `over` on top of `self`.
    ///
    /// Lists concatenate (self first), config maps merge key by key and every
    /// scalar set in `over` wins.
    pub fn merge(self, over: LaunchOptions) -> LaunchOptions {
        LaunchOptions {
            core: over.core.or(self.core),
            rom: concat(self.rom, over.rom),
            bios: concat(self.bios, over.bios),
            shader: concat(self.shader, over.shader),
            state: over.state.or(self.state),
            sram: over.sram.or(self.sram),
            retroarch_config: merge_map(self.retroarch_config, over.retroarch_config),
            retroarch_core_config: merge_map(self.retroarch_core_config, over.retroarch_core_config),
            element: over.element.or(self.element),
            size: over.size.or(self.size),
            cache: self.cache.merge(over.cache),
            respond_to_global_events: over.respond_to_global_events.or(self.respond_to_global_events),
            signal: over.signal.or(self.signal),
            before_launch: over.before_launch.or(self.before_launch),
            on_launch: over.on_launch.or(self.on_launch),
            wait_for_interaction: over.wait_for_interaction.or(self.wait_for_interaction),
            resolve_core: over.resolve_core.or(self.resolve_core),
            resolve_rom: over.resolve_rom.or(self.resolve_rom),
            resolve_bios: over.resolve_bios.or(self.resolve_bios),
            resolve_shader: over.resolve_shader.or(self.resolve_shader),
            loader: over.loader.or(self.loader),
            document: over.document.or(self.document),
            poll: over.poll.or(self.poll),
            client: over.client.or(self.client),
        }
    }

    pub fn core(mut self, core: impl Into<CoreSource>) -> Self {
        self.core = Some(core.into());
        self
    }

    pub fn rom(mut self, rom: impl Into<InputDescriptor>) -> Self {
        self.rom.push(rom.into());
        self
    }

    pub fn bios(mut self, bios: impl Into<InputDescriptor>) -> Self {
        self.bios.push(bios.into());
        self
    }

    pub fn shader(mut self, shader: impl Into<InputDescriptor>) -> Self {
        self.shader.push(shader.into());
        self
    }

    pub fn state(mut self, state: impl Into<InputDescriptor>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn sram(mut self, sram: impl Into<InputDescriptor>) -> Self {
        self.sram = Some(sram.into());
        self
    }

    pub fn loader(mut self, loader: Arc<dyn CoreLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// Launch options with every input resolved and every default applied.
#[derive(Clone)]
pub struct RuntimeOptions {
    pub core: ResolvedCore,
    pub rom: Vec<ResolvableInput>,
    pub bios: Vec<ResolvableInput>,
    pub shader: Vec<ResolvableInput>,
    pub state: Option<ResolvableInput>,
    pub sram: Option<ResolvableInput>,
    pub retroarch_config: ConfigMap,
    pub retroarch_core_config: ConfigMap,
    pub surface: Arc<Surface>,
    pub document: Arc<Document>,
    pub size: Option<Size>,
    pub respond_to_global_events: bool,
    pub signal: Option<AbortSignal>,
    pub before_launch: Option<Hook>,
    pub on_launch: Option<Hook>,
    pub wait_for_interaction: Option<Gate>,
    pub loader: Arc<dyn CoreLoader>,
    pub poll: PollConfig,
}

impl fmt::Debug for RuntimeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeOptions")
            .field("core", &self.core)
            .field("rom", &self.rom)
            .field("bios", &self.bios)
            .field("shader", &self.shader)
            .field("state", &self.state)
            .field("sram", &self.sram)
            .field("retroarch_config", &self.retroarch_config)
            .field("retroarch_core_config", &self.retroarch_core_config)
            .field("size", &self.size)
            .field("respond_to_global_events", &self.respond_to_global_events)
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}
