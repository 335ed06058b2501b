//! Retrolaunch Core - runtime orchestration for sandboxed emulator cores
//!
//! This crate turns a loosely specified launch request into a running core
//! and then drives that core from the outside.
//!
//! # Architecture
//!
//! - [`ResolvableInput`] - One named file from any supported source, read at most once
//! - [`resolve_options`] - Launch request → fully resolved [`RuntimeOptions`], with an identity cache
//! - [`VirtualFileSystemBridge`] - Writes into and polls the core's private filesystem
//! - [`RuntimeController`] - Setup, launch and every post-launch command
//! - [`WasmCoreLoader`] - Native host that runs wasm builds of the cores

pub mod abort;
pub mod controller;
pub mod error;
pub mod input;
#[cfg(test)]
mod integration;
pub mod launcher;
pub mod module;
pub mod options;
pub mod surface;
#[cfg(test)]
pub mod test_utils;
pub mod vfs;
pub mod wasm;

pub use abort::AbortSignal;
pub use controller::{RuntimeController, SavedState, Status};
pub use error::{Error, Result};
pub use input::{Blob, FetchRequest, InputDescriptor, ResolvableInput, ResolveContext};
pub use launcher::{
    clear_cache, configure, gb, gba, launch, megadrive, nes, reset_to_default, snes,
};
pub use module::{CoreLoader, CoreModule, ModuleConfig};
pub use options::{
    CacheOptions, CoreFiles, CoreSource, ElementSource, LaunchOptions, ResolvedCore,
    RuntimeOptions, resolve_options,
};
pub use surface::{Document, Gamepad, HostEvent, Size, Surface};
pub use vfs::{CoreFileSystem, FsError, MemFs, PollConfig, VirtualFileSystemBridge};
pub use wasm::{WasmCore, WasmCoreLoader};

pub use retrolaunch_shared::{ConfigMap, ConfigValue};
