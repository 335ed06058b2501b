//! Wasm core host
//!
//! Compiles a core's wasm binary with wasmtime, links the `env` host
//! functions in [`host`] and adapts the instance to [`CoreModule`].
//!
//! [`CoreModule`]: crate::module::CoreModule

mod engine;
pub mod host;
mod instance;


pub use engine::WasmEngine;
pub use instance::{DEFAULT_FRAME_INTERVAL, DEFAULT_MEMORY_LIMIT, WasmCore, WasmCoreLoader};
