//! Wasmtime engine wrapper for compiling cores

use anyhow::{Context, Result};
use wasmtime::{Engine, ExternType, Module};

const WASM_PAGE_SIZE: usize = 64 * 1024;

/// Shared compilation engine (one per loader)
pub struct WasmEngine {
    engine: Engine,
}

impl WasmEngine {
    pub fn new() -> Result<Self> {
        Ok(Self {
            engine: Engine::default(),
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Compile a core binary
    pub fn load_module(&self, bytes: &[u8]) -> Result<Module> {
        Module::new(&self.engine, bytes).context("Failed to compile core module")
    }

    /// Reject cores whose exported memory starts out larger than `limit` bytes.
    ///
    /// Checked before instantiation so the error names the module instead of
    /// surfacing as a generic instantiation failure.
    pub fn validate_module_memory(module: &Module, limit: usize) -> Result<()> {
        for export in module.exports() {
            if let ExternType::Memory(mem_type) = export.ty() {
                let min_pages = mem_type.minimum();
                let min_bytes = min_pages as usize * WASM_PAGE_SIZE;

                if min_bytes > limit {
                    anyhow::bail!(
                        "Core memory '{}' needs {} bytes ({} pages) up front, \
                         above the host limit of {} bytes",
                        export.name(),
                        min_bytes,
                        min_pages,
                        limit
                    );
                }

                if mem_type.maximum().is_none() {
                    tracing::debug!(
                        "Core memory '{}' declares no maximum; growth capped at {} bytes",
                        export.name(),
                        limit
                    );
                }
            }
        }
        Ok(())
    }
}
