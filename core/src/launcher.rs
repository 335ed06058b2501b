//! Top-level entry points
//!
//! [`launch`] layers a request over the global configuration, resolves it,
//! sets the core up and starts it. The per-system shortcuts only differ in
//! the core they pick when the request names none.

use crate::controller::RuntimeController;
use crate::error::Result;
use crate::options::{CoreSource, LaunchOptions, global, resolve_options};

pub use crate::options::clear_cache;
pub use crate::options::global::{configure, reset_to_default};

/// Default core per system shortcut.
pub const NES_CORE: &str = "fceumm";
pub const SNES_CORE: &str = "snes9x";
pub const GB_CORE: &str = "gambatte";
pub const GBA_CORE: &str = "mgba";
pub const MEGADRIVE_CORE: &str = "genesis_plus_gx";

/// Resolve, set up and start a core.
///
/// A failed launch shuts the core down and returns no controller.
pub async fn launch(options: LaunchOptions) -> Result<RuntimeController> {
    let options = global::get().merge(options);
    let resolved = resolve_options(options).await?;
    tracing::debug!(?resolved, "launch options resolved");

    let controller = RuntimeController::setup(resolved).await?;
    if let Err(e) = controller.launch().await {
        tracing::warn!(error = %e, "launch failed");
        controller.exit(1);
        return Err(e);
    }
    Ok(controller)
}

/// `options` with `core` filled in when the caller left it empty.
pub fn with_default_core(mut options: LaunchOptions, core: &str) -> LaunchOptions {
    if options.core.is_none() {
        options.core = Some(CoreSource::Id(core.to_string()));
    }
    options
}

pub async fn nes(options: LaunchOptions) -> Result<RuntimeController> {
    launch(with_default_core(options, NES_CORE)).await
}

pub async fn snes(options: LaunchOptions) -> Result<RuntimeController> {
    launch(with_default_core(options, SNES_CORE)).await
}

pub async fn gb(options: LaunchOptions) -> Result<RuntimeController> {
    launch(with_default_core(options, GB_CORE)).await
}

pub async fn gba(options: LaunchOptions) -> Result<RuntimeController> {
    launch(with_default_core(options, GBA_CORE)).await
}

pub async fn megadrive(options: LaunchOptions) -> Result<RuntimeController> {
    launch(with_default_core(options, MEGADRIVE_CORE)).await
}
