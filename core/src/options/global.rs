//! Process-wide launch configuration
//!
//! Every launch is layered over whatever is stored here at call time.

use std::sync::{LazyLock, RwLock};

use super::LaunchOptions;
use super::defaults::launch_defaults;

static GLOBAL: LazyLock<RwLock<LaunchOptions>> = LazyLock::new(|| RwLock::new(launch_defaults()));

/// Snapshot of the current global configuration.
pub fn get() -> LaunchOptions {
    GLOBAL.read().unwrap_or_else(|p| p.into_inner()).clone()
}

/// Edit the global configuration in place.
pub fn update(configure: impl FnOnce(&mut LaunchOptions)) {
    let mut global = GLOBAL.write().unwrap_or_else(|p| p.into_inner());
    configure(&mut global);
}

/// Merge `options` into the global configuration.
pub fn configure(options: LaunchOptions) {
    update(|global| {
        let current = std::mem::take(global);
        *global = current.merge(options);
    });
    tracing::debug!("global launch configuration updated");
}

/// Restore the built-in defaults.
pub fn reset_to_default() {
    update(|global| *global = launch_defaults());
    tracing::debug!("global launch configuration reset");
}

/// Serializes tests that touch the global configuration.
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|p| p.into_inner())
}
