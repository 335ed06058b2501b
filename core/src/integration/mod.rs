//! End-to-end tests for the launch pipeline
//!
//! Tests resolution, setup, launch and post-launch control against the
//! scripted [`MockCore`](crate::test_utils::MockCore).

#[cfg(test)]
mod control_tests;

#[cfg(test)]
pub(crate) mod test_utils {
    use std::sync::Arc;

    use crate::controller::RuntimeController;
    use crate::input::Blob;
    use crate::options::{LaunchOptions, resolve_options};
    use crate::test_utils::{MockCore, MockLoader, test_options};

    pub const GAME: &[u8] = b"NES\x1a\x02\x01";

    /// Mock launch options carrying one ROM named `game.nes`.
    pub fn game_options() -> LaunchOptions {
        test_options().rom(Blob::named("game.nes", GAME.to_vec()))
    }

    /// Resolve and set up without launching.
    pub async fn setup_with(
        options: LaunchOptions,
        loader: MockLoader,
    ) -> (RuntimeController, Arc<MockCore>) {
        let loader = Arc::new(loader);
        let resolved = resolve_options(options.loader(loader.clone())).await.unwrap();
        let controller = RuntimeController::setup(resolved).await.unwrap();
        let core = loader.last().unwrap();
        (controller, core)
    }

    /// Resolve, set up and launch.
    pub async fn launch_with(
        options: LaunchOptions,
        loader: MockLoader,
    ) -> (RuntimeController, Arc<MockCore>) {
        let (controller, core) = setup_with(options, loader).await;
        controller.launch().await.unwrap();
        (controller, core)
    }

    pub fn state_bytes(counter: u32) -> Vec<u8> {
        let mut state = b"MOCKSTATE".to_vec();
        state.extend_from_slice(&counter.to_le_bytes());
        state
    }
}
