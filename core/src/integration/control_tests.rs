//! Commands, state capture and scripted input on a running core

use retrolaunch_shared::layout;

use super::test_utils::*;
use crate::controller::{Status, commands};
use crate::input::Blob;
use crate::surface::HostEvent;
use crate::test_utils::{Channel, MockLoader};
use crate::vfs::CoreFileSystem;

#[tokio::test]
async fn test_save_load_save_round_trips_state() {
    let (controller, core) = launch_with(game_options(), MockLoader::new()).await;
    core.tick(41);

    let first = controller.save_state().await.unwrap();
    assert_eq!(first.state, state_bytes(41));
    assert_eq!(first.thumbnail, None);

    core.tick(100);
    controller.load_state(first.state.clone()).await.unwrap();
    core.wait_for_commands(2).await;
    assert_eq!(core.counter(), 41);

    let second = controller.save_state().await.unwrap();
    assert_eq!(second, first);

    // Captures never linger in the core's filesystem
    let state_path = layout::state_path("FCEUmm", "game");
    core.wait_for_commands(3).await;
    assert!(!core.memfs().exists(&state_path));
}

#[tokio::test]
async fn test_thumbnail_is_captured_when_enabled() {
    let mut options = game_options();
    options
        .retroarch_config
        .insert("savestate_thumbnail_enable".into(), true.into());

    let (controller, core) = launch_with(options, MockLoader::new()).await;
    core.tick(3);

    let saved = controller.save_state().await.unwrap();

    assert_eq!(saved.state, state_bytes(3));
    assert_eq!(saved.thumbnail.as_deref(), Some(&b"\x89PNGthumb"[..]));
    assert!(!core.memfs().exists(&layout::state_thumbnail_path("FCEUmm", "game")));
}

#[tokio::test]
async fn test_initial_state_is_loaded_on_launch() {
    let options = game_options().state(Blob::named("resume.state", state_bytes(7)));

    let (_controller, core) = launch_with(options, MockLoader::new()).await;
    core.wait_for_commands(1).await;

    assert_eq!(
        core.commands(),
        vec![(Channel::Queue, commands::LOAD_STATE.to_string())]
    );
    assert_eq!(core.counter(), 7);
}

#[tokio::test]
async fn test_load_state_clears_a_stale_thumbnail() {
    let (controller, core) = launch_with(game_options(), MockLoader::new()).await;
    controller.load_state(state_bytes(1)).await.unwrap();

    let thumbnail = layout::state_thumbnail_path("FCEUmm", "game");
    core.memfs().write_file(&thumbnail, b"\x89PNGstale").unwrap();

    controller.load_state(state_bytes(2)).await.unwrap();
    core.wait_for_commands(2).await;

    assert!(!core.memfs().exists(&thumbnail));
    assert_eq!(core.counter(), 2);
}

#[tokio::test]
async fn test_save_sram_returns_the_flushed_file() {
    let (controller, core) = launch_with(game_options(), MockLoader::new()).await;
    core.tick(5);

    let sram = controller.save_sram().await.unwrap();

    let mut expected = b"SRAM".to_vec();
    expected.extend_from_slice(&5u32.to_le_bytes());
    assert_eq!(sram, expected);
}

#[tokio::test]
async fn test_screenshot_returns_png_and_cleans_up() {
    let (controller, core) = launch_with(game_options(), MockLoader::with_direct_methods()).await;

    let png = controller.screenshot().await.unwrap();

    assert_eq!(png, b"\x89PNGscreen");
    assert!(core.memfs().list(layout::SCREENSHOT_DIR).is_empty());
}

#[tokio::test]
async fn test_pause_and_resume_toggle_once_per_transition() {
    let (controller, core) = launch_with(game_options(), MockLoader::new()).await;

    controller.pause().unwrap();
    controller.pause().unwrap();
    assert_eq!(controller.status(), Status::Paused);
    controller.resume().unwrap();
    controller.resume().unwrap();
    assert_eq!(controller.status(), Status::Running);

    controller.pause().unwrap();
    controller.restart().unwrap();
    assert_eq!(controller.status(), Status::Running);

    core.wait_for_commands(5).await;
    let sent: Vec<String> = core.commands().into_iter().map(|(_, c)| c).collect();
    assert_eq!(
        sent,
        [
            commands::PAUSE_TOGGLE,
            commands::PAUSE_TOGGLE,
            commands::PAUSE_TOGGLE,
            commands::PAUSE_TOGGLE,
            commands::RESET,
        ]
    );
    assert!(!core.is_paused());
}

#[tokio::test]
async fn test_restart_resets_emulation() {
    let (controller, core) = launch_with(game_options(), MockLoader::with_direct_methods()).await;
    core.tick(9);

    controller.restart().unwrap();

    assert_eq!(core.counter(), 0);
    assert_eq!(controller.status(), Status::Running);
}

#[tokio::test]
async fn test_direct_methods_are_preferred() {
    let (controller, core) = launch_with(game_options(), MockLoader::with_direct_methods()).await;

    controller.send_command(commands::MENU_TOGGLE).unwrap();
    controller.send_command("FAST_FORWARD").unwrap();

    // The direct call lands synchronously; the unknown command goes through the queue
    assert_eq!(
        core.commands(),
        vec![(Channel::Direct, commands::MENU_TOGGLE.to_string())]
    );
    core.wait_for_commands(2).await;
    assert_eq!(
        core.commands()[1],
        (Channel::Queue, "FAST_FORWARD".to_string())
    );
}

#[tokio::test]
async fn test_queue_is_used_without_direct_methods() {
    let (controller, core) = launch_with(game_options(), MockLoader::new()).await;

    controller.send_command(commands::SAVE_FILES).unwrap();
    controller.send_command(commands::MENU_TOGGLE).unwrap();
    core.wait_for_commands(2).await;

    assert_eq!(
        core.commands(),
        vec![
            (Channel::Queue, commands::SAVE_FILES.to_string()),
            (Channel::Queue, commands::MENU_TOGGLE.to_string()),
        ]
    );
}

#[tokio::test]
async fn test_press_uses_the_configured_binding() {
    let mut options = game_options();
    options.retroarch_config.insert("input_player1_a".into(), "x".into());
    options.retroarch_config.insert("input_player1_start".into(), "enter".into());
    options.retroarch_config.insert("input_player1_l2".into(), "nul".into());

    let (controller, core) = launch_with(options, MockLoader::new()).await;

    controller.press("a", 1).await.unwrap();
    assert_eq!(
        core.keys(),
        vec![
            HostEvent::KeyDown { key_code: 88 },
            HostEvent::KeyUp { key_code: 88 },
        ]
    );

    controller.press_down("start", 1).unwrap();
    controller.press_up("start", 1).unwrap();
    assert_eq!(
        core.keys()[2..],
        [
            HostEvent::KeyDown { key_code: 13 },
            HostEvent::KeyUp { key_code: 13 },
        ]
    );

    // Unbound and absent buttons do nothing
    controller.press("l2", 1).await.unwrap();
    controller.press_down("a", 2).unwrap();
    assert_eq!(core.keys().len(), 4);
}

#[tokio::test]
async fn test_press_reads_bindings_from_the_live_config_file() {
    let (controller, core) = launch_with(game_options(), MockLoader::new()).await;

    // The core rewrites its config on its own; the host must follow the file
    core.memfs()
        .write_file(
            layout::CONFIG_PATH,
            b"input_player1_a = \"f5\"\ninput_player1_b = \"keypad3\"\n",
        )
        .unwrap();

    controller.press("a", 1).await.unwrap();
    controller.press_down("b", 1).unwrap();

    assert_eq!(
        core.keys(),
        vec![
            HostEvent::KeyDown { key_code: 116 },
            HostEvent::KeyUp { key_code: 116 },
            HostEvent::KeyDown { key_code: 99 },
        ]
    );
    assert_eq!(
        controller.options().retroarch_config["input_player1_a"].to_string(),
        "x"
    );
}
