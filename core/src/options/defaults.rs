//! Built-in launch defaults

use std::path::PathBuf;

use retrolaunch_shared::{ConfigMap, ConfigValue, keys};
use url::Url;

use super::{CacheOptions, CoreFiles, CoreResolver, InputResolver, LaunchOptions, core_resolver, input_resolver};
use crate::input::InputDescriptor;
use crate::input::naming::split_name;

/// Where prebuilt cores are downloaded from by default.
pub const CORE_BASE_URL: &str =
    "https://cdn.jsdelivr.net/gh/arianrhodsandlot/retroarch-emscripten-build@v1.19.1/retroarch";

/// Where shader presets are downloaded from by default.
pub const SHADER_BASE_URL: &str = "https://cdn.jsdelivr.net/gh/libretro/glsl-shaders@master";

/// Default player 1 keyboard bindings.
const PLAYER1_BINDINGS: &[(&str, &str)] = &[
    ("a", "x"),
    ("b", "z"),
    ("x", "s"),
    ("y", "a"),
    ("l", "q"),
    ("r", "w"),
    ("l2", keys::UNBOUND),
    ("r2", keys::UNBOUND),
    ("start", "enter"),
    ("select", "rshift"),
    ("up", "up"),
    ("down", "down"),
    ("left", "left"),
    ("right", "right"),
];

/// Frontend settings every launch starts from.
pub fn retroarch_config() -> ConfigMap {
    let mut config = ConfigMap::new();
    let mut set = |key: &str, value: ConfigValue| {
        config.insert(key.to_string(), value);
    };

    set("menu_driver", "rgui".into());
    set("rewind_enable", true.into());
    set("notification_show_autoconfig", false.into());
    set("notification_show_cheats_applied", false.into());
    set("notification_show_config_override_load", false.into());
    set("notification_show_fast_forward", false.into());
    set("notification_show_remap_load", false.into());
    set("notification_show_patch_applied", false.into());
    set("notification_show_refresh_rate", false.into());
    set("notification_show_screenshot", false.into());
    set("notification_show_set_initial_disk", false.into());
    set("savestate_thumbnail_enable", false.into());
    set("stdin_cmd_enable", true.into());
    set("video_shader_enable", true.into());
    set("input_exit_emulator", keys::UNBOUND.into());
    set("input_cheat_index_plus", keys::UNBOUND.into());
    set("input_cheat_index_minus", keys::UNBOUND.into());
    set("input_cheat_toggle", keys::UNBOUND.into());
    set("input_hold_fast_forward", keys::UNBOUND.into());
    set("input_toggle_fast_forward", keys::UNBOUND.into());
    set("input_hold_slowmotion", keys::UNBOUND.into());
    set("input_rewind", keys::UNBOUND.into());
    set("input_menu_toggle", "f1".into());
    set("input_screenshot", keys::UNBOUND.into());
    set("input_save_state", keys::UNBOUND.into());
    set("input_load_state", keys::UNBOUND.into());

    for (button, key) in PLAYER1_BINDINGS {
        set(&format!("input_player1_{}", button), (*key).into());
    }
    config
}

/// Whether a core string is a plain id rather than a path or URL.
pub fn is_bare_core_id(core: &str) -> bool {
    !core.contains(['/', '\\']) && split_name(core).1.is_empty()
}

/// Core id from a core binary name: `fceumm_libretro.wasm` → `fceumm`.
pub fn core_name_from_file(file_name: &str) -> String {
    let base = split_name(file_name).0;
    base.strip_suffix("_libretro").unwrap_or(base).to_string()
}

/// Bare ids map to the core CDN; anything else is the binary itself with the
/// script expected beside it.
pub fn resolve_core() -> CoreResolver {
    core_resolver(|core: String| async move {
        if is_bare_core_id(&core) {
            let base = format!("{}/{}_libretro", CORE_BASE_URL, core);
            return Ok(CoreFiles {
                js: InputDescriptor::from(format!("{}.js", base)),
                wasm: InputDescriptor::from(format!("{}.wasm", base)),
            });
        }
        let (stem, _) = split_name(&core);
        Ok(CoreFiles {
            js: local_or_remote(format!("{}.js", stem)),
            wasm: local_or_remote(core),
        })
    })
}

/// URLs and paths pass through; a bare file name is taken relative to the
/// working directory.
fn local_or_remote(name: String) -> InputDescriptor {
    let is_url = Url::parse(&name).is_ok();
    let is_relative = name.starts_with('/') || name.starts_with("./") || name.starts_with("../");
    if is_url || is_relative {
        InputDescriptor::from(name)
    } else {
        InputDescriptor::from(PathBuf::from(name))
    }
}

fn resolve_local_or_remote(name: String) -> Vec<InputDescriptor> {
    vec![local_or_remote(name)]
}

pub fn resolve_rom() -> InputResolver {
    input_resolver(|name: String| async move { Ok(resolve_local_or_remote(name)) })
}

pub fn resolve_bios() -> InputResolver {
    input_resolver(|name: String| async move { Ok(resolve_local_or_remote(name)) })
}

/// A preset name such as `crt/crt-easymode` yields the preset and its shader
/// source from the shader CDN. Paths and URLs pass through.
pub fn resolve_shader() -> InputResolver {
    input_resolver(|name: String| async move {
        if name.is_empty() {
            return Ok(Vec::new());
        }
        if Url::parse(&name).is_ok() || !split_name(&name).1.is_empty() {
            return Ok(resolve_local_or_remote(name));
        }
        let (dir, file) = match name.rsplit_once('/') {
            Some((dir, file)) => (format!("{}/", dir), file.to_string()),
            None => (String::new(), name.clone()),
        };
        Ok(vec![
            InputDescriptor::from(format!("{}/{}.glslp", SHADER_BASE_URL, name)),
            InputDescriptor::from(format!("{}/{}shaders/{}.glsl", SHADER_BASE_URL, dir, file)),
        ])
    })
}

/// The configuration [`global::reset_to_default`](super::global::reset_to_default)
/// restores.
pub fn launch_defaults() -> LaunchOptions {
    LaunchOptions {
        retroarch_config: retroarch_config(),
        cache: CacheOptions {
            core: Some(true),
            rom: Some(false),
            bios: Some(true),
            shader: Some(true),
            state: Some(false),
            sram: Some(false),
        },
        respond_to_global_events: Some(true),
        resolve_core: Some(resolve_core()),
        resolve_rom: Some(resolve_rom()),
        resolve_bios: Some(resolve_bios()),
        resolve_shader: Some(resolve_shader()),
        ..LaunchOptions::default()
    }
}
