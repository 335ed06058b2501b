//! Virtual filesystem layout inside a core's private filesystem.
//!
//! Every path is absolute and `/`-separated regardless of the host platform.

use chrono::{DateTime, TimeZone};

pub const USERDATA_ROOT: &str = "/home/web_user/retroarch/userdata";
pub const CONTENT_DIR: &str = "/home/web_user/retroarch/userdata/content";
pub const SYSTEM_DIR: &str = "/home/web_user/retroarch/userdata/system";
pub const CONFIG_DIR: &str = "/home/web_user/retroarch/userdata/config";
pub const SCREENSHOT_DIR: &str = "/home/web_user/retroarch/userdata/screenshots";
pub const SHADER_DIR: &str = "/home/web_user/retroarch/userdata/shaders";
pub const SAVES_DIR: &str = "/home/web_user/retroarch/userdata/saves";
pub const STATES_DIR: &str = "/home/web_user/retroarch/userdata/states";

/// Frontend configuration read by the core at startup.
pub const CONFIG_PATH: &str = "/home/web_user/retroarch/userdata/retroarch.cfg";
/// Core options configuration.
pub const CORE_CONFIG_PATH: &str = "/home/web_user/retroarch/userdata/retroarch-core-options.cfg";
/// Generated shader preset referencing every supplied preset.
pub const SHADER_PRESET_PATH: &str = "/home/web_user/retroarch/userdata/shaders/global.glslp";

/// Directories created before any file is written.
pub const PROVISIONED_DIRS: &[&str] = &[
    CONTENT_DIR,
    SYSTEM_DIR,
    CONFIG_DIR,
    SCREENSHOT_DIR,
    SHADER_DIR,
    SAVES_DIR,
    STATES_DIR,
];

/// Shader preset extension; presets live at the shader root.
pub const SHADER_PRESET_EXTENSION: &str = "glslp";

/// Join a directory and a file name.
pub fn join(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name.trim_start_matches('/'))
}

/// Parent directory of a virtual path (`/` for top-level entries).
pub fn parent(path: &str) -> &str {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/",
        Some(index) => &path[..index],
    }
}

pub fn content_path(name: &str) -> String {
    join(CONTENT_DIR, name)
}

pub fn system_path(name: &str) -> String {
    join(SYSTEM_DIR, name)
}

/// Destination of a shader file: presets at the root, sources under `shaders/`.
pub fn shader_path(name: &str) -> String {
    let is_preset = name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(SHADER_PRESET_EXTENSION));
    if is_preset {
        join(SHADER_DIR, name)
    } else {
        join(&join(SHADER_DIR, "shaders"), name)
    }
}

/// Battery save path for a content base name under a core's display name.
pub fn sram_path(core_full_name: &str, base_name: &str) -> String {
    join(&join(SAVES_DIR, core_full_name), &format!("{}.srm", base_name))
}

/// Save state path for a content base name under a core's display name.
pub fn state_path(core_full_name: &str, base_name: &str) -> String {
    join(&join(STATES_DIR, core_full_name), &format!("{}.state", base_name))
}

/// Thumbnail written next to a save state.
pub fn state_thumbnail_path(core_full_name: &str, base_name: &str) -> String {
    format!("{}.png", state_path(core_full_name, base_name))
}

/// File name a core gives a screenshot taken at `time`.
pub fn screenshot_file_name<Tz: TimeZone>(base_name: &str, time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}-{}.png", base_name, time.format("%y%m%d-%H%M%S"))
}

pub fn screenshot_path(file_name: &str) -> String {
    join(SCREENSHOT_DIR, file_name)
}

/// Contents of the generated top-level shader preset.
pub fn shader_preset(preset_paths: &[String]) -> String {
    preset_paths
        .iter()
        .map(|path| format!("#reference \"{}\"\n", path))
        .collect()
}
