//! Named commands and the direct core methods that implement them

pub const PAUSE_TOGGLE: &str = "PAUSE_TOGGLE";
pub const RESET: &str = "RESET";
pub const SAVE_STATE: &str = "SAVE_STATE";
pub const LOAD_STATE: &str = "LOAD_STATE";
pub const SCREENSHOT: &str = "SCREENSHOT";
pub const SAVE_FILES: &str = "SAVE_FILES";
pub const MENU_TOGGLE: &str = "MENU_TOGGLE";

/// Commands a core may also expose as a callable method.
pub const DIRECT_METHODS: &[(&str, &str)] = &[
    (PAUSE_TOGGLE, "cmd_toggle_pause"),
    (RESET, "cmd_reset"),
    (SAVE_STATE, "cmd_save_state"),
    (LOAD_STATE, "cmd_load_state"),
    (SCREENSHOT, "cmd_take_screenshot"),
    (SAVE_FILES, "cmd_savefiles"),
    (MENU_TOGGLE, "cmd_toggle_menu"),
];

pub fn method_for(command: &str) -> Option<&'static str> {
    DIRECT_METHODS
        .iter()
        .find(|(name, _)| *name == command)
        .map(|(_, method)| *method)
}

pub fn command_for(method: &str) -> Option<&'static str> {
    DIRECT_METHODS
        .iter()
        .find(|(_, m)| *m == method)
        .map(|(command, _)| *command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lookups() {
        assert_eq!(method_for(SAVE_FILES), Some("cmd_savefiles"));
        assert_eq!(command_for("cmd_take_screenshot"), Some(SCREENSHOT));
        assert_eq!(method_for("FAST_FORWARD"), None);
    }
}
