//! Keyboard codes for configured input bindings.
//!
//! Bindings in the frontend config are key names such as `x`, `enter`,
//! `f5` or `keypad3`. Cores listen for classic keyboard codes, so button
//! presses are synthesized with the code each name maps to.

/// Binding value that means "not bound".
pub const UNBOUND: &str = "nul";

/// First function key code (F1).
const F1: u32 = 112;

/// First numeric keypad code (keypad 0).
const KEYPAD_0: u32 = 96;

/// Named keys that no prefix rule covers.
const NAMED_KEYS: &[(&str, u32)] = &[
    ("backspace", 8),
    ("tab", 9),
    ("enter", 13),
    ("kp_enter", 13),
    ("shift", 16),
    ("rshift", 16),
    ("ctrl", 17),
    ("rctrl", 17),
    ("alt", 18),
    ("ralt", 18),
    ("pause", 19),
    ("capslock", 20),
    ("escape", 27),
    ("space", 32),
    ("pageup", 33),
    ("pagedown", 34),
    ("end", 35),
    ("home", 36),
    ("left", 37),
    ("up", 38),
    ("right", 39),
    ("down", 40),
    ("insert", 45),
    ("del", 46),
    ("kp_multiply", 106),
    ("multiply", 106),
    ("kp_plus", 107),
    ("add", 107),
    ("kp_minus", 109),
    ("subtract", 109),
    ("kp_period", 110),
    ("kp_divide", 111),
    ("divide", 111),
    ("numlock", 144),
    ("num_lock", 144),
    ("scroll_lock", 145),
    ("semicolon", 186),
    ("equals", 187),
    ("comma", 188),
    ("minus", 189),
    ("period", 190),
    ("slash", 191),
    ("tilde", 192),
    ("backquote", 192),
    ("leftbracket", 219),
    ("backslash", 220),
    ("rightbracket", 221),
    ("quote", 222),
];

/// Map a binding name to the keyboard code a core listens for.
///
/// Returns `None` for unbound (`nul`), empty or unknown bindings.
pub fn key_code(binding: &str) -> Option<u32> {
    let name = binding.trim().to_ascii_lowercase();
    if name.is_empty() || name == UNBOUND {
        return None;
    }

    if let Some((_, code)) = NAMED_KEYS.iter().find(|(key, _)| *key == name) {
        return Some(*code);
    }

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return match c {
            'a'..='z' => Some(c.to_ascii_uppercase() as u32),
            '0'..='9' => Some(c as u32),
            _ => None,
        };
    }

    if (2..=3).contains(&name.len())
        && let Some(number) = name.strip_prefix('f')
        && let Ok(n) = number.parse::<u32>()
        && (1..=12).contains(&n)
    {
        return Some(F1 + n - 1);
    }

    let keypad = name
        .strip_prefix("keypad")
        .or_else(|| name.strip_prefix("num"));
    if let Some(digit) = keypad
        && let Ok(n) = digit.parse::<u32>()
        && n <= 9
    {
        return Some(KEYPAD_0 + n);
    }

    None
}
