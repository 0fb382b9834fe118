//! Key name resolution
//!
//! Keys are plain evdev key codes. Configuration files may use the kernel
//! token (`KEY_LEFTMETA`), the token without its prefix (`LeftMeta`), or one
//! of the friendly aliases below.

use std::str::FromStr;

pub use evdev::Key;

/// Friendly names that do not follow the `KEY_<NAME>` pattern
const KEY_ALIASES: &[(&str, Key)] = &[
    ("CAPS", Key::KEY_CAPSLOCK),
    ("CAPS_LOCK", Key::KEY_CAPSLOCK),
    ("ESCAPE", Key::KEY_ESC),
    ("RETURN", Key::KEY_ENTER),
    // Modifiers
    ("CTRL", Key::KEY_LEFTCTRL),
    ("LCTRL", Key::KEY_LEFTCTRL),
    ("RCTRL", Key::KEY_RIGHTCTRL),
    ("SHIFT", Key::KEY_LEFTSHIFT),
    ("LSHIFT", Key::KEY_LEFTSHIFT),
    ("RSHIFT", Key::KEY_RIGHTSHIFT),
    ("ALT", Key::KEY_LEFTALT),
    ("LALT", Key::KEY_LEFTALT),
    ("RALT", Key::KEY_RIGHTALT),
    ("SUPER", Key::KEY_LEFTMETA),
    ("META", Key::KEY_LEFTMETA),
    ("LMETA", Key::KEY_LEFTMETA),
    ("RMETA", Key::KEY_RIGHTMETA),
    // Symbols
    ("-", Key::KEY_MINUS),
    ("EQUALS", Key::KEY_EQUAL),
    ("=", Key::KEY_EQUAL),
    ("LBRACE", Key::KEY_LEFTBRACE),
    ("[", Key::KEY_LEFTBRACE),
    ("RBRACE", Key::KEY_RIGHTBRACE),
    ("]", Key::KEY_RIGHTBRACE),
    (";", Key::KEY_SEMICOLON),
    ("'", Key::KEY_APOSTROPHE),
    ("`", Key::KEY_GRAVE),
    ("\\", Key::KEY_BACKSLASH),
    (",", Key::KEY_COMMA),
    ("PERIOD", Key::KEY_DOT),
    (".", Key::KEY_DOT),
    ("/", Key::KEY_SLASH),
    // Navigation
    ("UPARROW", Key::KEY_UP),
    ("DOWNARROW", Key::KEY_DOWN),
    ("LEFTARROW", Key::KEY_LEFT),
    ("RIGHTARROW", Key::KEY_RIGHT),
    ("PGUP", Key::KEY_PAGEUP),
    ("PGDN", Key::KEY_PAGEDOWN),
    ("PGDOWN", Key::KEY_PAGEDOWN),
    ("INS", Key::KEY_INSERT),
    ("DEL", Key::KEY_DELETE),
    // Numpad
    ("NUMPAD0", Key::KEY_KP0),
    ("NUMPAD1", Key::KEY_KP1),
    ("NUMPAD2", Key::KEY_KP2),
    ("NUMPAD3", Key::KEY_KP3),
    ("NUMPAD4", Key::KEY_KP4),
    ("NUMPAD5", Key::KEY_KP5),
    ("NUMPAD6", Key::KEY_KP6),
    ("NUMPAD7", Key::KEY_KP7),
    ("NUMPAD8", Key::KEY_KP8),
    ("NUMPAD9", Key::KEY_KP9),
    ("KPDECIMAL", Key::KEY_KPDOT),
    ("NUMPAD_DOT", Key::KEY_KPDOT),
    ("NUMPAD_ENTER", Key::KEY_KPENTER),
    ("KPADD", Key::KEY_KPPLUS),
    ("NUMPAD_PLUS", Key::KEY_KPPLUS),
    ("KPSUBTRACT", Key::KEY_KPMINUS),
    ("NUMPAD_MINUS", Key::KEY_KPMINUS),
    ("KPMULTIPLY", Key::KEY_KPASTERISK),
    ("NUMPAD_MULTIPLY", Key::KEY_KPASTERISK),
    ("KPDIVIDE", Key::KEY_KPSLASH),
    ("NUMPAD_DIVIDE", Key::KEY_KPSLASH),
    ("NUM_LOCK", Key::KEY_NUMLOCK),
    // Media
    ("XF86BACK", Key::KEY_BACK),
    ("XF86FORWARD", Key::KEY_FORWARD),
];

/// Parse a key name string to an evdev Key (case-insensitive)
///
/// Returns `None` for names that are neither an alias nor a kernel key token.
pub fn parse_key(name: &str) -> Option<Key> {
    let upper = name.trim().to_uppercase();
    if upper.is_empty() {
        return None;
    }

    if let Some((_, key)) = KEY_ALIASES.iter().find(|(alias, _)| *alias == upper) {
        return Some(*key);
    }

    if upper.starts_with("KEY_") {
        return Key::from_str(&upper).ok();
    }

    Key::from_str(&format!("KEY_{}", upper)).ok()
}

/// Canonical kernel token for a key, e.g. `KEY_LEFTMETA`
pub fn key_name(key: Key) -> String {
    format!("{:?}", key)
}

/// The friendly aliases accepted by [`parse_key`] besides `KEY_*` tokens
pub fn known_key_names() -> impl Iterator<Item = (&'static str, Key)> {
    KEY_ALIASES.iter().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kernel_tokens() {
        assert_eq!(parse_key("KEY_LEFTMETA"), Some(Key::KEY_LEFTMETA));
        assert_eq!(parse_key("key_capslock"), Some(Key::KEY_CAPSLOCK));
        assert_eq!(parse_key("KEY_KATAKANAHIRAGANA"), Some(Key::KEY_KATAKANAHIRAGANA));
    }

    #[test]
    fn test_parse_without_prefix() {
        assert_eq!(parse_key("A"), Some(Key::KEY_A));
        assert_eq!(parse_key("leftctrl"), Some(Key::KEY_LEFTCTRL));
        assert_eq!(parse_key("Home"), Some(Key::KEY_HOME));
        assert_eq!(parse_key("F13"), Some(Key::KEY_F13));
        assert_eq!(parse_key("7"), Some(Key::KEY_7));
        assert_eq!(parse_key("Hangeul"), Some(Key::KEY_HANGEUL));
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(parse_key("Escape"), Some(Key::KEY_ESC));
        assert_eq!(parse_key("Super"), Some(Key::KEY_LEFTMETA));
        assert_eq!(parse_key("RCtrl"), Some(Key::KEY_RIGHTCTRL));
        assert_eq!(parse_key("["), Some(Key::KEY_LEFTBRACE));
        assert_eq!(parse_key("PgDn"), Some(Key::KEY_PAGEDOWN));
        assert_eq!(parse_key("numpad_enter"), Some(Key::KEY_KPENTER));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(parse_key("NotAKey"), None);
        assert_eq!(parse_key("KEY_NOPE"), None);
        assert_eq!(parse_key(""), None);
    }

    #[test]
    fn test_key_name_is_kernel_token() {
        assert_eq!(key_name(Key::KEY_LEFTMETA), "KEY_LEFTMETA");
        assert_eq!(parse_key(&key_name(Key::KEY_SPACE)), Some(Key::KEY_SPACE));
    }

    #[test]
    fn test_aliases_all_resolve() {
        for (alias, key) in known_key_names() {
            assert_eq!(parse_key(alias), Some(key), "alias {alias}");
        }
    }
}
