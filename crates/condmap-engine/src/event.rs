//! Key events consumed and produced by the engine

use std::fmt;

use evdev::{EventType, InputEvent, InputEventKind};

use crate::key::{key_name, Key};

/// Key event kind, with the kernel's `value` encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Release,
    Press,
    /// Autorepeat while the key stays down
    Repeat,
}

impl Action {
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Release),
            1 => Some(Self::Press),
            2 => Some(Self::Repeat),
            _ => None,
        }
    }

    pub fn value(self) -> i32 {
        match self {
            Self::Release => 0,
            Self::Press => 1,
            Self::Repeat => 2,
        }
    }
}

/// A single key press, release or repeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub key: Key,
    pub action: Action,
}

/// Events emitted by the engine have the same shape as its input
pub type OutputEvent = KeyEvent;

impl KeyEvent {
    pub fn new(key: Key, action: Action) -> Self {
        Self { key, action }
    }

    pub fn press(key: Key) -> Self {
        Self::new(key, Action::Press)
    }

    pub fn release(key: Key) -> Self {
        Self::new(key, Action::Release)
    }

    pub fn repeat(key: Key) -> Self {
        Self::new(key, Action::Repeat)
    }

    /// Extract a key event from a raw evdev event
    ///
    /// Returns `None` for non-key events and for values outside 0..=2.
    pub fn from_input_event(event: &InputEvent) -> Option<Self> {
        match event.kind() {
            InputEventKind::Key(key) => Action::from_value(event.value()).map(|a| Self::new(key, a)),
            _ => None,
        }
    }

    pub fn to_input_event(self) -> InputEvent {
        InputEvent::new(EventType::KEY, self.key.code(), self.action.value())
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.action {
            Action::Press => '+',
            Action::Release => '-',
            Action::Repeat => '=',
        };
        write!(f, "{}{}", sign, key_name(self.key))
    }
}
