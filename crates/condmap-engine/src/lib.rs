//! Conditional key remapping for condmap
//!
//! A [`RuleSet`] is built from one device's configuration and shared by a
//! [`RemapEngine`], which rewrites that device's key events one at a time.

mod engine;
mod error;
mod event;
mod input;
mod key;
mod key_state;
mod rule;
mod ruleset;

pub use engine::{EngineStats, RemapEngine};
pub use error::{KeyRole, RuleSetError, UnknownKey};
pub use event::{Action, KeyEvent, OutputEvent};
pub use input::{event_device_paths, is_keyboard};
pub use key::{key_name, known_key_names, parse_key, Key};
pub use key_state::KeyState;
pub use rule::{KeySeq, Mapping, Rule};
pub use ruleset::RuleSet;
