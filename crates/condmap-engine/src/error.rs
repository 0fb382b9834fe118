use std::fmt;

use condmap_config::SourceLocation;
use thiserror::Error;

/// Errors raised while turning a device configuration into a [`RuleSet`](crate::RuleSet)
#[derive(Error, Debug)]
pub enum RuleSetError {
    #[error(
        "Unknown key name(s) in device '{device}': {}. Run `condmap keys` for accepted names",
        format_unknown(.keys)
    )]
    UnknownKeys {
        device: String,
        keys: Vec<UnknownKey>,
    },

    #[error("Rule {rule} in device '{device}' maps `{key}` more than once ({location})")]
    DuplicateTarget {
        device: String,
        /// 1-based rule index in declaration order
        rule: usize,
        key: String,
        location: SourceLocation,
    },
}

/// Where an unresolvable key name appeared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Trigger,
    Condition,
    Except,
    MapTarget,
    Replacement,
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyRole::Trigger => "when",
            KeyRole::Condition => "cond",
            KeyRole::Except => "except",
            KeyRole::MapTarget => "map target",
            KeyRole::Replacement => "map replacement",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKey {
    pub name: String,
    pub role: KeyRole,
    /// 1-based rule index in declaration order
    pub rule: usize,
    pub location: SourceLocation,
}

impl fmt::Display for UnknownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` ({} in rule {}, {})",
            self.name, self.role, self.rule, self.location
        )
    }
}

fn format_unknown(keys: &[UnknownKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
