//! A single conditional remap

use std::fmt;

use smallvec::SmallVec;

use crate::key::{key_name, Key};
use crate::key_state::KeyState;

/// Output sequence for one key; most remaps produce one or two keys
pub type KeySeq = SmallVec<[Key; 4]>;

/// `target` is rewritten to `replacements` while the rule's decision is pinned.
/// An empty replacement list suppresses `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub target: Key,
    pub replacements: KeySeq,
}

impl Mapping {
    pub fn is_suppression(&self) -> bool {
        self.replacements.is_empty()
    }
}

/// One conditional remap rule.
///
/// The rule fires for `trigger` when no `except` key is held and at least one
/// condition group is fully held (OR of ANDs). A rule built without
/// conditions has the single empty group and always passes that test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    label: Option<String>,
    trigger: Key,
    cond_groups: Vec<Box<[Key]>>,
    except: Box<[Key]>,
    mappings: Vec<Mapping>,
}

fn key_set(keys: impl IntoIterator<Item = Key>) -> Box<[Key]> {
    let mut keys: Vec<Key> = keys.into_iter().collect();
    keys.sort();
    keys.dedup();
    keys.into_boxed_slice()
}

impl Rule {
    /// A rule for `trigger` with no conditions, exceptions or mappings
    pub fn new(trigger: Key) -> Self {
        Self {
            label: None,
            trigger,
            cond_groups: vec![Box::default()],
            except: Box::default(),
            mappings: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Require every key of `group` to be held (a single AND group)
    pub fn cond(self, group: impl IntoIterator<Item = Key>) -> Self {
        self.cond_groups([group])
    }

    /// Require any one of `groups` to be fully held.
    ///
    /// An empty list of groups is treated as the single empty group.
    pub fn cond_groups<G>(mut self, groups: impl IntoIterator<Item = G>) -> Self
    where
        G: IntoIterator<Item = Key>,
    {
        self.cond_groups = groups.into_iter().map(key_set).collect();
        if self.cond_groups.is_empty() {
            self.cond_groups.push(Box::default());
        }
        self
    }

    /// Forbid any of `keys` from being held
    pub fn except(mut self, keys: impl IntoIterator<Item = Key>) -> Self {
        self.except = key_set(keys);
        self
    }

    /// Append a mapping; mappings are applied in the order they are added
    pub fn map(mut self, target: Key, replacements: impl IntoIterator<Item = Key>) -> Self {
        self.mappings.push(Mapping {
            target,
            replacements: replacements.into_iter().collect(),
        });
        self
    }

    /// Shorthand for mapping `target` to nothing
    pub fn suppress(self, target: Key) -> Self {
        self.map(target, std::iter::empty())
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn trigger(&self) -> Key {
        self.trigger
    }

    pub fn cond_group_list(&self) -> &[Box<[Key]>] {
        &self.cond_groups
    }

    pub fn except_keys(&self) -> &[Key] {
        &self.except
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// The mapping whose target is `key`, if any
    pub fn mapping_for(&self, key: Key) -> Option<&Mapping> {
        self.mappings.iter().find(|m| m.target == key)
    }

    /// Evaluate exceptions and condition groups against the held set
    pub fn conditions_hold(&self, state: &KeyState) -> bool {
        if self.except.iter().any(|&k| state.is_held(k)) {
            return false;
        }

        self.cond_groups
            .iter()
            .any(|group| group.iter().all(|&k| state.is_held(k)))
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |keys: &[Key]| keys.iter().map(|&k| key_name(k)).collect::<Vec<_>>().join("+");

        if let Some(label) = &self.label {
            write!(f, "[{}] ", label)?;
        }
        write!(f, "{}", key_name(self.trigger))?;

        let groups: Vec<String> = self
            .cond_groups
            .iter()
            .filter(|g| !g.is_empty())
            .map(|g| names(g))
            .collect();
        if !groups.is_empty() {
            write!(f, " if {}", groups.join(" | "))?;
        }
        if !self.except.is_empty() {
            write!(f, " unless {}", names(&self.except))?;
        }

        for mapping in &self.mappings {
            if mapping.is_suppression() {
                write!(f, "; {} -> (none)", key_name(mapping.target))?;
            } else {
                write!(
                    f,
                    "; {} -> {}",
                    key_name(mapping.target),
                    names(&mapping.replacements)
                )?;
            }
        }

        Ok(())
    }
}
