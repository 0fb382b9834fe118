//! Event rewriting state machine
//!
//! # Press-time pinning
//!
//! A key's output is decided once, when it is pressed, and remembered in a
//! pending-decision table keyed by the physical key. Release and repeat
//! events replay that pinned output instead of consulting the rules again,
//! so the output stays consistent even when modifiers change while the key
//! is down.
//!
//! ```text
//!   Press(K)                          Release(K)
//!      │                                  │
//!      ▼                                  ▼
//!  RuleSet::find_match(K, held)      pending.remove(K)
//!      │ (held set before K)              │
//!      ├── no rule ──► emit +K            ├── found ──► emit -out for each pinned key
//!      │               pin K -> [K]       │
//!      └── rule ─────► apply mappings     └── missing ─► emit -K, count anomaly
//!                      in declaration order
//! ```
//!
//! A mapping whose target is the trigger defines the trigger's own output.
//! A mapping targeting another key rewrites that key's pinned output, but only
//! while it is physically down: its old outputs are released and the
//! replacements pressed (nothing, for a suppression). When no mapping targets
//! the trigger, the trigger passes through as itself after the side effects.
//!
//! Rule outputs are reference counted: two held keys both producing
//! `KEY_LEFTCTRL` press it once and release it when the second one goes up.
//! A key no rule matched is forwarded literally, press and release.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use smallvec::smallvec;

use crate::event::{Action, KeyEvent, OutputEvent};
use crate::key::Key;
use crate::key_state::KeyState;
use crate::rule::{KeySeq, Rule};
use crate::ruleset::RuleSet;

/// Counters for observability; anomalies never stop processing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Input events processed
    pub events: u64,
    /// Presses decided by a rule
    pub remapped: u64,
    /// Presses without a matching rule, plus orphan releases and repeats
    pub passed_through: u64,
    /// Releases or repeats with no pinned decision, and repeated presses
    pub anomalies: u64,
}

impl fmt::Display for EngineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} event(s), {} remapped, {} passed through, {} anomalies",
            self.events, self.remapped, self.passed_through, self.anomalies
        )
    }
}

/// Outputs a physical key produces while it is down
#[derive(Debug, Clone)]
struct Pinned {
    outputs: KeySeq,
    /// No rule matched; the key's own press and release are forwarded as-is
    identity: bool,
}

/// Rewrites a single ordered stream of key events.
///
/// One engine per input stream; events must be fed strictly in order.
#[derive(Debug)]
pub struct RemapEngine {
    rules: Arc<RuleSet>,
    state: KeyState,
    /// Physical key -> outputs it currently produces
    pending: HashMap<Key, Pinned>,
    stats: EngineStats,
}

impl RemapEngine {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self {
            rules,
            state: KeyState::new(),
            pending: HashMap::new(),
            stats: EngineStats::default(),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn state(&self) -> &KeyState {
        &self.state
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Outputs currently pinned for a physically held key
    pub fn pinned_output(&self, key: Key) -> Option<&[Key]> {
        self.pending.get(&key).map(|pinned| pinned.outputs.as_slice())
    }

    /// Process one event and return the events to emit
    pub fn process_event(&mut self, event: KeyEvent) -> Vec<OutputEvent> {
        let mut out = Vec::new();
        self.process_into(event, &mut out);
        out
    }

    /// Process one event, appending emitted events to `out`.
    ///
    /// Lets the caller reuse one buffer across the whole event loop.
    pub fn process_into(&mut self, event: KeyEvent, out: &mut Vec<OutputEvent>) {
        self.stats.events += 1;
        tracing::trace!("IN {}", event);

        match event.action {
            Action::Press => self.press(event.key, out),
            Action::Release => self.release(event.key, out),
            Action::Repeat => self.repeat(event.key, out),
        }
    }

    /// Release every output still held and forget all state.
    ///
    /// Used on teardown so nothing stays stuck down on the output device.
    pub fn release_all(&mut self) -> Vec<OutputEvent> {
        let mut out = Vec::new();
        let pending: Vec<Pinned> = self.pending.drain().map(|(_, pinned)| pinned).collect();
        for pinned in &pending {
            self.release_outputs(&pinned.outputs, &mut out);
        }
        self.state.clear();
        out
    }

    /// Forget all state without emitting anything
    pub fn reset(&mut self) {
        self.pending.clear();
        self.state.clear();
    }

    fn press(&mut self, key: Key, out: &mut Vec<OutputEvent>) {
        if let Some(stale) = self.pending.remove(&key) {
            tracing::warn!("Double press of {:?}; releasing its previous output", key);
            self.stats.anomalies += 1;
            self.unpin(key, stale, out);
        }

        // Conditions see the held set from before this press
        let rules = Arc::clone(&self.rules);
        let rule = rules.find_match(key, &self.state);
        self.state.set_held(key, true);

        match rule {
            Some(rule) => {
                self.stats.remapped += 1;
                tracing::debug!("{:?} pressed, applying rule {}", key, rule);
                self.apply_rule(key, rule, out);
            }
            None => {
                self.stats.passed_through += 1;
                out.push(KeyEvent::press(key));
                self.state.hold_virtual(key);
                self.pending.insert(
                    key,
                    Pinned {
                        outputs: smallvec![key],
                        identity: true,
                    },
                );
            }
        }
    }

    fn apply_rule(&mut self, key: Key, rule: &Rule, out: &mut Vec<OutputEvent>) {
        let mut trigger_pinned = false;

        for mapping in rule.mappings() {
            if mapping.target == key {
                self.pin(key, &mapping.replacements, out);
                trigger_pinned = true;
            } else {
                self.rewrite_held(mapping.target, &mapping.replacements, out);
            }
        }

        if !trigger_pinned {
            self.pin(key, &[key], out);
        }
    }

    /// Press `outputs` on behalf of `key` and remember them
    fn pin(&mut self, key: Key, outputs: &[Key], out: &mut Vec<OutputEvent>) {
        self.press_outputs(outputs, out);
        self.pending.insert(
            key,
            Pinned {
                outputs: outputs.iter().copied().collect(),
                identity: false,
            },
        );
    }

    /// Undo a pinned decision once its physical key goes up
    fn unpin(&mut self, key: Key, pinned: Pinned, out: &mut Vec<OutputEvent>) {
        if pinned.identity {
            out.push(KeyEvent::release(key));
            self.state.release_virtual(key);
        } else {
            self.release_outputs(&pinned.outputs, out);
        }
    }

    /// Change what an already held key produces, as a side effect of another press
    fn rewrite_held(&mut self, target: Key, replacements: &[Key], out: &mut Vec<OutputEvent>) {
        let Some(pinned) = self.pending.get_mut(&target) else {
            tracing::trace!("{:?} is not held; mapping skipped", target);
            return;
        };

        if pinned.outputs.as_slice() == replacements {
            return;
        }

        pinned.identity = false;
        let previous = std::mem::replace(&mut pinned.outputs, replacements.iter().copied().collect());

        let released: KeySeq = previous
            .iter()
            .copied()
            .filter(|k| !replacements.contains(k))
            .collect();
        let pressed: KeySeq = replacements
            .iter()
            .copied()
            .filter(|k| !previous.contains(k))
            .collect();

        self.release_outputs(&released, out);
        self.press_outputs(&pressed, out);
    }

    fn release(&mut self, key: Key, out: &mut Vec<OutputEvent>) {
        self.state.set_held(key, false);

        match self.pending.remove(&key) {
            Some(pinned) => self.unpin(key, pinned, out),
            None => {
                tracing::warn!("Release of {:?} with no recorded press; passing through", key);
                self.stats.anomalies += 1;
                self.stats.passed_through += 1;
                out.push(KeyEvent::release(key));
            }
        }
    }

    /// Output keys shared by several pinned decisions go down once
    fn press_outputs(&mut self, outputs: &[Key], out: &mut Vec<OutputEvent>) {
        for &output in outputs {
            if self.state.hold_virtual(output) {
                out.push(KeyEvent::press(output));
            }
        }
    }

    /// Output keys go up only when their last holder lets go
    fn release_outputs(&mut self, outputs: &[Key], out: &mut Vec<OutputEvent>) {
        for &output in outputs {
            if self.state.release_virtual(output) {
                out.push(KeyEvent::release(output));
            }
        }
    }

    fn repeat(&mut self, key: Key, out: &mut Vec<OutputEvent>) {
        match self.pending.get(&key) {
            Some(pinned) => out.extend(pinned.outputs.iter().map(|&k| KeyEvent::repeat(k))),
            None => {
                tracing::warn!("Repeat of {:?} with no recorded press; passing through", key);
                self.stats.anomalies += 1;
                self.stats.passed_through += 1;
                out.push(KeyEvent::repeat(key));
            }
        }
    }
}

impl From<RuleSet> for RemapEngine {
    fn from(rules: RuleSet) -> Self {
        Self::new(Arc::new(rules))
    }
}
