//! Ordered rule collection indexed by trigger key

use std::collections::{BTreeSet, HashMap};

use condmap_config::{DeviceConfig, KeyRef};

use crate::error::{KeyRole, RuleSetError, UnknownKey};
use crate::key::{parse_key, Key};
use crate::key_state::KeyState;
use crate::rule::Rule;

/// Immutable set of rules for one device.
///
/// Rules keep their declaration order; for a given trigger the earliest
/// declared rule whose conditions hold wins.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    /// Trigger -> indices into `rules`, ascending
    by_trigger: HashMap<Key, Vec<usize>>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        let mut by_trigger: HashMap<Key, Vec<usize>> = HashMap::new();
        for (i, rule) in rules.iter().enumerate() {
            by_trigger.entry(rule.trigger()).or_default().push(i);
        }

        Self { rules, by_trigger }
    }

    /// Build the rule set for a configured device, resolving every key name.
    ///
    /// A rule with several `when` keys becomes one rule per trigger, in order.
    /// All unknown key names are reported together.
    pub fn from_device_config(device: &DeviceConfig) -> Result<Self, RuleSetError> {
        let mut unknown = Vec::new();
        let mut rules = Vec::new();

        for (index, rule_config) in device.rules.iter().enumerate() {
            let rule_no = index + 1;
            let mut resolve = |key: &KeyRef, role: KeyRole| -> Option<Key> {
                let parsed = parse_key(&key.name);
                if parsed.is_none() {
                    unknown.push(UnknownKey {
                        name: key.name.clone(),
                        role,
                        rule: rule_no,
                        location: key.location,
                    });
                }
                parsed
            };

            let triggers: Vec<Option<Key>> = rule_config
                .when
                .iter()
                .map(|k| resolve(k, KeyRole::Trigger))
                .collect();
            let groups: Vec<Vec<Option<Key>>> = rule_config
                .cond
                .iter()
                .map(|group| group.iter().map(|k| resolve(k, KeyRole::Condition)).collect())
                .collect();
            let except: Vec<Option<Key>> = rule_config
                .except
                .iter()
                .map(|k| resolve(k, KeyRole::Except))
                .collect();
            let mappings: Vec<(Option<Key>, Vec<Option<Key>>)> = rule_config
                .mappings
                .iter()
                .map(|m| {
                    let target = resolve(&m.target, KeyRole::MapTarget);
                    let replacements = m
                        .replacements
                        .iter()
                        .map(|k| resolve(k, KeyRole::Replacement))
                        .collect();
                    (target, replacements)
                })
                .collect();

            // Keep collecting names from later rules before giving up
            if !unknown.is_empty() {
                continue;
            }

            let mut resolved: Vec<(Key, Vec<Key>)> = Vec::with_capacity(mappings.len());
            for (mapping, (target, replacements)) in rule_config.mappings.iter().zip(mappings) {
                let Some(target) = target else { continue };
                if resolved.iter().any(|(seen, _)| *seen == target) {
                    return Err(RuleSetError::DuplicateTarget {
                        device: device.name.clone(),
                        rule: rule_no,
                        key: mapping.target.name.clone(),
                        location: mapping.target.location,
                    });
                }
                let replacements: Vec<Key> = replacements.into_iter().flatten().collect();
                resolved.push((target, replacements));
            }

            let groups: Vec<Vec<Key>> = groups
                .into_iter()
                .map(|g| g.into_iter().flatten().collect())
                .collect();
            let except: Vec<Key> = except.into_iter().flatten().collect();

            for trigger in triggers.into_iter().flatten() {
                let mut rule = Rule::new(trigger)
                    .cond_groups(groups.iter().map(|g| g.iter().copied()))
                    .except(except.iter().copied());
                if let Some(label) = &rule_config.name {
                    rule = rule.with_label(label.clone());
                }
                for (target, replacements) in &resolved {
                    rule = rule.map(*target, replacements.iter().copied());
                }
                rules.push(rule);
            }
        }

        if !unknown.is_empty() {
            return Err(RuleSetError::UnknownKeys {
                device: device.name.clone(),
                keys: unknown,
            });
        }

        tracing::debug!(
            "Built {} rule(s) for device '{}' from {} rule block(s)",
            rules.len(),
            device.name,
            device.rules.len()
        );

        Ok(Self::new(rules))
    }

    /// First rule, in declaration order, triggered by `key` whose conditions
    /// hold against `state`. Pure: nothing is mutated.
    pub fn find_match(&self, key: Key, state: &KeyState) -> Option<&Rule> {
        self.rules_for(key).find(|rule| rule.conditions_hold(state))
    }

    /// Candidate rules for `key`, in declaration order
    pub fn rules_for(&self, key: Key) -> impl Iterator<Item = &Rule> + '_ {
        self.by_trigger
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(move |&i| &self.rules[i])
    }

    /// Every key this set can emit or rewrite
    pub fn output_keys(&self) -> BTreeSet<Key> {
        let mut keys = BTreeSet::new();
        for rule in &self.rules {
            keys.insert(rule.trigger());
            for mapping in rule.mappings() {
                keys.insert(mapping.target);
                keys.extend(mapping.replacements.iter().copied());
            }
        }
        keys
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
