//! Registered triggers and longest-suffix matching over them.

use crate::error::{KeyflowError, Result};
use std::collections::BTreeMap;

/// Trigger to expansion mapping as stored on disk and handed to the engine.
pub type Hotkeys = BTreeMap<String, String>;

/// Check that a trigger can ever be matched: non-empty and free of whitespace.
pub fn validate_trigger(trigger: &str) -> Result<()> {
    if trigger.is_empty() {
        return Err(KeyflowError::InvalidTrigger(
            "trigger cannot be empty".to_string(),
        ));
    }
    if trigger.chars().any(char::is_whitespace) {
        return Err(KeyflowError::InvalidTrigger(format!(
            "'{}' contains whitespace",
            trigger
        )));
    }
    Ok(())
}

/// Snapshot of the trigger mapping plus its derived matching order.
///
/// The ordering and maximum length are rebuilt from scratch on every
/// [`TriggerIndex::replace`], so they can never drift from the mapping.
#[derive(Debug, Clone, Default)]
pub struct TriggerIndex {
    sorted: Vec<(String, String)>,
    max_len: usize,
}

impl TriggerIndex {
    pub fn new(hotkeys: &Hotkeys) -> Self {
        let mut sorted: Vec<(String, String)> = Vec::with_capacity(hotkeys.len());
        for (trigger, expansion) in hotkeys {
            if let Err(e) = validate_trigger(trigger) {
                tracing::warn!("Skipping trigger: {}", e);
                continue;
            }
            sorted.push((trigger.clone(), expansion.clone()));
        }

        // Stable sort keeps mapping order for equal lengths
        sorted.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

        let max_len = sorted
            .first()
            .map(|(trigger, _)| trigger.chars().count())
            .unwrap_or(0);

        Self { sorted, max_len }
    }

    /// Install a new mapping, recomputing the derived view in the same step.
    pub fn replace(&mut self, hotkeys: &Hotkeys) {
        *self = Self::new(hotkeys);
    }

    /// Matchable triggers, longest first.
    pub fn lookup_candidates(&self) -> &[(String, String)] {
        &self.sorted
    }

    /// Length in characters of the longest matchable trigger, 0 when empty.
    pub fn max_trigger_len(&self) -> usize {
        self.max_len
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }
}

/// Find the trigger the buffer ends with, preferring the longest one.
pub fn find_match<'a>(
    buffer: &str,
    candidates: &'a [(String, String)],
) -> Option<(&'a str, &'a str)> {
    candidates
        .iter()
        .find(|(trigger, _)| !trigger.is_empty() && buffer.ends_with(trigger.as_str()))
        .map(|(trigger, expansion)| (trigger.as_str(), expansion.as_str()))
}

/// Existing triggers that are a prefix of `trigger` or have it as a prefix.
///
/// Such pairs can shadow each other while typing.
pub fn overlapping_triggers<'a>(hotkeys: &'a Hotkeys, trigger: &str) -> Vec<&'a str> {
    hotkeys
        .keys()
        .filter(|existing| {
            existing.as_str() != trigger
                && (existing.starts_with(trigger) || trigger.starts_with(existing.as_str()))
        })
        .map(String::as_str)
        .collect()
}
