//! File-backed store for explicit trigger rules.
//!
//! The store is a single pretty-printed JSON array, rewritten wholesale on
//! every mutation. Reads fail soft: a missing or corrupt file loads as an
//! empty rule list. All read-modify-rewrite cycles are serialized behind a
//! per-store mutex so a chat command and a scheduler tick cannot race each
//! other's writes.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::memory::condition::{sanitize_tags, ConditionTag};
use crate::models::Rule;

pub struct RuleStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl RuleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RuleStore {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Load every rule in the store. A missing file or malformed JSON is
    /// logged and yields an empty list — never an error.
    pub fn load_all(&self) -> Vec<Rule> {
        let _guard = self.lock.lock();
        self.load_unlocked()
    }

    fn load_unlocked(&self) -> Vec<Rule> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("[RULES] No rule store at {} yet", self.path.display());
                return Vec::new();
            }
            Err(e) => {
                log::error!("[RULES] Failed to read {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Rule>>(&content) {
            Ok(rules) => rules,
            Err(e) => {
                log::error!("[RULES] Malformed rule store {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    fn write_unlocked(&self, rules: &[Rule]) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }
        let json = serde_json::to_string_pretty(rules)
            .map_err(|e| format!("Failed to serialize rules: {}", e))?;
        fs::write(&self.path, json)
            .map_err(|e| format!("Failed to write {}: {}", self.path.display(), e))
    }

    /// Insert or fully replace a rule by id.
    ///
    /// Invalid condition tags are stripped (an empty result gets the
    /// default tag), and empty descriptive fields are filled with
    /// deterministic defaults. `active` is taken as-is; a rule that
    /// arrived without the field stays inactive.
    pub fn upsert(&self, mut rule: Rule) -> Result<(), String> {
        if rule.id.is_empty() {
            return Err("Rule is missing an id".to_string());
        }

        let dropped = rule
            .condition_tags
            .iter()
            .filter(|t| ConditionTag::parse(t).is_none())
            .count();
        if dropped > 0 {
            log::warn!(
                "[RULES] Dropping {} invalid condition tag(s) from rule '{}'",
                dropped,
                rule.id
            );
        }
        rule.condition_tags = sanitize_tags(&rule.condition_tags);
        rule.fill_defaults();

        let _guard = self.lock.lock();
        let mut rules = self.load_unlocked();
        let before = rules.len();
        rules.retain(|r| r.id != rule.id);
        let replaced = rules.len() < before;
        rules.push(rule.clone());
        self.write_unlocked(&rules)?;

        if replaced {
            log::info!("[RULES] Replaced rule '{}'", rule.id);
        } else {
            log::info!("[RULES] Added rule '{}'", rule.id);
        }
        Ok(())
    }

    /// Delete every rule whose id is in `ids`. Returns the number removed;
    /// the store is rewritten only when something actually matched.
    pub fn delete_by_ids(&self, ids: &HashSet<String>) -> Result<usize, String> {
        if ids.is_empty() {
            return Ok(0);
        }

        let _guard = self.lock.lock();
        let rules = self.load_unlocked();
        let remaining: Vec<Rule> = rules.iter().filter(|r| !ids.contains(&r.id)).cloned().collect();
        let removed = rules.len() - remaining.len();

        if removed > 0 {
            self.write_unlocked(&remaining)?;
            log::info!("[RULES] Deleted {} rule(s)", removed);
        }
        Ok(removed)
    }

    /// Report (rule id, issue) pairs without modifying the store.
    pub fn validate(&self) -> Vec<(String, String)> {
        let mut issues = Vec::new();
        for rule in self.load_all() {
            let label = if rule.id.is_empty() { "<missing id>".to_string() } else { rule.id.clone() };

            if rule.id.is_empty() {
                issues.push((label.clone(), "missing id".to_string()));
            }
            if rule.condition_tags.is_empty() {
                issues.push((label.clone(), "no condition tags".to_string()));
                continue;
            }
            let invalid: Vec<&String> = rule
                .condition_tags
                .iter()
                .filter(|t| ConditionTag::parse(t).is_none())
                .collect();
            if !invalid.is_empty() {
                issues.push((
                    label,
                    format!(
                        "invalid condition tags: {}",
                        invalid.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
                    ),
                ));
            }
        }
        issues
    }

    /// Repair every rule in place: generate ids for id-less rules, strip
    /// invalid tags (substituting the default when none survive), and fill
    /// empty descriptive fields. Never activates a rule. Returns how many
    /// rules changed.
    pub fn repair(&self) -> Result<usize, String> {
        let _guard = self.lock.lock();
        let mut rules = self.load_unlocked();
        let mut fixed = 0;

        for rule in rules.iter_mut() {
            let original = serde_json::to_string(&rule).unwrap_or_default();

            if rule.id.is_empty() {
                rule.id = format!("rule_{}", Uuid::new_v4().simple());
            }
            rule.condition_tags = sanitize_tags(&rule.condition_tags);
            rule.fill_defaults();

            if serde_json::to_string(&rule).unwrap_or_default() != original {
                fixed += 1;
            }
        }

        if fixed > 0 {
            self.write_unlocked(&rules)?;
            log::info!("[RULES] Repaired {} rule(s)", fixed);
        }
        Ok(fixed)
    }
}
