//! Editor settings reconciliation
//!
//! Brings a settings document in line with a table of desired edits.
//! Each edit carries a condition; when the current value (or the edit's
//! declared default, if the key is absent) already satisfies it the edit is
//! skipped. Running the same table twice changes nothing the second time.
//!
//! Edits in a table must be independent: no condition may look at another
//! edit's key. Table order only affects the order changes are reported in.

use crate::editor_settings::SettingsStore;
use crate::types::ConfigDocument;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Report line when the document was persisted
pub const UPDATED_MESSAGE: &str = "Editor settings updated successfully.";

/// Report line when every edit already holds
pub const NO_CHANGES_MESSAGE: &str = "No editor settings changes needed.";

/// How the current value is compared with the desired one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Current value must equal the desired value
    #[default]
    Equals,
    /// Current value must be a number >= the desired value
    AtLeast,
}

impl Condition {
    pub fn is_satisfied(&self, current: Option<&Value>, desired: &Value) -> bool {
        let Some(current) = current else {
            return false;
        };
        match self {
            Condition::Equals => current == desired,
            Condition::AtLeast => match (current.as_f64(), desired.as_f64()) {
                (Some(have), Some(want)) => have >= want,
                _ => false,
            },
        }
    }
}

/// A target setting and the rule deciding whether it already holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredEdit {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub condition: Condition,
    /// Value assumed when the key is missing from the document
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

impl DesiredEdit {
    pub fn new(key: &str, value: Value, condition: Condition) -> Self {
        Self {
            key: key.to_string(),
            value,
            condition,
            default: None,
            description: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Human-readable change line
    pub fn describe(&self) -> String {
        match &self.description {
            Some(text) => text.clone(),
            None => match &self.value {
                Value::String(s) => format!("Set '{}' to '{}'.", self.key, s),
                other => format!("Set '{}' to {}.", self.key, other),
            },
        }
    }

    /// Whether the document already meets this edit
    pub fn holds_in(&self, doc: &ConfigDocument) -> bool {
        let current = doc.get(&self.key).or(self.default.as_ref());
        self.condition.is_satisfied(current, &self.value)
    }
}

/// Non-mutating suggestion fired when a list setting grows too long
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListLengthAdvisory {
    pub key: String,
    pub threshold: usize,
}

impl ListLengthAdvisory {
    pub fn check(&self, doc: &ConfigDocument) -> Option<String> {
        let count = doc.get(&self.key)?.as_array()?.len();
        if count <= self.threshold {
            return None;
        }
        Some(format!(
            "You have {} {} installed. Consider disabling or uninstalling unused {} to improve performance.",
            count, self.key, self.key
        ))
    }
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub document: ConfigDocument,
    /// One line per edit that was applied, in table order
    pub applied: Vec<String>,
    /// Suggestions that did not touch the document
    pub advisories: Vec<String>,
    pub changed: bool,
}

/// Apply every edit whose condition fails
pub fn reconcile(current: &ConfigDocument, edits: &[DesiredEdit]) -> ReconcileOutcome {
    let mut document = current.clone();
    let mut applied = Vec::new();

    for edit in edits {
        if edit.holds_in(&document) {
            continue;
        }
        document.insert(edit.key.clone(), edit.value.clone());
        applied.push(edit.describe());
    }

    let changed = !applied.is_empty();
    ReconcileOutcome {
        document,
        applied,
        advisories: Vec::new(),
        changed,
    }
}

/// Desired edits plus advisory rules evaluated together
#[derive(Debug, Clone, PartialEq)]
pub struct EditTable {
    pub edits: Vec<DesiredEdit>,
    pub advisories: Vec<ListLengthAdvisory>,
}

impl Default for EditTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl EditTable {
    /// Whitespace rendering and a readable font size, plus the extension count advisory
    pub fn standard() -> Self {
        Self {
            edits: vec![
                DesiredEdit::new("editor.renderWhitespace", json!("all"), Condition::Equals)
                    .with_description("Set 'editor.renderWhitespace' to 'all'."),
                DesiredEdit::new("editor.fontSize", json!(14), Condition::AtLeast)
                    .with_default(json!(12))
                    .with_description("Set 'editor.fontSize' to 14."),
            ],
            advisories: vec![ListLengthAdvisory {
                key: "extensions".to_string(),
                threshold: 10,
            }],
        }
    }

    /// Standard table followed by extra edits; extras never replace standard keys
    pub fn with_extra_edits(mut self, extra: &[DesiredEdit]) -> Self {
        for edit in extra {
            if self.edits.iter().any(|e| e.key == edit.key) {
                warn!("Ignoring extra edit for '{}': key already in the edit table", edit.key);
                continue;
            }
            self.edits.push(edit.clone());
        }
        self
    }

    pub fn reconcile(&self, current: &ConfigDocument) -> ReconcileOutcome {
        let mut outcome = reconcile(current, &self.edits);
        outcome.advisories = self
            .advisories
            .iter()
            .filter_map(|rule| rule.check(&outcome.document))
            .collect();
        outcome
    }

    /// Read the store, reconcile, persist on change and describe what happened
    pub fn reconcile_and_persist(&self, store: &SettingsStore) -> Vec<String> {
        let current = store.load();
        let outcome = self.reconcile(&current);

        if !outcome.changed {
            info!("Editor settings already match the edit table");
            let mut report = outcome.advisories;
            report.push(NO_CHANGES_MESSAGE.to_string());
            return report;
        }

        match store.save(&outcome.document) {
            Ok(()) => {
                info!("Applied {} editor setting change(s)", outcome.applied.len());
                let mut report = outcome.applied;
                report.extend(outcome.advisories);
                report.push(UPDATED_MESSAGE.to_string());
                report
            }
            Err(e) => {
                warn!("Failed to persist editor settings: {}", e);
                vec![format!("Failed to update editor settings: {}", e)]
            }
        }
    }
}
