use serde::{Deserialize, Serialize};

/// An explicit trigger rule: a set of condition tags paired with a
/// natural-language action description.
///
/// Every field except `id` is optional in stored JSON; missing fields
/// deserialize to deterministic defaults. `active` defaults to `false`
/// so a malformed rule is never auto-activated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub condition_tags: Vec<String>,
    #[serde(default)]
    pub condition_description: String,
    #[serde(default)]
    pub action_description: String,
    #[serde(default)]
    pub active: bool,
}

impl Rule {
    /// Fill empty descriptive fields with deterministic defaults.
    /// Leaves `id`, `condition_tags` and `active` untouched.
    pub fn fill_defaults(&mut self) {
        if self.name.is_empty() {
            self.name = format!("Rule {}", self.id);
        }
        if self.condition_description.is_empty() {
            self.condition_description = format!("Conditions: {}", self.condition_tags.join(", "));
        }
        if self.action_description.is_empty() {
            self.action_description = "Automatically generated action".to_string();
        }
    }
}
