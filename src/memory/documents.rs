//! Sectioned markdown memory documents (user facts, contextual rules).
//!
//! A document is a title heading followed by `## Section` headings and
//! `- item` bullet lines. Merging is deliberately approximate: new lines
//! replace an existing item when a cheap key/keyword match says they
//! describe the same thing, and false matches in either direction are
//! accepted behavior. The whole file is rewritten on every merge.

use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;

/// Section names a contextual rule can be classified into, tried in
/// order; the first trigger-word hit wins.
const RULE_SECTIONS: &[(&str, &[&str])] = &[
    ("Prohibitions", &["do not", "don't", "never", "avoid"]),
    ("Emotional Response", &["sad", "upset", "emotion", "feeling"]),
    ("Situational Rules", &["when ", "if ", "situation"]),
];

/// Ordered sections of a parsed document.
type Sections = Vec<(String, Vec<String>)>;

pub struct MemoryDocument {
    path: PathBuf,
    title: String,
    default_section: String,
    lock: Mutex<()>,
}

impl MemoryDocument {
    pub fn new(path: impl Into<PathBuf>, title: &str, default_section: &str) -> Self {
        MemoryDocument {
            path: path.into(),
            title: title.to_string(),
            default_section: default_section.to_string(),
            lock: Mutex::new(()),
        }
    }

    /// Read the raw document content. Missing or unreadable files load as
    /// an empty document.
    pub fn read(&self) -> String {
        match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::error!("[MEMORY] Failed to read {}: {}", self.path.display(), e);
                }
                String::new()
            }
        }
    }

    /// Merge fact lines: replace the first existing item sharing the
    /// line's key (text before the first colon), else append to the
    /// default section. Returns the number of lines merged.
    pub fn merge_facts(&self, new_lines: &[String]) -> Result<usize, String> {
        self.merge_with(new_lines, merge_fact_line)
    }

    /// Merge contextual rule lines: replace an existing item containing
    /// the line's first three keywords, else classify by trigger words and
    /// append. Returns the number of lines merged.
    pub fn merge_rules(&self, new_lines: &[String]) -> Result<usize, String> {
        self.merge_with(new_lines, merge_rule_line)
    }

    fn merge_with(
        &self,
        new_lines: &[String],
        merge_line: fn(&mut Sections, &str, &str),
    ) -> Result<usize, String> {
        if new_lines.is_empty() {
            return Ok(0);
        }

        let _guard = self.lock.lock();
        let mut sections = parse_sections(&self.read(), &self.default_section);
        for line in new_lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            merge_line(&mut sections, line, &self.default_section);
        }

        self.write_unlocked(&sections)?;
        Ok(new_lines.len())
    }

    fn write_unlocked(&self, sections: &Sections) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }
        fs::write(&self.path, render(&self.title, sections))
            .map_err(|e| format!("Failed to write {}: {}", self.path.display(), e))
    }
}

/// Parse markdown into ordered (section, items) pairs. Bullets seen
/// before any `## ` heading belong to the default section.
fn parse_sections(content: &str, default_section: &str) -> Sections {
    let mut sections: Sections = Vec::new();
    let mut current = default_section.to_string();

    for line in content.lines() {
        if let Some(heading) = line.strip_prefix("## ") {
            current = heading.trim().to_string();
            if !sections.iter().any(|(name, _)| *name == current) {
                sections.push((current.clone(), Vec::new()));
            }
        } else if line.starts_with("- ") {
            section_items(&mut sections, &current).push(line.to_string());
        }
    }

    sections
}

/// Render the document: title, then each non-empty section in first-seen
/// order. Empty sections are omitted.
fn render(title: &str, sections: &Sections) -> String {
    let mut out = format!("{}\n\n", title);
    for (name, items) in sections {
        if items.is_empty() {
            continue;
        }
        out.push_str(&format!("## {}\n", name));
        out.push_str(&items.join("\n"));
        out.push_str("\n\n");
    }
    out
}

fn section_items<'a>(sections: &'a mut Sections, name: &str) -> &'a mut Vec<String> {
    if let Some(idx) = sections.iter().position(|(n, _)| n == name) {
        &mut sections[idx].1
    } else {
        sections.push((name.to_string(), Vec::new()));
        &mut sections.last_mut().unwrap().1
    }
}

/// Fact matching: the key is everything before the first colon (the whole
/// line when there is none). Any existing item containing the key as a
/// substring is treated as the same fact and replaced in place.
fn merge_fact_line(sections: &mut Sections, fact: &str, default_section: &str) {
    let key = match fact.split_once(':') {
        Some((prefix, _)) => prefix.trim(),
        None => fact,
    };

    for (_, items) in sections.iter_mut() {
        for item in items.iter_mut() {
            if !key.is_empty() && item.contains(key) {
                *item = format!("- {}", fact);
                return;
            }
        }
    }

    section_items(sections, default_section).push(format!("- {}", fact));
}

/// Rule matching: the first three whitespace tokens (lowercased) form the
/// keyword set; an existing item containing them all is replaced. New
/// rules are classified into a section by trigger-word substring match.
fn merge_rule_line(sections: &mut Sections, rule: &str, default_section: &str) {
    let lowered = rule.to_lowercase();
    let keywords: Vec<&str> = lowered.split_whitespace().take(3).collect();

    if !keywords.is_empty() {
        for (_, items) in sections.iter_mut() {
            for item in items.iter_mut() {
                let item_lower = item.to_lowercase();
                if keywords.iter().all(|k| item_lower.contains(k)) {
                    *item = format!("- {}", rule);
                    return;
                }
            }
        }
    }

    let target = RULE_SECTIONS
        .iter()
        .find(|(_, triggers)| triggers.iter().any(|t| lowered.contains(t)))
        .map(|(name, _)| *name)
        .unwrap_or(default_section);

    section_items(sections, target).push(format!("- {}", rule));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn facts_doc(dir: &TempDir) -> MemoryDocument {
        MemoryDocument::new(dir.path().join("facts.md"), "# User Information", "Other")
    }

    fn rules_doc(dir: &TempDir) -> MemoryDocument {
        MemoryDocument::new(
            dir.path().join("contextual_rules.md"),
            "# Contextual Rules",
            "Other Rules",
        )
    }

    #[test]
    fn new_fact_lands_in_default_section() {
        let dir = TempDir::new().unwrap();
        let doc = facts_doc(&dir);
        doc.merge_facts(&["Favorite drink: green tea".to_string()]).unwrap();

        let content = doc.read();
        assert!(content.starts_with("# User Information\n"));
        assert!(content.contains("## Other\n- Favorite drink: green tea"));
    }

    #[test]
    fn fact_with_matching_key_replaces_in_place() {
        let dir = TempDir::new().unwrap();
        let doc = facts_doc(&dir);
        doc.merge_facts(&["Favorite drink: coffee".to_string()]).unwrap();
        doc.merge_facts(&["Favorite drink: green tea".to_string()]).unwrap();

        let content = doc.read();
        assert_eq!(content.matches("Favorite drink").count(), 1);
        assert!(content.contains("- Favorite drink: green tea"));
        assert!(!content.contains("coffee"));
    }

    #[test]
    fn fact_key_match_handles_multibyte_text() {
        let dir = TempDir::new().unwrap();
        let doc = facts_doc(&dir);
        doc.merge_facts(&["생일: 1월 1일".to_string()]).unwrap();
        doc.merge_facts(&["생일: 3월 5일".to_string()]).unwrap();

        let content = doc.read();
        assert_eq!(content.matches("생일").count(), 1);
        assert!(content.contains("- 생일: 3월 5일"));
    }

    #[test]
    fn fact_replacement_preserves_its_section() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("facts.md");
        std::fs::write(
            &path,
            "# User Information\n\n## Routine\n- Wake-up time: 07:00\n\n## Other\n- Pet: a cat\n\n",
        )
        .unwrap();
        let doc = MemoryDocument::new(path, "# User Information", "Other");

        doc.merge_facts(&["Wake-up time: 06:30".to_string()]).unwrap();
        let content = doc.read();
        let routine_pos = content.find("## Routine").unwrap();
        let other_pos = content.find("## Other").unwrap();
        let fact_pos = content.find("- Wake-up time: 06:30").unwrap();
        assert!(routine_pos < fact_pos && fact_pos < other_pos);
    }

    #[test]
    fn rule_with_shared_keywords_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let doc = rules_doc(&dir);
        doc.merge_rules(&["Keep replies short and casual in the evening".to_string()])
            .unwrap();
        doc.merge_rules(&["Keep replies short during work hours too".to_string()])
            .unwrap();

        let content = doc.read();
        assert_eq!(content.matches("Keep replies short").count(), 1);
        assert!(content.contains("during work hours"));
        assert!(!content.contains("casual"));
    }

    #[test]
    fn rules_classify_by_trigger_words() {
        let dir = TempDir::new().unwrap();
        let doc = rules_doc(&dir);
        doc.merge_rules(&[
            "Never bring up work on weekends".to_string(),
            "Offer comfort if the user sounds sad".to_string(),
            "When the user is studying, keep quiet".to_string(),
            "Prefers short greetings".to_string(),
        ])
        .unwrap();

        let content = doc.read();
        let section_of = |item: &str| {
            let item_pos = content.find(item).unwrap();
            content[..item_pos]
                .rmatch_indices("## ")
                .next()
                .map(|(pos, _)| content[pos..].lines().next().unwrap().to_string())
                .unwrap()
        };
        assert_eq!(section_of("Never bring up work"), "## Prohibitions");
        assert_eq!(section_of("Offer comfort"), "## Emotional Response");
        assert_eq!(section_of("When the user is studying"), "## Situational Rules");
        assert_eq!(section_of("Prefers short greetings"), "## Other Rules");
    }

    #[test]
    fn sections_keep_first_seen_order_and_empty_ones_are_omitted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("facts.md");
        std::fs::write(
            &path,
            "# User Information\n\n## Work\n- Job: nurse\n\n## Empty Section\n\n## Hobbies\n- Hobby: climbing\n\n",
        )
        .unwrap();
        let doc = MemoryDocument::new(path, "# User Information", "Other");
        doc.merge_facts(&["City: Busan".to_string()]).unwrap();

        let content = doc.read();
        let work = content.find("## Work").unwrap();
        let hobbies = content.find("## Hobbies").unwrap();
        let other = content.find("## Other").unwrap();
        assert!(work < hobbies && hobbies < other);
        assert!(!content.contains("## Empty Section"));
    }
}
