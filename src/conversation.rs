//! Append-only conversation log.
//!
//! One JSON record per line, UTF-8, never rewritten in place. The log is
//! the source of truth for recent-history prompts and for the
//! last-activity clock the scheduler's elapsed conditions read.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use parking_lot::Mutex;

use crate::activity::ActivityTracker;
use crate::models::{ConversationEntry, Role};

pub struct ConversationLog {
    path: PathBuf,
    tracker: ActivityTracker,
    lock: Mutex<()>,
}

impl ConversationLog {
    pub fn new(path: impl Into<PathBuf>, tracker: ActivityTracker) -> Self {
        ConversationLog {
            path: path.into(),
            tracker,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and move the last-activity clock. Both user and
    /// assistant entries count as activity.
    pub fn append(&self, entry: &ConversationEntry) -> Result<(), String> {
        let line = serde_json::to_string(entry)
            .map_err(|e| format!("Failed to serialize log entry: {}", e))?;

        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| format!("Failed to open {}: {}", self.path.display(), e))?;
        writeln!(file, "{}", line)
            .map_err(|e| format!("Failed to append to {}: {}", self.path.display(), e))?;
        drop(file);

        self.tracker.record(entry.time);
        Ok(())
    }

    /// Last `limit` entries for a channel. With `user_name` set, other
    /// users' messages are skipped but assistant replies are kept.
    /// Unparseable lines are skipped; a missing file yields an empty list.
    pub fn recent(&self, channel: &str, user_name: Option<&str>, limit: usize) -> Vec<ConversationEntry> {
        let mut entries = Vec::new();
        for entry in self.read_entries() {
            if entry.channel != channel {
                continue;
            }
            if let Some(name) = user_name {
                if entry.role == Role::User && entry.name != name {
                    continue;
                }
            }
            entries.push(entry);
        }

        if entries.len() > limit {
            entries.split_off(entries.len() - limit)
        } else {
            entries
        }
    }

    /// Latest timestamp anywhere in the log.
    pub fn last_timestamp(&self) -> Option<DateTime<Local>> {
        self.read_entries().map(|e| e.time).max()
    }

    /// Prime the activity tracker from the log tail. Called once at
    /// startup so elapsed conditions survive restarts.
    pub fn seed_activity(&self) {
        match self.last_timestamp() {
            Some(at) => {
                self.tracker.record(at);
                log::info!("[LOG] Last message time restored: {}", at.to_rfc3339());
            }
            None => log::info!("[LOG] No previous messages found"),
        }
    }

    fn read_entries(&self) -> impl Iterator<Item = ConversationEntry> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => Some(f),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::error!("[LOG] Failed to open {}: {}", self.path.display(), e);
                }
                None
            }
        };

        file.into_iter().flat_map(|f| {
            BufReader::new(f)
                .lines()
                .filter_map(|line| line.ok())
                .filter_map(|line| serde_json::from_str::<ConversationEntry>(&line).ok())
        })
    }

    /// Total number of parseable entries (diagnostics).
    pub fn entry_count(&self) -> usize {
        self.read_entries().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn log_in(dir: &TempDir) -> ConversationLog {
        ConversationLog::new(dir.path().join("logs").join("history.jsonl"), ActivityTracker::new())
    }

    fn entry(role: Role, name: &str, channel: &str, content: &str) -> ConversationEntry {
        ConversationEntry::new(role, name, channel, content)
    }

    #[test]
    fn append_is_one_json_line_per_entry() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        log.append(&entry(Role::User, "Dana", "123", "hello")).unwrap();
        log.append(&entry(Role::Assistant, "MIRA", "123", "hi!")).unwrap();

        let raw = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(raw.lines().count(), 2);
        let first: ConversationEntry = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
        assert_eq!(first.role, Role::User);
        assert_eq!(first.content, "hello");
    }

    #[test]
    fn recent_filters_by_channel_and_user() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        log.append(&entry(Role::User, "Dana", "123", "one")).unwrap();
        log.append(&entry(Role::User, "Eli", "123", "two")).unwrap();
        log.append(&entry(Role::Assistant, "MIRA", "123", "three")).unwrap();
        log.append(&entry(Role::User, "Dana", "456", "elsewhere")).unwrap();

        let recent = log.recent("123", Some("Dana"), 5);
        let contents: Vec<&str> = recent.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "three"]);
    }

    #[test]
    fn recent_returns_only_the_tail() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        for i in 0..10 {
            log.append(&entry(Role::User, "Dana", "123", &format!("msg{}", i))).unwrap();
        }
        let recent = log.recent("123", None, 3);
        let contents: Vec<&str> = recent.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["msg7", "msg8", "msg9"]);
    }

    #[test]
    fn corrupt_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        log.append(&entry(Role::User, "Dana", "123", "good")).unwrap();

        let mut raw = std::fs::read_to_string(log.path()).unwrap();
        raw.push_str("{ definitely not json\n");
        std::fs::write(log.path(), raw).unwrap();
        log.append(&entry(Role::User, "Dana", "123", "also good")).unwrap();

        assert_eq!(log.entry_count(), 2);
    }

    #[test]
    fn seed_activity_restores_the_clock() {
        let dir = TempDir::new().unwrap();
        let tracker = ActivityTracker::new();
        let path = dir.path().join("history.jsonl");
        {
            let log = ConversationLog::new(&path, ActivityTracker::new());
            log.append(&entry(Role::User, "Dana", "123", "hello")).unwrap();
        }

        // Fresh process: new tracker, same file.
        let log = ConversationLog::new(&path, tracker.clone());
        assert!(tracker.last_activity().is_none());
        log.seed_activity();
        assert!(tracker.last_activity().is_some());
    }

    #[test]
    fn append_updates_activity() {
        let dir = TempDir::new().unwrap();
        let tracker = ActivityTracker::new();
        let log = ConversationLog::new(dir.path().join("h.jsonl"), tracker.clone());
        log.append(&entry(Role::Assistant, "MIRA", "123", "hi")).unwrap();
        assert!(tracker.last_activity().is_some());
    }
}
