//! The admin action log.
//!
//! Every successful create, change and delete through the API records a
//! [`LogEntry`]. Change messages are stored as structured JSON, e.g.
//! `[{"changed": {"fields": ["Title"]}}, {"added": {"name": "chapter", "object": "Intro"}}]`,
//! and rendered to text by [`LogEntry::get_change_message`].

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, PoisonError, RwLock};

use admin_mis_forms::formset::{get_text_list, FormSetChange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Action flag values, as stored by the standard admin log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ActionFlag {
    Addition = 1,
    Change = 2,
    Deletion = 3,
}

impl ActionFlag {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Addition => "Addition",
            Self::Change => "Change",
            Self::Deletion => "Deletion",
        }
    }
}

impl std::fmt::Display for ActionFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One recorded admin action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub action_time: DateTime<Utc>,
    pub user_id: i64,
    /// `"app_label.model_name"` of the affected object.
    pub content_type: String,
    pub object_id: String,
    pub object_repr: String,
    pub action_flag: ActionFlag,
    /// Structured change message (a JSON array), or empty.
    pub change_message: String,
}

impl LogEntry {
    pub fn is_addition(&self) -> bool {
        self.action_flag == ActionFlag::Addition
    }

    pub fn is_change(&self) -> bool {
        self.action_flag == ActionFlag::Change
    }

    pub fn is_deletion(&self) -> bool {
        self.action_flag == ActionFlag::Deletion
    }

    /// Renders the structured change message as text.
    ///
    /// A message that is not a JSON array is returned as is.
    pub fn get_change_message(&self) -> String {
        let Ok(Value::Array(parts)) = serde_json::from_str::<Value>(&self.change_message) else {
            return self.change_message.clone();
        };
        let mut out = Vec::new();
        for part in &parts {
            if let Some(added) = part.get("added") {
                out.push(match named(added) {
                    Some((name, object)) => format!("Added {name} \u{201c}{object}\u{201d}."),
                    None => "Added.".to_string(),
                });
            } else if let Some(changed) = part.get("changed") {
                let fields: Vec<String> = changed
                    .get("fields")
                    .and_then(Value::as_array)
                    .map(|f| f.iter().filter_map(Value::as_str).map(ToString::to_string).collect())
                    .unwrap_or_default();
                let fields = get_text_list(&fields, "and");
                out.push(match named(changed) {
                    Some((name, object)) => {
                        format!("Changed {fields} for {name} \u{201c}{object}\u{201d}.")
                    }
                    None => format!("Changed {fields}."),
                });
            } else if let Some((name, object)) = part.get("deleted").and_then(named) {
                out.push(format!("Deleted {name} \u{201c}{object}\u{201d}."));
            }
        }
        if out.is_empty() {
            "No fields changed.".to_string()
        } else {
            out.join(" ")
        }
    }
}

fn named(part: &Value) -> Option<(&str, &str)> {
    Some((part.get("name")?.as_str()?, part.get("object")?.as_str()?))
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} {} (pk={}) by user {}",
            self.action_time.format("%Y-%m-%d %H:%M:%S"),
            self.action_flag,
            self.object_repr,
            self.object_id,
            self.user_id,
        )
    }
}

/// Builds the structured change message for a saved form and its inline
/// changes.
pub fn construct_change_message(
    changed_labels: &[String],
    inline_changes: &[FormSetChange],
    add: bool,
) -> Value {
    let mut message = Vec::new();
    if add {
        message.push(json!({ "added": {} }));
    } else if !changed_labels.is_empty() {
        message.push(json!({ "changed": { "fields": changed_labels } }));
    }
    for change in inline_changes {
        message.push(match change {
            FormSetChange::Added { name, object } => {
                json!({ "added": { "name": name, "object": object } })
            }
            FormSetChange::Changed { name, object, fields } => {
                json!({ "changed": { "name": name, "object": object, "fields": fields } })
            }
            FormSetChange::Deleted { name, object } => {
                json!({ "deleted": { "name": name, "object": object } })
            }
        });
    }
    Value::Array(message)
}

/// Storage for log entries.
pub trait LogEntryStore: Send + Sync {
    fn log_action(
        &self,
        user_id: i64,
        content_type: &str,
        object_id: &str,
        object_repr: &str,
        action_flag: ActionFlag,
        change_message: &str,
    ) -> LogEntry;

    fn log_addition(
        &self,
        user_id: i64,
        content_type: &str,
        object_id: &str,
        object_repr: &str,
        change_message: &str,
    ) -> LogEntry {
        self.log_action(
            user_id,
            content_type,
            object_id,
            object_repr,
            ActionFlag::Addition,
            change_message,
        )
    }

    fn log_change(
        &self,
        user_id: i64,
        content_type: &str,
        object_id: &str,
        object_repr: &str,
        change_message: &str,
    ) -> LogEntry {
        self.log_action(
            user_id,
            content_type,
            object_id,
            object_repr,
            ActionFlag::Change,
            change_message,
        )
    }

    fn log_deletion(
        &self,
        user_id: i64,
        content_type: &str,
        object_id: &str,
        object_repr: &str,
    ) -> LogEntry {
        self.log_action(
            user_id,
            content_type,
            object_id,
            object_repr,
            ActionFlag::Deletion,
            "",
        )
    }

    /// Entries for one object, newest first.
    fn get_for_object(&self, content_type: &str, object_id: &str) -> Vec<LogEntry>;

    /// The latest entries, newest first.
    fn recent(&self, limit: usize) -> Vec<LogEntry>;

    fn count(&self) -> usize;
}

/// In-memory [`LogEntryStore`].
#[derive(Debug, Clone)]
pub struct InMemoryLogEntryStore {
    entries: Arc<RwLock<Vec<LogEntry>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryLogEntryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for InMemoryLogEntryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogEntryStore for InMemoryLogEntryStore {
    fn log_action(
        &self,
        user_id: i64,
        content_type: &str,
        object_id: &str,
        object_repr: &str,
        action_flag: ActionFlag,
        change_message: &str,
    ) -> LogEntry {
        let entry = LogEntry {
            id: self.next_id.fetch_add(1, AtomicOrdering::Relaxed),
            action_time: Utc::now(),
            user_id,
            content_type: content_type.to_string(),
            object_id: object_id.to_string(),
            object_repr: object_repr.to_string(),
            action_flag,
            change_message: change_message.to_string(),
        };
        tracing::debug!(entry = %entry, "log entry recorded");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        entry
    }

    fn get_for_object(&self, content_type: &str, object_id: &str) -> Vec<LogEntry> {
        let mut result: Vec<LogEntry> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.content_type == content_type && e.object_id == object_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.id.cmp(&a.id));
        result
    }

    fn recent(&self, limit: usize) -> Vec<LogEntry> {
        let mut result = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        result.sort_by(|a, b| b.id.cmp(&a.id));
        result.truncate(limit);
        result
    }

    fn count(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message: &str) -> LogEntry {
        InMemoryLogEntryStore::new().log_change(1, "library.book", "1", "Dune", message)
    }

    #[test]
    fn test_action_flag() {
        assert_eq!(ActionFlag::Addition.as_u8(), 1);
        assert_eq!(ActionFlag::Deletion.as_u8(), 3);
        assert_eq!(format!("{}", ActionFlag::Change), "Change");
    }

    #[test]
    fn test_construct_change_message_add() {
        let message = construct_change_message(
            &[],
            &[FormSetChange::Added {
                name: "chapter".into(),
                object: "Intro".into(),
            }],
            true,
        );
        assert_eq!(
            message,
            json!([{"added": {}}, {"added": {"name": "chapter", "object": "Intro"}}])
        );
    }

    #[test]
    fn test_construct_change_message_change() {
        let message = construct_change_message(
            &["Title".to_string()],
            &[FormSetChange::Deleted {
                name: "chapter".into(),
                object: "Old".into(),
            }],
            false,
        );
        assert_eq!(
            message,
            json!([
                {"changed": {"fields": ["Title"]}},
                {"deleted": {"name": "chapter", "object": "Old"}},
            ])
        );
        assert_eq!(construct_change_message(&[], &[], false), json!([]));
    }

    #[test]
    fn test_get_change_message() {
        assert_eq!(entry(r#"[{"added": {}}]"#).get_change_message(), "Added.");
        assert_eq!(
            entry(r#"[{"changed": {"fields": ["Title", "Year", "Isbn"]}}]"#).get_change_message(),
            "Changed Title, Year and Isbn."
        );
        let message = json!([
            {"changed": {"name": "chapter", "object": "Intro", "fields": ["Title"]}},
            {"deleted": {"name": "chapter", "object": "Old"}},
        ]);
        assert_eq!(
            entry(&message.to_string()).get_change_message(),
            "Changed Title for chapter \u{201c}Intro\u{201d}. Deleted chapter \u{201c}Old\u{201d}."
        );
        assert_eq!(entry("[]").get_change_message(), "No fields changed.");
        assert_eq!(entry("plain text").get_change_message(), "plain text");
    }

    #[test]
    fn test_store_queries() {
        let store = InMemoryLogEntryStore::new();
        store.log_addition(1, "library.book", "1", "Dune", r#"[{"added": {}}]"#);
        store.log_change(1, "library.book", "1", "Dune", "[]");
        store.log_deletion(2, "library.book", "2", "Emma");
        assert_eq!(store.count(), 3);

        let history = store.get_for_object("library.book", "1");
        assert_eq!(history.len(), 2);
        assert!(history[0].is_change());
        assert!(history[1].is_addition());

        let recent = store.recent(1);
        assert_eq!(recent.len(), 1);
        assert!(recent[0].is_deletion());
        assert_eq!(recent[0].user_id, 2);
    }
}
