//! User-facing messages produced while handling a request.
//!
//! Admin actions report their outcome through [`Messages`]; the action
//! endpoint returns them as `{message_content, message_level}` objects.

use serde::Serialize;

/// Message severity, with the numeric levels of the standard messages
/// framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug = 10,
    Info = 20,
    Success = 25,
    Warning = 30,
    Error = 40,
}

impl Level {
    /// The label clients see. Debug messages have none.
    pub const fn human_readable(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Info => "Information",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Debug => "Unknown",
        }
    }
}

/// Messages below this level are dropped.
pub const MIN_LEVEL: Level = Level::Info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub message_content: String,
    pub message_level: &'static str,
}

/// Messages queued during one request.
#[derive(Debug, Default)]
pub struct Messages {
    queued: Vec<(Level, String)>,
}

impl Messages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, level: Level, message: impl Into<String>) {
        if level < MIN_LEVEL {
            return;
        }
        self.queued.push((level, message.into()));
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.add(Level::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.add(Level::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.add(Level::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.add(Level::Error, message);
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Drains the queue into the client representation.
    pub fn into_payload(self) -> Vec<Message> {
        self.queued
            .into_iter()
            .map(|(level, message)| Message {
                message_content: message,
                message_level: level.human_readable(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_labelled() {
        assert_eq!(Level::Success.human_readable(), "Success");
        assert_eq!(Level::Info.human_readable(), "Information");
        assert_eq!(Level::Warning.human_readable(), "Warning");
        assert_eq!(Level::Error.human_readable(), "Error");
        assert_eq!(Level::Debug.human_readable(), "Unknown");
    }

    #[test]
    fn test_debug_messages_are_dropped() {
        let mut messages = Messages::new();
        messages.add(Level::Debug, "noise");
        messages.success("done");
        messages.error("failed");
        assert_eq!(messages.len(), 2);
        let payload = messages.into_payload();
        assert_eq!(payload[0].message_content, "done");
        assert_eq!(payload[1].message_level, "Error");
    }

    #[test]
    fn test_payload_shape() {
        let mut messages = Messages::new();
        messages.warning("careful");
        let value = serde_json::to_value(messages.into_payload()).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{"message_content": "careful", "message_level": "Warning"}])
        );
    }
}
