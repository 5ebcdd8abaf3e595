//! Session output log
//!
//! Append-only record of what was received, sent and what went wrong during
//! the current connection, exposed as one growing text blob.

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Origin of an output message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageTag {
    /// Line read from the device
    Received,
    /// Text written to the device
    Sent,
    /// Reader failure
    Error,
}

impl MessageTag {
    /// Short prefix used in the rendered text
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Received => "RX",
            Self::Sent => "TX",
            Self::Error => "ERR",
        }
    }
}

/// A single output entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEntry {
    /// When the entry was appended
    pub timestamp: DateTime<Local>,
    /// Origin
    pub tag: MessageTag,
    /// Message text
    pub text: String,
}

impl OutputEntry {
    /// Create new entry
    pub fn new(tag: MessageTag, text: &str) -> Self {
        Self {
            timestamp: Local::now(),
            tag,
            text: text.to_string(),
        }
    }

    /// Format as a text line
    pub fn to_text(&self, show_timestamp: bool) -> String {
        if show_timestamp {
            format!(
                "[{}] {} {}",
                self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
                self.tag.prefix(),
                self.text
            )
        } else {
            format!("{} {}", self.tag.prefix(), self.text)
        }
    }
}

#[derive(Debug, Default)]
struct OutputLog {
    entries: Vec<OutputEntry>,
    text: String,
}

/// Shared, append-only output buffer
///
/// Cloning yields another handle to the same log.
#[derive(Debug, Clone)]
pub struct OutputSink {
    log: Arc<RwLock<OutputLog>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for OutputSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink {
    /// Create an empty sink
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            log: Arc::new(RwLock::new(OutputLog::default())),
            revision: Arc::new(revision),
        }
    }

    /// Append a message
    pub fn append(&self, text: &str, tag: MessageTag) {
        let entry = OutputEntry::new(tag, text);
        {
            let mut log = self.log.write();
            log.text.push_str(&entry.to_text(false));
            log.text.push('\n');
            log.entries.push(entry);
        }
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Drop every entry
    pub fn clear(&self) {
        {
            let mut log = self.log.write();
            log.entries.clear();
            log.text.clear();
        }
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Rendered text of the whole log, one `TAG text` line per entry
    pub fn text(&self) -> String {
        self.log.read().text.clone()
    }

    /// Snapshot of all entries
    pub fn entries(&self) -> Vec<OutputEntry> {
        self.log.read().entries.clone()
    }

    /// Entries appended after the first `offset`
    pub fn entries_since(&self, offset: usize) -> Vec<OutputEntry> {
        let log = self.log.read();
        log.entries.get(offset..).map(<[_]>::to_vec).unwrap_or_default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.log.read().entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count entries with a given tag
    pub fn count(&self, tag: MessageTag) -> usize {
        self.log.read().entries.iter().filter(|e| e.tag == tag).count()
    }

    /// Watch the revision counter; it changes on every append or clear
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_renders_tagged_lines() {
        let sink = OutputSink::new();
        sink.append("hello", MessageTag::Received);
        sink.append("PING", MessageTag::Sent);
        sink.append("boom", MessageTag::Error);

        assert_eq!(sink.text(), "RX hello\nTX PING\nERR boom\n");
        assert_eq!(sink.len(), 3);
        assert_eq!(sink.count(MessageTag::Sent), 1);
    }

    #[test]
    fn test_clear_resets_log() {
        let sink = OutputSink::new();
        sink.append("a", MessageTag::Received);
        sink.clear();

        assert!(sink.is_empty());
        assert_eq!(sink.text(), "");
    }

    #[test]
    fn test_entries_since() {
        let sink = OutputSink::new();
        for i in 0..5 {
            sink.append(&i.to_string(), MessageTag::Received);
        }
        let tail: Vec<String> = sink.entries_since(3).into_iter().map(|e| e.text).collect();
        assert_eq!(tail, vec!["3", "4"]);
        assert!(sink.entries_since(10).is_empty());
    }

    #[test]
    fn test_clones_share_the_log() {
        let sink = OutputSink::new();
        let other = sink.clone();
        other.append("x", MessageTag::Received);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_revision_notifies_subscribers() {
        let sink = OutputSink::new();
        let mut rx = sink.subscribe();

        sink.append("x", MessageTag::Received);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);

        sink.clear();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 2);
    }
}
