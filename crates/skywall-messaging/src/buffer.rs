//! Persistent message buffer
//!
//! Async sends and failed buffered-opt-in sync sends land here. The queue is
//! bounded by message count and total byte size; on shutdown outstanding
//! entries are written to a JSON-lines file and reloaded on the next start.
//! Within a category, order of delivery is the order of enqueue.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use skywall_core::fs::{ensure_parent_dir, read_to_string_opt};
use skywall_core::Result as CoreResult;

use crate::metadata::{MessageCategory, MessageMetadata};
use crate::response::HttpMethod;

/// One buffered message, exactly what is needed to replay the send
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferedMessage {
    /// HTTP method of the original send
    pub method: HttpMethod,
    /// Request URI
    pub uri: String,
    /// Request body
    pub body: String,
    /// Message category
    pub category: MessageCategory,
    /// Destination and delivery metadata
    pub metadata: MessageMetadata,
    /// Replay attempts so far
    #[serde(default)]
    pub retries: u32,
}

impl BufferedMessage {
    fn approximate_size(&self) -> usize {
        self.body.len() + self.uri.len() + 64
    }
}

/// Bounded FIFO queue with on-disk persistence
pub struct MessageBuffer {
    queue: Mutex<VecDeque<BufferedMessage>>,
    max_messages: usize,
    max_bytes: usize,
    persist_path: Option<PathBuf>,
}

impl MessageBuffer {
    /// In-memory buffer bounded by message count and byte size
    pub fn new(max_messages: usize, max_bytes: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            max_messages,
            max_bytes,
            persist_path: None,
        }
    }

    /// Buffer that persists to `path` on [`persist`](Self::persist)
    pub fn with_persistence(max_messages: usize, max_bytes: usize, path: impl AsRef<Path>) -> Self {
        Self {
            persist_path: Some(path.as_ref().to_path_buf()),
            ..Self::new(max_messages, max_bytes)
        }
    }

    /// Enqueue a message; the oldest entries are dropped when a bound is hit
    pub fn push(&self, message: BufferedMessage) {
        let mut queue = self.queue.lock();
        queue.push_back(message);

        while queue.len() > self.max_messages {
            queue.pop_front();
            warn!("Message buffer over message-count bound, dropping oldest entry");
        }
        while queue.iter().map(BufferedMessage::approximate_size).sum::<usize>() > self.max_bytes
            && queue.len() > 1
        {
            queue.pop_front();
            warn!("Message buffer over byte bound, dropping oldest entry");
        }
    }

    /// The oldest entry, without removing it
    pub fn peek(&self) -> Option<BufferedMessage> {
        self.queue.lock().front().cloned()
    }

    /// Remove and return the oldest entry
    pub fn pop(&self) -> Option<BufferedMessage> {
        self.queue.lock().pop_front()
    }

    /// Put a message back at the head after a failed replay
    pub fn push_front(&self, message: BufferedMessage) {
        self.queue.lock().push_front(message);
    }

    /// Number of buffered messages
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether the buffer holds no messages
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Write outstanding entries to the persistence file, one JSON per line
    pub async fn persist(&self) -> CoreResult<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let entries: Vec<BufferedMessage> = self.queue.lock().iter().cloned().collect();
        let mut lines = String::new();
        for entry in &entries {
            lines.push_str(&serde_json::to_string(entry)?);
            lines.push('\n');
        }
        ensure_parent_dir(path).await?;
        tokio::fs::write(path, lines).await?;
        debug!(count = entries.len(), path = %path.display(), "Persisted message buffer");
        Ok(())
    }

    /// Reload persisted entries (file order) and truncate the file
    ///
    /// Each persisted message is re-enqueued exactly once; a corrupt line is
    /// skipped with a warning rather than poisoning the rest of the file.
    pub async fn load(&self) -> CoreResult<usize> {
        let Some(path) = &self.persist_path else {
            return Ok(0);
        };
        let Some(contents) = read_to_string_opt(path).await? else {
            return Ok(0);
        };

        let mut loaded = 0;
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<BufferedMessage>(line) {
                Ok(message) => {
                    self.push(message);
                    loaded += 1;
                }
                Err(e) => warn!(error = %e, "Skipping corrupt buffered message"),
            }
        }
        tokio::fs::write(path, b"").await?;
        debug!(count = loaded, "Reloaded persisted message buffer");
        Ok(loaded)
    }

    /// Path of the persistence file, when configured
    pub fn persist_path(&self) -> Option<&Path> {
        self.persist_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(uri: &str, body: &str) -> BufferedMessage {
        BufferedMessage {
            method: HttpMethod::Post,
            uri: uri.into(),
            body: body.into(),
            category: MessageCategory::Log,
            metadata: MessageMetadata::to_fog(),
            retries: 0,
        }
    }

    #[test]
    fn test_fifo_order() {
        let buffer = MessageBuffer::new(10, 1 << 20);
        buffer.push(message("/a", ""));
        buffer.push(message("/b", ""));
        assert_eq!(buffer.pop().expect("first").uri, "/a");
        assert_eq!(buffer.pop().expect("second").uri, "/b");
        assert!(buffer.pop().is_none());
    }

    #[test]
    fn test_count_bound_drops_oldest() {
        let buffer = MessageBuffer::new(2, 1 << 20);
        buffer.push(message("/a", ""));
        buffer.push(message("/b", ""));
        buffer.push(message("/c", ""));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.pop().expect("head").uri, "/b");
    }

    #[test]
    fn test_byte_bound_drops_oldest() {
        let buffer = MessageBuffer::new(100, 300);
        buffer.push(message("/a", &"x".repeat(200)));
        buffer.push(message("/b", &"y".repeat(200)));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.peek().expect("head").uri, "/b");
    }

    #[test]
    fn test_push_front_restores_head() {
        let buffer = MessageBuffer::new(10, 1 << 20);
        buffer.push(message("/a", ""));
        let head = buffer.pop().expect("pop");
        buffer.push(message("/b", ""));
        buffer.push_front(head);
        assert_eq!(buffer.peek().expect("head").uri, "/a");
    }

    #[tokio::test]
    async fn test_persist_and_reload_exactly_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("buffer.jsonl");

        let buffer = MessageBuffer::with_persistence(10, 1 << 20, &path);
        buffer.push(message("/a", "one"));
        buffer.push(message("/b", "two"));
        buffer.persist().await.expect("persist");

        let restored = MessageBuffer::with_persistence(10, 1 << 20, &path);
        assert_eq!(restored.load().await.expect("load"), 2);
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.pop().expect("head").uri, "/a");

        // A second load must not duplicate the entries
        let again = MessageBuffer::with_persistence(10, 1 << 20, &path);
        assert_eq!(again.load().await.expect("load"), 0);
    }

    #[tokio::test]
    async fn test_load_skips_corrupt_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("buffer.jsonl");
        let good = serde_json::to_string(&message("/ok", "")).expect("serialize");
        tokio::fs::write(&path, format!("{good}\nnot json\n")).await.expect("write");

        let buffer = MessageBuffer::with_persistence(10, 1 << 20, &path);
        assert_eq!(buffer.load().await.expect("load"), 1);
        assert_eq!(buffer.pop().expect("head").uri, "/ok");
    }
}
