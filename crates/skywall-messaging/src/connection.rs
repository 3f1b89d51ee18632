//! Per-category connection state and the connection pool
//!
//! The pool owns one entry per `(category, host, port, tls)` tuple. An entry
//! tracks consecutive failures, the suspended flag, and any active
//! rate-limit block; the underlying sockets are kept alive by the transport.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::metadata::{MessageCategory, MessageMetadata};

/// Identity of one pooled connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnKey {
    /// Message category owning the connection
    pub category: MessageCategory,
    /// Destination host
    pub host: String,
    /// Destination port
    pub port: u16,
    /// Whether the connection uses TLS
    pub secure: bool,
}

impl ConnKey {
    /// Key for a message's destination
    pub fn from_metadata(category: MessageCategory, metadata: &MessageMetadata) -> Self {
        Self {
            category,
            host: metadata.host_name().to_string(),
            port: metadata.port(),
            secure: metadata.conn_flags().secure,
        }
    }
}

/// State of one pooled connection
#[derive(Debug, Clone)]
pub struct ConnState {
    consecutive_failures: u32,
    suspended: bool,
    rate_limited_until: Option<Instant>,
}

impl ConnState {
    fn new() -> Self {
        Self {
            consecutive_failures: 0,
            suspended: false,
            rate_limited_until: None,
        }
    }

    /// Whether the connection is suspended
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Whether an active rate-limit block is in effect
    pub fn is_rate_limited(&self) -> bool {
        self.rate_limited_until.is_some_and(|until| Instant::now() < until)
    }

    /// When the current rate-limit block expires
    pub fn rate_limited_until(&self) -> Option<Instant> {
        self.rate_limited_until
    }

    /// Consecutive failures since the last success
    pub fn failures(&self) -> u32 {
        self.consecutive_failures
    }
}

/// Pool of per-category connection states
pub struct ConnectionPool {
    entries: Mutex<HashMap<ConnKey, ConnState>>,
    suspend_threshold: u32,
}

impl ConnectionPool {
    /// Pool suspending a connection after `suspend_threshold` consecutive
    /// failures
    pub fn new(suspend_threshold: u32) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            suspend_threshold,
        }
    }

    /// Current state of the connection, creating a fresh entry on first use
    pub fn state(&self, key: &ConnKey) -> ConnState {
        self.entries.lock().entry(key.clone()).or_insert_with(ConnState::new).clone()
    }

    /// Record a successful exchange: failures reset, suspension clears
    pub fn on_success(&self, key: &ConnKey) {
        let mut entries = self.entries.lock();
        let state = entries.entry(key.clone()).or_insert_with(ConnState::new);
        if state.suspended {
            info!(host = %key.host, "Connection recovered from suspension");
        }
        state.consecutive_failures = 0;
        state.suspended = false;
    }

    /// Record a failed exchange; the connection suspends at the threshold
    pub fn on_failure(&self, key: &ConnKey) {
        let mut entries = self.entries.lock();
        let state = entries.entry(key.clone()).or_insert_with(ConnState::new);
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.suspend_threshold && !state.suspended {
            info!(
                host = %key.host,
                failures = state.consecutive_failures,
                "Suspending connection after consecutive failures"
            );
            state.suspended = true;
        }
    }

    /// Put a rate-limit block on the connection
    pub fn set_rate_limited(&self, key: &ConnKey, retry_after: Duration) {
        debug!(host = %key.host, secs = retry_after.as_secs(), "Rate limiting connection");
        let mut entries = self.entries.lock();
        let state = entries.entry(key.clone()).or_insert_with(ConnState::new);
        state.rate_limited_until = Some(Instant::now() + retry_after);
    }

    /// Number of known connections
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the pool has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ConnKey {
        ConnKey {
            category: MessageCategory::Generic,
            host: "fog.example.com".into(),
            port: 443,
            secure: true,
        }
    }

    #[test]
    fn test_fresh_state() {
        let pool = ConnectionPool::new(3);
        let state = pool.state(&key());
        assert!(!state.is_suspended());
        assert!(!state.is_rate_limited());
        assert_eq!(state.failures(), 0);
    }

    #[test]
    fn test_suspension_at_threshold() {
        let pool = ConnectionPool::new(3);
        pool.on_failure(&key());
        pool.on_failure(&key());
        assert!(!pool.state(&key()).is_suspended());
        pool.on_failure(&key());
        assert!(pool.state(&key()).is_suspended());
    }

    #[test]
    fn test_success_clears_suspension() {
        let pool = ConnectionPool::new(1);
        pool.on_failure(&key());
        assert!(pool.state(&key()).is_suspended());
        pool.on_success(&key());
        let state = pool.state(&key());
        assert!(!state.is_suspended());
        assert_eq!(state.failures(), 0);
    }

    #[test]
    fn test_rate_limit_window() {
        let pool = ConnectionPool::new(3);
        pool.set_rate_limited(&key(), Duration::from_secs(2));
        let state = pool.state(&key());
        assert!(state.is_rate_limited());
        assert!(state.rate_limited_until().expect("until") >= Instant::now());
    }

    #[test]
    fn test_expired_rate_limit() {
        let pool = ConnectionPool::new(3);
        pool.set_rate_limited(&key(), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(!pool.state(&key()).is_rate_limited());
    }

    #[test]
    fn test_separate_categories_separate_state() {
        let pool = ConnectionPool::new(1);
        let log_key = ConnKey {
            category: MessageCategory::Log,
            ..key()
        };
        pool.on_failure(&key());
        assert!(pool.state(&key()).is_suspended());
        assert!(!pool.state(&log_key).is_suspended());
        assert_eq!(pool.len(), 2);
    }
}
