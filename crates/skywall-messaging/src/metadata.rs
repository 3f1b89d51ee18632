//! Message metadata: destination, connection flags, proxy, buffering

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Named channel selecting a dedicated persistent connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    /// General control-plane traffic
    Generic,
    /// Log shipping
    Log,
    /// Metric shipping
    Metric,
    /// Policy retrieval
    Policy,
    /// Telemetry channel
    Telemetry,
}

impl Default for MessageCategory {
    fn default() -> Self {
        Self::Generic
    }
}

/// TLS-related connection flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionFlags {
    /// Use TLS
    #[serde(default)]
    pub secure: bool,
    /// Skip certificate validation entirely
    #[serde(default)]
    pub skip_validation: bool,
    /// Accept a certificate whose name does not match the host
    #[serde(default)]
    pub ignore_ssl_name: bool,
}

/// Proxy settings carried on a message; override environment configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Proxy host
    pub host: String,
    /// Proxy port
    pub port: u16,
    /// `user:password` authentication, empty when the proxy is open
    #[serde(default)]
    pub authentication: String,
}

/// Rate-limit block put on a connection by a 429 response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitBlock {
    /// Seconds to hold off, from the `Retry-After` header
    pub retry_after_secs: u64,
}

/// Everything the client needs to know about one message's destination and
/// delivery requirements
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    host_name: String,
    port_num: u16,
    #[serde(default)]
    conn_flags: ConnectionFlags,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    proxy_settings: Option<ProxySettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    external_certificate: Option<String>,
    #[serde(default)]
    should_buffer: bool,
    #[serde(default)]
    is_to_fog: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rate_limit_block: Option<RateLimitBlock>,
}

impl MessageMetadata {
    /// Metadata for a peer at `host:port`
    pub fn new(host_name: impl Into<String>, port_num: u16) -> Self {
        Self {
            host_name: host_name.into(),
            port_num,
            ..Self::default()
        }
    }

    /// Metadata for a message to the fog; host and port come from the agent
    /// details at send time
    pub fn to_fog() -> Self {
        Self {
            is_to_fog: true,
            ..Self::default()
        }
    }

    /// Destination host
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Destination port
    pub fn port(&self) -> u16 {
        self.port_num
    }

    /// Set destination host and port
    pub fn set_address(&mut self, host: impl Into<String>, port: u16) {
        self.host_name = host.into();
        self.port_num = port;
    }

    /// Connection flags
    pub fn conn_flags(&self) -> ConnectionFlags {
        self.conn_flags
    }

    /// Enable TLS on the connection
    #[must_use]
    pub fn secure(mut self) -> Self {
        self.conn_flags.secure = true;
        self
    }

    /// Disable certificate validation
    #[must_use]
    pub fn skip_validation(mut self) -> Self {
        self.conn_flags.skip_validation = true;
        self
    }

    /// Accept a certificate whose name does not match the host; the chain
    /// is still validated
    #[must_use]
    pub fn ignore_ssl_name(mut self) -> Self {
        self.conn_flags.ignore_ssl_name = true;
        self
    }

    /// Request headers
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Insert one header
    pub fn insert_header(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.headers.insert(key.into(), val.into());
    }

    /// Merge a header map; existing keys are overwritten
    pub fn insert_headers(&mut self, headers: &HashMap<String, String>) {
        for (key, val) in headers {
            self.headers.insert(key.clone(), val.clone());
        }
    }

    /// Proxy settings, when carried on this message
    pub fn proxy_settings(&self) -> Option<&ProxySettings> {
        self.proxy_settings.as_ref()
    }

    /// Attach proxy settings
    pub fn set_proxy_settings(&mut self, proxy: ProxySettings) {
        self.proxy_settings = Some(proxy);
    }

    /// External CA certificate (PEM) trusted for this message only
    pub fn external_certificate(&self) -> Option<&str> {
        self.external_certificate.as_deref()
    }

    /// Attach an external CA certificate in PEM form
    pub fn set_external_certificate(&mut self, pem: impl Into<String>) {
        self.external_certificate = Some(pem.into());
    }

    /// Whether the message should be buffered on failure
    pub fn should_buffer(&self) -> bool {
        self.should_buffer
    }

    /// Opt the message in or out of failure buffering
    pub fn set_should_buffer(&mut self, should_buffer: bool) {
        self.should_buffer = should_buffer;
    }

    /// Builder form of [`set_should_buffer`](Self::set_should_buffer)
    #[must_use]
    pub fn buffered(mut self) -> Self {
        self.should_buffer = true;
        self
    }

    /// Whether the message is addressed to the fog
    pub fn is_to_fog(&self) -> bool {
        self.is_to_fog
    }

    /// Rate-limit block carried by this message
    pub fn rate_limit_block(&self) -> Option<RateLimitBlock> {
        self.rate_limit_block
    }

    /// Mark the message as rate limited with a hold-off period
    pub fn set_rate_limit_block(&mut self, retry_after_secs: u64) {
        self.rate_limit_block = Some(RateLimitBlock { retry_after_secs });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_flags() {
        let metadata = MessageMetadata::new("peer.local", 8080).secure().buffered();
        assert!(metadata.conn_flags().secure);
        assert!(metadata.should_buffer());
        assert!(!metadata.is_to_fog());
        assert_eq!(metadata.host_name(), "peer.local");
        assert_eq!(metadata.port(), 8080);
    }

    #[test]
    fn test_ignore_ssl_name_flag_is_independent() {
        let metadata = MessageMetadata::new("peer.local", 8443).secure().ignore_ssl_name();
        assert!(metadata.conn_flags().ignore_ssl_name);
        assert!(!metadata.conn_flags().skip_validation);
    }

    #[test]
    fn test_to_fog_has_no_address() {
        let metadata = MessageMetadata::to_fog();
        assert!(metadata.is_to_fog());
        assert!(metadata.host_name().is_empty());
    }

    #[test]
    fn test_header_merge_overwrites() {
        let mut metadata = MessageMetadata::default();
        metadata.insert_header("X-A", "1");
        let mut extra = HashMap::new();
        extra.insert("X-A".to_string(), "2".to_string());
        extra.insert("X-B".to_string(), "3".to_string());
        metadata.insert_headers(&extra);
        assert_eq!(metadata.headers().get("X-A").map(String::as_str), Some("2"));
        assert_eq!(metadata.headers().get("X-B").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_serde_round_trip() {
        let mut metadata = MessageMetadata::new("host", 443).secure();
        metadata.set_rate_limit_block(2);
        metadata.set_proxy_settings(ProxySettings {
            host: "proxy".into(),
            port: 3128,
            authentication: String::new(),
        });
        let json = serde_json::to_string(&metadata).expect("serialize");
        let back: MessageMetadata = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.host_name(), "host");
        assert_eq!(back.rate_limit_block().map(|b| b.retry_after_secs), Some(2));
        assert_eq!(back.proxy_settings().map(|p| p.port), Some(3128));
    }
}
