//! Agent identity and fog addressing
//!
//! Read from the agent details file written at registration time. The
//! messaging client consults this for the fog host/port and the ambient
//! headers every fog request carries.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Build hash baked into the user agent string sent to the fog
pub const BUILD_HASH: &str = "a7030abf93a4c13";

/// Identity and connection details of this agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentDetails {
    /// Agent id assigned at registration
    #[serde(default)]
    pub agent_id: String,
    /// Profile id assigned at registration
    #[serde(default)]
    pub profile_id: String,
    /// Tenant id, empty when unregistered
    #[serde(default)]
    pub tenant_id: String,
    /// Fog domain name
    #[serde(default)]
    pub fog_domain: String,
    /// Fog port
    #[serde(default)]
    pub fog_port: u16,
    /// Whether the fog connection uses TLS
    #[serde(default = "default_true")]
    pub ssl_enabled: bool,
    /// Registration token, when present
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
}

fn default_true() -> bool {
    true
}

impl AgentDetails {
    /// Load agent details from a JSON file on disk
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// The user agent string carried on every fog request
    pub fn user_agent() -> String {
        format!("Infinity Next ({BUILD_HASH})")
    }

    /// Ambient headers attached to fog-bound requests
    pub fn ambient_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("User-Agent".to_string(), Self::user_agent());
        if !self.tenant_id.is_empty() {
            headers.insert("X-Tenant-Id".to_string(), self.tenant_id.clone());
        }
        headers
    }

    /// Whether fog host and port are known
    pub fn has_fog_address(&self) -> bool {
        !self.fog_domain.is_empty() && self.fog_port != 0
    }

    /// `host:port` string for status reporting
    pub fn fog_address(&self) -> String {
        if !self.has_fog_address() {
            return String::new();
        }
        format!("{}:{}", self.fog_domain, self.fog_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered() -> AgentDetails {
        AgentDetails {
            agent_id: "agent-1".into(),
            profile_id: "profile-1".into(),
            tenant_id: "tenant-1".into(),
            fog_domain: "fog.example.com".into(),
            fog_port: 443,
            ssl_enabled: true,
            token: String::new(),
        }
    }

    #[test]
    fn test_user_agent_carries_build_hash() {
        assert_eq!(AgentDetails::user_agent(), "Infinity Next (a7030abf93a4c13)");
    }

    #[test]
    fn test_ambient_headers_with_tenant() {
        let headers = registered().ambient_headers();
        assert_eq!(headers.get("X-Tenant-Id").map(String::as_str), Some("tenant-1"));
        assert!(headers.contains_key("User-Agent"));
    }

    #[test]
    fn test_ambient_headers_without_tenant() {
        let mut details = registered();
        details.tenant_id.clear();
        assert!(!details.ambient_headers().contains_key("X-Tenant-Id"));
    }

    #[test]
    fn test_fog_address() {
        assert_eq!(registered().fog_address(), "fog.example.com:443");
        assert_eq!(AgentDetails::default().fog_address(), "");
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("details.json");
        tokio::fs::write(&path, r#"{"agent_id":"a","fog_domain":"f","fog_port":8080}"#)
            .await
            .expect("write");
        let details = AgentDetails::load(&path).await.expect("load");
        assert_eq!(details.agent_id, "a");
        assert_eq!(details.fog_port, 8080);
        assert!(details.ssl_enabled);
    }
}
