//! Orchestration status file
//!
//! A JSON snapshot of the agent's control-plane state, consumed by the CLI
//! and support tooling. The field names are a long-standing external
//! contract; they keep their legacy spelling. A write failure is not fatal -
//! the periodic tick retries on the next round.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::env_details::EnvDetails;
use crate::error::Result;
use crate::fs::write_atomic;

/// How the agent registered against the fog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationDetails {
    /// Registered agent name
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Deployment type reported at registration
    #[serde(rename = "Type", default)]
    pub agent_type: String,
    /// Platform string
    #[serde(rename = "Platform", default)]
    pub platform: String,
    /// CPU architecture
    #[serde(rename = "Architecture", default)]
    pub architecture: String,
}

/// Snapshot of the orchestration state, serialized with its legacy keys
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestrationStatus {
    /// Timestamp of the last update attempt
    #[serde(rename = "Last update attempt", default)]
    pub last_update_attempt: String,
    /// Outcome of the last update attempt
    #[serde(rename = "Last update status", default)]
    pub last_update_status: String,
    /// Timestamp of the last successful update
    #[serde(rename = "Last update", default)]
    pub last_update: String,
    /// Timestamp of the last manifest update
    #[serde(rename = "Last manifest update", default)]
    pub last_manifest_update: String,
    /// Version of the installed policy
    #[serde(rename = "Policy version", default)]
    pub policy_version: String,
    /// Timestamp of the last policy update
    #[serde(rename = "Last policy update", default)]
    pub last_policy_update: String,
    /// Timestamp of the last settings update
    #[serde(rename = "Last settings update", default)]
    pub last_settings_update: String,
    /// Upgrade mode (automatic/manual)
    #[serde(rename = "Upgrade mode", default)]
    pub upgrade_mode: String,
    /// Fog address the agent is registered against
    #[serde(rename = "Fog address", default)]
    pub fog_address: String,
    /// Registration state
    #[serde(rename = "Registration status", default)]
    pub registration_status: String,
    /// Details recorded at registration time
    #[serde(rename = "Registration details", default)]
    pub registration_details: RegistrationDetails,
    /// Agent id
    #[serde(rename = "Agent ID", default)]
    pub agent_id: String,
    /// Profile id
    #[serde(rename = "Profile ID", default)]
    pub profile_id: String,
    /// Tenant id
    #[serde(rename = "Tenant ID", default)]
    pub tenant_id: String,
    /// Manifest installation state
    #[serde(rename = "Manifest status", default)]
    pub manifest_status: String,
    /// Installed policy file per service
    #[serde(rename = "Service policy", default)]
    pub service_policies: HashMap<String, String>,
    /// Installed settings file per service
    #[serde(rename = "Service settings", default)]
    pub service_settings: HashMap<String, String>,
}

impl OrchestrationStatus {
    /// Fresh status with environment-dependent defaults
    pub fn initial() -> Self {
        Self {
            manifest_status: if EnvDetails::is_standalone() { "Succeeded" } else { "None" }.to_string(),
            registration_status: "Registration not started".to_string(),
            upgrade_mode: "automatic".to_string(),
            ..Self::default()
        }
    }

    /// Record a policy installation under a service name
    pub fn set_service_policy(&mut self, service: impl Into<String>, path: impl Into<String>) {
        self.service_policies.insert(service.into(), path.into());
    }

    /// Mark the last update attempt, successful or not
    pub fn record_update_attempt(&mut self, timestamp: String, success: bool) {
        self.last_update_attempt = timestamp.clone();
        self.last_update_status = if success { "Succeeded" } else { "Failed" }.to_string();
        if success {
            self.last_update = timestamp;
        }
    }
}

/// Periodically persists the status snapshot to disk
pub struct StatusWriter {
    status: Arc<Mutex<OrchestrationStatus>>,
    path: PathBuf,
}

impl StatusWriter {
    /// Writer persisting `status` to `path`
    pub fn new(status: Arc<Mutex<OrchestrationStatus>>, path: impl AsRef<Path>) -> Self {
        Self {
            status,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Write the current snapshot once
    pub async fn write_once(&self) -> Result<()> {
        let snapshot = self.status.lock().clone();
        let json = serde_json::to_string_pretty(&snapshot)?;
        write_atomic(&self.path, json.as_bytes()).await
    }

    /// Run the 5-second persistence tick until cancelled
    ///
    /// A failed write is logged and retried on the next tick.
    pub async fn run(self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match self.write_once().await {
                Ok(()) => debug!(path = %self.path.display(), "Wrote orchestration status"),
                Err(e) => warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to write orchestration status, will retry"
                ),
            }
        }
    }
}

/// Default persistence period for the status file
pub const STATUS_WRITE_PERIOD: Duration = Duration::from_secs(5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_field_names() {
        let status = OrchestrationStatus::initial();
        let json = serde_json::to_string(&status).expect("serialize");
        for key in [
            "Last update attempt",
            "Last update status",
            "Last update",
            "Last manifest update",
            "Policy version",
            "Last policy update",
            "Last settings update",
            "Upgrade mode",
            "Fog address",
            "Registration status",
            "Registration details",
            "Agent ID",
            "Profile ID",
            "Tenant ID",
            "Manifest status",
            "Service policy",
            "Service settings",
        ] {
            assert!(json.contains(&format!("\"{key}\"")), "missing key {key}");
        }
    }

    #[test]
    fn test_record_update_attempt() {
        let mut status = OrchestrationStatus::initial();
        status.record_update_attempt("2026-01-01T00:00:00Z".into(), false);
        assert_eq!(status.last_update_status, "Failed");
        assert!(status.last_update.is_empty());

        status.record_update_attempt("2026-01-02T00:00:00Z".into(), true);
        assert_eq!(status.last_update_status, "Succeeded");
        assert_eq!(status.last_update, "2026-01-02T00:00:00Z");
    }

    #[test]
    fn test_round_trip() {
        let mut status = OrchestrationStatus::initial();
        status.set_service_policy("http_transaction_handler", "/etc/policy.json");
        let json = serde_json::to_string(&status).expect("serialize");
        let back: OrchestrationStatus = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(
            back.service_policies.get("http_transaction_handler").map(String::as_str),
            Some("/etc/policy.json")
        );
    }

    #[tokio::test]
    async fn test_write_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("orchestration_status.json");
        let status = Arc::new(Mutex::new(OrchestrationStatus::initial()));
        let writer = StatusWriter::new(status, &path);
        writer.write_once().await.expect("write");
        let contents = tokio::fs::read_to_string(&path).await.expect("read");
        assert!(contents.contains("Registration status"));
    }
}
