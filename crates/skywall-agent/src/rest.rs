//! Local REST surface
//!
//! A small axum router: the liveness probe, the fog connection check, and a
//! policy-apply action for the CLI. Failure to bind the listener is fatal to
//! the agent.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use skywall_core::OrchestrationStatus;
use skywall_messaging::{MessageCategory, MessagingClient};
use skywall_policy::{K8sPolicyGenerator, LocalPolicyGenerator};

/// The policy generator variant for this deployment
pub enum PolicyGenerator {
    /// Linux host reading the local YAML file
    Local(LocalPolicyGenerator),
    /// Kubernetes cluster reading ingresses and custom resources
    K8s(K8sPolicyGenerator),
}

impl PolicyGenerator {
    /// Compile the policy; empty string on failure
    pub async fn parse_policy(&self, policy_version: &str) -> String {
        match self {
            Self::Local(generator) => generator.parse_policy(policy_version).await,
            Self::K8s(generator) => generator.parse_policy(policy_version).await,
        }
    }
}

/// Shared state of the REST handlers
#[derive(Clone)]
pub struct AppState {
    /// Messaging client used by the fog connection check
    pub messaging: Arc<MessagingClient>,
    /// Policy generator behind the apply action
    pub generator: Arc<PolicyGenerator>,
    /// Orchestration status updated on policy application
    pub status: Arc<Mutex<OrchestrationStatus>>,
}

/// Build the agent's local REST router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(health_live))
        .route("/show/check-fog-connection", get(check_fog_connection))
        .route("/apply-policy", post(apply_policy))
        .route("/validate-keyword-rule", post(validate_keyword_rule))
        .with_state(state)
}

async fn health_live() -> StatusCode {
    StatusCode::OK
}

async fn check_fog_connection(State(state): State<AppState>) -> Json<skywall_messaging::FogConnectionStatus> {
    Json(state.messaging.check_fog_connection(MessageCategory::Generic).await)
}

/// Response of the policy-apply action
#[derive(Debug, Serialize)]
struct ApplyPolicyResponse {
    success: bool,
    policy_size: usize,
}

async fn apply_policy(State(state): State<AppState>) -> (StatusCode, Json<ApplyPolicyResponse>) {
    let version = state.status.lock().policy_version.clone();
    let artifact = state.generator.parse_policy(&version).await;
    let success = !artifact.is_empty();

    if success {
        let timestamp = chrono::Utc::now().to_rfc3339();
        let mut status = state.status.lock();
        status.last_policy_update = timestamp.clone();
        status.record_update_attempt(timestamp, true);
        info!(bytes = artifact.len(), "Policy applied");
    } else {
        let timestamp = chrono::Utc::now().to_rfc3339();
        state.status.lock().record_update_attempt(timestamp, false);
    }

    let code = if success { StatusCode::OK } else { StatusCode::INTERNAL_SERVER_ERROR };
    (
        code,
        Json(ApplyPolicyResponse {
            success,
            policy_size: artifact.len(),
        }),
    )
}

/// Request of the keyword-rule validation action
#[derive(Debug, serde::Deserialize)]
struct ValidateRuleRequest {
    rule: String,
}

/// Response of the keyword-rule validation action
#[derive(Debug, Serialize)]
struct ValidateRuleResponse {
    valid: bool,
    keywords: usize,
    error: String,
}

/// Compile a signature rule without installing it, for policy authors
async fn validate_keyword_rule(Json(request): Json<ValidateRuleRequest>) -> Json<ValidateRuleResponse> {
    match skywall_keywords::compile_rule(&request.rule) {
        Ok(rule) => Json(ValidateRuleResponse {
            valid: true,
            keywords: rule.len(),
            error: String::new(),
        }),
        Err(e) => Json(ValidateRuleResponse {
            valid: false,
            keywords: 0,
            error: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skywall_core::AgentDetails;
    use skywall_messaging::{MessagingConfig, ReqwestTransport};
    use skywall_policy::{LocalPolicyConfig, PolicyVersion};

    fn state(dir: &std::path::Path) -> AppState {
        let messaging = Arc::new(MessagingClient::new(
            MessagingConfig::default(),
            Arc::new(ReqwestTransport::new()),
            AgentDetails::default(),
        ));
        let generator = LocalPolicyGenerator::new(LocalPolicyConfig {
            policy_path: dir.join("local_policy.yaml"),
            artifact_path: dir.join("local_appsec.policy"),
            yaml_converter: None,
            version: PolicyVersion::V1beta1,
        });
        AppState {
            messaging,
            generator: Arc::new(PolicyGenerator::Local(generator)),
            status: Arc::new(Mutex::new(OrchestrationStatus::initial())),
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = router(state(dir.path()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        let client = reqwest_like_get(&format!("http://{addr}/health/live")).await;
        assert_eq!(client, 200);
    }

    #[tokio::test]
    async fn test_check_fog_connection_reports_error_without_fog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = router(state(dir.path()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        let body = get_body(&format!("http://{addr}/show/check-fog-connection")).await;
        let json: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(json["connected_to_fog"], false);
        assert!(!json["error"].as_str().expect("error").is_empty());
    }

    #[tokio::test]
    async fn test_validate_keyword_rule_handler() {
        let ok = validate_keyword_rule(Json(ValidateRuleRequest {
            rule: r#"data:"Login",nocase,part HTTP_REQUEST_BODY;"#.into(),
        }))
        .await;
        assert!(ok.0.valid);
        assert_eq!(ok.0.keywords, 1);

        let bad = validate_keyword_rule(Json(ValidateRuleRequest {
            rule: "frobnicate;".into(),
        }))
        .await;
        assert!(!bad.0.valid);
        assert!(bad.0.error.contains("unknown keyword type"));
    }

    async fn raw_request(url: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let url = url.strip_prefix("http://").expect("http url");
        let (addr, path) = url.split_once('/').expect("path");
        let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connect");
        stream
            .write_all(format!("GET /{path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n").as_bytes())
            .await
            .expect("write");
        let mut response = String::new();
        stream.read_to_string(&mut response).await.expect("read");
        response
    }

    async fn reqwest_like_get(url: &str) -> u16 {
        let response = raw_request(url).await;
        response
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .expect("status code")
    }

    async fn get_body(url: &str) -> String {
        let response = raw_request(url).await;
        response.split("\r\n\r\n").nth(1).unwrap_or("").to_string()
    }
}
