//! Skywall agent entry point
//!
//! Builds the runtime services - messaging client, policy generator, status
//! writer, REST listener - and wires them together through explicit
//! constructor injection. No service is a global; test doubles slot in at
//! every seam.

mod rest;

use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use parking_lot::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use skywall_core::orchestration_status::{StatusWriter, STATUS_WRITE_PERIOD};
use skywall_core::{AgentDetails, EnvDetails, OrchestrationStatus};
use skywall_messaging::{MessagingClient, MessagingConfig, ReqwestTransport};
use skywall_policy::{
    ClusterClient, K8sPolicyGenerator, LocalPolicyConfig, LocalPolicyGenerator, PolicyVersion,
};

use rest::{AppState, PolicyGenerator};

/// Filesystem layout of the agent
struct AgentPaths {
    state_dir: PathBuf,
    agent_details: PathBuf,
    buffered_messages: PathBuf,
    orchestration_status: PathBuf,
}

impl AgentPaths {
    fn from_env() -> Self {
        let state_dir = std::env::var("SKYWALL_STATE_DIR").map_or_else(|_| PathBuf::from("/etc/skywall/state"), PathBuf::from);
        Self {
            agent_details: state_dir.join("agent_details.json"),
            buffered_messages: state_dir.join("buffered_messages.jsonl"),
            orchestration_status: state_dir.join("orchestration_status.json"),
            state_dir,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let paths = AgentPaths::from_env();
    let env_details = EnvDetails::detect();
    info!(deployment = ?env_details.deployment_type(), state_dir = %paths.state_dir.display(), "Starting Skywall agent");

    // A present but unreadable credentials file is fatal; an absent one
    // starts the agent unregistered
    let agent_details = match skywall_core::fs::read_to_string_opt(&paths.agent_details).await? {
        Some(contents) => serde_json::from_str::<AgentDetails>(&contents).context("Malformed agent details file")?,
        None => {
            warn!("No agent details on disk, starting unregistered");
            AgentDetails::default()
        }
    };

    let messaging = Arc::new(MessagingClient::with_buffer_persistence(
        MessagingConfig::default().with_env_proxy(),
        Arc::new(ReqwestTransport::new()),
        agent_details.clone(),
        &paths.buffered_messages,
    ));
    let restored = messaging.restore_buffer().await?;
    if restored > 0 {
        info!(restored, "Re-enqueued buffered messages from the previous run");
    }
    tokio::spawn(Arc::clone(&messaging).run_buffer_flush());

    // Orchestration status snapshot and its 5-second persistence tick
    let status = Arc::new(Mutex::new({
        let mut status = OrchestrationStatus::initial();
        status.fog_address = agent_details.fog_address();
        status.agent_id = agent_details.agent_id.clone();
        status.profile_id = agent_details.profile_id.clone();
        status.tenant_id = agent_details.tenant_id.clone();
        status
    }));
    tokio::spawn(StatusWriter::new(Arc::clone(&status), &paths.orchestration_status).run(STATUS_WRITE_PERIOD));

    let policy_version = policy_version_from_env();
    let generator = if env_details.is_k8s() {
        let cluster = ClusterClient::new(Arc::clone(&messaging), env_details.token(), policy_version);
        tokio::spawn({
            let discovery = ClusterClient::new(Arc::clone(&messaging), env_details.token(), policy_version);
            async move {
                let uid = discovery.wait_for_cluster_id().await;
                info!(cluster_id = %uid, "Cluster identity resolved");
            }
        });
        PolicyGenerator::K8s(K8sPolicyGenerator::new(cluster))
    } else {
        PolicyGenerator::Local(LocalPolicyGenerator::new(local_policy_config(policy_version)))
    };

    let state = AppState {
        messaging: Arc::clone(&messaging),
        generator: Arc::new(generator),
        status,
    };

    let listen_addr = std::env::var("SKYWALL_REST_ADDR").unwrap_or_else(|_| "127.0.0.1:7777".to_string());
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind the REST listener on {listen_addr}"))?;
    info!(addr = %listen_addr, "REST listener ready");

    let server = axum::serve(listener, rest::router(state)).into_future();
    tokio::select! {
        result = server => result.context("REST listener failed")?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    // Bounded best-effort drain, then persist the remainder
    let _ = tokio::time::timeout(Duration::from_secs(3), messaging.flush_once()).await;
    messaging.persist_buffer().await?;
    info!("Shutdown complete");
    Ok(())
}

fn policy_version_from_env() -> PolicyVersion {
    match std::env::var("SKYWALL_POLICY_VERSION").as_deref() {
        Ok("v1beta2") => PolicyVersion::V1beta2,
        _ => PolicyVersion::V1beta1,
    }
}

fn local_policy_config(version: PolicyVersion) -> LocalPolicyConfig {
    let mut config = match std::env::var("SKYWALL_PREFIX") {
        Ok(prefix) => LocalPolicyConfig::with_prefix(std::path::Path::new(&prefix)),
        Err(_) => LocalPolicyConfig::default(),
    };
    config.version = version;
    config
}
