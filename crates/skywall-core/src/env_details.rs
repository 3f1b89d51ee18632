//! Deployment environment detection
//!
//! The agent behaves differently on a plain Linux host and inside a
//! Kubernetes pod. Detection is by the presence of the service-account token;
//! the `deployment_type` environment variable can force the non-CRD
//! Kubernetes path.

use std::path::{Path, PathBuf};

/// Default service-account directory mounted into pods
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// In-cluster API server address
pub const CLUSTER_API_HOST: &str = "kubernetes.default.svc";

/// In-cluster API server port
pub const CLUSTER_API_PORT: u16 = 443;

/// How this agent is deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentType {
    /// Plain Linux host, policy comes from a local YAML file
    Linux,
    /// Kubernetes with openappsec custom resources
    K8s,
    /// Kubernetes without custom resources (`deployment_type=non_crd_k8s`)
    NonCrdK8s,
}

/// Observed environment of the running agent
#[derive(Debug, Clone)]
pub struct EnvDetails {
    deployment_type: DeploymentType,
    token: String,
    service_account_dir: PathBuf,
}

impl EnvDetails {
    /// Detect the environment from the default service-account location
    pub fn detect() -> Self {
        Self::detect_at(Path::new(SERVICE_ACCOUNT_DIR))
    }

    /// Detect the environment from a specific service-account directory
    pub fn detect_at(service_account_dir: &Path) -> Self {
        let token = std::fs::read_to_string(service_account_dir.join("token"))
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        let deployment_type = if token.is_empty() {
            DeploymentType::Linux
        } else if std::env::var("deployment_type").as_deref() == Ok("non_crd_k8s") {
            DeploymentType::NonCrdK8s
        } else {
            DeploymentType::K8s
        };

        Self {
            deployment_type,
            token,
            service_account_dir: service_account_dir.to_path_buf(),
        }
    }

    /// The detected deployment type
    pub fn deployment_type(&self) -> DeploymentType {
        self.deployment_type
    }

    /// Whether the agent runs inside a Kubernetes pod
    pub fn is_k8s(&self) -> bool {
        self.deployment_type != DeploymentType::Linux
    }

    /// Service-account bearer token, empty outside Kubernetes
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Directory the credentials were read from
    pub fn service_account_dir(&self) -> &Path {
        &self.service_account_dir
    }

    /// Whether standalone mode is forced via `CLOUDGUARD_APPSEC_STANDALONE`
    pub fn is_standalone() -> bool {
        std::env::var_os("CLOUDGUARD_APPSEC_STANDALONE").is_some()
    }
}
