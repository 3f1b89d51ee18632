//! # Skywall Policy
//!
//! Declarative policy compiler. Ingests high-level security policy - a YAML
//! file on a Linux host, or custom resources and ingress annotations in a
//! Kubernetes cluster - and produces the canonical rulebase artifact the
//! enforcement side consumes.
//!
//! Two input schema versions (`v1beta1`, `v1beta2`) canonicalize into one
//! output graph. Cross-references between policy elements travel by name and
//! are resolved through a [`PolicyFetcher`]; the compiler deduplicates
//! resolved elements across rules and emits deterministic output - identical
//! input produces byte-identical artifacts except for generated UUIDs.

pub mod error;
pub mod k8s;
pub mod local;
pub mod maker;
pub mod sections;
pub mod spec;

pub use error::{PolicyError, Result};
pub use k8s::{ClusterClient, K8sPolicyGenerator};
pub use local::{LocalPolicyGenerator, LocalPolicyConfig};
pub use maker::{PolicyFetcher, PolicyMaker};

/// Default output path of the compiled artifact
pub const LOCAL_POLICY_ARTIFACT_PATH: &str = "/tmp/local_appsec.policy";

/// Default source path of the local policy file, under the install prefix
pub const LOCAL_POLICY_SOURCE_PATH: &str = "/conf/local_policy.yaml";

/// Annotation prefix shared by all policy-related ingress annotations
pub const ANNOTATION_PREFIX: &str = "openappsec.io/";

/// Supported input schema versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyVersion {
    /// The original schema
    V1beta1,
    /// The successor schema with split practice kinds
    V1beta2,
}

impl PolicyVersion {
    /// API group version segment used in cluster resource paths
    pub fn api_version(&self) -> &'static str {
        match self {
            Self::V1beta1 => "v1beta1",
            Self::V1beta2 => "v1beta2",
        }
    }
}
