//! Kubernetes policy compilation
//!
//! Ingresses are enumerated from the cluster API; the policy-related
//! annotations (`openappsec.io/policy`, `openappsec.io/syslog`,
//! `openappsec.io/mode`) resolve against cluster-scoped custom resources.
//! Cluster access goes through the messaging client with the
//! service-account bearer token; an unresolved reference aborts the ingress
//! it belongs to, not the whole compilation.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, trace};

use skywall_core::env_details::{CLUSTER_API_HOST, CLUSTER_API_PORT};
use skywall_core::events::SecurityEvent;
use skywall_core::fs::write_atomic;
use skywall_messaging::{HttpMethod, MessageCategory, MessageMetadata, MessagingClient};

use crate::error::{PolicyError, Result};
use crate::maker::{split_host_name, PolicyFetcher, PolicyMaker};
use crate::spec::v1beta1::{
    AppSecCustomResponseSpec, AppSecPracticeSpec, AppsecExceptionSpec, AppsecPolicySpec, AppsecTriggerSpec,
    ParsedRule, SourceIdentifierSpec, TrustedSourcesSpec,
};
use crate::spec::v1beta2::{AccessControlPracticeSpec, AppsecPolicySpecV2, ThreatPreventionPracticeSpec};
use crate::spec::SpecWrapper;
use crate::{PolicyVersion, ANNOTATION_PREFIX, LOCAL_POLICY_ARTIFACT_PATH};

const POLICY_KEY: &str = "policy";
const SYSLOG_KEY: &str = "syslog";
const MODE_KEY: &str = "mode";

/// Ingress object metadata
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngressMetadata {
    /// Ingress name
    #[serde(default)]
    pub name: String,
    /// Ingress annotations
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

/// One path of an ingress rule
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressRulePath {
    /// The path
    #[serde(default)]
    pub path: String,
    /// Path match type
    #[serde(default)]
    pub path_type: String,
}

/// The HTTP paths of an ingress rule
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngressRulePaths {
    /// The paths
    #[serde(default)]
    pub paths: Vec<IngressRulePath>,
}

/// One host rule of an ingress
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngressDefinedRule {
    /// The host
    #[serde(default)]
    pub host: String,
    /// Paths under the host
    #[serde(default)]
    pub http: IngressRulePaths,
}

/// The spec of an ingress object
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    /// Ingress class
    #[serde(default)]
    pub ingress_class_name: String,
    /// Default backend, when one exists
    #[serde(default)]
    pub default_backend: Option<serde_json::Value>,
    /// Host rules
    #[serde(default)]
    pub rules: Vec<IngressDefinedRule>,
}

/// One ingress object
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SingleIngressData {
    /// Object metadata
    #[serde(default)]
    pub metadata: IngressMetadata,
    /// Object spec
    #[serde(default)]
    pub spec: IngressSpec,
}

/// The ingress list returned by the cluster API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngressData {
    /// API version of the list
    #[serde(default, rename = "apiVersion")]
    pub api_version: String,
    /// The ingresses
    #[serde(default)]
    pub items: Vec<SingleIngressData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct NamespaceMetadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    uid: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SingleNamespaceData {
    #[serde(default)]
    metadata: NamespaceMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct NamespaceData {
    #[serde(default)]
    items: Vec<SingleNamespaceData>,
}

/// Typed access to the in-cluster API through the messaging client
pub struct ClusterClient {
    messaging: Arc<MessagingClient>,
    token: String,
    version: PolicyVersion,
}

impl ClusterClient {
    /// Client authenticating with the service-account bearer token
    pub fn new(messaging: Arc<MessagingClient>, token: impl Into<String>, version: PolicyVersion) -> Self {
        Self {
            messaging,
            token: token.into(),
            version,
        }
    }

    /// Fetch and deserialize one cluster object
    pub async fn get_object<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let mut metadata = MessageMetadata::new(CLUSTER_API_HOST, CLUSTER_API_PORT).secure().skip_validation();
        metadata.insert_header("Authorization", format!("Bearer {}", self.token));
        metadata.insert_header("Connection", "close");

        let response = self
            .messaging
            .send_sync_message(HttpMethod::Get, path, "", MessageCategory::Generic, &metadata)
            .await
            .map_err(|e| PolicyError::Cluster(format!("Was not able to get object from the cluster in path: {path}: {e}")))?;
        serde_json::from_str(response.body())
            .map_err(|e| PolicyError::Cluster(format!("Malformed cluster object at {path}: {e}")))
    }

    /// Fetch the spec of a cluster-scoped openappsec resource
    pub async fn openappsec_resource<T: DeserializeOwned>(&self, kind: &str, name: &str) -> Result<T> {
        let path = format!("/apis/openappsec.io/{}/{kind}/{name}", self.version.api_version());
        trace!(path, "Fetching openappsec resource");
        let wrapper: SpecWrapper<T> = self.get_object(&path).await?;
        Ok(wrapper.spec)
    }

    /// Enumerate the cluster's ingresses
    pub async fn ingresses(&self) -> Result<IngressData> {
        self.get_object("/apis/networking.k8s.io/v1/ingresses").await
    }

    /// The cluster id: the UID of the `kube-system` namespace
    pub async fn cluster_id(&self) -> Result<String> {
        let namespaces: NamespaceData = self.get_object("/api/v1/namespaces/").await?;
        namespaces
            .items
            .iter()
            .find(|ns| ns.metadata.name == "kube-system")
            .map(|ns| ns.metadata.uid.clone())
            .ok_or_else(|| PolicyError::Cluster("kube-system namespace not found".to_string()))
    }

    /// Poll for the cluster id once a second until it resolves
    pub async fn wait_for_cluster_id(&self) -> String {
        loop {
            match self.cluster_id().await {
                Ok(uid) => {
                    trace!(uid, "Found cluster UID");
                    return uid;
                }
                Err(e) => {
                    debug!(error = %e, "Failed to retrieve cluster UID, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// The configured schema version
    pub fn version(&self) -> PolicyVersion {
        self.version
    }
}

/// Resolves element references against cluster-scoped custom resources
pub struct K8sPolicyFetcher<'a> {
    client: &'a ClusterClient,
}

impl<'a> K8sPolicyFetcher<'a> {
    /// Fetcher over a cluster client
    pub fn new(client: &'a ClusterClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PolicyFetcher for K8sPolicyFetcher<'_> {
    async fn practice(&self, name: &str) -> Result<AppSecPracticeSpec> {
        match self.client.version() {
            PolicyVersion::V1beta1 => self.client.openappsec_resource("practices", name).await,
            PolicyVersion::V1beta2 => {
                let practice: ThreatPreventionPracticeSpec =
                    self.client.openappsec_resource("threatpreventionpractices", name).await?;
                Ok(practice.to_v1())
            }
        }
    }

    async fn trigger(&self, name: &str) -> Result<AppsecTriggerSpec> {
        self.client.openappsec_resource("logtriggers", name).await
    }

    async fn exceptions(&self, name: &str) -> Result<Vec<AppsecExceptionSpec>> {
        self.client.openappsec_resource("exceptions", name).await
    }

    async fn custom_response(&self, name: &str) -> Result<AppSecCustomResponseSpec> {
        self.client.openappsec_resource("customresponses", name).await
    }

    async fn trusted_sources(&self, name: &str) -> Result<TrustedSourcesSpec> {
        self.client.openappsec_resource("trustedsources", name).await
    }

    async fn source_identifiers(&self, name: &str) -> Result<Vec<SourceIdentifierSpec>> {
        self.client.openappsec_resource("sourcesidentifiers", name).await
    }

    async fn threat_prevention_practice(&self, name: &str) -> Result<Option<ThreatPreventionPracticeSpec>> {
        match self.client.version() {
            PolicyVersion::V1beta1 => Ok(None),
            PolicyVersion::V1beta2 => Ok(Some(self.client.openappsec_resource("threatpreventionpractices", name).await?)),
        }
    }

    async fn access_control_practice(&self, name: &str) -> Result<Option<AccessControlPracticeSpec>> {
        match self.client.version() {
            PolicyVersion::V1beta1 => Ok(None),
            PolicyVersion::V1beta2 => Ok(Some(self.client.openappsec_resource("accesscontrolpractices", name).await?)),
        }
    }
}

/// Enforcement mode of the wildcard cleanup rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CleanupRuleMode {
    Inactive,
    Detect,
    Prevent,
}

/// Compiles cluster policy from ingresses and custom resources
pub struct K8sPolicyGenerator {
    client: ClusterClient,
    artifact_path: PathBuf,
}

impl K8sPolicyGenerator {
    /// Generator writing the artifact to the default path
    pub fn new(client: ClusterClient) -> Self {
        Self {
            client,
            artifact_path: PathBuf::from(LOCAL_POLICY_ARTIFACT_PATH),
        }
    }

    /// Override the artifact output path
    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = path.into();
        self
    }

    /// Compile the cluster policy
    ///
    /// Returns the artifact JSON, or the empty string after reporting a
    /// structured policy-installation failure. One broken ingress is skipped;
    /// the others still compile.
    pub async fn parse_policy(&self, policy_version: &str) -> String {
        match self.try_parse_policy(policy_version).await {
            Ok(artifact) => artifact,
            Err(e) => {
                SecurityEvent::policy_installation_failure(format!("Failed to compile cluster policy: {e}")).report();
                String::new()
            }
        }
    }

    async fn try_parse_policy(&self, policy_version: &str) -> Result<String> {
        let ingresses = self.client.ingresses().await?;
        trace!(api_version = %ingresses.api_version, items = ingresses.items.len(), "Received ingresses");

        let fetcher = K8sPolicyFetcher::new(&self.client);
        let mut maker = PolicyMaker::new();
        let mut cleanup_rule_mode = CleanupRuleMode::Inactive;
        let mut cleanup_default_rule: Option<ParsedRule> = None;

        for ingress in &ingresses.items {
            if let Err(e) = self
                .process_ingress(ingress, &fetcher, &mut maker, &mut cleanup_rule_mode, &mut cleanup_default_rule)
                .await
            {
                SecurityEvent::policy_installation_failure(format!(
                    "Failed to compile policy for ingress '{}': {e}",
                    ingress.metadata.name
                ))
                .report();
            }
        }

        // The wildcard cleanup rule covers traffic to the default backend
        if cleanup_rule_mode != CleanupRuleMode::Inactive {
            trace!(mode = ?cleanup_rule_mode, "Pushing a cleanup rule");
            if let Some(default_rule) = &cleanup_default_rule {
                let wildcard = ParsedRule {
                    host: "*".to_string(),
                    ..ParsedRule::default()
                };
                maker
                    .create_policy_elements_by_rule(&wildcard, &[], default_rule, &fetcher, "", "", true)
                    .await?;
            }
        }

        info!(
            rules = maker.rule_count(),
            "Policy creation summary"
        );

        let wrapper = maker.combine_elements_to_policy(policy_version, "Kubernetes", "Kubernetes Agents");
        let artifact = serde_json::to_string(&wrapper)?;
        write_atomic(&self.artifact_path, artifact.as_bytes()).await.map_err(|e| {
            PolicyError::Conversion(format!("Failed to write the policy artifact: {e}"))
        })?;
        Ok(artifact)
    }

    async fn process_ingress(
        &self,
        ingress: &SingleIngressData,
        fetcher: &K8sPolicyFetcher<'_>,
        maker: &mut PolicyMaker,
        cleanup_rule_mode: &mut CleanupRuleMode,
        cleanup_default_rule: &mut Option<ParsedRule>,
    ) -> Result<()> {
        let mut specific_assets: BTreeSet<(String, String)> = BTreeSet::new();
        for rule in &ingress.spec.rules {
            for path in &rule.http.paths {
                trace!(host = %rule.host, path = %path.path, "Inserting host data to the specific asset set");
                specific_assets.insert((rule.host.clone(), path.path.clone()));
            }
        }

        let mut policy_annotation = String::new();
        let mut syslog_address = String::new();
        let mut syslog_port = String::new();
        for (key, val) in &ingress.metadata.annotations {
            if !key.starts_with(ANNOTATION_PREFIX) {
                continue;
            }
            let key = &key[ANNOTATION_PREFIX.len()..];
            if key == POLICY_KEY {
                policy_annotation = val.clone();
            }
            if key == SYSLOG_KEY {
                match val.split_once(':') {
                    Some((address, port)) => {
                        syslog_address = address.to_string();
                        syslog_port = port.to_string();
                    }
                    None => syslog_address = val.clone(),
                }
            }
            if key == MODE_KEY {
                trace!(mode = %val, "Found mode annotation");
            }
        }

        if policy_annotation.is_empty() {
            debug!(ingress = %ingress.metadata.name, "No policy was found in this ingress");
            return Ok(());
        }

        trace!(policy = %policy_annotation, "Trying to parse policy");
        let (default_rule, specific_rules, access_control_by_rule) = self.fetch_policy(&policy_annotation).await?;

        for (rule, access_control) in specific_rules.iter().zip(&access_control_by_rule) {
            let (_, url, uri) = split_host_name(&rule.host);
            // A specific rule covers this asset; it gets no default policy
            specific_assets.remove(&(url, uri));

            maker
                .create_policy_elements_by_rule(
                    rule,
                    access_control,
                    &default_rule,
                    fetcher,
                    &syslog_address,
                    &syslog_port,
                    false,
                )
                .await?;
        }

        if ingress.spec.default_backend.is_some() {
            trace!("Default backend exists in the ingress");
            let escalated = match cleanup_rule_mode {
                CleanupRuleMode::Prevent => None,
                _ if default_rule.mode.contains("prevent") => Some(CleanupRuleMode::Prevent),
                CleanupRuleMode::Inactive if default_rule.mode.contains("detect") => Some(CleanupRuleMode::Detect),
                _ => None,
            };
            if let Some(mode) = escalated {
                *cleanup_rule_mode = mode;
                *cleanup_default_rule = Some(default_rule.clone());
            }
        }

        // Every ingress asset not covered by a specific rule gets the
        // default rule
        for (url, uri) in &specific_assets {
            let synthetic = ParsedRule {
                host: format!("{url}{uri}"),
                ..ParsedRule::default()
            };
            maker
                .create_policy_elements_by_rule(&synthetic, &[], &default_rule, fetcher, &syslog_address, &syslog_port, false)
                .await?;
        }

        Ok(())
    }

    /// Fetch the policy custom resource and normalize it to the `v1beta1`
    /// rule form, keeping the `v1beta2` access-control references per rule
    async fn fetch_policy(&self, name: &str) -> Result<(ParsedRule, Vec<ParsedRule>, Vec<Vec<String>>)> {
        match self.client.version() {
            PolicyVersion::V1beta1 => {
                let policy: AppsecPolicySpec = self.client.openappsec_resource("policies", name).await?;
                let count = policy.specific_rules.len();
                Ok((policy.default_rule, policy.specific_rules, vec![Vec::new(); count]))
            }
            PolicyVersion::V1beta2 => {
                let policy: AppsecPolicySpecV2 = self.client.openappsec_resource("policies", name).await?;
                let default_access_control = policy.default_rule.access_control_practices().to_vec();
                let access_control = policy
                    .specific_rules
                    .iter()
                    .map(|rule| {
                        if rule.access_control_practices().is_empty() {
                            default_access_control.clone()
                        } else {
                            rule.access_control_practices().to_vec()
                        }
                    })
                    .collect();
                let rules = policy.specific_rules.iter().map(super::spec::v1beta2::ParsedRuleV2::to_v1).collect();
                Ok((policy.default_rule.to_v1(), rules, access_control))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use skywall_core::AgentDetails;
    use skywall_messaging::{
        HttpResponse, HttpStatus, MessagingConfig, MessagingResult, Transport, TransportRequest,
    };

    /// Transport serving canned cluster objects by path
    struct ClusterStub {
        objects: HashMap<String, serde_json::Value>,
        requests: Mutex<Vec<String>>,
    }

    impl ClusterStub {
        fn new(objects: Vec<(&str, serde_json::Value)>) -> Arc<Self> {
            Arc::new(Self {
                objects: objects.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for ClusterStub {
        async fn send(&self, request: &TransportRequest) -> MessagingResult<HttpResponse> {
            self.requests.lock().push(request.uri.clone());
            match self.objects.get(&request.uri) {
                Some(value) => Ok(HttpResponse::new(HttpStatus::Ok, value.to_string())),
                None => Ok(HttpResponse::new(HttpStatus::NotFound, "not found")),
            }
        }
    }

    fn client(stub: Arc<ClusterStub>) -> ClusterClient {
        let messaging = Arc::new(MessagingClient::new(
            MessagingConfig::default(),
            stub,
            AgentDetails::default(),
        ));
        ClusterClient::new(messaging, "sa-token", PolicyVersion::V1beta1)
    }

    fn ingress_list() -> serde_json::Value {
        serde_json::json!({
            "apiVersion": "networking.k8s.io/v1",
            "items": [{
                "metadata": {
                    "name": "web-ingress",
                    "annotations": {
                        "openappsec.io/policy": "demo-policy",
                        "kubernetes.io/ingress.class": "nginx"
                    }
                },
                "spec": {
                    "rules": [{
                        "host": "example.com",
                        "http": {"paths": [{"path": "/api", "pathType": "Prefix"}, {"path": "/web", "pathType": "Prefix"}]}
                    }]
                }
            }]
        })
    }

    fn policy_resource() -> serde_json::Value {
        serde_json::json!({
            "apiVersion": "openappsec.io/v1beta1",
            "kind": "Policy",
            "spec": {
                "default": {
                    "mode": "prevent-learn",
                    "practices": ["webapp-default-practice"],
                    "triggers": ["appsec-default-log-trigger"]
                },
                "specific-rules": [{"host": "example.com/api"}]
            }
        })
    }

    fn practice_resource() -> serde_json::Value {
        serde_json::json!({"spec": {"name": "webapp-default-practice"}})
    }

    fn trigger_resource() -> serde_json::Value {
        serde_json::json!({"spec": {"name": "appsec-default-log-trigger"}})
    }

    #[tokio::test]
    async fn test_cluster_requests_carry_bearer_token() {
        let stub = ClusterStub::new(vec![("/api/v1/namespaces/", serde_json::json!({"items": []}))]);
        let client = client(Arc::clone(&stub));
        let _ = client.cluster_id().await;
        assert_eq!(stub.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_cluster_id_from_kube_system() {
        let stub = ClusterStub::new(vec![(
            "/api/v1/namespaces/",
            serde_json::json!({"items": [
                {"metadata": {"name": "default", "uid": "a"}},
                {"metadata": {"name": "kube-system", "uid": "cluster-uid-1"}}
            ]}),
        )]);
        let client = client(stub);
        assert_eq!(client.cluster_id().await.expect("uid"), "cluster-uid-1");
    }

    #[tokio::test]
    async fn test_parse_policy_covers_specific_and_default_assets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stub = ClusterStub::new(vec![
            ("/apis/networking.k8s.io/v1/ingresses", ingress_list()),
            ("/apis/openappsec.io/v1beta1/policies/demo-policy", policy_resource()),
            ("/apis/openappsec.io/v1beta1/practices/webapp-default-practice", practice_resource()),
            ("/apis/openappsec.io/v1beta1/logtriggers/appsec-default-log-trigger", trigger_resource()),
        ]);
        let generator = K8sPolicyGenerator::new(client(stub)).with_artifact_path(dir.path().join("artifact.json"));

        let artifact = generator.parse_policy("7").await;
        assert!(!artifact.is_empty());
        let json: serde_json::Value = serde_json::from_str(&artifact).expect("json");

        let rules = json["policies"]["rules"]["rulebase"]["rulesConfig"].as_array().expect("rules");
        // One specific rule (/api) plus one synthesized default rule (/web)
        assert_eq!(rules.len(), 2);
        let ids: Vec<&str> = rules.iter().map(|r| r["assetId"].as_str().expect("id")).collect();
        assert!(ids.contains(&"example.com/api"));
        assert!(ids.contains(&"example.com/web"));
        assert_eq!(json["settings"]["agent"]["agentType"], "Kubernetes");
    }

    #[tokio::test]
    async fn test_broken_ingress_does_not_abort_others() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut list = ingress_list();
        list["items"].as_array_mut().expect("items").push(serde_json::json!({
            "metadata": {
                "name": "broken-ingress",
                "annotations": {"openappsec.io/policy": "missing-policy"}
            },
            "spec": {"rules": []}
        }));
        let stub = ClusterStub::new(vec![
            ("/apis/networking.k8s.io/v1/ingresses", list),
            ("/apis/openappsec.io/v1beta1/policies/demo-policy", policy_resource()),
            ("/apis/openappsec.io/v1beta1/practices/webapp-default-practice", practice_resource()),
            ("/apis/openappsec.io/v1beta1/logtriggers/appsec-default-log-trigger", trigger_resource()),
        ]);
        let generator = K8sPolicyGenerator::new(client(stub)).with_artifact_path(dir.path().join("artifact.json"));

        let artifact = generator.parse_policy("7").await;
        assert!(!artifact.is_empty());
        let json: serde_json::Value = serde_json::from_str(&artifact).expect("json");
        assert_eq!(
            json["policies"]["rules"]["rulebase"]["rulesConfig"].as_array().expect("rules").len(),
            2
        );
    }

    #[tokio::test]
    async fn test_default_backend_creates_cleanup_rule() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut list = ingress_list();
        list["items"][0]["spec"]["defaultBackend"] = serde_json::json!({"service": {"name": "fallback"}});
        let stub = ClusterStub::new(vec![
            ("/apis/networking.k8s.io/v1/ingresses", list),
            ("/apis/openappsec.io/v1beta1/policies/demo-policy", policy_resource()),
            ("/apis/openappsec.io/v1beta1/practices/webapp-default-practice", practice_resource()),
            ("/apis/openappsec.io/v1beta1/logtriggers/appsec-default-log-trigger", trigger_resource()),
        ]);
        let generator = K8sPolicyGenerator::new(client(stub)).with_artifact_path(dir.path().join("artifact.json"));

        let artifact = generator.parse_policy("7").await;
        let json: serde_json::Value = serde_json::from_str(&artifact).expect("json");
        let rules = json["policies"]["rules"]["rulebase"]["rulesConfig"].as_array().expect("rules");
        // Cleanup rule lands last after the specificity sort
        assert_eq!(rules.last().expect("last")["assetId"], "Any");
        assert_eq!(rules.last().expect("last")["context"], "All()");
    }

    #[tokio::test]
    async fn test_ingress_without_policy_annotation_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let list = serde_json::json!({
            "items": [{"metadata": {"name": "plain", "annotations": {}}, "spec": {"rules": []}}]
        });
        let stub = ClusterStub::new(vec![("/apis/networking.k8s.io/v1/ingresses", list)]);
        let generator = K8sPolicyGenerator::new(client(stub)).with_artifact_path(dir.path().join("artifact.json"));

        let artifact = generator.parse_policy("7").await;
        let json: serde_json::Value = serde_json::from_str(&artifact).expect("json");
        assert!(json["policies"]["rules"]["rulebase"]["rulesConfig"].as_array().expect("rules").is_empty());
    }

    #[tokio::test]
    async fn test_syslog_annotation_synthesizes_trigger() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut list = ingress_list();
        list["items"][0]["metadata"]["annotations"]["openappsec.io/syslog"] = serde_json::json!("10.3.3.3:1514");
        // Policy without a named trigger so the syslog one is synthesized
        let policy = serde_json::json!({
            "spec": {
                "default": {"mode": "detect-learn", "practices": ["webapp-default-practice"]},
                "specific-rules": [{"host": "example.com/api"}]
            }
        });
        let stub = ClusterStub::new(vec![
            ("/apis/networking.k8s.io/v1/ingresses", list),
            ("/apis/openappsec.io/v1beta1/policies/demo-policy", policy),
            ("/apis/openappsec.io/v1beta1/practices/webapp-default-practice", practice_resource()),
        ]);
        let generator = K8sPolicyGenerator::new(client(stub)).with_artifact_path(dir.path().join("artifact.json"));

        let artifact = generator.parse_policy("7").await;
        let json: serde_json::Value = serde_json::from_str(&artifact).expect("json");
        let triggers = json["policies"]["triggers"]["rulebase"]["log"].as_array().expect("log");
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0]["triggerName"], "10.3.3.3");
        assert_eq!(triggers[0]["urlForSyslog"], "10.3.3.3:1514");
        assert_eq!(triggers[0]["logToSyslog"], true);
    }
}
