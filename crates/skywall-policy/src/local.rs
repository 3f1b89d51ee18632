//! Linux local-policy compilation
//!
//! The policy source is a YAML file. Conversion to JSON goes through an
//! external converter command (`yq` by default); when no converter is
//! configured the file is parsed directly with serde_yaml.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use skywall_core::events::SecurityEvent;
use skywall_core::fs::write_atomic;

use crate::error::{PolicyError, Result};
use crate::maker::{PolicyFetcher, PolicyMaker};
use crate::spec::v1beta1::{
    AppSecCustomResponseSpec, AppSecPracticeSpec, AppsecExceptionSpec, AppsecLinuxPolicy, AppsecTriggerSpec,
    SourceIdentifierSpec, TrustedSourcesSpec,
};
use crate::spec::v1beta2::{AccessControlPracticeSpec, AppsecLinuxPolicyV2, ThreatPreventionPracticeSpec};
use crate::{PolicyVersion, LOCAL_POLICY_ARTIFACT_PATH, LOCAL_POLICY_SOURCE_PATH};

/// Configuration of the local policy generator
#[derive(Debug, Clone)]
pub struct LocalPolicyConfig {
    /// Path of the policy YAML file
    pub policy_path: PathBuf,
    /// Path the compiled artifact is written to
    pub artifact_path: PathBuf,
    /// External YAML-to-JSON converter; `{path}` is replaced by the policy
    /// path. `None` parses the YAML in-process.
    pub yaml_converter: Option<Vec<String>>,
    /// Input schema version
    pub version: PolicyVersion,
}

impl Default for LocalPolicyConfig {
    fn default() -> Self {
        Self {
            policy_path: PathBuf::from(LOCAL_POLICY_SOURCE_PATH),
            artifact_path: PathBuf::from(LOCAL_POLICY_ARTIFACT_PATH),
            yaml_converter: Some(vec![
                "yq".to_string(),
                "{path}".to_string(),
                "-o".to_string(),
                "json".to_string(),
            ]),
            version: PolicyVersion::V1beta1,
        }
    }
}

impl LocalPolicyConfig {
    /// Config rooted at an install prefix
    pub fn with_prefix(prefix: &std::path::Path) -> Self {
        Self {
            policy_path: prefix.join(LOCAL_POLICY_SOURCE_PATH.trim_start_matches('/')),
            ..Self::default()
        }
    }
}

/// Resolves element references against the in-memory policy object
pub struct LinuxPolicyFetcher {
    policy: AppsecLinuxPolicy,
}

impl LinuxPolicyFetcher {
    /// Fetcher over a parsed policy file
    pub fn new(policy: AppsecLinuxPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl PolicyFetcher for LinuxPolicyFetcher {
    async fn practice(&self, name: &str) -> Result<AppSecPracticeSpec> {
        self.policy
            .practices
            .iter()
            .find(|practice| practice.practice_name == name)
            .cloned()
            .ok_or_else(|| PolicyError::unresolved("practice", name, "not present in the policy file"))
    }

    async fn trigger(&self, name: &str) -> Result<AppsecTriggerSpec> {
        self.policy
            .log_triggers
            .iter()
            .find(|trigger| trigger.name == name)
            .cloned()
            .ok_or_else(|| PolicyError::unresolved("trigger", name, "not present in the policy file"))
    }

    async fn exceptions(&self, name: &str) -> Result<Vec<AppsecExceptionSpec>> {
        let matching: Vec<AppsecExceptionSpec> =
            self.policy.exceptions.iter().filter(|spec| spec.name == name).cloned().collect();
        if matching.is_empty() {
            return Err(PolicyError::unresolved("exception", name, "not present in the policy file"));
        }
        Ok(matching)
    }

    async fn custom_response(&self, name: &str) -> Result<AppSecCustomResponseSpec> {
        self.policy
            .custom_responses
            .iter()
            .find(|response| response.name == name)
            .cloned()
            .ok_or_else(|| PolicyError::unresolved("custom response", name, "not present in the policy file"))
    }

    async fn trusted_sources(&self, name: &str) -> Result<TrustedSourcesSpec> {
        self.policy
            .trusted_sources
            .iter()
            .find(|sources| sources.name == name)
            .cloned()
            .ok_or_else(|| PolicyError::unresolved("trusted sources", name, "not present in the policy file"))
    }

    async fn source_identifiers(&self, name: &str) -> Result<Vec<SourceIdentifierSpec>> {
        self.policy
            .source_identifiers
            .iter()
            .find(|wrapper| wrapper.name == name)
            .map(|wrapper| wrapper.identifiers.clone())
            .ok_or_else(|| PolicyError::unresolved("source identifiers", name, "not present in the policy file"))
    }
}

/// Resolves element references against an in-memory `v1beta2` policy object
pub struct LinuxPolicyFetcherV2 {
    policy: AppsecLinuxPolicyV2,
}

impl LinuxPolicyFetcherV2 {
    /// Fetcher over a parsed `v1beta2` policy file
    pub fn new(policy: AppsecLinuxPolicyV2) -> Self {
        Self { policy }
    }

    fn find_threat_prevention(&self, name: &str) -> Option<&ThreatPreventionPracticeSpec> {
        self.policy.threat_prevention_practices.iter().find(|practice| practice.name == name)
    }
}

#[async_trait]
impl PolicyFetcher for LinuxPolicyFetcherV2 {
    async fn practice(&self, name: &str) -> Result<AppSecPracticeSpec> {
        self.find_threat_prevention(name)
            .map(ThreatPreventionPracticeSpec::to_v1)
            .ok_or_else(|| PolicyError::unresolved("practice", name, "not present in the policy file"))
    }

    async fn trigger(&self, name: &str) -> Result<AppsecTriggerSpec> {
        self.policy
            .log_triggers
            .iter()
            .find(|trigger| trigger.name == name)
            .cloned()
            .ok_or_else(|| PolicyError::unresolved("trigger", name, "not present in the policy file"))
    }

    async fn exceptions(&self, name: &str) -> Result<Vec<AppsecExceptionSpec>> {
        let matching: Vec<AppsecExceptionSpec> =
            self.policy.exceptions.iter().filter(|spec| spec.name == name).cloned().collect();
        if matching.is_empty() {
            return Err(PolicyError::unresolved("exception", name, "not present in the policy file"));
        }
        Ok(matching)
    }

    async fn custom_response(&self, name: &str) -> Result<AppSecCustomResponseSpec> {
        self.policy
            .custom_responses
            .iter()
            .find(|response| response.name == name)
            .cloned()
            .ok_or_else(|| PolicyError::unresolved("custom response", name, "not present in the policy file"))
    }

    async fn trusted_sources(&self, name: &str) -> Result<TrustedSourcesSpec> {
        self.policy
            .trusted_sources
            .iter()
            .find(|sources| sources.name == name)
            .cloned()
            .ok_or_else(|| PolicyError::unresolved("trusted sources", name, "not present in the policy file"))
    }

    async fn source_identifiers(&self, name: &str) -> Result<Vec<SourceIdentifierSpec>> {
        self.policy
            .sources_identifiers
            .iter()
            .find(|wrapper| wrapper.name == name)
            .map(|wrapper| wrapper.identifiers.clone())
            .ok_or_else(|| PolicyError::unresolved("source identifiers", name, "not present in the policy file"))
    }

    async fn threat_prevention_practice(&self, name: &str) -> Result<Option<ThreatPreventionPracticeSpec>> {
        Ok(self.find_threat_prevention(name).cloned())
    }

    async fn access_control_practice(&self, name: &str) -> Result<Option<AccessControlPracticeSpec>> {
        Ok(self.policy.access_control_practices.iter().find(|practice| practice.name == name).cloned())
    }
}

/// Compiles the local policy file into the artifact
pub struct LocalPolicyGenerator {
    config: LocalPolicyConfig,
}

impl LocalPolicyGenerator {
    /// Generator with the given configuration
    pub fn new(config: LocalPolicyConfig) -> Self {
        Self { config }
    }

    /// The artifact output path
    pub fn policy_path(&self) -> &std::path::Path {
        &self.config.artifact_path
    }

    /// Compile the local policy file
    ///
    /// Returns the artifact JSON, or the empty string after reporting a
    /// structured policy-installation failure.
    pub async fn parse_policy(&self, policy_version: &str) -> String {
        match self.try_parse_policy(policy_version).await {
            Ok(artifact) => artifact,
            Err(e) => {
                SecurityEvent::policy_installation_failure(format!("Failed to compile local policy: {e}")).report();
                String::new()
            }
        }
    }

    async fn try_parse_policy(&self, policy_version: &str) -> Result<String> {
        let policy_json = self.policy_as_json().await?;
        let mut maker = PolicyMaker::new();

        match self.config.version {
            PolicyVersion::V1beta1 => {
                let policy: AppsecLinuxPolicy = serde_json::from_value(policy_json)?;
                let fetcher = LinuxPolicyFetcher::new(policy.clone());
                maker
                    .create_policy_elements(&policy.policies.specific_rules, &policy.policies.default_rule, &fetcher)
                    .await?;
            }
            PolicyVersion::V1beta2 => {
                let policy: AppsecLinuxPolicyV2 = serde_json::from_value(policy_json)?;
                let fetcher = LinuxPolicyFetcherV2::new(policy.clone());
                let default_rule = policy.policies.default_rule.to_v1();
                let default_access_control = policy.policies.default_rule.access_control_practices().to_vec();
                for rule in &policy.policies.specific_rules {
                    let access_control = if rule.access_control_practices().is_empty() {
                        &default_access_control
                    } else {
                        rule.access_control_practices()
                    };
                    maker
                        .create_policy_elements_by_rule(
                            &rule.to_v1(),
                            access_control,
                            &default_rule,
                            &fetcher,
                            "",
                            "",
                            false,
                        )
                        .await?;
                }
            }
        }

        let wrapper = maker.combine_elements_to_policy(policy_version, "Linux", "Linux Agents");
        let artifact = serde_json::to_string(&wrapper)?;
        write_atomic(&self.config.artifact_path, artifact.as_bytes())
            .await
            .map_err(|e| PolicyError::Conversion(format!("Failed to write the policy artifact: {e}")))?;
        debug!(path = %self.config.artifact_path.display(), "Wrote compiled policy artifact");
        Ok(artifact)
    }

    /// Convert the policy YAML to a JSON value, via the configured external
    /// converter or in-process parsing
    async fn policy_as_json(&self) -> Result<serde_json::Value> {
        if let Some(converter) = &self.config.yaml_converter {
            match self.run_converter(converter).await {
                Ok(json) => return Ok(json),
                Err(e) => {
                    warn!(error = %e, "YAML converter failed, falling back to in-process parsing");
                }
            }
        }

        let contents = tokio::fs::read_to_string(&self.config.policy_path).await?;
        let yaml: serde_yaml::Value = serde_yaml::from_str(&contents)?;
        serde_json::to_value(yaml).map_err(PolicyError::from)
    }

    async fn run_converter(&self, converter: &[String]) -> Result<serde_json::Value> {
        let path = self.config.policy_path.display().to_string();
        let argv: Vec<String> = converter.iter().map(|arg| arg.replace("{path}", &path)).collect();
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| PolicyError::InvalidInput("Empty YAML converter command".to_string()))?;

        let output = tokio::process::Command::new(program).args(args).output().await?;
        if !output.status.success() {
            return Err(PolicyError::Conversion(format!(
                "Converter exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        serde_json::from_slice(&output.stdout).map_err(PolicyError::from)
    }
}

/// Shared handle used by the agent wiring
pub type SharedLocalPolicyGenerator = Arc<LocalPolicyGenerator>;

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY_YAML: &str = r#"
policies:
  default:
    mode: detect-learn
    practices: [webapp-default-practice]
    triggers: [appsec-default-log-trigger]
  specific-rules:
    - host: "example.com/api"
practices:
  - name: webapp-default-practice
log-triggers:
  - name: appsec-default-log-trigger
custom-responses: []
exceptions: []
trusted-sources: []
source-identifiers: []
"#;

    fn config(dir: &std::path::Path) -> LocalPolicyConfig {
        LocalPolicyConfig {
            policy_path: dir.join("local_policy.yaml"),
            artifact_path: dir.join("local_appsec.policy"),
            yaml_converter: None,
            version: PolicyVersion::V1beta1,
        }
    }

    #[tokio::test]
    async fn test_parse_policy_writes_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        tokio::fs::write(dir.path().join("local_policy.yaml"), POLICY_YAML).await.expect("write");

        let generator = LocalPolicyGenerator::new(config(dir.path()));
        let artifact = generator.parse_policy("1.0.0").await;
        assert!(!artifact.is_empty());

        let on_disk = tokio::fs::read_to_string(dir.path().join("local_appsec.policy")).await.expect("read");
        assert_eq!(artifact, on_disk);

        let json: serde_json::Value = serde_json::from_str(&artifact).expect("json");
        assert_eq!(json["policies"]["version"], "1.0.0");
        assert_eq!(
            json["policies"]["rules"]["rulebase"]["rulesConfig"][0]["assetName"],
            "example.com/api"
        );
        assert_eq!(json["settings"]["agent"]["agentType"], "Linux");
    }

    #[tokio::test]
    async fn test_missing_reference_yields_empty_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let broken = POLICY_YAML.replace("  - name: webapp-default-practice", "  - name: other-practice");
        tokio::fs::write(dir.path().join("local_policy.yaml"), broken).await.expect("write");

        let generator = LocalPolicyGenerator::new(config(dir.path()));
        assert_eq!(generator.parse_policy("1.0.0").await, "");
    }

    #[tokio::test]
    async fn test_missing_file_yields_empty_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let generator = LocalPolicyGenerator::new(config(dir.path()));
        assert_eq!(generator.parse_policy("1.0.0").await, "");
    }

    #[tokio::test]
    async fn test_converter_fallback_to_serde_yaml() {
        let dir = tempfile::tempdir().expect("tempdir");
        tokio::fs::write(dir.path().join("local_policy.yaml"), POLICY_YAML).await.expect("write");

        let mut config = config(dir.path());
        config.yaml_converter = Some(vec!["definitely-not-a-real-converter".to_string(), "{path}".to_string()]);
        let generator = LocalPolicyGenerator::new(config);
        assert!(!generator.parse_policy("1.0.0").await.is_empty());
    }

    #[tokio::test]
    async fn test_v1beta2_policy_emits_protection_sections() {
        const POLICY_V2_YAML: &str = r#"
policies:
  default:
    mode: prevent-learn
    threatPreventionPractices: [tp-practice]
    accessControlPractices: [ac-practice]
    triggers: [log-trigger]
  specificRules:
    - host: "example.com"
threatPreventionPractices:
  - name: tp-practice
    intrusionPrevention:
      overrideMode: prevent
      maxPerformanceImpact: medium
accessControlPractices:
  - name: ac-practice
    rateLimit:
      overrideMode: prevent
      rules:
        - limit: 100
          unit: minute
          uri: /login
logTriggers:
  - name: log-trigger
"#;
        let dir = tempfile::tempdir().expect("tempdir");
        tokio::fs::write(dir.path().join("local_policy.yaml"), POLICY_V2_YAML).await.expect("write");

        let mut config = config(dir.path());
        config.version = PolicyVersion::V1beta2;
        let generator = LocalPolicyGenerator::new(config);
        let artifact = generator.parse_policy("2.0.0").await;
        assert!(!artifact.is_empty());

        let json: serde_json::Value = serde_json::from_str(&artifact).expect("json");
        assert_eq!(json["policies"]["ips"]["IpsProtections"][0]["defaultMode"], "prevent");
        assert_eq!(json["policies"]["rateLimit"]["RateLimit"][0]["rules"][0]["limit"], 100);
        assert_eq!(
            json["policies"]["waap"]["WAAP"]["WebApplicationSecurity"][0]["practiceName"],
            "tp-practice"
        );
    }

    #[test]
    fn test_default_paths() {
        let config = LocalPolicyConfig::default();
        assert_eq!(config.artifact_path, PathBuf::from("/tmp/local_appsec.policy"));
        assert_eq!(config.policy_path, PathBuf::from("/conf/local_policy.yaml"));
    }

    #[test]
    fn test_prefix_paths() {
        let config = LocalPolicyConfig::with_prefix(std::path::Path::new("/opt/skywall"));
        assert_eq!(config.policy_path, PathBuf::from("/opt/skywall/conf/local_policy.yaml"));
    }
}
