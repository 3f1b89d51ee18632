//! The `v1beta2` input schema
//!
//! The successor layout splits practices into threat-prevention and
//! access-control kinds, scopes policies with `appsecClassName`, and moves
//! rule fields to camelCase. Shapes shared with `v1beta1` convert into the
//! older types so the compiler core works on one input form.

use serde::Deserialize;

use super::v1beta1::{
    AppSecPracticeAntiBot, AppSecPracticeFiles, AppSecPracticeSpec, AppSecPracticeWebAttacks, ParsedRule,
};

fn default_inactive() -> String {
    "Inactive".to_string()
}

/// One rule of a `v1beta2` policy
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedRuleV2 {
    /// Host (and optional path) the rule attaches to; `*` matches anything
    #[serde(default)]
    pub host: String,
    /// Enforcement mode
    #[serde(default)]
    pub mode: String,
    /// Referenced threat-prevention practice names
    #[serde(default)]
    pub threat_prevention_practices: Vec<String>,
    /// Referenced access-control practice names
    #[serde(default)]
    pub access_control_practices: Vec<String>,
    /// Referenced log trigger names
    #[serde(default)]
    pub triggers: Vec<String>,
    /// Referenced exception names
    #[serde(default)]
    pub exceptions: Vec<String>,
    /// Referenced custom response name
    #[serde(default)]
    pub custom_response: String,
    /// Referenced source-identifier set name
    #[serde(default)]
    pub source_identifiers: String,
    /// Referenced trusted-sources name
    #[serde(default)]
    pub trusted_sources: String,
}

impl ParsedRuleV2 {
    /// Flatten into the `v1beta1` rule form the compiler core works on
    pub fn to_v1(&self) -> ParsedRule {
        ParsedRule {
            host: self.host.clone(),
            mode: self.mode.clone(),
            practices: self.threat_prevention_practices.clone(),
            log_triggers: self.triggers.clone(),
            exceptions: self.exceptions.clone(),
            custom_response: self.custom_response.clone(),
            source_identifiers: self.source_identifiers.clone(),
            trusted_sources: self.trusted_sources.clone(),
        }
    }

    /// Access-control practice names, which have no `v1beta1` counterpart
    pub fn access_control_practices(&self) -> &[String] {
        &self.access_control_practices
    }
}

/// The `v1beta2` policy object
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppsecPolicySpecV2 {
    /// Class name scoping this policy to one agent deployment
    #[serde(default)]
    pub appsec_class_name: String,
    /// Rule applied where no specific rule matches
    #[serde(default, rename = "default")]
    pub default_rule: ParsedRuleV2,
    /// Host-specific rules
    #[serde(default)]
    pub specific_rules: Vec<ParsedRuleV2>,
}

/// The `intrusion-prevention` block of a threat-prevention practice
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrusionPreventionSpec {
    /// Block mode
    #[serde(default = "default_inactive")]
    pub override_mode: String,
    /// Highest tolerated performance impact
    #[serde(default)]
    pub max_performance_impact: String,
    /// Minimum severity acted on
    #[serde(default)]
    pub min_severity_level: String,
    /// Action on high-confidence findings
    #[serde(default)]
    pub high_confidence_event_action: String,
    /// Action on medium-confidence findings
    #[serde(default)]
    pub medium_confidence_event_action: String,
    /// Action on low-confidence findings
    #[serde(default)]
    pub low_confidence_event_action: String,
    /// Protections newer than this many years are skipped
    #[serde(default)]
    pub min_cve_year: u32,
}

impl Default for IntrusionPreventionSpec {
    fn default() -> Self {
        Self {
            override_mode: default_inactive(),
            max_performance_impact: String::new(),
            min_severity_level: String::new(),
            high_confidence_event_action: String::new(),
            medium_confidence_event_action: String::new(),
            low_confidence_event_action: String::new(),
            min_cve_year: 0,
        }
    }
}

/// The `file-security` block of a threat-prevention practice
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSecuritySpec {
    /// Block mode
    #[serde(default = "default_inactive")]
    pub override_mode: String,
    /// Minimum severity acted on
    #[serde(default)]
    pub min_severity_level: String,
    /// Action on archives within archives
    #[serde(default)]
    pub archive_inside_archive: String,
    /// File size limit
    #[serde(default)]
    pub file_size_limit: u64,
    /// Unit of the file size limit
    #[serde(default)]
    pub file_size_limit_unit: String,
}

impl Default for FileSecuritySpec {
    fn default() -> Self {
        Self {
            override_mode: default_inactive(),
            min_severity_level: String::new(),
            archive_inside_archive: String::new(),
            file_size_limit: 0,
            file_size_limit_unit: String::new(),
        }
    }
}

/// A named threat-prevention practice
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatPreventionPracticeSpec {
    /// Practice name used for rule references
    #[serde(default)]
    pub name: String,
    /// Practice mode
    #[serde(default)]
    pub practice_mode: String,
    /// Web attacks block (shared shape with `v1beta1`)
    #[serde(default, rename = "webAttacks")]
    pub web_attacks: AppSecPracticeWebAttacks,
    /// Intrusion prevention block
    #[serde(default)]
    pub intrusion_prevention: IntrusionPreventionSpec,
    /// File security block
    #[serde(default)]
    pub file_security: FileSecuritySpec,
    /// Snort signatures block
    #[serde(default)]
    pub snort_signatures: AppSecPracticeFiles,
    /// Schema validation block
    #[serde(default)]
    pub schema_validation: AppSecPracticeFiles,
    /// Anti-bot block
    #[serde(default)]
    pub anti_bot: AppSecPracticeAntiBot,
}

impl ThreatPreventionPracticeSpec {
    /// Project onto the `v1beta1` practice form the web sections consume
    pub fn to_v1(&self) -> AppSecPracticeSpec {
        AppSecPracticeSpec {
            practice_name: self.name.clone(),
            openapi_schema_validation: self.schema_validation.clone(),
            snort_signatures: self.snort_signatures.clone(),
            web_attacks: self.web_attacks.clone(),
            anti_bot: self.anti_bot.clone(),
        }
    }
}

/// One rate-limit rule of an access-control practice
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRuleSpec {
    /// Requests allowed per unit
    #[serde(default)]
    pub limit: u64,
    /// Unit of the limit (`second`/`minute`)
    #[serde(default)]
    pub unit: String,
    /// URI the limit attaches to
    #[serde(default)]
    pub uri: String,
    /// Trigger names referenced by this rule
    #[serde(default)]
    pub triggers: Vec<String>,
}

/// The `rate-limit` block of an access-control practice
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSpec {
    /// Block mode
    #[serde(default = "default_inactive")]
    pub override_mode: String,
    /// The rate-limit rules
    #[serde(default)]
    pub rules: Vec<RateLimitRuleSpec>,
}

impl Default for RateLimitSpec {
    fn default() -> Self {
        Self {
            override_mode: default_inactive(),
            rules: Vec::new(),
        }
    }
}

/// A named access-control practice
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlPracticeSpec {
    /// Practice name used for rule references
    #[serde(default)]
    pub name: String,
    /// Rate limit block
    #[serde(default)]
    pub rate_limit: RateLimitSpec,
}

/// The whole local policy file in `v1beta2` form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppsecLinuxPolicyV2 {
    /// The policy rules
    #[serde(default)]
    pub policies: AppsecPolicySpecV2,
    /// Named threat-prevention practices
    #[serde(default)]
    pub threat_prevention_practices: Vec<ThreatPreventionPracticeSpec>,
    /// Named access-control practices
    #[serde(default)]
    pub access_control_practices: Vec<AccessControlPracticeSpec>,
    /// Named log triggers (shared shape with `v1beta1`)
    #[serde(default)]
    pub log_triggers: Vec<super::v1beta1::AppsecTriggerSpec>,
    /// Named custom responses
    #[serde(default)]
    pub custom_responses: Vec<super::v1beta1::AppSecCustomResponseSpec>,
    /// Named exceptions
    #[serde(default)]
    pub exceptions: Vec<super::v1beta1::AppsecExceptionSpec>,
    /// Named trusted-sources groups
    #[serde(default)]
    pub trusted_sources: Vec<super::v1beta1::TrustedSourcesSpec>,
    /// Named source-identifier sets
    #[serde(default)]
    pub sources_identifiers: Vec<super::v1beta1::SourceIdentifierSpecWrapper>,
}
