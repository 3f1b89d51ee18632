//! Web application and web API practice sections

use serde::Serialize;

use crate::sections::triggers::LogTriggerSection;
use crate::sections::trusted_sources::{AppSecTrustedSources, SourcesIdentifiers};
use crate::spec::v1beta1::{AppSecPracticeAntiBot, AppSecPracticeSpec};

/// Request-size and parsing caps of a practice
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeAdvancedConfig {
    /// Header size cap in bytes
    pub http_header_max_size: u64,
    /// Count of additionally allowed methods
    pub http_illegal_methods_allowed: u64,
    /// Body size cap in KB
    pub http_request_body_max_size: u64,
    /// JSON object depth cap
    pub json_max_object_depth: u64,
    /// URL size cap in bytes
    pub url_max_size: u64,
}

impl PracticeAdvancedConfig {
    /// Caps from the practice's web-attacks block
    pub fn from_spec(spec: &AppSecPracticeSpec) -> Self {
        Self {
            http_header_max_size: spec.web_attacks.max_header_size_bytes,
            http_illegal_methods_allowed: 0,
            http_request_body_max_size: spec.web_attacks.max_body_size_kb,
            json_max_object_depth: spec.web_attacks.max_object_depth,
            url_max_size: spec.web_attacks.max_url_size_bytes,
        }
    }
}

/// A log trigger embedded in a web application section
#[derive(Debug, Clone, Serialize)]
pub struct TriggersInWaapSection {
    /// Discriminator, always `log`
    #[serde(rename = "$triggerType")]
    pub trigger_type: String,
    /// Trigger id
    pub id: String,
    /// Trigger name
    pub name: String,
    /// The full trigger section
    pub log: LogTriggerSection,
}

impl TriggersInWaapSection {
    /// Embed a compiled log trigger
    pub fn new(log_section: LogTriggerSection) -> Self {
        Self {
            trigger_type: "log".to_string(),
            id: log_section.trigger_id().to_string(),
            name: log_section.trigger_name().to_string(),
            log: log_section,
        }
    }
}

/// Behavior override for one trusted source
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSecOverride {
    /// The behavior granted to the matched source
    pub parsed_behavior: Vec<OverrideBehavior>,
    /// The source match
    pub parsed_match: OverrideMatch,
}

/// Behavior half of an override
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideBehavior {
    /// Source identifier receiving the behavior
    pub http_source_id: String,
}

/// Match half of an override
#[derive(Debug, Clone, Serialize)]
pub struct OverrideMatch {
    /// Match operator
    pub operator: String,
    /// Matched tag
    pub tag: String,
    /// Matched value
    pub value: String,
}

impl AppSecOverride {
    /// Override for one trusted-source identifier
    pub fn new(source: &SourcesIdentifiers) -> Self {
        Self {
            parsed_behavior: vec![OverrideBehavior {
                http_source_id: source.source_ident().to_string(),
            }],
            parsed_match: OverrideMatch {
                operator: "BASIC".to_string(),
                tag: "sourceip".to_string(),
                value: "0.0.0.0/0".to_string(),
            },
        }
    }
}

/// A compiled web application practice
#[derive(Debug, Clone, Serialize)]
pub struct WebAppSection {
    /// Context predicate binding by practice id
    pub context: String,
    /// Whether mitigation is active
    #[serde(rename = "webAttackMitigation")]
    pub web_attack_mitigation: bool,
    /// Minimum confidence acted on
    #[serde(rename = "webAttackMitigationSeverity")]
    pub web_attack_mitigation_severity: String,
    /// Mitigation aggressiveness derived from the severity
    #[serde(rename = "webAttackMitigationAction")]
    pub web_attack_mitigation_action: String,
    /// Enforcement mode
    #[serde(rename = "webAttackMitigationMode")]
    pub web_attack_mitigation_mode: String,
    /// Request caps
    #[serde(rename = "practiceAdvancedConfig")]
    pub practice_advanced_config: PracticeAdvancedConfig,
    /// CSRF protection state
    #[serde(rename = "csrfProtection")]
    pub csrf_protection: String,
    /// Open-redirect detection state
    #[serde(rename = "openRedirect")]
    pub open_redirect: String,
    /// Error-disclosure detection state
    #[serde(rename = "errorDisclosure")]
    pub error_disclosure: String,
    /// Practice id
    #[serde(rename = "practiceId")]
    pub practice_id: String,
    /// Practice name
    #[serde(rename = "practiceName")]
    pub practice_name: String,
    /// Asset id
    #[serde(rename = "assetId")]
    pub asset_id: String,
    /// Asset name
    #[serde(rename = "assetName")]
    pub asset_name: String,
    /// Rule id
    #[serde(rename = "ruleId")]
    pub rule_id: String,
    /// Rule name
    #[serde(rename = "ruleName")]
    pub rule_name: String,
    /// Embedded log triggers
    pub triggers: Vec<TriggersInWaapSection>,
    /// Application URLs covered by this practice
    #[serde(rename = "applicationUrls")]
    pub application_urls: String,
    /// Trusted-source overrides
    pub overrides: Vec<AppSecOverride>,
    /// Trusted-sources parameters
    #[serde(rename = "trustedSources")]
    pub trusted_sources: Vec<AppSecTrustedSources>,
    /// WAAP parameters, unused
    #[serde(rename = "waapParameters")]
    pub waap_parameters: Vec<String>,
    /// Legacy bot protection flag
    #[serde(rename = "botProtection")]
    pub bot_protection: bool,
    /// Anti-bot block
    #[serde(rename = "antiBot")]
    pub anti_bot: AppSecPracticeAntiBot,
    /// Bot protection state
    #[serde(rename = "botProtection_v2")]
    pub bot_protection_v2: String,
}

impl WebAppSection {
    /// Compile one web application section
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        application_urls: String,
        asset_id: String,
        asset_name: String,
        rule_id: String,
        rule_name: String,
        practice_id: String,
        practice_name: String,
        spec: &AppSecPracticeSpec,
        log_trigger: Option<LogTriggerSection>,
        default_mode: &str,
        trusted_sources: AppSecTrustedSources,
    ) -> Self {
        let severity = spec.web_attacks.minimum_confidence.clone();
        let action = match severity.as_str() {
            "critical" => "low",
            "high" => "balanced",
            "medium" => "high",
            _ => "Error",
        };

        let overrides = trusted_sources.sources_identifiers().iter().map(AppSecOverride::new).collect();

        Self {
            context: format!("practiceId({practice_id})"),
            web_attack_mitigation: true,
            web_attack_mitigation_severity: severity,
            web_attack_mitigation_action: action.to_string(),
            web_attack_mitigation_mode: spec.web_attacks.mode_or(default_mode).to_string(),
            practice_advanced_config: PracticeAdvancedConfig::from_spec(spec),
            csrf_protection: "Disabled".to_string(),
            open_redirect: "Disabled".to_string(),
            error_disclosure: "Disabled".to_string(),
            practice_id,
            practice_name,
            asset_id,
            asset_name,
            rule_id,
            rule_name,
            triggers: log_trigger.map(TriggersInWaapSection::new).into_iter().collect(),
            application_urls,
            overrides,
            trusted_sources: vec![trusted_sources],
            waap_parameters: Vec::new(),
            bot_protection: false,
            anti_bot: spec.anti_bot.clone(),
            bot_protection_v2: "Detect".to_string(),
        }
    }

    /// The practice id
    pub fn practice_id(&self) -> &str {
        &self.practice_id
    }
}

/// A compiled web API practice
#[derive(Debug, Clone, Serialize)]
pub struct WebApiSection {
    /// Application URLs covered by this practice
    pub application_urls: String,
    /// Asset id
    pub asset_id: String,
    /// Asset name
    pub asset_name: String,
    /// Context predicate binding by practice id
    pub context: String,
    /// Request caps
    #[serde(rename = "practiceAdvancedConfig")]
    pub practice_advanced_config: PracticeAdvancedConfig,
    /// Practice id
    pub practice_id: String,
    /// Practice name
    pub practice_name: String,
    /// Rule id
    #[serde(rename = "ruleId")]
    pub rule_id: String,
    /// Rule name
    #[serde(rename = "ruleName")]
    pub rule_name: String,
    /// Legacy schema validation flag
    #[serde(rename = "schemaValidation")]
    pub schema_validation: bool,
    /// Schema validation state
    #[serde(rename = "schemaValidation_v2")]
    pub schema_validation_v2: String,
    /// Whether mitigation is active
    pub web_attack_mitigation: bool,
    /// Mitigation aggressiveness
    pub web_attack_mitigation_action: String,
    /// Minimum confidence acted on
    pub web_attack_mitigation_severity: String,
    /// Enforcement mode
    pub web_attack_mitigation_mode: String,
    /// OpenAPI schema files, unused
    pub oas: Vec<String>,
    /// Trusted sources, unused for APIs
    #[serde(rename = "trustedSources")]
    pub trusted_sources: Vec<String>,
    /// Triggers, unused for APIs
    pub triggers: Vec<String>,
    /// WAAP parameters, unused
    #[serde(rename = "waapParameters")]
    pub waap_parameters: Vec<String>,
    /// Overrides, unused for APIs
    pub overrides: Vec<String>,
}

impl WebApiSection {
    /// Compile one web API section
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        application_urls: String,
        asset_id: String,
        asset_name: String,
        rule_id: String,
        rule_name: String,
        practice_id: String,
        practice_name: String,
        web_attack_mitigation_action: String,
        web_attack_mitigation_severity: String,
        web_attack_mitigation_mode: String,
        web_attack_mitigation: bool,
        spec: &AppSecPracticeSpec,
    ) -> Self {
        Self {
            application_urls,
            asset_id,
            asset_name,
            context: format!("practiceId({practice_id})"),
            practice_advanced_config: PracticeAdvancedConfig::from_spec(spec),
            practice_id,
            practice_name,
            rule_id,
            rule_name,
            schema_validation: false,
            schema_validation_v2: "Disabled".to_string(),
            web_attack_mitigation,
            web_attack_mitigation_action,
            web_attack_mitigation_severity,
            web_attack_mitigation_mode,
            oas: Vec::new(),
            trusted_sources: Vec::new(),
            triggers: Vec::new(),
            waap_parameters: Vec::new(),
            overrides: Vec::new(),
        }
    }
}

/// The WAAP rulebase: application and API practices
#[derive(Debug, Clone, Serialize)]
pub struct AppSecRulebase {
    /// Web API practices
    #[serde(rename = "WebAPISecurity")]
    pub web_api_practices: Vec<WebApiSection>,
    /// Web application practices
    #[serde(rename = "WebApplicationSecurity")]
    pub web_application_practices: Vec<WebAppSection>,
}

/// Wrapper serializing the WAAP rulebase under its artifact key
#[derive(Debug, Clone, Serialize)]
pub struct AppSecWrapper {
    /// The rulebase
    #[serde(rename = "WAAP")]
    pub app_sec_rulebase: AppSecRulebase,
}

impl AppSecWrapper {
    /// Wrap compiled practices
    pub fn new(web_apps: Vec<WebAppSection>, web_apis: Vec<WebApiSection>) -> Self {
        Self {
            app_sec_rulebase: AppSecRulebase {
                web_api_practices: web_apis,
                web_application_practices: web_apps,
            },
        }
    }
}
