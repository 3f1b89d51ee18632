//! The `v1beta1` input schema
//!
//! Field names and defaults follow the published custom-resource schema;
//! the same shapes deserialize the local Linux policy file.

use serde::Deserialize;

fn default_true() -> bool {
    true
}

fn default_high() -> String {
    "high".to_string()
}

fn default_json() -> String {
    "json".to_string()
}

fn default_syslog_port() -> u16 {
    514
}

fn default_inactive() -> String {
    "Inactive".to_string()
}

fn default_unset() -> String {
    "Unset".to_string()
}

fn default_critical() -> String {
    "critical".to_string()
}

fn default_block_page() -> String {
    "block-page".to_string()
}

fn default_response_code() -> u16 {
    403
}

fn default_message_body() -> String {
    "Openappsec's <b>Application Security</b> has detected an attack and blocked it.".to_string()
}

fn default_message_title() -> String {
    "Attack blocked by web application protection".to_string()
}

fn default_min_sources() -> u32 {
    3
}

/// One rule of the policy: a host pattern plus named element references
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ParsedRule {
    /// Host (and optional path) the rule attaches to; `*` matches anything
    #[serde(default)]
    pub host: String,
    /// Enforcement mode
    #[serde(default)]
    pub mode: String,
    /// Referenced practice names
    #[serde(default)]
    pub practices: Vec<String>,
    /// Referenced log trigger names
    #[serde(default, rename = "triggers")]
    pub log_triggers: Vec<String>,
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

/// The policy object: one default rule plus host-specific rules
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppsecPolicySpec {
    /// Rule applied where no specific rule matches
    #[serde(default, rename = "default")]
    pub default_rule: ParsedRule,
    /// Host-specific rules
    #[serde(default)]
    pub specific_rules: Vec<ParsedRule>,
}

/// Web-attack protections toggles
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppSecWebAttackProtections {
    /// CSRF protection state
    #[serde(default = "default_inactive_lower", rename = "csrf-enabled")]
    pub csrf_protection: String,
    /// Error-disclosure detection state
    #[serde(default = "default_inactive_lower", rename = "error-disclosure-enabled")]
    pub error_disclosure: String,
    /// Open-redirect detection state
    #[serde(default = "default_inactive_lower", rename = "open-redirect-enabled")]
    pub open_redirect: String,
    /// Whether non-valid HTTP methods are flagged
    #[serde(default)]
    pub non_valid_http_methods: bool,
}

fn default_inactive_lower() -> String {
    "inactive".to_string()
}

impl Default for AppSecWebAttackProtections {
    fn default() -> Self {
        Self {
            csrf_protection: default_inactive_lower(),
            error_disclosure: default_inactive_lower(),
            open_redirect: default_inactive_lower(),
            non_valid_http_methods: false,
        }
    }
}

/// The `web-attacks` block of a practice
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppSecPracticeWebAttacks {
    /// Protections toggles
    #[serde(default)]
    pub protections: AppSecWebAttackProtections,
    /// Practice mode; `Unset` defers to the rule's default mode
    #[serde(default = "default_unset", rename = "override-mode")]
    pub mode: String,
    /// Minimum confidence a finding needs to act on
    #[serde(default = "default_critical")]
    pub minimum_confidence: String,
    /// Body size cap in KB
    #[serde(default = "default_max_body_size")]
    pub max_body_size_kb: u64,
    /// Header size cap in bytes
    #[serde(default = "default_max_header_size")]
    pub max_header_size_bytes: u64,
    /// JSON object depth cap
    #[serde(default = "default_max_object_depth")]
    pub max_object_depth: u64,
    /// URL size cap in bytes
    #[serde(default = "default_max_url_size")]
    pub max_url_size_bytes: u64,
}

fn default_max_body_size() -> u64 {
    1_000_000
}

fn default_max_header_size() -> u64 {
    102_400
}

fn default_max_object_depth() -> u64 {
    40
}

fn default_max_url_size() -> u64 {
    32_768
}

impl Default for AppSecPracticeWebAttacks {
    fn default() -> Self {
        Self {
            protections: AppSecWebAttackProtections::default(),
            mode: default_unset(),
            minimum_confidence: default_critical(),
            max_body_size_kb: default_max_body_size(),
            max_header_size_bytes: default_max_header_size(),
            max_object_depth: default_max_object_depth(),
            max_url_size_bytes: default_max_url_size(),
        }
    }
}

impl AppSecPracticeWebAttacks {
    /// The effective mode: `Unset` falls back to the rule default
    pub fn mode_or<'a>(&'a self, default_mode: &'a str) -> &'a str {
        if self.mode == "Unset" || self.mode.is_empty() {
            default_mode
        } else {
            &self.mode
        }
    }
}

/// One URI entry of the anti-bot block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppSecWebBotsUri {
    /// The protected or injected URI
    #[serde(default)]
    pub uri: String,
}

/// The `anti-bot` block of a practice
#[derive(Debug, Clone, Deserialize)]
pub struct AppSecPracticeAntiBot {
    /// URIs to inject bot-detection content into
    #[serde(default, rename = "injected-URIs")]
    pub injected_uris: Vec<AppSecWebBotsUri>,
    /// URIs validated against bot-detection state
    #[serde(default, rename = "validated-URIs")]
    pub validated_uris: Vec<AppSecWebBotsUri>,
    /// Anti-bot mode
    #[serde(default = "default_inactive", rename = "override-mode")]
    pub override_mode: String,
}

impl Default for AppSecPracticeAntiBot {
    fn default() -> Self {
        Self {
            injected_uris: Vec::new(),
            validated_uris: Vec::new(),
            override_mode: default_inactive(),
        }
    }
}

impl serde::Serialize for AppSecPracticeAntiBot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("AppSecPracticeAntiBot", 3)?;
        let injected: Vec<&str> = self.injected_uris.iter().map(|u| u.uri.as_str()).collect();
        let validated: Vec<&str> = self.validated_uris.iter().map(|u| u.uri.as_str()).collect();
        state.serialize_field("injected", &injected)?;
        state.serialize_field("validated", &validated)?;
        state.serialize_field("overrideMode", &self.override_mode)?;
        state.end()
    }
}

/// A signature-file block (`snort-signatures` / `openapi-schema-validation`)
#[derive(Debug, Clone, Deserialize)]
pub struct AppSecPracticeFiles {
    /// Block mode
    #[serde(default = "default_inactive", rename = "override-mode")]
    pub override_mode: String,
    /// Referenced configuration-map files
    #[serde(default, rename = "files")]
    pub config_map: Vec<String>,
}

impl Default for AppSecPracticeFiles {
    fn default() -> Self {
        Self {
            override_mode: default_inactive(),
            config_map: Vec::new(),
        }
    }
}

/// A named bundle of detection settings referenced from rules
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppSecPracticeSpec {
    /// Practice name used for rule references
    #[serde(default, rename = "name")]
    pub practice_name: String,
    /// OpenAPI schema validation block
    #[serde(default, rename = "openapi-schema-validation")]
    pub openapi_schema_validation: AppSecPracticeFiles,
    /// Snort signatures block
    #[serde(default)]
    pub snort_signatures: AppSecPracticeFiles,
    /// Web attacks block
    #[serde(default)]
    pub web_attacks: AppSecPracticeWebAttacks,
    /// Anti-bot block
    #[serde(default)]
    pub anti_bot: AppSecPracticeAntiBot,
}

/// The `access-control-logging` block of a trigger
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppsecTriggerAccessControlLogging {
    /// Log allowed requests
    #[serde(default)]
    pub allow_events: bool,
    /// Log dropped requests
    #[serde(default)]
    pub drop_events: bool,
}

/// The `additional-suspicious-events-logging` block of a trigger
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppsecTriggerAdditionalSuspiciousEventsLogging {
    /// Whether extended suspicious-event logging is on
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Include the response body
    #[serde(default)]
    pub response_body: bool,
    /// Minimum severity to extend logging for
    #[serde(default = "default_high")]
    pub minimum_severity: String,
}

impl Default for AppsecTriggerAdditionalSuspiciousEventsLogging {
    fn default() -> Self {
        Self {
            enabled: true,
            response_body: false,
            minimum_severity: default_high(),
        }
    }
}

/// The `appsec-logging` block of a trigger
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppsecTriggerLogging {
    /// Log every web request
    #[serde(default)]
    pub all_web_requests: bool,
    /// Log detect events
    #[serde(default)]
    pub detect_events: bool,
    /// Log prevent events
    #[serde(default = "default_true")]
    pub prevent_events: bool,
}

impl Default for AppsecTriggerLogging {
    fn default() -> Self {
        Self {
            all_web_requests: false,
            detect_events: false,
            prevent_events: true,
        }
    }
}

/// The `extended-logging` block of a trigger
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppsecTriggerExtendedLogging {
    /// Include HTTP headers
    #[serde(default)]
    pub http_headers: bool,
    /// Include the request body
    #[serde(default)]
    pub request_body: bool,
    /// Include the URL path
    #[serde(default)]
    pub url_path: bool,
    /// Include the URL query
    #[serde(default)]
    pub url_query: bool,
}

/// A syslog/CEF logging destination
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingService {
    /// Destination address; empty disables the destination
    #[serde(default)]
    pub address: String,
    /// Transport protocol
    #[serde(default)]
    pub proto: String,
    /// Destination port
    #[serde(default = "default_syslog_port")]
    pub port: u16,
}

impl Default for LoggingService {
    fn default() -> Self {
        Self {
            address: String::new(),
            proto: String::new(),
            port: default_syslog_port(),
        }
    }
}

/// The `stdout` block of the log destination
#[derive(Debug, Clone, Deserialize)]
pub struct StdoutLogging {
    /// Output format; `json-formatted` beautifies
    #[serde(default = "default_json")]
    pub format: String,
}

impl Default for StdoutLogging {
    fn default() -> Self {
        Self {
            format: default_json(),
        }
    }
}

/// The `log-destination` block of a trigger
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppsecTriggerLogDestination {
    /// Ship logs to the fog
    #[serde(default)]
    pub cloud: bool,
    /// Local stdout logging
    #[serde(default)]
    pub stdout: StdoutLogging,
    /// Syslog destination
    #[serde(default)]
    pub syslog_service: LoggingService,
    /// CEF destination
    #[serde(default)]
    pub cef_service: LoggingService,
}

impl AppsecTriggerLogDestination {
    /// Whether logs go to the local agent (a stdout format is present)
    pub fn is_agent_local(&self) -> bool {
        !self.stdout.format.is_empty()
    }

    /// Whether stdout logs should be beautified
    pub fn should_beautify_logs(&self) -> bool {
        self.stdout.format == "json-formatted"
    }

    /// Whether a CEF destination is configured
    pub fn is_cef_needed(&self) -> bool {
        !self.cef_service.address.is_empty()
    }

    /// Whether a syslog destination is configured
    pub fn is_syslog_needed(&self) -> bool {
        !self.syslog_service.address.is_empty()
    }
}

/// A named logging destination and verbosity bundle
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppsecTriggerSpec {
    /// Trigger name used for rule references
    #[serde(default)]
    pub name: String,
    /// Access-control logging block
    #[serde(default)]
    pub access_control_logging: AppsecTriggerAccessControlLogging,
    /// Additional suspicious-events logging block
    #[serde(default)]
    pub additional_suspicious_events_logging: AppsecTriggerAdditionalSuspiciousEventsLogging,
    /// Appsec logging block
    #[serde(default)]
    pub appsec_logging: AppsecTriggerLogging,
    /// Extended logging block
    #[serde(default)]
    pub extended_logging: AppsecTriggerExtendedLogging,
    /// Log destination block
    #[serde(default)]
    pub log_destination: AppsecTriggerLogDestination,
}

/// A named match/action exception
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppsecExceptionSpec {
    /// Exception name used for rule references
    #[serde(default)]
    pub name: String,
    /// Action taken on match (`skip` normalizes to `ignore`)
    #[serde(default)]
    pub action: String,
    /// Country-code conditions
    #[serde(default)]
    pub country_code: Vec<String>,
    /// Country-name conditions
    #[serde(default)]
    pub country_name: Vec<String>,
    /// Host conditions
    #[serde(default)]
    pub host_name: Vec<String>,
    /// Parameter-name conditions
    #[serde(default)]
    pub param_name: Vec<String>,
    /// Parameter-value conditions
    #[serde(default)]
    pub param_value: Vec<String>,
    /// Protection-name conditions
    #[serde(default)]
    pub protection_name: Vec<String>,
    /// Source-identifier conditions
    #[serde(default)]
    pub source_identifier: Vec<String>,
    /// Source-IP conditions
    #[serde(default)]
    pub source_ip: Vec<String>,
    /// URL conditions
    #[serde(default)]
    pub url: Vec<String>,
}

/// A named custom HTTP response served on block
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppSecCustomResponseSpec {
    /// Response name used for rule references
    #[serde(default)]
    pub name: String,
    /// HTTP status code of the block page
    #[serde(default = "default_response_code")]
    pub http_response_code: u16,
    /// Response mode
    #[serde(default = "default_block_page")]
    pub mode: String,
    /// Block page body
    #[serde(default = "default_message_body")]
    pub message_body: String,
    /// Block page title
    #[serde(default = "default_message_title")]
    pub message_title: String,
}

impl Default for AppSecCustomResponseSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            http_response_code: default_response_code(),
            mode: default_block_page(),
            message_body: default_message_body(),
            message_title: default_message_title(),
        }
    }
}

/// A named group of trusted sources
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedSourcesSpec {
    /// Group name used for rule references
    #[serde(default)]
    pub name: String,
    /// Sources that must agree before a source is trusted
    #[serde(default = "default_min_sources")]
    pub min_num_of_sources: u32,
    /// Identifier values describing the trusted sources
    #[serde(default)]
    pub sources_identifiers: Vec<String>,
}

impl Default for TrustedSourcesSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            min_num_of_sources: default_min_sources(),
            sources_identifiers: Vec::new(),
        }
    }
}

/// One identifier of a source-identifiers set
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceIdentifierSpec {
    /// Identifier kind (header name, cookie, source IP, ...)
    #[serde(default)]
    pub source_identifier: String,
    /// Values of the identifier; empty means any value
    #[serde(default)]
    pub value: Vec<String>,
}

/// A named set of source identifiers
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceIdentifierSpecWrapper {
    /// Set name used for rule references
    #[serde(default)]
    pub name: String,
    /// The identifiers
    #[serde(default)]
    pub identifiers: Vec<SourceIdentifierSpec>,
}

/// The whole local policy file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppsecLinuxPolicy {
    /// The policy rules
    #[serde(default)]
    pub policies: AppsecPolicySpec,
    /// Named practices
    #[serde(default)]
    pub practices: Vec<AppSecPracticeSpec>,
    /// Named log triggers
    #[serde(default)]
    pub log_triggers: Vec<AppsecTriggerSpec>,
    /// Named custom responses
    #[serde(default)]
    pub custom_responses: Vec<AppSecCustomResponseSpec>,
    /// Named exceptions
    #[serde(default)]
    pub exceptions: Vec<AppsecExceptionSpec>,
    /// Named trusted-sources groups
    #[serde(default)]
    pub trusted_sources: Vec<TrustedSourcesSpec>,
    /// Named source-identifier sets
    #[serde(default)]
    pub source_identifiers: Vec<SourceIdentifierSpecWrapper>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_rule_kebab_keys() {
        let rule: ParsedRule = serde_json::from_str(
            r#"{
                "host": "example.com/api",
                "mode": "prevent-learn",
                "practices": ["webapp-default-practice"],
                "triggers": ["appsec-default-log-trigger"],
                "custom-response": "403-response",
                "source-identifiers": "",
                "trusted-sources": ""
            }"#,
        )
        .expect("parse");
        assert_eq!(rule.host, "example.com/api");
        assert_eq!(rule.log_triggers, vec!["appsec-default-log-trigger"]);
        assert_eq!(rule.custom_response, "403-response");
    }

    #[test]
    fn test_policy_spec_split() {
        let spec: AppsecPolicySpec = serde_json::from_str(
            r#"{
                "default": {"mode": "detect-learn", "practices": ["p"]},
                "specific-rules": [{"host": "a.com"}, {"host": "b.com"}]
            }"#,
        )
        .expect("parse");
        assert_eq!(spec.default_rule.mode, "detect-learn");
        assert_eq!(spec.specific_rules.len(), 2);
    }

    #[test]
    fn test_practice_defaults() {
        let practice: AppSecPracticeSpec = serde_json::from_str(r#"{"name": "p"}"#).expect("parse");
        assert_eq!(practice.web_attacks.mode, "Unset");
        assert_eq!(practice.web_attacks.minimum_confidence, "critical");
        assert_eq!(practice.web_attacks.max_header_size_bytes, 102_400);
        assert_eq!(practice.anti_bot.override_mode, "Inactive");
        assert_eq!(practice.web_attacks.mode_or("prevent"), "prevent");
    }

    #[test]
    fn test_practice_mode_override() {
        let practice: AppSecPracticeSpec = serde_json::from_str(
            r#"{"name": "p", "web-attacks": {"override-mode": "detect", "minimum-confidence": "high"}}"#,
        )
        .expect("parse");
        assert_eq!(practice.web_attacks.mode_or("prevent"), "detect");
        assert_eq!(practice.web_attacks.minimum_confidence, "high");
    }

    #[test]
    fn test_trigger_defaults() {
        let trigger: AppsecTriggerSpec = serde_json::from_str(r#"{"name": "t"}"#).expect("parse");
        assert!(trigger.additional_suspicious_events_logging.enabled);
        assert_eq!(trigger.additional_suspicious_events_logging.minimum_severity, "high");
        assert!(trigger.appsec_logging.prevent_events);
        assert!(trigger.log_destination.is_agent_local());
        assert!(!trigger.log_destination.should_beautify_logs());
        assert!(!trigger.log_destination.is_syslog_needed());
        assert_eq!(trigger.log_destination.syslog_service.port, 514);
    }

    #[test]
    fn test_trigger_destinations() {
        let trigger: AppsecTriggerSpec = serde_json::from_str(
            r#"{
                "name": "t",
                "log-destination": {
                    "cloud": true,
                    "stdout": {"format": "json-formatted"},
                    "syslog-service": {"address": "10.0.0.9", "port": 1514}
                }
            }"#,
        )
        .expect("parse");
        assert!(trigger.log_destination.cloud);
        assert!(trigger.log_destination.should_beautify_logs());
        assert!(trigger.log_destination.is_syslog_needed());
        assert_eq!(trigger.log_destination.syslog_service.port, 1514);
        assert!(!trigger.log_destination.is_cef_needed());
    }

    #[test]
    fn test_custom_response_defaults() {
        let response: AppSecCustomResponseSpec = serde_json::from_str(r#"{"name": "r"}"#).expect("parse");
        assert_eq!(response.http_response_code, 403);
        assert_eq!(response.mode, "block-page");
        assert!(response.message_title.contains("Attack blocked"));
    }

    #[test]
    fn test_linux_policy_file() {
        let policy: AppsecLinuxPolicy = serde_json::from_str(
            r#"{
                "policies": {
                    "default": {"mode": "detect-learn", "practices": ["webapp-default-practice"]},
                    "specific-rules": [{"host": "example.com"}]
                },
                "practices": [{"name": "webapp-default-practice"}],
                "log-triggers": [{"name": "appsec-default-log-trigger"}],
                "custom-responses": [],
                "exceptions": [{"name": "allow-monitoring", "action": "skip", "sourceIp": ["10.0.0.1"]}],
                "trusted-sources": [{"name": "ts", "minNumOfSources": 2, "sourcesIdentifiers": ["1.1.1.1"]}],
                "source-identifiers": [{"name": "si", "identifiers": [{"sourceIdentifier": "x-forwarded-for"}]}]
            }"#,
        )
        .expect("parse");
        assert_eq!(policy.practices[0].practice_name, "webapp-default-practice");
        assert_eq!(policy.exceptions[0].source_ip, vec!["10.0.0.1"]);
        assert_eq!(policy.trusted_sources[0].min_num_of_sources, 2);
        assert_eq!(policy.source_identifiers[0].identifiers[0].source_identifier, "x-forwarded-for");
    }
}
