//! Trigger sections: logging destinations and custom web responses

use serde::Serialize;
use uuid::Uuid;

use crate::spec::v1beta1::AppsecTriggerSpec;

/// A compiled log trigger
///
/// Ids are generated per compilation; consumers re-resolve triggers by name.
#[derive(Debug, Clone, Serialize)]
pub struct LogTriggerSection {
    #[serde(skip)]
    id: String,
    /// Context predicate binding the trigger by id
    pub context: String,
    /// Trigger name
    #[serde(rename = "triggerName")]
    pub name: String,
    /// Trigger type, always `log`
    #[serde(rename = "triggerType")]
    pub trigger_type: String,
    /// Verbosity level
    pub verbosity: String,
    /// Log allowed access-control events
    #[serde(rename = "acAllow")]
    pub ac_allow: bool,
    /// Log dropped access-control events
    #[serde(rename = "acDrop")]
    pub ac_drop: bool,
    /// Log compliance violations
    #[serde(rename = "complianceViolations")]
    pub compliance_violations: bool,
    /// Log compliance warnings
    #[serde(rename = "complianceWarnings")]
    pub compliance_warnings: bool,
    /// Minimum severity for extended logging
    #[serde(rename = "extendloggingMinSeverity")]
    pub extend_logging_min_severity: String,
    /// Whether extended logging is on
    #[serde(rename = "extendlogging")]
    pub extend_logging: bool,
    /// Log to the local agent
    #[serde(rename = "logToAgent")]
    pub log_to_agent: bool,
    /// Log to a CEF destination
    #[serde(rename = "logToCef")]
    pub log_to_cef: bool,
    /// Log to the fog
    #[serde(rename = "logToCloud")]
    pub log_to_cloud: bool,
    /// Log to a syslog destination
    #[serde(rename = "logToSyslog")]
    pub log_to_syslog: bool,
    /// Include the response body
    #[serde(rename = "responseBody")]
    pub response_body: bool,
    /// Include the response code
    #[serde(rename = "responseCode")]
    pub response_code: bool,
    /// Log detect events
    #[serde(rename = "tpDetect")]
    pub tp_detect: bool,
    /// Log prevent events
    #[serde(rename = "tpPrevent")]
    pub tp_prevent: bool,
    /// Include the request body
    #[serde(rename = "webBody")]
    pub web_body: bool,
    /// Include request headers
    #[serde(rename = "webHeaders")]
    pub web_headers: bool,
    /// Log all web requests
    #[serde(rename = "webRequests")]
    pub web_requests: bool,
    /// Include the URL path
    #[serde(rename = "webUrlPath")]
    pub web_url_path: bool,
    /// Include the URL query
    #[serde(rename = "webUrlQuery")]
    pub web_url_query: bool,
    /// `address:port` of the syslog destination
    #[serde(rename = "urlForSyslog")]
    pub url_for_syslog: String,
    /// `address:port` of the CEF destination
    #[serde(rename = "urlForCef")]
    pub url_for_cef: String,
    /// Beautify stdout output
    #[serde(rename = "formatLoggingOutput")]
    pub beautify_logs: bool,
}

impl Default for LogTriggerSection {
    fn default() -> Self {
        Self::from_spec(String::new(), &AppsecTriggerSpec::default())
    }
}

impl LogTriggerSection {
    /// Compile a named trigger spec
    pub fn from_spec(name: String, spec: &AppsecTriggerSpec) -> Self {
        let destination = &spec.log_destination;
        let suspicious = &spec.additional_suspicious_events_logging;
        let logging = &spec.appsec_logging;
        let extended = &spec.extended_logging;

        let log_to_cef = destination.is_cef_needed();
        let log_to_syslog = destination.is_syslog_needed();
        let cef_address = if log_to_cef { destination.cef_service.address.clone() } else { String::new() };
        let cef_port = if log_to_cef { destination.cef_service.port } else { 0 };
        let syslog_address = if log_to_syslog {
            destination.syslog_service.address.clone()
        } else {
            String::new()
        };
        let syslog_port = if log_to_syslog { destination.syslog_service.port } else { 514 };

        Self::assemble(
            name,
            suspicious.minimum_severity.clone(),
            suspicious.enabled,
            destination.is_agent_local(),
            log_to_cef,
            destination.cloud,
            log_to_syslog,
            suspicious.response_body,
            logging.detect_events,
            logging.prevent_events,
            extended.request_body,
            extended.http_headers,
            logging.all_web_requests,
            extended.url_path,
            extended.url_query,
            cef_port,
            cef_address,
            syslog_port,
            syslog_address,
            destination.should_beautify_logs(),
        )
    }

    /// Synthesize a syslog-only trigger from an ingress annotation
    ///
    /// The trigger is named after the bare address; the port defaults to 514
    /// when the annotation carries none or an unparsable one.
    pub fn syslog_only(address: String, port: &str) -> Self {
        let port = port.parse().unwrap_or_else(|_| {
            if !port.is_empty() {
                tracing::warn!(port, "Failed to convert syslog port, using default 514");
            }
            514
        });
        Self::assemble(
            address.clone(),
            "high".to_string(),
            true,
            true,
            false,
            false,
            true,
            false,
            false,
            true,
            false,
            false,
            false,
            false,
            false,
            0,
            String::new(),
            port,
            address,
            false,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        name: String,
        extend_logging_min_severity: String,
        extend_logging: bool,
        log_to_agent: bool,
        log_to_cef: bool,
        log_to_cloud: bool,
        log_to_syslog: bool,
        response_body: bool,
        tp_detect: bool,
        tp_prevent: bool,
        web_body: bool,
        web_headers: bool,
        web_requests: bool,
        web_url_path: bool,
        web_url_query: bool,
        cef_port: u16,
        cef_address: String,
        syslog_port: u16,
        syslog_address: String,
        beautify_logs: bool,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            context: format!("triggerId({id})"),
            id,
            name,
            trigger_type: "log".to_string(),
            verbosity: "Standard".to_string(),
            ac_allow: false,
            ac_drop: false,
            compliance_violations: false,
            compliance_warnings: false,
            extend_logging_min_severity,
            extend_logging,
            log_to_agent,
            log_to_cef,
            log_to_cloud,
            log_to_syslog,
            response_body,
            response_code: false,
            tp_detect,
            tp_prevent,
            web_body,
            web_headers,
            web_requests,
            web_url_path,
            web_url_query,
            url_for_syslog: format!("{syslog_address}:{syslog_port}"),
            url_for_cef: format!("{cef_address}:{cef_port}"),
            beautify_logs,
        }
    }

    /// The generated trigger id
    pub fn trigger_id(&self) -> &str {
        &self.id
    }

    /// The trigger name
    pub fn trigger_name(&self) -> &str {
        &self.name
    }
}

/// A compiled custom web response trigger
#[derive(Debug, Clone, Serialize)]
pub struct WebUserResponseTriggerSection {
    #[serde(skip)]
    id: String,
    /// Context predicate binding the trigger by id
    pub context: String,
    /// Trigger name
    #[serde(rename = "triggerName")]
    pub name: String,
    /// Response detail level
    #[serde(rename = "details level")]
    pub details_level: String,
    /// Response body
    #[serde(rename = "response body")]
    pub response_body: String,
    /// Response status code
    #[serde(rename = "response code")]
    pub response_code: u16,
    /// Response title
    #[serde(rename = "response title")]
    pub response_title: String,
}

impl WebUserResponseTriggerSection {
    /// Compile a named custom response
    pub fn new(
        name: String,
        details_level: String,
        response_body: String,
        response_code: u16,
        response_title: String,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            context: format!("triggerId({id})"),
            id,
            name,
            details_level,
            response_body,
            response_code,
            response_title,
        }
    }

    /// The generated trigger id
    pub fn trigger_id(&self) -> &str {
        &self.id
    }

    /// The trigger name
    pub fn trigger_name(&self) -> &str {
        &self.name
    }
}

/// The triggers rulebase of the artifact
#[derive(Debug, Clone, Serialize)]
pub struct TriggersRulebase {
    /// Log triggers
    pub log: Vec<LogTriggerSection>,
    /// Web user response triggers
    #[serde(rename = "webUserResponse")]
    pub web_user_response: Vec<WebUserResponseTriggerSection>,
}

/// Wrapper serializing the triggers rulebase under its artifact key
#[derive(Debug, Clone, Serialize)]
pub struct TriggersWrapper {
    /// The rulebase
    pub rulebase: TriggersRulebase,
}

impl TriggersWrapper {
    /// Wrap the compiled triggers
    pub fn new(log: Vec<LogTriggerSection>, web_user_response: Vec<WebUserResponseTriggerSection>) -> Self {
        Self {
            rulebase: TriggersRulebase {
                log,
                web_user_response,
            },
        }
    }
}
