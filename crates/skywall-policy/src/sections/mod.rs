//! Canonical output sections of the compiled policy artifact
//!
//! Field names here are an external contract with the enforcement side and
//! downstream log tooling; they keep their historical spelling.

pub mod exceptions;
pub mod practices;
pub mod protections;
pub mod rules;
pub mod settings;
pub mod triggers;
pub mod trusted_sources;

use serde::Serialize;

use crate::sections::exceptions::ExceptionsWrapper;
use crate::sections::practices::AppSecWrapper;
use crate::sections::protections::{FileSecurityWrapper, IpsWrapper, RateLimitWrapper};
use crate::sections::rules::RulesConfigWrapper;
use crate::sections::settings::SettingsWrapper;
use crate::sections::triggers::TriggersWrapper;

/// The security applications of one compiled policy
#[derive(Debug, Clone, Serialize)]
pub struct SecurityAppsWrapper {
    /// Web application / web API practices
    pub waap: AppSecWrapper,
    /// Log and web-user-response triggers
    pub triggers: TriggersWrapper,
    /// Rules configuration (asset matching)
    pub rules: RulesConfigWrapper,
    /// Exceptions
    pub exceptions: ExceptionsWrapper,
    /// Intrusion-prevention protections
    pub ips: IpsWrapper,
    /// File-security protections
    #[serde(rename = "fileSecurity")]
    pub file_security: FileSecurityWrapper,
    /// Rate-limit protections
    #[serde(rename = "rateLimit")]
    pub rate_limit: RateLimitWrapper,
    /// Version string of the source policy
    pub version: String,
}

/// The complete artifact: settings plus security applications
#[derive(Debug, Clone, Serialize)]
pub struct PolicyWrapper {
    /// Agent settings
    pub settings: SettingsWrapper,
    /// The compiled security applications
    pub policies: SecurityAppsWrapper,
}
