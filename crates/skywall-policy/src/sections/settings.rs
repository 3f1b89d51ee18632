//! Agent settings section written alongside the security applications

use serde::Serialize;
use uuid::Uuid;

/// One key/value agent setting
#[derive(Debug, Clone, Serialize)]
pub struct AgentSettingsSection {
    /// Generated setting id
    pub id: String,
    /// Setting key
    pub key: String,
    /// Setting value
    pub value: String,
}

impl AgentSettingsSection {
    /// Setting with a generated id
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The agent settings rulebase
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRulebase {
    /// Individual settings
    pub agent_settings: Vec<AgentSettingsSection>,
    /// Agent deployment type
    pub agent_type: String,
    /// Restrict traffic to defined applications only
    pub allow_only_defined_applications: bool,
    /// Accept any fog
    pub any_fog: bool,
    /// Cap on concurrently registered agents
    pub max_number_of_agents: u32,
    /// Upgrade mode
    pub upgrade_mode: String,
}

impl SettingsRulebase {
    /// Rulebase for the given deployment type
    pub fn new(agent_settings: Vec<AgentSettingsSection>, agent_type: impl Into<String>) -> Self {
        Self {
            agent_settings,
            agent_type: agent_type.into(),
            allow_only_defined_applications: false,
            any_fog: true,
            max_number_of_agents: 10,
            upgrade_mode: "automatic".to_string(),
        }
    }
}

/// The settings wrapper of the artifact
#[derive(Debug, Clone, Serialize)]
pub struct SettingsWrapper {
    /// Profile type
    #[serde(rename = "profileType")]
    pub profile_type: String,
    /// Token sharing mode
    #[serde(rename = "tokenType")]
    pub token_type: String,
    /// Profile name
    pub name: String,
    /// Generated profile id
    pub id: String,
    /// The settings rulebase
    pub agent: SettingsRulebase,
}

impl SettingsWrapper {
    /// Wrapper around a settings rulebase
    pub fn new(agent: SettingsRulebase, name: impl Into<String>) -> Self {
        Self {
            profile_type: "agent".to_string(),
            token_type: "sameToken".to_string(),
            name: name.into(),
            id: Uuid::new_v4().to_string(),
            agent,
        }
    }
}
