//! The policy maker: resolves rule references into canonical sections
//!
//! Cross-references travel by name. Lookups go first to the in-memory
//! element maps (deduplicating across rules), then to the [`PolicyFetcher`]
//! collaborator - the local policy object on Linux, the cluster API in
//! Kubernetes. A failed lookup aborts the compilation of the current ingress
//! and surfaces as an error; the caller decides whether other ingresses
//! still compile.
//!
//! Element maps are ordered so identical input produces byte-identical
//! artifacts (UUID fields aside).

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::error::{PolicyError, Result};
use crate::sections::exceptions::{ExceptionsRulebase, ExceptionsWrapper, InnerException};
use crate::sections::practices::{AppSecWrapper, WebAppSection, WebApiSection};
use crate::sections::protections::{
    FileSecurityProtectionsSection, FileSecurityWrapper, IpsProtectionsSection, IpsWrapper, RateLimitSection,
    RateLimitWrapper,
};
use crate::sections::rules::{
    ParametersSection, PracticeSection, RulesConfigRulebase, RulesConfigWrapper, RulesTriggerSection,
    UsersIdentifier, UsersIdentifiersRulebase,
};
use crate::sections::settings::{AgentSettingsSection, SettingsRulebase, SettingsWrapper};
use crate::sections::triggers::{LogTriggerSection, TriggersWrapper, WebUserResponseTriggerSection};
use crate::sections::trusted_sources::{expand_trusted_sources, AppSecTrustedSources};
use crate::sections::{PolicyWrapper, SecurityAppsWrapper};
use crate::spec::v1beta1::{
    AppSecCustomResponseSpec, AppSecPracticeSpec, AppsecExceptionSpec, AppsecTriggerSpec, ParsedRule,
    SourceIdentifierSpec, TrustedSourcesSpec,
};
use crate::spec::v1beta2::{AccessControlPracticeSpec, ThreatPreventionPracticeSpec};

/// Resolves named policy elements the compiler has not seen yet
#[async_trait]
pub trait PolicyFetcher: Send + Sync {
    /// Resolve a practice by name
    async fn practice(&self, name: &str) -> Result<AppSecPracticeSpec>;
    /// Resolve a log trigger by name
    async fn trigger(&self, name: &str) -> Result<AppsecTriggerSpec>;
    /// Resolve the exceptions registered under a name
    async fn exceptions(&self, name: &str) -> Result<Vec<AppsecExceptionSpec>>;
    /// Resolve a custom response by name
    async fn custom_response(&self, name: &str) -> Result<AppSecCustomResponseSpec>;
    /// Resolve a trusted-sources group by name
    async fn trusted_sources(&self, name: &str) -> Result<TrustedSourcesSpec>;
    /// Resolve a source-identifiers set by name
    async fn source_identifiers(&self, name: &str) -> Result<Vec<SourceIdentifierSpec>>;

    /// Resolve a `v1beta2` threat-prevention practice, when the schema has one
    async fn threat_prevention_practice(&self, _name: &str) -> Result<Option<ThreatPreventionPracticeSpec>> {
        Ok(None)
    }

    /// Resolve a `v1beta2` access-control practice, when the schema has one
    async fn access_control_practice(&self, _name: &str) -> Result<Option<AccessControlPracticeSpec>> {
        Ok(None)
    }
}

/// Split a rule host into `(asset_name, url, uri)`
///
/// The wildcard host normalizes to the distinguished `Any` triple; otherwise
/// the host splits at the first `/`.
pub fn split_host_name(host: &str) -> (String, String, String) {
    if host == "*" {
        return ("Any".to_string(), "Any".to_string(), "Any".to_string());
    }
    match host.find('/') {
        Some(pos) => (host.to_string(), host[..pos].to_string(), host[pos..].to_string()),
        None => (host.to_string(), host.to_string(), String::new()),
    }
}

fn first_or_default<'a>(specific: &'a [String], default: &'a [String]) -> &'a str {
    specific
        .first()
        .filter(|name| !name.is_empty())
        .or_else(|| default.first().filter(|name| !name.is_empty()))
        .map_or("", |name| name.as_str())
}

fn name_or_default<'a>(specific: &'a str, default: &'a str) -> &'a str {
    if specific.is_empty() {
        default
    } else {
        specific
    }
}

/// Accumulates canonical sections across rules and combines them into the
/// final artifact
#[derive(Default)]
pub struct PolicyMaker {
    log_triggers: BTreeMap<String, LogTriggerSection>,
    web_user_res_triggers: BTreeMap<String, WebUserResponseTriggerSection>,
    inner_exceptions: BTreeMap<String, Vec<InnerException>>,
    web_apps: BTreeMap<String, WebAppSection>,
    web_apis: BTreeMap<String, WebApiSection>,
    rules_config: Vec<RulesConfigRulebase>,
    users_identifiers: Vec<UsersIdentifiersRulebase>,
    trusted_sources_specs: BTreeMap<String, TrustedSourcesSpec>,
    source_identifiers_specs: BTreeMap<String, Vec<SourceIdentifierSpec>>,
    practices: BTreeMap<String, AppSecPracticeSpec>,
    practice_ids: BTreeMap<String, String>,
    ips_sections: Vec<IpsProtectionsSection>,
    file_security_sections: Vec<FileSecurityProtectionsSection>,
    rate_limit_sections: Vec<RateLimitSection>,
}

impl PolicyMaker {
    /// Fresh maker with empty element maps
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every accumulated element
    pub fn clear_element_maps(&mut self) {
        *self = Self::default();
    }

    /// Number of rules accumulated so far
    pub fn rule_count(&self) -> usize {
        self.rules_config.len()
    }

    /// Whether a specific rule already covered `(url, uri)`
    pub fn covers_asset(&self, url: &str, uri: &str) -> bool {
        let asset_id = format!("{url}{uri}");
        self.rules_config.iter().any(|rule| rule.asset_id() == asset_id)
    }

    /// Create the policy elements for one rule
    ///
    /// `default_rule` supplies fallbacks for references the rule leaves
    /// empty. `syslog_address`/`syslog_port` come from the ingress syslog
    /// annotation and synthesize a trigger when no named one is referenced.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_policy_elements_by_rule(
        &mut self,
        rule: &ParsedRule,
        access_control_practices: &[String],
        default_rule: &ParsedRule,
        fetcher: &dyn PolicyFetcher,
        syslog_address: &str,
        syslog_port: &str,
        is_cleanup_candidate: bool,
    ) -> Result<()> {
        let (mut asset_name, mut url, mut uri) = split_host_name(&rule.host);
        trace!(asset = %asset_name, "Handling rule for asset");

        let practice_name = first_or_default(&rule.practices, &default_rule.practices);
        let trigger_name = first_or_default(&rule.log_triggers, &default_rule.log_triggers);
        let exception_name = first_or_default(&rule.exceptions, &default_rule.exceptions);
        let web_user_res_name = name_or_default(&rule.custom_response, &default_rule.custom_response);
        let source_identifiers_name = name_or_default(&rule.source_identifiers, &default_rule.source_identifiers);
        let trusted_sources_name = name_or_default(&rule.trusted_sources, &default_rule.trusted_sources);

        self.extract_exceptions(exception_name, fetcher).await?;
        self.extract_triggers(trigger_name, syslog_address, syslog_port, fetcher).await?;
        let web_user_res_refs = self.extract_web_user_response(web_user_res_name, fetcher).await?;
        let parsed_trusted_sources = self
            .extract_trusted_sources(&asset_name, trusted_sources_name, source_identifiers_name, fetcher)
            .await?;
        self.extract_practice(practice_name, fetcher).await?;

        let log_trigger = self.log_triggers.get(trigger_name).cloned();
        let exception_id = self
            .inner_exceptions
            .get(exception_name)
            .and_then(|exceptions| exceptions.first())
            .map(|exception| exception.behavior_id().to_string())
            .unwrap_or_default();

        if rule.host == "*" {
            asset_name = "Any".to_string();
            url = "Any".to_string();
            uri = "Any".to_string();
        }

        let mut triggers = Vec::new();
        if let Some(trigger) = &log_trigger {
            if !trigger.trigger_id().is_empty() {
                triggers.push(RulesTriggerSection::new(trigger_name, trigger.trigger_id(), "log"));
            }
        }
        for (name, id) in &web_user_res_refs {
            triggers.push(RulesTriggerSection::new(name, id, "WebUserResponse"));
        }

        let practice_id = self.practice_id_for(practice_name);
        let rules_config = RulesConfigRulebase::new(
            asset_name.clone(),
            &url,
            "",
            &uri,
            vec![PracticeSection::new(&practice_id, "WebApplication", practice_name)],
            vec![ParametersSection::new(&exception_id, exception_name)],
            triggers,
        );

        let port = "80";
        let full_url = if asset_name == "Any" {
            String::new()
        } else {
            format!("{url}{uri}:{port}")
        };

        if !self.web_apps.contains_key(&full_url) {
            if !source_identifiers_name.is_empty() {
                if let Some(specs) = self.source_identifiers_specs.get(source_identifiers_name) {
                    let source_identifiers: Vec<UsersIdentifier> = specs
                        .iter()
                        .map(|spec| UsersIdentifier {
                            source_identifier: spec.source_identifier.clone(),
                            identifier_values: spec.value.clone(),
                        })
                        .collect();
                    if let Some(primary) = source_identifiers.first().cloned() {
                        self.users_identifiers.push(UsersIdentifiersRulebase {
                            context: rules_config.context().to_string(),
                            source_identifier: primary.source_identifier,
                            identifier_values: primary.identifier_values,
                            source_identifiers,
                        });
                    }
                }
            }

            let practice_spec = self
                .practices
                .get(practice_name)
                .cloned()
                .ok_or_else(|| PolicyError::unresolved("practice", practice_name, "missing after extraction"))?;
            let web_app = WebAppSection::new(
                full_url.clone(),
                rules_config.asset_id().to_string(),
                asset_name.clone(),
                rules_config.asset_id().to_string(),
                asset_name.clone(),
                practice_id.clone(),
                practice_name.to_string(),
                &practice_spec,
                log_trigger,
                &default_rule.mode,
                parsed_trusted_sources,
            );
            self.web_apps.insert(full_url, web_app);
            self.rules_config.push(rules_config);
        }

        if !is_cleanup_candidate {
            self.extract_v2_protections(rule, access_control_practices, practice_name, &asset_name, fetcher)
                .await?;
        }
        Ok(())
    }

    /// Create the elements for all specific rules of one policy
    pub async fn create_policy_elements(
        &mut self,
        rules: &[ParsedRule],
        default_rule: &ParsedRule,
        fetcher: &dyn PolicyFetcher,
    ) -> Result<()> {
        for rule in rules {
            self.create_policy_elements_by_rule(rule, &[], default_rule, fetcher, "", "", false)
                .await?;
        }
        Ok(())
    }

    /// Combine the accumulated elements into the artifact
    pub fn combine_elements_to_policy(&self, policy_version: &str, agent_type: &str, profile_name: &str) -> PolicyWrapper {
        // The web-app set is ordered by practice id, matching the rulebase
        // the management console produces
        let mut web_apps: Vec<WebAppSection> = self.web_apps.values().cloned().collect();
        web_apps.sort_by(|a, b| a.practice_id().cmp(b.practice_id()));
        let web_apis: Vec<WebApiSection> = self.web_apis.values().cloned().collect();

        let exceptions: Vec<InnerException> = self.inner_exceptions.values().flatten().cloned().collect();

        let settings_key = if agent_type == "Kubernetes" {
            AgentSettingsSection::new("agent.test.k8s.policy", "k8s policy")
        } else {
            AgentSettingsSection::new("agent.test.local.policy", "local policy")
        };

        let security_apps = SecurityAppsWrapper {
            waap: AppSecWrapper::new(web_apps, web_apis),
            triggers: TriggersWrapper::new(
                self.log_triggers.values().cloned().collect(),
                self.web_user_res_triggers.values().cloned().collect(),
            ),
            rules: RulesConfigWrapper::new(self.rules_config.clone(), self.users_identifiers.clone()),
            exceptions: ExceptionsWrapper::new(vec![ExceptionsRulebase::new(exceptions)]),
            ips: IpsWrapper {
                ips_protections: self.ips_sections.clone(),
            },
            file_security: FileSecurityWrapper {
                file_security_protections: self.file_security_sections.clone(),
            },
            rate_limit: RateLimitWrapper {
                rate_limit: self.rate_limit_sections.clone(),
            },
            version: policy_version.to_string(),
        };

        PolicyWrapper {
            settings: SettingsWrapper::new(SettingsRulebase::new(vec![settings_key], agent_type), profile_name),
            policies: security_apps,
        }
    }

    /// Stable practice id: the same name always maps to the same id within
    /// one compilation
    fn practice_id_for(&mut self, practice_name: &str) -> String {
        self.practice_ids
            .entry(practice_name.to_string())
            .or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone()
    }

    async fn extract_practice(&mut self, practice_name: &str, fetcher: &dyn PolicyFetcher) -> Result<()> {
        if practice_name.is_empty() || self.practices.contains_key(practice_name) {
            return Ok(());
        }
        let practice = fetcher.practice(practice_name).await?;
        debug!(practice = practice_name, "Successfully retrieved practice");
        self.practices.insert(practice_name.to_string(), practice);
        Ok(())
    }

    async fn extract_exceptions(&mut self, exception_name: &str, fetcher: &dyn PolicyFetcher) -> Result<()> {
        if exception_name.is_empty() || self.inner_exceptions.contains_key(exception_name) {
            return Ok(());
        }
        let specs = fetcher.exceptions(exception_name).await?;
        let compiled = specs.iter().map(InnerException::from_spec).collect();
        self.inner_exceptions.insert(exception_name.to_string(), compiled);
        Ok(())
    }

    async fn extract_triggers(
        &mut self,
        trigger_name: &str,
        syslog_address: &str,
        syslog_port: &str,
        fetcher: &dyn PolicyFetcher,
    ) -> Result<()> {
        if trigger_name.is_empty() && !syslog_address.is_empty() {
            if self.log_triggers.contains_key(trigger_name) {
                return Ok(());
            }
            if syslog_address.parse::<std::net::IpAddr>().is_err() {
                return Err(PolicyError::InvalidInput(format!(
                    "Syslog address is invalid. Address: {syslog_address}"
                )));
            }
            trace!(address = syslog_address, port = syslog_port, "Creating default syslog log section");
            let section = LogTriggerSection::syslog_only(syslog_address.to_string(), syslog_port);
            self.log_triggers.insert(trigger_name.to_string(), section);
            return Ok(());
        }

        if !trigger_name.is_empty() && !self.log_triggers.contains_key(trigger_name) {
            let spec = fetcher.trigger(trigger_name).await?;
            let section = LogTriggerSection::from_spec(trigger_name.to_string(), &spec);
            self.log_triggers.insert(trigger_name.to_string(), section);
        }
        Ok(())
    }

    async fn extract_web_user_response(
        &mut self,
        web_user_res_name: &str,
        fetcher: &dyn PolicyFetcher,
    ) -> Result<Vec<(String, String)>> {
        if web_user_res_name.is_empty() {
            return Ok(Vec::new());
        }

        if !self.web_user_res_triggers.contains_key(web_user_res_name) {
            let spec = fetcher.custom_response(web_user_res_name).await?;
            let section = WebUserResponseTriggerSection::new(
                web_user_res_name.to_string(),
                spec.mode,
                spec.message_body,
                spec.http_response_code,
                spec.message_title,
            );
            self.web_user_res_triggers.insert(web_user_res_name.to_string(), section);
        }

        let section = &self.web_user_res_triggers[web_user_res_name];
        Ok(vec![(section.trigger_name().to_string(), section.trigger_id().to_string())])
    }

    async fn extract_trusted_sources(
        &mut self,
        asset_name: &str,
        trusted_sources_name: &str,
        source_identifiers_name: &str,
        fetcher: &dyn PolicyFetcher,
    ) -> Result<AppSecTrustedSources> {
        if trusted_sources_name.is_empty() && source_identifiers_name.is_empty() {
            return Ok(AppSecTrustedSources::default());
        }
        if trusted_sources_name.is_empty() != source_identifiers_name.is_empty() {
            return Err(PolicyError::InvalidInput(format!(
                "Trusted sources and source identifiers must be provided together. \
                 Trusted sources: '{trusted_sources_name}', source identifiers: '{source_identifiers_name}'"
            )));
        }

        if !self.trusted_sources_specs.contains_key(trusted_sources_name) {
            let spec = fetcher.trusted_sources(trusted_sources_name).await?;
            self.trusted_sources_specs.insert(trusted_sources_name.to_string(), spec);
        }
        if !self.source_identifiers_specs.contains_key(source_identifiers_name) {
            let specs = fetcher.source_identifiers(source_identifiers_name).await?;
            self.source_identifiers_specs.insert(source_identifiers_name.to_string(), specs);
        }

        Ok(expand_trusted_sources(
            asset_name,
            &self.trusted_sources_specs[trusted_sources_name],
            &self.source_identifiers_specs[source_identifiers_name],
        ))
    }

    /// Emit the `v1beta2` protection sections the rule's practices carry
    async fn extract_v2_protections(
        &mut self,
        rule: &ParsedRule,
        access_control_practices: &[String],
        practice_name: &str,
        asset_name: &str,
        fetcher: &dyn PolicyFetcher,
    ) -> Result<()> {
        let (_, url, uri) = split_host_name(&rule.host);
        let asset_id = if asset_name == "Any" { "Any".to_string() } else { format!("{url}{uri}") };
        let context = if asset_name == "Any" {
            "All()".to_string()
        } else {
            format!("Any(EqualHost({url}))")
        };

        if let Some(practice) = fetcher.threat_prevention_practice(practice_name).await? {
            let practice_id = self.practice_id_for(&practice.name);
            self.ips_sections.push(IpsProtectionsSection::new(
                context.clone(),
                asset_name.to_string(),
                asset_id.clone(),
                asset_name.to_string(),
                practice_id.clone(),
                practice.name.clone(),
                &practice.intrusion_prevention,
            ));
            self.file_security_sections.push(FileSecurityProtectionsSection::new(
                context.clone(),
                asset_name.to_string(),
                asset_id.clone(),
                asset_name.to_string(),
                practice_id,
                practice.name.clone(),
                &practice.file_security,
            ));
        }

        for ac_name in access_control_practices {
            if let Some(practice) = fetcher.access_control_practice(ac_name).await? {
                let practice_id = self.practice_id_for(&practice.name);
                self.rate_limit_sections.push(RateLimitSection::new(
                    context.clone(),
                    asset_id.clone(),
                    asset_name.to_string(),
                    practice_id,
                    practice.name.clone(),
                    &practice.rate_limit,
                ));
            }
        }
        Ok(())
    }
}
