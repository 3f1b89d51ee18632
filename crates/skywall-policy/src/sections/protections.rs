//! Protection sections introduced with the `v1beta2` schema
//!
//! Intrusion prevention, file security, and rate limiting. Policies without
//! matching practice data still emit the (empty) wrappers so consumers see a
//! stable artifact shape.

use serde::Serialize;

use crate::spec::v1beta2::{FileSecuritySpec, IntrusionPreventionSpec, RateLimitSpec};

/// A compiled intrusion-prevention section for one asset
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpsProtectionsSection {
    /// Context predicate gating the section
    pub context: String,
    /// Rule name
    pub rule_name: String,
    /// Asset id
    pub asset_id: String,
    /// Asset name
    pub asset_name: String,
    /// Practice id
    pub practice_id: String,
    /// Practice name
    pub practice_name: String,
    /// Enforcement mode
    pub default_mode: String,
    /// Highest tolerated performance impact
    pub max_performance_impact: String,
    /// Minimum severity acted on
    pub min_severity_level: String,
    /// Action on high-confidence findings
    pub high_confidence_event_action: String,
    /// Action on medium-confidence findings
    pub medium_confidence_event_action: String,
    /// Action on low-confidence findings
    pub low_confidence_event_action: String,
    /// Oldest CVE year protections are loaded for
    pub min_cve_year: u32,
}

impl IpsProtectionsSection {
    /// Compile the intrusion-prevention block of a practice
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: String,
        rule_name: String,
        asset_id: String,
        asset_name: String,
        practice_id: String,
        practice_name: String,
        spec: &IntrusionPreventionSpec,
    ) -> Self {
        Self {
            context,
            rule_name,
            asset_id,
            asset_name,
            practice_id,
            practice_name,
            default_mode: spec.override_mode.clone(),
            max_performance_impact: spec.max_performance_impact.clone(),
            min_severity_level: spec.min_severity_level.clone(),
            high_confidence_event_action: spec.high_confidence_event_action.clone(),
            medium_confidence_event_action: spec.medium_confidence_event_action.clone(),
            low_confidence_event_action: spec.low_confidence_event_action.clone(),
            min_cve_year: spec.min_cve_year,
        }
    }
}

/// Wrapper serializing the IPS sections under their artifact key
#[derive(Debug, Clone, Default, Serialize)]
pub struct IpsWrapper {
    /// The sections
    #[serde(rename = "IpsProtections")]
    pub ips_protections: Vec<IpsProtectionsSection>,
}

/// A compiled file-security section for one asset
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSecurityProtectionsSection {
    /// Context predicate gating the section
    pub context: String,
    /// Rule name
    pub rule_name: String,
    /// Asset id
    pub asset_id: String,
    /// Asset name
    pub asset_name: String,
    /// Practice id
    pub practice_id: String,
    /// Practice name
    pub practice_name: String,
    /// Enforcement mode
    pub default_mode: String,
    /// Minimum severity acted on
    pub min_severity_level: String,
    /// Action on archives within archives
    pub archive_inside_archive: String,
    /// File size limit
    pub file_size_limit: u64,
    /// Unit of the file size limit
    pub file_size_limit_unit: String,
}

impl FileSecurityProtectionsSection {
    /// Compile the file-security block of a practice
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: String,
        rule_name: String,
        asset_id: String,
        asset_name: String,
        practice_id: String,
        practice_name: String,
        spec: &FileSecuritySpec,
    ) -> Self {
        Self {
            context,
            rule_name,
            asset_id,
            asset_name,
            practice_id,
            practice_name,
            default_mode: spec.override_mode.clone(),
            min_severity_level: spec.min_severity_level.clone(),
            archive_inside_archive: spec.archive_inside_archive.clone(),
            file_size_limit: spec.file_size_limit,
            file_size_limit_unit: spec.file_size_limit_unit.clone(),
        }
    }
}

/// Wrapper serializing the file-security sections under their artifact key
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileSecurityWrapper {
    /// The sections
    #[serde(rename = "FileSecurityProtections")]
    pub file_security_protections: Vec<FileSecurityProtectionsSection>,
}

/// One compiled rate-limit rule
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRuleSection {
    /// Requests allowed per unit
    pub limit: u64,
    /// Unit of the limit
    pub unit: String,
    /// URI the limit attaches to
    pub uri: String,
    /// Trigger names referenced by the rule
    pub triggers: Vec<String>,
}

/// A compiled rate-limit section for one asset
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSection {
    /// Context predicate gating the section
    pub context: String,
    /// Asset id
    pub asset_id: String,
    /// Asset name
    pub asset_name: String,
    /// Practice id
    pub practice_id: String,
    /// Practice name
    pub practice_name: String,
    /// Enforcement mode
    pub default_mode: String,
    /// The rate-limit rules
    pub rules: Vec<RateLimitRuleSection>,
}

impl RateLimitSection {
    /// Compile the rate-limit block of an access-control practice
    pub fn new(
        context: String,
        asset_id: String,
        asset_name: String,
        practice_id: String,
        practice_name: String,
        spec: &RateLimitSpec,
    ) -> Self {
        Self {
            context,
            asset_id,
            asset_name,
            practice_id,
            practice_name,
            default_mode: spec.override_mode.clone(),
            rules: spec
                .rules
                .iter()
                .map(|rule| RateLimitRuleSection {
                    limit: rule.limit,
                    unit: rule.unit.clone(),
                    uri: rule.uri.clone(),
                    triggers: rule.triggers.clone(),
                })
                .collect(),
        }
    }
}

/// Wrapper serializing the rate-limit sections under their artifact key
#[derive(Debug, Clone, Default, Serialize)]
pub struct RateLimitWrapper {
    /// The sections
    #[serde(rename = "RateLimit")]
    pub rate_limit: Vec<RateLimitSection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ips_section_from_spec() {
        let spec: IntrusionPreventionSpec = serde_json::from_str(
            r#"{
                "overrideMode": "prevent",
                "maxPerformanceImpact": "medium",
                "minSeverityLevel": "high",
                "highConfidenceEventAction": "prevent",
                "mediumConfidenceEventAction": "detect",
                "lowConfidenceEventAction": "detect",
                "minCveYear": 2016
            }"#,
        )
        .expect("spec");
        let section = IpsProtectionsSection::new(
            "All()".into(),
            "example.com".into(),
            "example.com".into(),
            "example.com".into(),
            "pid".into(),
            "ips-practice".into(),
            &spec,
        );
        assert_eq!(section.default_mode, "prevent");
        assert_eq!(section.min_cve_year, 2016);
        let json = serde_json::to_value(&section).expect("serialize");
        assert!(json.get("highConfidenceEventAction").is_some());
    }

    #[test]
    fn test_file_security_section_from_spec() {
        let spec: FileSecuritySpec = serde_json::from_str(
            r#"{"overrideMode": "detect", "fileSizeLimit": 25, "fileSizeLimitUnit": "MB"}"#,
        )
        .expect("spec");
        let section = FileSecurityProtectionsSection::new(
            "All()".into(),
            "r".into(),
            "a".into(),
            "a".into(),
            "p".into(),
            "fs".into(),
            &spec,
        );
        assert_eq!(section.file_size_limit, 25);
        assert_eq!(section.file_size_limit_unit, "MB");
    }

    #[test]
    fn test_rate_limit_section_from_spec() {
        let spec: RateLimitSpec = serde_json::from_str(
            r#"{"overrideMode": "prevent", "rules": [{"limit": 100, "unit": "minute", "uri": "/login"}]}"#,
        )
        .expect("spec");
        let section = RateLimitSection::new("All()".into(), "a".into(), "a".into(), "p".into(), "ac".into(), &spec);
        assert_eq!(section.rules.len(), 1);
        assert_eq!(section.rules[0].limit, 100);
        assert_eq!(section.default_mode, "prevent");
    }

    #[test]
    fn test_empty_wrappers_serialize_stable_shape() {
        let json = serde_json::to_value(IpsWrapper::default()).expect("serialize");
        assert!(json["IpsProtections"].as_array().expect("array").is_empty());
        let json = serde_json::to_value(RateLimitWrapper::default()).expect("serialize");
        assert!(json["RateLimit"].as_array().expect("array").is_empty());
    }
}
