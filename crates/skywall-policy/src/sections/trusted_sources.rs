//! Trusted-sources section

use serde::Serialize;
use uuid::Uuid;

use crate::spec::v1beta1::{SourceIdentifierSpec, TrustedSourcesSpec};

/// One `(identifier, value)` pair of a trusted-sources entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesIdentifiers {
    /// Identifier key; multi-valued identifiers expand to `key:value`
    pub source_identifier: String,
    /// The trusted source value
    pub value: String,
}

impl SourcesIdentifiers {
    /// Pair of identifier key and trusted value
    pub fn new(source_identifier: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            source_identifier: source_identifier.into(),
            value: value.into(),
        }
    }

    /// The identifier key
    pub fn source_ident(&self) -> &str {
        &self.source_identifier
    }
}

/// A compiled trusted-sources parameter
#[derive(Debug, Clone, Default, Serialize)]
pub struct AppSecTrustedSources {
    /// Generated parameter id
    pub id: String,
    /// Asset name the parameter attaches to
    pub name: String,
    /// Sources that must agree before a source is trusted
    #[serde(rename = "numOfSources")]
    pub num_of_sources: u32,
    /// The identifier/value matrix
    #[serde(rename = "sourcesIdentifiers")]
    pub sources_identifiers: Vec<SourcesIdentifiers>,
    /// Parameter type, always `TrustedSource`
    #[serde(rename = "parameterType")]
    pub parameter_type: String,
}

impl AppSecTrustedSources {
    /// Section for one asset
    pub fn new(name: impl Into<String>, num_of_sources: u32, sources_identifiers: Vec<SourcesIdentifiers>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            num_of_sources,
            sources_identifiers,
            parameter_type: "TrustedSource".to_string(),
        }
    }

    /// The identifier/value matrix
    pub fn sources_identifiers(&self) -> &[SourcesIdentifiers] {
        &self.sources_identifiers
    }

    /// Whether the section carries any identifiers
    pub fn is_empty(&self) -> bool {
        self.sources_identifiers.is_empty()
    }
}

/// Expand the (source identifiers x trusted sources) matrix for one asset
///
/// Every entry of the trusted-sources list is paired with every identifier;
/// a multi-valued identifier contributes one `key:value` entry per value.
pub fn expand_trusted_sources(
    asset_name: &str,
    trusted: &TrustedSourcesSpec,
    identifiers: &[SourceIdentifierSpec],
) -> AppSecTrustedSources {
    let mut generated = Vec::new();
    for identifier in identifiers {
        for trusted_source in &trusted.sources_identifiers {
            if identifier.value.is_empty() {
                generated.push(SourcesIdentifiers::new(&identifier.source_identifier, trusted_source));
            } else {
                for value in &identifier.value {
                    let key = format!("{}:{value}", identifier.source_identifier);
                    generated.push(SourcesIdentifiers::new(key, trusted_source));
                }
            }
        }
    }
    AppSecTrustedSources::new(asset_name, trusted.min_num_of_sources, generated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trusted(sources: &[&str]) -> TrustedSourcesSpec {
        TrustedSourcesSpec {
            name: "ts".into(),
            min_num_of_sources: 3,
            sources_identifiers: sources.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn identifier(key: &str, values: &[&str]) -> SourceIdentifierSpec {
        SourceIdentifierSpec {
            source_identifier: key.into(),
            value: values.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_single_identifier_expansion() {
        let section = expand_trusted_sources(
            "example.com",
            &trusted(&["1.1.1.1", "2.2.2.2"]),
            &[identifier("sourceip", &[])],
        );
        assert_eq!(section.sources_identifiers().len(), 2);
        assert_eq!(section.sources_identifiers()[0].source_ident(), "sourceip");
        assert_eq!(section.sources_identifiers()[0].value, "1.1.1.1");
        assert_eq!(section.num_of_sources, 3);
    }

    #[test]
    fn test_multi_valued_identifier_expansion() {
        let section = expand_trusted_sources(
            "example.com",
            &trusted(&["10.0.0.1"]),
            &[identifier("headerkey", &["x-forwarded-for", "x-real-ip"])],
        );
        let keys: Vec<&str> = section.sources_identifiers().iter().map(SourcesIdentifiers::source_ident).collect();
        assert_eq!(keys, vec!["headerkey:x-forwarded-for", "headerkey:x-real-ip"]);
    }

    #[test]
    fn test_cross_product_size() {
        let section = expand_trusted_sources(
            "Any",
            &trusted(&["a", "b", "c"]),
            &[identifier("sourceip", &[]), identifier("cookie", &["session"])],
        );
        // 1 empty-valued identifier x 3 + 1 single-valued identifier x 3
        assert_eq!(section.sources_identifiers().len(), 6);
    }

    #[test]
    fn test_serialized_keys() {
        let section = expand_trusted_sources("a", &trusted(&["s"]), &[identifier("k", &[])]);
        let json = serde_json::to_value(&section).expect("serialize");
        assert!(json.get("numOfSources").is_some());
        assert!(json.get("sourcesIdentifiers").is_some());
        assert_eq!(json["parameterType"], "TrustedSource");
    }
}
