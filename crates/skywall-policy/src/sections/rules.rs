//! Rules configuration: asset matching and rule ordering
//!
//! Each rule carries a context predicate - a deterministic string expression
//! over `EqualHost`, `EqualListeningPort`, and `BeginWithUri` - that gates
//! its applicability at request time. Identical input rules must produce
//! byte-identical context strings; they are cache keys downstream.

use serde::Serialize;

/// Decomposition of an asset name into its addressing parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetUrlParser {
    /// Scheme, when present
    pub protocol: String,
    /// Host part
    pub asset_url: String,
    /// Port part, empty when unspecified
    pub port: String,
    /// Path part
    pub asset_uri: String,
    /// Query string, when present
    pub query_string: String,
}

impl AssetUrlParser {
    /// Split `uri` into `(protocol, url, port, uri, query)`
    pub fn parse(uri: &str) -> Self {
        let mut result = Self::default();
        if uri.is_empty() {
            return result;
        }

        let mut rest = uri;
        if let Some(scheme_end) = rest.find("://") {
            result.protocol = rest[..scheme_end].to_string();
            rest = &rest[scheme_end + 3..];
        }

        let (before_query, query) = match rest.find('?') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        result.query_string = query.to_string();

        let (authority, path) = match before_query.find('/') {
            Some(idx) => (&before_query[..idx], &before_query[idx..]),
            None => (before_query, ""),
        };
        result.asset_uri = path.to_string();

        match authority.find(':') {
            Some(idx) => {
                result.asset_url = authority[..idx].to_string();
                result.port = authority[idx + 1..].to_string();
            }
            None => result.asset_url = authority.to_string(),
        }

        result
    }
}

/// Reference from a rule to a practice
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSection {
    /// Practice id
    pub practice_id: String,
    /// Practice name
    pub practice_name: String,
    /// Practice type
    pub practice_type: String,
}

impl PracticeSection {
    /// Reference with an id, type, and name
    pub fn new(id: impl Into<String>, practice_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            practice_id: id.into(),
            practice_name: name.into(),
            practice_type: practice_type.into(),
        }
    }
}

/// Reference from a rule to a parameter (exception) entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParametersSection {
    /// Parameter id
    pub parameter_id: String,
    /// Parameter name
    pub parameter_name: String,
    /// Parameter type
    pub parameter_type: String,
}

impl ParametersSection {
    /// Exception-typed parameter reference
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            parameter_id: id.into(),
            parameter_name: name.into(),
            parameter_type: "exception".to_string(),
        }
    }
}

/// Reference from a rule to a trigger
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesTriggerSection {
    /// Trigger id
    pub trigger_id: String,
    /// Trigger name
    pub trigger_name: String,
    /// Trigger type (`log` / `WebUserResponse`)
    pub trigger_type: String,
}

impl RulesTriggerSection {
    /// Trigger reference
    pub fn new(name: impl Into<String>, id: impl Into<String>, trigger_type: impl Into<String>) -> Self {
        Self {
            trigger_id: id.into(),
            trigger_name: name.into(),
            trigger_type: trigger_type.into(),
        }
    }
}

/// One rule of the rules-config rulebase
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesConfigRulebase {
    /// Asset id (`<url><uri>`, or `Any`)
    pub asset_id: String,
    /// Asset name (the original host string)
    pub asset_name: String,
    /// Rule id, same value as the asset id
    pub rule_id: String,
    /// Rule name, same value as the asset name
    pub rule_name: String,
    /// Context predicate gating the rule
    pub context: String,
    /// Rule priority
    pub priority: u32,
    /// Whether this is a cleanup rule
    pub is_cleanup: bool,
    /// Parameter references
    pub parameters: Vec<ParametersSection>,
    /// Practice references
    pub practices: Vec<PracticeSection>,
    /// Trigger references
    pub triggers: Vec<RulesTriggerSection>,
    /// Zone id, unused
    pub zone_id: String,
    /// Zone name, unused
    pub zone_name: String,
}

impl RulesConfigRulebase {
    /// Build a rule with its context predicate
    ///
    /// The distinguished wildcard (`Any` name, url, and uri) yields asset id
    /// `Any` and the constant predicate `All()`. Without an explicit port
    /// one `All(...)` branch is produced for each of 80 and 443.
    pub fn new(
        name: impl Into<String>,
        url: &str,
        port: &str,
        uri: &str,
        practices: Vec<PracticeSection>,
        parameters: Vec<ParametersSection>,
        triggers: Vec<RulesTriggerSection>,
    ) -> Self {
        let name = name.into();
        let any = name == "Any" && url == "Any" && uri == "Any";
        let (id, context) = if any {
            ("Any".to_string(), "All()".to_string())
        } else {
            (format!("{url}{uri}"), Self::build_context(url, port, uri))
        };

        Self {
            asset_id: id.clone(),
            asset_name: name.clone(),
            rule_id: id,
            rule_name: name,
            context,
            priority: 1,
            is_cleanup: false,
            parameters,
            practices,
            triggers,
            zone_id: String::new(),
            zone_name: String::new(),
        }
    }

    fn build_context(url: &str, port: &str, uri: &str) -> String {
        let host_check = format!("Any(EqualHost({url})),");
        let uri_check = if uri.is_empty() || uri == "/" {
            String::new()
        } else {
            format!(",BeginWithUri({uri})")
        };
        let ports: Vec<&str> = if port.is_empty() { vec!["80", "443"] } else { vec![port] };

        let branches: Vec<String> = ports
            .iter()
            .map(|p| format!("All({host_check}EqualListeningPort({p}){uri_check})"))
            .collect();
        format!("Any({})", branches.join(","))
    }

    /// The context predicate
    pub fn context(&self) -> &str {
        &self.context
    }

    /// The asset name
    pub fn asset_name(&self) -> &str {
        &self.asset_name
    }

    /// The asset id
    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    /// Id of the first referenced practice, empty when there is none
    pub fn practice_id(&self) -> &str {
        self.practices.first().map_or("", |p| p.practice_id.as_str())
    }
}

/// One source-identifier entry of the users-identifiers rulebase
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersIdentifier {
    /// Identifier kind
    pub source_identifier: String,
    /// Identifier values
    pub identifier_values: Vec<String>,
}

/// Users-identifiers rulebase entry, scoped by a context predicate
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersIdentifiersRulebase {
    /// Context predicate the identifiers apply under
    pub context: String,
    /// Primary identifier kind
    pub source_identifier: String,
    /// Primary identifier values
    pub identifier_values: Vec<String>,
    /// All identifiers
    pub source_identifiers: Vec<UsersIdentifier>,
}

/// The sorted rules-config rulebase
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesRulebase {
    /// Rules, most specific first
    pub rules_config: Vec<RulesConfigRulebase>,
    /// Users-identifiers entries
    pub users_identifiers: Vec<UsersIdentifiersRulebase>,
}

impl RulesRulebase {
    /// Assemble and sort the rulebase
    pub fn new(mut rules_config: Vec<RulesConfigRulebase>, users_identifiers: Vec<UsersIdentifiersRulebase>) -> Self {
        rules_config.sort_by(|first, second| {
            let first_name = first.asset_name();
            let second_name = second.asset_name();
            if sort_by_specific(first_name, second_name) {
                std::cmp::Ordering::Less
            } else if sort_by_specific(second_name, first_name) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        });
        Self {
            rules_config,
            users_identifiers,
        }
    }
}

/// Whether `first` is strictly more specific than `second`
///
/// Specificity: concrete URL over `Any`, concrete port over `*`, concrete
/// URI over `*`, longer URI over its own prefix, reverse lexical order of
/// the asset names as the final tie-break.
pub fn sort_by_specific(first: &str, second: &str) -> bool {
    if first.is_empty() {
        return false;
    }
    if second.is_empty() {
        return true;
    }

    let first_parsed = AssetUrlParser::parse(first);
    let second_parsed = AssetUrlParser::parse(second);

    // URL specificity
    if first_parsed.asset_url == "Any" && second_parsed.asset_url != "Any" {
        return false;
    }
    if second_parsed.asset_url == "Any" && first_parsed.asset_url != "Any" {
        return true;
    }

    // Port specificity
    if first_parsed.port == "*" && second_parsed.port != "*" {
        return false;
    }
    if second_parsed.port == "*" && first_parsed.port != "*" {
        return true;
    }

    // URI specificity
    if first_parsed.asset_uri == "*" && second_parsed.asset_uri != "*" {
        return false;
    }
    if second_parsed.asset_uri == "*" && first_parsed.asset_uri != "*" {
        return true;
    }

    if first_parsed.asset_uri.is_empty() {
        return false;
    }
    if second_parsed.asset_uri.is_empty() {
        return true;
    }

    // A URI containing the other as a substring is the more specific one
    if second_parsed.asset_uri.contains(&first_parsed.asset_uri) {
        return false;
    }
    if first_parsed.asset_uri.contains(&second_parsed.asset_uri) {
        return true;
    }

    if first_parsed.asset_url.is_empty() || second_parsed.asset_url.is_empty() {
        return false;
    }

    second < first
}

/// Wrapper serializing the rulebase under its artifact key
#[derive(Debug, Clone, Serialize)]
pub struct RulesConfigWrapper {
    /// The rulebase
    pub rulebase: RulesRulebase,
}

impl RulesConfigWrapper {
    /// Wrap a sorted rulebase
    pub fn new(rules_config: Vec<RulesConfigRulebase>, users_identifiers: Vec<UsersIdentifiersRulebase>) -> Self {
        Self {
            rulebase: RulesRulebase::new(rules_config, users_identifiers),
        }
    }
}
