//! Exceptions section: behavior/match pairs

use serde::Serialize;
use uuid::Uuid;

use crate::spec::v1beta1::AppsecExceptionSpec;

/// A single condition or an operator over nested matches
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ExceptionMatch {
    /// Leaf condition: `key in value`
    Condition {
        /// Discriminator, always `condition`
        #[serde(rename = "type")]
        match_type: &'static str,
        /// Operator, always `in`
        op: &'static str,
        /// Condition key
        key: String,
        /// Accepted values
        value: Vec<String>,
    },
    /// Inner node combining nested matches
    Operator {
        /// Discriminator, always `operator`
        #[serde(rename = "type")]
        match_type: &'static str,
        /// Combining operator
        op: &'static str,
        /// Nested matches
        items: Vec<ExceptionMatch>,
    },
}

impl ExceptionMatch {
    /// Leaf condition
    pub fn condition(key: impl Into<String>, value: Vec<String>) -> Self {
        Self::Condition {
            match_type: "condition",
            op: "in",
            key: key.into(),
            value,
        }
    }

    /// Conjunction of nested matches
    pub fn and(items: Vec<ExceptionMatch>) -> Self {
        Self::Operator {
            match_type: "operator",
            op: "and",
            items,
        }
    }

    /// Build the match tree from the populated condition lists of a spec
    ///
    /// A single populated list yields a bare condition; several are joined
    /// under one `and` operator.
    pub fn from_spec(spec: &AppsecExceptionSpec) -> Self {
        let mut conditions = Vec::new();
        let pairs: [(&str, &Vec<String>); 9] = [
            ("countryCode", &spec.country_code),
            ("countryName", &spec.country_name),
            ("hostName", &spec.host_name),
            ("paramName", &spec.param_name),
            ("paramValue", &spec.param_value),
            ("protectionName", &spec.protection_name),
            ("sourceIdentifier", &spec.source_identifier),
            ("sourceIp", &spec.source_ip),
            ("url", &spec.url),
        ];
        for (key, values) in pairs {
            if !values.is_empty() {
                conditions.push(Self::condition(key, values.clone()));
            }
        }

        if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            Self::and(conditions)
        }
    }
}

/// The action half of an exception
#[derive(Debug, Clone, Serialize)]
pub struct ExceptionBehavior {
    /// Generated behavior id
    pub id: String,
    /// Behavior key, always `action`
    pub key: String,
    /// The action value
    pub value: String,
}

impl ExceptionBehavior {
    /// Behavior with a generated id
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// The generated behavior id
    pub fn behavior_id(&self) -> &str {
        &self.id
    }
}

/// One compiled exception: what to match and what to do
#[derive(Debug, Clone, Serialize)]
pub struct InnerException {
    /// The action
    pub behavior: ExceptionBehavior,
    /// The match tree
    #[serde(rename = "match")]
    pub match_: ExceptionMatch,
}

impl InnerException {
    /// Pair a behavior with a match tree
    pub fn new(behavior: ExceptionBehavior, match_: ExceptionMatch) -> Self {
        Self { behavior, match_ }
    }

    /// Compile a spec: the `skip` action normalizes to `ignore`
    pub fn from_spec(spec: &AppsecExceptionSpec) -> Self {
        let action = if spec.action == "skip" { "ignore" } else { spec.action.as_str() };
        Self::new(ExceptionBehavior::new("action", action), ExceptionMatch::from_spec(spec))
    }

    /// The generated behavior id
    pub fn behavior_id(&self) -> &str {
        self.behavior.behavior_id()
    }
}

/// Exceptions grouped under one context
#[derive(Debug, Clone, Serialize)]
pub struct ExceptionsRulebase {
    /// Context predicate the exceptions apply under
    pub context: String,
    /// The exceptions
    pub exceptions: Vec<InnerException>,
}

impl ExceptionsRulebase {
    /// Rulebase applying everywhere
    pub fn new(exceptions: Vec<InnerException>) -> Self {
        Self {
            context: "Any()".to_string(),
            exceptions,
        }
    }
}

/// Wrapper serializing the exceptions under their artifact key
#[derive(Debug, Clone, Serialize)]
pub struct ExceptionsWrapper {
    /// The rulebases
    pub rulebase: ExceptionsRulebaseList,
}

/// List holder matching the artifact layout
#[derive(Debug, Clone, Serialize)]
pub struct ExceptionsRulebaseList {
    /// The rulebases
    pub exception: Vec<ExceptionsRulebase>,
}

impl ExceptionsWrapper {
    /// Wrap the compiled exceptions
    pub fn new(exception: Vec<ExceptionsRulebase>) -> Self {
        Self {
            rulebase: ExceptionsRulebaseList { exception },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(json: &str) -> AppsecExceptionSpec {
        serde_json::from_str(json).expect("spec")
    }

    #[test]
    fn test_single_condition_stays_bare() {
        let m = ExceptionMatch::from_spec(&spec(r#"{"name": "e", "action": "drop", "sourceIp": ["10.0.0.1"]}"#));
        let json = serde_json::to_value(&m).expect("serialize");
        assert_eq!(json["type"], "condition");
        assert_eq!(json["op"], "in");
        assert_eq!(json["key"], "sourceIp");
        assert_eq!(json["value"][0], "10.0.0.1");
    }

    #[test]
    fn test_multiple_conditions_joined_by_and() {
        let m = ExceptionMatch::from_spec(&spec(
            r#"{"name": "e", "action": "drop", "sourceIp": ["10.0.0.1"], "url": ["/health"]}"#,
        ));
        let json = serde_json::to_value(&m).expect("serialize");
        assert_eq!(json["type"], "operator");
        assert_eq!(json["op"], "and");
        assert_eq!(json["items"].as_array().expect("items").len(), 2);
    }

    #[test]
    fn test_skip_normalizes_to_ignore() {
        let exception = InnerException::from_spec(&spec(
            r#"{"name": "e", "action": "skip", "url": ["/metrics"]}"#,
        ));
        assert_eq!(exception.behavior.value, "ignore");
        assert_eq!(exception.behavior.key, "action");
        assert!(!exception.behavior_id().is_empty());
    }

    #[test]
    fn test_other_actions_preserved() {
        let exception = InnerException::from_spec(&spec(
            r#"{"name": "e", "action": "accept", "url": ["/metrics"]}"#,
        ));
        assert_eq!(exception.behavior.value, "accept");
    }

    #[test]
    fn test_wrapper_layout() {
        let exception = InnerException::from_spec(&spec(r#"{"name": "e", "action": "drop", "url": ["/x"]}"#));
        let wrapper = ExceptionsWrapper::new(vec![ExceptionsRulebase::new(vec![exception])]);
        let json = serde_json::to_value(&wrapper).expect("serialize");
        assert_eq!(json["rulebase"]["exception"][0]["context"], "Any()");
        assert!(json["rulebase"]["exception"][0]["exceptions"][0]["match"].is_object());
    }
}
