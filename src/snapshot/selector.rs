//! Label selector evaluation
//!
//! Supports both selector shapes found in the wild:
//! - structured selectors (`matchLabels` + `matchExpressions`), used by
//!   NetworkPolicy, PodDisruptionBudget and workload specs
//! - plain equality maps, used by Service `spec.selector`
//!
//! All clauses are ANDed together. Evaluation is pure; namespace scoping is
//! the index's job.

use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Reasons a selector document cannot be evaluated
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("malformed label selector: {0}")]
    Malformed(String),

    #[error("unknown operator '{operator}' for key '{key}'")]
    UnknownOperator { key: String, operator: String },

    #[error("operator {operator} on key '{key}' requires at least one value")]
    MissingValues {
        key: String,
        operator: SelectorOperator,
    },

    #[error("operator {operator} on key '{key}' must not carry values")]
    UnexpectedValues {
        key: String,
        operator: SelectorOperator,
    },
}

/// Set-based selector operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

impl SelectorOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorOperator::In => "In",
            SelectorOperator::NotIn => "NotIn",
            SelectorOperator::Exists => "Exists",
            SelectorOperator::DoesNotExist => "DoesNotExist",
        }
    }

    fn parse(key: &str, operator: &str) -> Result<Self, SelectorError> {
        match operator {
            "In" => Ok(SelectorOperator::In),
            "NotIn" => Ok(SelectorOperator::NotIn),
            "Exists" => Ok(SelectorOperator::Exists),
            "DoesNotExist" => Ok(SelectorOperator::DoesNotExist),
            _ => Err(SelectorError::UnknownOperator {
                key: key.to_string(),
                operator: operator.to_string(),
            }),
        }
    }
}

impl fmt::Display for SelectorOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `matchExpressions` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub operator: SelectorOperator,
    pub values: Vec<String>,
}

impl Requirement {
    pub fn new(
        key: impl Into<String>,
        operator: SelectorOperator,
        values: Vec<String>,
    ) -> Result<Self, SelectorError> {
        let key = key.into();
        match operator {
            SelectorOperator::In | SelectorOperator::NotIn if values.is_empty() => {
                Err(SelectorError::MissingValues { key, operator })
            }
            SelectorOperator::Exists | SelectorOperator::DoesNotExist if !values.is_empty() => {
                Err(SelectorError::UnexpectedValues { key, operator })
            }
            _ => Ok(Self {
                key,
                operator,
                values,
            }),
        }
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            SelectorOperator::In => value.is_some_and(|v| self.values.contains(v)),
            // NotIn also matches objects that lack the key entirely
            SelectorOperator::NotIn => value.is_none_or(|v| !self.values.contains(v)),
            SelectorOperator::Exists => value.is_some(),
            SelectorOperator::DoesNotExist => value.is_none(),
        }
    }

    fn to_kubectl(&self) -> String {
        match self.operator {
            SelectorOperator::In => format!("{} in ({})", self.key, self.values.join(",")),
            SelectorOperator::NotIn => format!("{} notin ({})", self.key, self.values.join(",")),
            SelectorOperator::Exists => self.key.clone(),
            SelectorOperator::DoesNotExist => format!("!{}", self.key),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            SelectorOperator::In | SelectorOperator::NotIn => write!(
                f,
                "{} {} ({})",
                self.key,
                self.operator,
                self.values.join(", ")
            ),
            SelectorOperator::Exists | SelectorOperator::DoesNotExist => {
                write!(f, "{} {}", self.key, self.operator)
            }
        }
    }
}

/// A parsed label selector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    match_labels: BTreeMap<String, String>,
    match_expressions: Vec<Requirement>,
}

impl LabelSelector {
    /// Equality-only selector
    pub fn from_match_labels(match_labels: BTreeMap<String, String>) -> Self {
        Self {
            match_labels,
            match_expressions: Vec::new(),
        }
    }

    pub fn new(match_labels: BTreeMap<String, String>, match_expressions: Vec<Requirement>) -> Self {
        Self {
            match_labels,
            match_expressions,
        }
    }

    /// Parse a structured selector (`matchLabels` / `matchExpressions`)
    pub fn from_value(value: &Value) -> Result<Self, SelectorError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        if !value.is_object() {
            return Err(SelectorError::Malformed(format!(
                "expected an object, got {}",
                value
            )));
        }
        let parsed: metav1::LabelSelector = serde_json::from_value(value.clone())
            .map_err(|e| SelectorError::Malformed(e.to_string()))?;
        Self::try_from(parsed)
    }

    /// Parse a Service-style selector: a flat map of label equalities
    pub fn from_equality_map(value: &Value) -> Result<Self, SelectorError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let match_labels: BTreeMap<String, String> = serde_json::from_value(value.clone())
            .map_err(|e| SelectorError::Malformed(e.to_string()))?;
        Ok(Self::from_match_labels(match_labels))
    }

    /// An empty selector has no clauses and matches every object
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }

    pub fn match_labels(&self) -> &BTreeMap<String, String> {
        &self.match_labels
    }

    pub fn match_expressions(&self) -> &[Requirement] {
        &self.match_expressions
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
            && self.match_expressions.iter().all(|r| r.matches(labels))
    }

    /// Render in `kubectl -l` syntax for verification commands
    pub fn to_kubectl(&self) -> String {
        self.match_labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .chain(self.match_expressions.iter().map(Requirement::to_kubectl))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl TryFrom<metav1::LabelSelector> for LabelSelector {
    type Error = SelectorError;

    fn try_from(selector: metav1::LabelSelector) -> Result<Self, Self::Error> {
        let match_expressions = selector
            .match_expressions
            .unwrap_or_default()
            .into_iter()
            .map(|expr| {
                let operator = SelectorOperator::parse(&expr.key, &expr.operator)?;
                Requirement::new(expr.key, operator, expr.values.unwrap_or_default())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            match_labels: selector.match_labels.unwrap_or_default(),
            match_expressions,
        })
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("<empty>");
        }
        let clauses: Vec<String> = self
            .match_labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .chain(self.match_expressions.iter().map(|r| r.to_string()))
            .collect();
        f.write_str(&clauses.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_match_labels_and_expressions_are_anded() {
        let selector = LabelSelector::from_value(&json!({
            "matchLabels": {"app": "web"},
            "matchExpressions": [
                {"key": "tier", "operator": "In", "values": ["frontend", "edge"]},
                {"key": "legacy", "operator": "DoesNotExist"}
            ]
        }))
        .unwrap();

        assert!(selector.matches(&labels(&[("app", "web"), ("tier", "edge")])));
        assert!(!selector.matches(&labels(&[("app", "web"), ("tier", "backend")])));
        assert!(!selector.matches(&labels(&[("app", "web"), ("tier", "edge"), ("legacy", "y")])));
        assert!(!selector.matches(&labels(&[("tier", "edge")])));
    }

    #[test]
    fn test_not_in_matches_missing_key() {
        let selector = LabelSelector::from_value(&json!({
            "matchExpressions": [{"key": "env", "operator": "NotIn", "values": ["prod"]}]
        }))
        .unwrap();

        assert!(selector.matches(&labels(&[])));
        assert!(selector.matches(&labels(&[("env", "dev")])));
        assert!(!selector.matches(&labels(&[("env", "prod")])));
    }

    #[test]
    fn test_exists() {
        let selector = LabelSelector::from_value(&json!({
            "matchExpressions": [{"key": "app", "operator": "Exists"}]
        }))
        .unwrap();
        assert!(selector.matches(&labels(&[("app", "")])));
        assert!(!selector.matches(&labels(&[("other", "x")])));
    }

    #[test]
    fn test_unknown_operator_is_an_error() {
        let err = LabelSelector::from_value(&json!({
            "matchExpressions": [{"key": "app", "operator": "Matches", "values": ["x"]}]
        }))
        .unwrap_err();
        assert_eq!(
            err,
            SelectorError::UnknownOperator {
                key: "app".to_string(),
                operator: "Matches".to_string()
            }
        );
    }

    #[test]
    fn test_in_without_values_is_an_error() {
        let err = LabelSelector::from_value(&json!({
            "matchExpressions": [{"key": "app", "operator": "In", "values": []}]
        }))
        .unwrap_err();
        assert!(matches!(err, SelectorError::MissingValues { .. }));
    }

    #[test]
    fn test_equality_map() {
        let selector = LabelSelector::from_equality_map(&json!({"app": "web"})).unwrap();
        assert!(selector.matches(&labels(&[("app", "web"), ("extra", "1")])));
        assert!(LabelSelector::from_equality_map(&json!(["app"])).is_err());
        assert!(LabelSelector::from_equality_map(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let selector = LabelSelector::from_value(&json!({})).unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(&labels(&[("anything", "goes")])));
    }

    #[test]
    fn test_display_renders_expressions() {
        let selector = LabelSelector::from_value(&json!({
            "matchLabels": {"app": "web"},
            "matchExpressions": [
                {"key": "tier", "operator": "In", "values": ["frontend", "edge"]},
                {"key": "legacy", "operator": "DoesNotExist"}
            ]
        }))
        .unwrap();

        assert_eq!(
            selector.to_string(),
            "app=web, tier In (frontend, edge), legacy DoesNotExist"
        );
        assert_eq!(
            selector.to_kubectl(),
            "app=web,tier in (frontend,edge),!legacy"
        );
    }
}
