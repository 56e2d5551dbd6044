//! Structural integrity scanning
//!
//! Finds dangling cross-references between related objects: selectors that
//! match nothing, backends that do not exist, scale targets that are gone and
//! disruption budgets that can never be satisfied. Each rule is an independent
//! check over the same snapshot and selector evaluator, so one malformed
//! object only ever costs the finding for that object.
//!
//! To add a rule:
//! 1. Write the check in `checks.rs`
//! 2. Add an entry to `RULES` below

mod checks;

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::models::ObjectKey;
use crate::snapshot::SnapshotIndex;

pub use checks::expected_replicas;

/// How urgent a finding is
///
/// Ordered for filtering: `Info < Warning < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!(
                "Unknown severity: {} (expected info, warning, high or critical)",
                s
            )),
        }
    }
}

/// One structural integrity problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub rule_id: &'static str,
    pub severity: Severity,
    /// Object the problem was found on
    pub subject: ObjectKey,
    /// Object the subject points at, when the reference names one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<ObjectKey>,
    pub message: String,
    /// Command that confirms the finding against a live cluster
    pub verify_command: String,
}

/// Signature shared by every check
pub type CheckFn = fn(&SnapshotIndex, &Rule) -> Vec<Finding>;

/// Registry entry for a scan rule
pub struct Rule {
    pub id: &'static str,
    pub severity: Severity,
    pub description: &'static str,
    pub check: CheckFn,
}

impl Rule {
    /// Start a finding attributed to this rule
    pub fn finding(
        &self,
        subject: ObjectKey,
        target: Option<ObjectKey>,
        message: String,
        verify_command: String,
    ) -> Finding {
        Finding {
            rule_id: self.id,
            severity: self.severity,
            subject,
            target,
            message,
            verify_command,
        }
    }
}

pub const SERVICE_SELECTOR_NO_MATCH: &str = "service-selector-no-match";
pub const INGRESS_BACKEND_MISSING: &str = "ingress-backend-missing";
pub const ROUTE_BACKEND_MISSING: &str = "route-backend-missing";
pub const HPA_TARGET_MISSING: &str = "hpa-target-missing";
pub const PDB_BLOCKS_EVICTION: &str = "pdb-blocks-eviction";
pub const NETWORKPOLICY_SELECTOR_NO_MATCH: &str = "networkpolicy-selector-no-match";

/// Every rule the scanner knows
pub const RULES: &[Rule] = &[
    Rule {
        id: SERVICE_SELECTOR_NO_MATCH,
        severity: Severity::High,
        description: "Service selector matches no pods in its namespace",
        check: checks::service_selectors,
    },
    Rule {
        id: INGRESS_BACKEND_MISSING,
        severity: Severity::High,
        description: "Ingress backend references a Service that does not exist",
        check: checks::ingress_backends,
    },
    Rule {
        id: ROUTE_BACKEND_MISSING,
        severity: Severity::High,
        description: "HTTPRoute backendRef references a Service that does not exist",
        check: checks::route_backends,
    },
    Rule {
        id: HPA_TARGET_MISSING,
        severity: Severity::Warning,
        description: "HorizontalPodAutoscaler scale target does not exist",
        check: checks::hpa_targets,
    },
    Rule {
        id: PDB_BLOCKS_EVICTION,
        severity: Severity::High,
        description: "PodDisruptionBudget allows no voluntary evictions",
        check: checks::pdb_evictions,
    },
    Rule {
        id: NETWORKPOLICY_SELECTOR_NO_MATCH,
        severity: Severity::Warning,
        description: "NetworkPolicy podSelector matches no pods in its namespace",
        check: checks::network_policy_selectors,
    },
];

pub fn find_rule(id: &str) -> Option<&'static Rule> {
    RULES.iter().find(|rule| rule.id == id)
}

/// Rule engine with per-run filtering
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    disabled: BTreeSet<String>,
    min_severity: Option<Severity>,
    namespace: Option<String>,
}

impl Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip a rule by id; unknown ids are ignored with a warning
    pub fn disable(mut self, rule_id: &str) -> Self {
        if find_rule(rule_id).is_none() {
            tracing::warn!("Ignoring unknown scan rule: {}", rule_id);
        }
        self.disabled.insert(rule_id.to_string());
        self
    }

    pub fn disable_all<I, S>(self, rule_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        rule_ids
            .into_iter()
            .fold(self, |scanner, id| scanner.disable(id.as_ref()))
    }

    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    /// Only report findings on objects in this namespace
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn is_enabled(&self, rule: &Rule) -> bool {
        !self.disabled.contains(rule.id)
            && self.min_severity.is_none_or(|min| rule.severity >= min)
    }

    /// Run every enabled rule
    ///
    /// Results are ordered by severity (highest first), then rule, then subject.
    pub fn scan(&self, index: &SnapshotIndex) -> Vec<Finding> {
        let mut findings: Vec<Finding> = RULES
            .iter()
            .filter(|rule| self.is_enabled(rule))
            .flat_map(|rule| {
                let found = (rule.check)(index, rule);
                tracing::debug!("Rule {} produced {} findings", rule.id, found.len());
                found
            })
            .filter(|f| {
                self.namespace
                    .as_deref()
                    .is_none_or(|ns| f.subject.namespace == ns)
            })
            .collect();

        findings.sort_by(|a, b| {
            (Reverse(a.severity), a.rule_id, &a.subject).cmp(&(
                Reverse(b.severity),
                b.rule_id,
                &b.subject,
            ))
        });
        findings
    }
}

/// Scan with every rule enabled
pub fn scan(index: &SnapshotIndex) -> Vec<Finding> {
    Scanner::default().scan(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order_and_parse() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::High < Severity::Critical);
        assert_eq!("WARN".parse::<Severity>(), Ok(Severity::Warning));
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn test_rule_ids_are_unique() {
        let ids: BTreeSet<&str> = RULES.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), RULES.len());
        assert!(find_rule(PDB_BLOCKS_EVICTION).is_some());
        assert!(find_rule("nope").is_none());
    }

    #[test]
    fn test_scanner_filters() {
        let hpa = find_rule(HPA_TARGET_MISSING).unwrap();
        let svc = find_rule(SERVICE_SELECTOR_NO_MATCH).unwrap();

        let scanner = Scanner::new().min_severity(Severity::High);
        assert!(!scanner.is_enabled(hpa));
        assert!(scanner.is_enabled(svc));

        let scanner = Scanner::new().disable(SERVICE_SELECTOR_NO_MATCH);
        assert!(!scanner.is_enabled(svc));
        assert!(scanner.is_enabled(hpa));
    }

    #[test]
    fn test_empty_snapshot_has_no_findings() {
        assert!(scan(&SnapshotIndex::default()).is_empty());
    }
}
