//! Pod classification and label-selector helpers.

use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde::{Deserialize, Serialize};

/// Node label carrying the placement zone.
pub const ZONE_LABEL: &str = "topology.kubernetes.io/zone";

/// Field selector restricting pod lists to running pods.
pub const RUNNING_PHASE_SELECTOR: &str = "status.phase=Running";

pub fn is_terminating(pod: &Pod) -> bool {
    pod.metadata.deletion_timestamp.is_some()
}

pub fn phase(pod: &Pod) -> Option<&str> {
    pod.status.as_ref().and_then(|s| s.phase.as_deref())
}

/// `Ready` condition is `True`.
pub fn is_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

pub fn node_name(pod: &Pod) -> Option<&str> {
    pod.spec
        .as_ref()
        .and_then(|s| s.node_name.as_deref())
        .filter(|n| !n.is_empty())
}

pub fn node_zone(node: &Node) -> Option<&str> {
    node.metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(ZONE_LABEL))
        .map(String::as_str)
        .filter(|z| !z.is_empty())
}

pub fn node_is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

/// Breakdown of a pod list used in rollout diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodCensus {
    pub total: u32,
    pub ready: u32,
    pub running_not_ready: u32,
    pub pending: u32,
    pub terminating: u32,
    pub names: Vec<String>,
}

impl PodCensus {
    pub fn from_pods(pods: &[Pod]) -> Self {
        let mut census = Self::default();
        for pod in pods {
            census.total += 1;
            census
                .names
                .push(pod.metadata.name.clone().unwrap_or_default());
            if is_terminating(pod) {
                census.terminating += 1;
                continue;
            }
            match phase(pod) {
                Some("Pending") => census.pending += 1,
                Some("Running") if is_ready(pod) => census.ready += 1,
                Some("Running") => census.running_not_ready += 1,
                _ => {}
            }
        }
        census
    }

    /// Pods not marked for deletion.
    pub const fn active(&self) -> u32 {
        self.total - self.terminating
    }
}

/// Render a label selector in the `key=value,key in (a,b)` list syntax.
pub fn format_label_selector(selector: &LabelSelector) -> String {
    let mut parts: Vec<String> = selector
        .match_labels
        .iter()
        .flatten()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();

    for expr in selector.match_expressions.iter().flatten() {
        let values = expr.values.clone().unwrap_or_default().join(",");
        let part = match expr.operator.as_str() {
            "In" => format!("{} in ({values})", expr.key),
            "NotIn" => format!("{} notin ({values})", expr.key),
            "Exists" => expr.key.clone(),
            "DoesNotExist" => format!("!{}", expr.key),
            other => format!("{} {other} ({values})", expr.key),
        };
        parts.push(part);
    }

    parts.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{PodCondition, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelectorRequirement, Time};
    use std::collections::BTreeMap;

    fn pod(name: &str, phase: &str, ready: bool, terminating: bool) -> Pod {
        let mut pod = Pod::default();
        pod.metadata.name = Some(name.to_string());
        if terminating {
            pod.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        }
        pod.status = Some(PodStatus {
            phase: Some(phase.to_string()),
            conditions: Some(vec![PodCondition {
                type_: "Ready".to_string(),
                status: if ready { "True" } else { "False" }.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        });
        pod
    }

    #[test]
    fn test_census_classification() {
        let pods = vec![
            pod("a", "Running", true, false),
            pod("b", "Running", false, false),
            pod("c", "Pending", false, false),
            pod("d", "Running", true, true),
        ];
        let census = PodCensus::from_pods(&pods);
        assert_eq!(census.total, 4);
        assert_eq!(census.ready, 1);
        assert_eq!(census.running_not_ready, 1);
        assert_eq!(census.pending, 1);
        assert_eq!(census.terminating, 1);
        assert_eq!(census.active(), 3);
        assert_eq!(census.names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_format_label_selector() {
        let selector = LabelSelector {
            match_labels: Some(BTreeMap::from([
                ("app".to_string(), "app".to_string()),
                ("component".to_string(), "web".to_string()),
            ])),
            match_expressions: Some(vec![
                LabelSelectorRequirement {
                    key: "tier".to_string(),
                    operator: "In".to_string(),
                    values: Some(vec!["a".to_string(), "b".to_string()]),
                },
                LabelSelectorRequirement {
                    key: "canary".to_string(),
                    operator: "DoesNotExist".to_string(),
                    values: None,
                },
            ]),
        };
        assert_eq!(
            format_label_selector(&selector),
            "app=app,component=web,tier in (a,b),!canary"
        );
    }
}
