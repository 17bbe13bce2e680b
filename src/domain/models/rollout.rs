//! Rollout tolerances and status samples.

use std::fmt;
use std::str::FromStr;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::{Deserialize, Serialize};

use crate::domain::errors::ToleranceError;

/// A surge/unavailable tolerance: an absolute count or a percentage of the
/// desired replica count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntOrPercent {
    Count(u32),
    Percent(u32),
}

impl IntOrPercent {
    /// Absolute value for `desired` replicas. Percentages round up when
    /// `round_up` is set, down otherwise.
    pub fn scaled(self, desired: u32, round_up: bool) -> u32 {
        match self {
            Self::Count(n) => n,
            Self::Percent(p) => {
                let product = u64::from(desired) * u64::from(p);
                let value = if round_up {
                    product.div_ceil(100)
                } else {
                    product / 100
                };
                u32::try_from(value).unwrap_or(u32::MAX)
            }
        }
    }
}

impl FromStr for IntOrPercent {
    type Err = ToleranceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parse = |digits: &str| -> Result<u32, ToleranceError> {
            let value: i64 = digits
                .parse()
                .map_err(|_| ToleranceError::Invalid(s.to_string()))?;
            u32::try_from(value).map_err(|_| ToleranceError::Negative(value))
        };
        match trimmed.strip_suffix('%') {
            Some(digits) => parse(digits).map(Self::Percent),
            None => parse(trimmed).map(Self::Count),
        }
    }
}

impl TryFrom<&IntOrString> for IntOrPercent {
    type Error = ToleranceError;

    fn try_from(value: &IntOrString) -> Result<Self, Self::Error> {
        match value {
            IntOrString::Int(n) => u32::try_from(*n)
                .map(Self::Count)
                .map_err(|_| ToleranceError::Negative(i64::from(*n))),
            IntOrString::String(s) => s.parse(),
        }
    }
}

impl fmt::Display for IntOrPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Percent(p) => write!(f, "{p}%"),
        }
    }
}

/// Platform default for both tolerances of a rolling update.
pub const DEFAULT_TOLERANCE: IntOrPercent = IntOrPercent::Percent(25);

/// Tolerances resolved to absolute counts for a given desired replica count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutBounds {
    pub desired: u32,
    pub max_surge: u32,
    pub max_unavailable: u32,
}

impl RolloutBounds {
    /// Resolve tolerances the way the orchestration platform does:
    /// `max_surge` rounds up, `max_unavailable` rounds down, and when both
    /// resolve to zero one replica is allowed to be unavailable so the
    /// rollout can make progress.
    pub fn resolve(desired: u32, max_surge: IntOrPercent, max_unavailable: IntOrPercent) -> Self {
        let surge = max_surge.scaled(desired, true);
        let mut unavailable = max_unavailable.scaled(desired, false);
        if surge == 0 && unavailable == 0 {
            unavailable = 1;
        }
        Self {
            desired,
            max_surge: surge,
            max_unavailable: unavailable,
        }
    }

    /// Resolve from a deployment's rolling-update strategy, defaulting missing
    /// tolerances to 25%.
    pub fn from_deployment(deployment: &Deployment) -> Result<Self, ToleranceError> {
        let name = deployment.metadata.name.clone().unwrap_or_default();
        let spec = deployment
            .spec
            .as_ref()
            .ok_or_else(|| ToleranceError::MissingReplicas(name.clone()))?;
        let replicas = spec
            .replicas
            .ok_or(ToleranceError::MissingReplicas(name))?;
        let desired =
            u32::try_from(replicas).map_err(|_| ToleranceError::Negative(i64::from(replicas)))?;

        let rolling = spec
            .strategy
            .as_ref()
            .and_then(|s| s.rolling_update.as_ref());
        let surge = rolling
            .and_then(|r| r.max_surge.as_ref())
            .map(IntOrPercent::try_from)
            .transpose()?
            .unwrap_or(DEFAULT_TOLERANCE);
        let unavailable = rolling
            .and_then(|r| r.max_unavailable.as_ref())
            .map(IntOrPercent::try_from)
            .transpose()?
            .unwrap_or(DEFAULT_TOLERANCE);

        Ok(Self::resolve(desired, surge, unavailable))
    }

    /// Lowest acceptable count of available replicas.
    pub const fn availability_floor(&self) -> u32 {
        self.desired.saturating_sub(self.max_unavailable)
    }

    /// Highest acceptable total replica count.
    pub const fn surge_ceiling(&self) -> u32 {
        self.desired.saturating_add(self.max_surge)
    }
}

/// One observation of a rollout in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutSample {
    pub desired: u32,
    pub updated: u32,
    pub total: u32,
    pub available: u32,
    /// Running pods behind the workload, when the sampler lists them.
    pub running_pods: Option<u32>,
}

impl RolloutSample {
    pub const fn new(desired: u32, updated: u32, total: u32, available: u32) -> Self {
        Self {
            desired,
            updated,
            total,
            available,
            running_pods: None,
        }
    }

    #[must_use]
    pub const fn with_running_pods(mut self, running: u32) -> Self {
        self.running_pods = Some(running);
        self
    }

    /// Read counts from a deployment's spec and status.
    pub fn from_deployment(deployment: &Deployment) -> Self {
        let count = |v: Option<i32>| v.and_then(|n| u32::try_from(n).ok()).unwrap_or(0);
        let desired = count(deployment.spec.as_ref().and_then(|s| s.replicas));
        let status = deployment.status.as_ref();
        Self::new(
            desired,
            count(status.and_then(|s| s.updated_replicas)),
            count(status.and_then(|s| s.replicas)),
            count(status.and_then(|s| s.available_replicas)),
        )
    }

    /// Updated, total and available all equal the desired count.
    pub const fn is_complete(&self) -> bool {
        self.updated == self.desired && self.total == self.desired && self.available == self.desired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tolerance() {
        assert_eq!("25%".parse::<IntOrPercent>().unwrap(), IntOrPercent::Percent(25));
        assert_eq!("3".parse::<IntOrPercent>().unwrap(), IntOrPercent::Count(3));
        assert!(matches!(
            "abc".parse::<IntOrPercent>(),
            Err(ToleranceError::Invalid(_))
        ));
        assert_eq!(
            "-1".parse::<IntOrPercent>().unwrap_err(),
            ToleranceError::Negative(-1)
        );
    }

    #[test]
    fn test_percentages_round_per_field() {
        // 25% of 10 = 2.5: surge rounds up to 3, unavailable rounds down to 2.
        let bounds = RolloutBounds::resolve(10, IntOrPercent::Percent(25), IntOrPercent::Percent(25));
        assert_eq!(bounds.max_surge, 3);
        assert_eq!(bounds.max_unavailable, 2);
        assert_eq!(bounds.availability_floor(), 8);
        assert_eq!(bounds.surge_ceiling(), 13);
    }

    #[test]
    fn test_zero_unavailable_requires_full_availability() {
        let bounds = RolloutBounds::resolve(10, IntOrPercent::Count(1), IntOrPercent::Count(0));
        assert_eq!(bounds.availability_floor(), 10);
        assert_eq!(bounds.surge_ceiling(), 11);
    }

    #[test]
    fn test_both_zero_allows_one_unavailable() {
        let bounds = RolloutBounds::resolve(4, IntOrPercent::Percent(10), IntOrPercent::Count(0));
        // 10% of 4 rounds up to 1 surge, so unavailable stays 0.
        assert_eq!(bounds.max_unavailable, 0);

        let bounds = RolloutBounds::resolve(4, IntOrPercent::Count(0), IntOrPercent::Percent(10));
        assert_eq!(bounds.max_surge, 0);
        assert_eq!(bounds.max_unavailable, 1);
    }

    #[test]
    fn test_intorstring_conversion() {
        let v = IntOrPercent::try_from(&IntOrString::String("50%".to_string())).unwrap();
        assert_eq!(v, IntOrPercent::Percent(50));
        let v = IntOrPercent::try_from(&IntOrString::Int(2)).unwrap();
        assert_eq!(v, IntOrPercent::Count(2));
    }

    #[test]
    fn test_sample_completion_requires_all_three() {
        assert!(!RolloutSample::new(10, 10, 11, 10).is_complete());
        assert!(!RolloutSample::new(10, 10, 10, 9).is_complete());
        assert!(RolloutSample::new(10, 10, 10, 10).is_complete());
    }
}
