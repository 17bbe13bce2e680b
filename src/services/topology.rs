//! Topology skew calculator.
//!
//! Pure functions over `(entity, zone)` placements. Entities without a zone
//! are left out of the distribution entirely; they are not a bucket of their
//! own. Skew is `max - min` over populated zones and is undefined when no
//! zone is populated.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::errors::SkewError;
use crate::domain::models::{invariant, Check, Invariant, Placement, ZoneDistribution};

/// Count entities per zone.
pub fn distribution<'a>(placements: impl IntoIterator<Item = &'a Placement>) -> ZoneDistribution {
    let mut counts = BTreeMap::new();
    for zone in placements.into_iter().filter_map(|p| p.zone.as_deref()) {
        *counts.entry(zone.to_string()).or_insert(0) += 1;
    }
    ZoneDistribution::from_counts(counts)
}

pub fn skew(distribution: &ZoneDistribution) -> Result<usize, SkewError> {
    match (distribution.max_count(), distribution.min_count()) {
        (Some(max), Some(min)) => Ok(max - min),
        _ => Err(SkewError::NoPopulatedZones),
    }
}

/// Distribution and skew of one placement snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkewReport {
    pub distribution: ZoneDistribution,
    pub skew: usize,
    /// Entities that had no zone and were left out.
    pub unplaced: usize,
}

impl SkewReport {
    pub fn from_placements(placements: &[Placement]) -> Result<Self, SkewError> {
        let distribution = distribution(placements);
        let skew = skew(&distribution)?;
        Ok(Self {
            unplaced: placements.iter().filter(|p| p.zone.is_none()).count(),
            distribution,
            skew,
        })
    }

    pub const fn within(&self, max_skew: usize) -> bool {
        self.skew <= max_skew
    }
}

/// Invariant: skew across populated zones never exceeds `max_skew`.
///
/// A snapshot with no populated zone breaks the invariant, since the
/// property cannot be shown to hold.
pub fn max_skew_invariant<S, F>(max_skew: usize, placements: F) -> impl Invariant<S>
where
    F: Fn(&S) -> Vec<Placement> + Send + Sync,
{
    invariant(format!("zone skew <= {max_skew}"), move |sample: &S| {
        let placements = placements(sample);
        match SkewReport::from_placements(&placements) {
            Ok(report) => Check::ensure(report.within(max_skew), || {
                format!("skew {} across {:?}", report.skew, report.distribution.counts())
            }),
            Err(err) => Check::broken(err.to_string()),
        }
    })
}

/// Entities of `dependents` that landed in a zone occupied by any of
/// `occupants`. Unzoned entities on either side are ignored.
pub fn zone_collisions<'a>(occupants: &[Placement], dependents: &'a [Placement]) -> Vec<&'a Placement> {
    let occupied: BTreeSet<&str> = occupants.iter().filter_map(|p| p.zone.as_deref()).collect();
    dependents
        .iter()
        .filter(|p| p.zone.as_deref().is_some_and(|z| occupied.contains(z)))
        .collect()
}

/// Invariant form of [`zone_collisions`].
pub fn zone_separation_invariant<S, F>(split: F) -> impl Invariant<S>
where
    F: Fn(&S) -> (Vec<Placement>, Vec<Placement>) + Send + Sync,
{
    invariant("zone separation", move |sample: &S| {
        let (occupants, dependents) = split(sample);
        let collisions = zone_collisions(&occupants, &dependents);
        Check::ensure(collisions.is_empty(), || {
            let names: Vec<String> = collisions
                .iter()
                .map(|p| format!("{}@{}", p.entity, p.zone.as_deref().unwrap_or_default()))
                .collect();
            format!("dependents in occupied zones: {}", names.join(", "))
        })
    })
}
