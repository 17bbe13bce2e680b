//! Zone placement model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Where one entity (pod) landed. `zone` is `None` until the entity is
/// scheduled onto a node carrying a zone label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub entity: String,
    pub zone: Option<String>,
}

impl Placement {
    pub fn new(entity: impl Into<String>, zone: Option<impl Into<String>>) -> Self {
        Self {
            entity: entity.into(),
            zone: zone.map(Into::into),
        }
    }
}

/// Entity count per zone, built fresh from one placement snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDistribution {
    counts: BTreeMap<String, usize>,
}

impl ZoneDistribution {
    pub(crate) const fn from_counts(counts: BTreeMap<String, usize>) -> Self {
        Self { counts }
    }

    pub const fn counts(&self) -> &BTreeMap<String, usize> {
        &self.counts
    }

    /// Number of populated zones.
    pub fn zones(&self) -> usize {
        self.counts.len()
    }

    /// Entities with an assigned zone.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn max_count(&self) -> Option<usize> {
        self.counts.values().copied().max()
    }

    pub fn min_count(&self) -> Option<usize> {
        self.counts.values().copied().min()
    }
}
