//! Per-spot occupancy status.

use serde::Serialize;

/// Last known status of a spot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpotStatus {
    #[default]
    Unknown,
    Occupied,
    Empty,
}

impl SpotStatus {
    /// Maps a classifier verdict (true = occupied) to a status.
    pub fn from_verdict(occupied: bool) -> Self {
        if occupied {
            SpotStatus::Occupied
        } else {
            SpotStatus::Empty
        }
    }
}

/// Counts over an occupancy vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OccupancySummary {
    pub occupied: usize,
    /// Spots last classified as empty.
    pub available: usize,
    pub unknown: usize,
    pub total: usize,
}

impl OccupancySummary {
    pub fn from_statuses(statuses: &[SpotStatus]) -> Self {
        let mut summary = OccupancySummary {
            total: statuses.len(),
            ..OccupancySummary::default()
        };
        for status in statuses {
            match status {
                SpotStatus::Occupied => summary.occupied += 1,
                SpotStatus::Empty => summary.available += 1,
                SpotStatus::Unknown => summary.unknown += 1,
            }
        }
        summary
    }
}

/// Status vector for one session. Its length is fixed to the registry size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupancyState {
    statuses: Vec<SpotStatus>,
}

impl OccupancyState {
    pub fn new(spot_count: usize) -> Self {
        Self {
            statuses: vec![SpotStatus::Unknown; spot_count],
        }
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<SpotStatus> {
        self.statuses.get(index).copied()
    }

    /// Only the scheduler's classification step writes statuses. Returns true
    /// when the stored value changed.
    pub(crate) fn set(&mut self, index: usize, status: SpotStatus) -> bool {
        match self.statuses.get_mut(index) {
            Some(slot) if *slot != status => {
                *slot = status;
                true
            }
            _ => false,
        }
    }

    pub fn statuses(&self) -> &[SpotStatus] {
        &self.statuses
    }

    pub fn snapshot(&self) -> Vec<SpotStatus> {
        self.statuses.clone()
    }

    pub fn summary(&self) -> OccupancySummary {
        OccupancySummary::from_statuses(&self.statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown_with_fixed_length() {
        let state = OccupancyState::new(4);
        assert_eq!(state.len(), 4);
        assert!(state.statuses().iter().all(|s| *s == SpotStatus::Unknown));
        assert_eq!(state.get(4), None);
    }

    #[test]
    fn set_reports_changes_and_ignores_out_of_range() {
        let mut state = OccupancyState::new(2);
        assert!(state.set(0, SpotStatus::Occupied));
        assert!(!state.set(0, SpotStatus::Occupied));
        assert!(!state.set(7, SpotStatus::Empty));
        assert_eq!(state.len(), 2);
        assert_eq!(state.get(0), Some(SpotStatus::Occupied));
    }

    #[test]
    fn summary_counts_each_status() {
        let mut state = OccupancyState::new(5);
        state.set(0, SpotStatus::Occupied);
        state.set(1, SpotStatus::Empty);
        state.set(2, SpotStatus::Empty);
        let summary = state.summary();
        assert_eq!(
            summary,
            OccupancySummary {
                occupied: 1,
                available: 2,
                unknown: 2,
                total: 5
            }
        );
    }
}
