//! Run-scoped calibration constants.

use crate::channel::ChannelId;
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of rotating capacitors per QIE channel.
pub const N_CAPIDS: usize = 4;

/// Per-channel overrides of the algorithm's containment defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecoParams {
    /// Whether to apply the pulse containment correction.
    pub correct_for_phase_containment: bool,
    /// Pulse phase (ns) used by the containment correction.
    pub correction_phase_ns: f32,
}

/// Calibration constants for a single channel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelCalibration {
    /// Pedestal (fC) for each CAPID.
    pub pedestals: [f64; N_CAPIDS],
    /// fC to energy conversion factor for each CAPID.
    pub gains: [f64; N_CAPIDS],
    /// Time calibration constant (ns), subtracted from the reconstructed time.
    #[cfg_attr(feature = "serde", serde(default))]
    pub time_corr: f32,
    /// Optional per-channel reconstruction overrides.
    #[cfg_attr(feature = "serde", serde(default))]
    pub reco_params: Option<RecoParams>,
}

impl Default for ChannelCalibration {
    /// Zero pedestals, unit gains, no time correction.
    fn default() -> Self {
        Self {
            pedestals: [0.0; N_CAPIDS],
            gains: [1.0; N_CAPIDS],
            time_corr: 0.0,
            reco_params: None,
        }
    }
}

impl ChannelCalibration {
    /// Pedestal for the given CAPID (taken modulo 4).
    #[inline]
    #[must_use]
    pub fn pedestal(&self, capid: usize) -> f64 {
        self.pedestals[capid % N_CAPIDS]
    }

    /// Gain for the given CAPID (taken modulo 4).
    #[inline]
    #[must_use]
    pub fn gain(&self, capid: usize) -> f64 {
        self.gains[capid % N_CAPIDS]
    }

    /// Sets the time correction.
    #[must_use]
    pub fn with_time_corr(mut self, time_corr: f32) -> Self {
        self.time_corr = time_corr;
        self
    }

    /// Sets the per-channel reconstruction overrides.
    #[must_use]
    pub fn with_reco_params(mut self, params: RecoParams) -> Self {
        self.reco_params = Some(params);
        self
    }
}

/// Source of per-channel calibration constants for the current run.
pub trait CalibrationProvider: Send + Sync {
    /// Returns the calibration for `id`.
    fn calibration(&self, id: ChannelId) -> ChannelCalibration;
}

/// In-memory calibration table keyed by channel id.
///
/// Channels without an entry get the table's fallback record.
#[derive(Debug, Clone, Default)]
pub struct CalibrationTable {
    entries: HashMap<ChannelId, ChannelCalibration>,
    fallback: ChannelCalibration,
}

impl CalibrationTable {
    /// Creates an empty table with the default fallback.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the record returned for channels without an entry.
    #[must_use]
    pub fn with_fallback(mut self, fallback: ChannelCalibration) -> Self {
        self.fallback = fallback;
        self
    }

    /// Adds or replaces the entry for `id`.
    pub fn insert(&mut self, id: ChannelId, calibration: ChannelCalibration) {
        self.entries.insert(id, calibration);
    }

    /// Number of explicit entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table has no explicit entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if `id` has an explicit entry.
    #[must_use]
    pub fn contains(&self, id: ChannelId) -> bool {
        self.entries.contains_key(&id)
    }
}

impl FromIterator<(ChannelId, ChannelCalibration)> for CalibrationTable {
    fn from_iter<I: IntoIterator<Item = (ChannelId, ChannelCalibration)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            fallback: ChannelCalibration::default(),
        }
    }
}

impl CalibrationProvider for CalibrationTable {
    fn calibration(&self, id: ChannelId) -> ChannelCalibration {
        match self.entries.get(&id) {
            Some(calib) => *calib,
            None => {
                log::trace!("no calibration for {id}, using fallback");
                self.fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::channel::Subdetector;

    #[test]
    fn test_capid_lookup_wraps() {
        let calib = ChannelCalibration {
            pedestals: [1.0, 2.0, 3.0, 4.0],
            gains: [0.1, 0.2, 0.3, 0.4],
            ..ChannelCalibration::default()
        };
        assert_eq!(calib.pedestal(1), 2.0);
        assert_eq!(calib.pedestal(5), 2.0);
        assert_eq!(calib.gain(3), 0.4);
        assert_eq!(calib.gain(7), 0.4);
    }

    #[test]
    fn test_table_fallback() {
        let id = ChannelId::new(Subdetector::Barrel, 1, 1, 1).unwrap();
        let other = ChannelId::new(Subdetector::Barrel, 2, 1, 1).unwrap();

        let mut table = CalibrationTable::new()
            .with_fallback(ChannelCalibration::default().with_time_corr(-1.0));
        table.insert(id, ChannelCalibration::default().with_time_corr(3.5));

        assert_eq!(table.len(), 1);
        assert!(table.contains(id));
        assert_eq!(table.calibration(id).time_corr, 3.5);
        assert_eq!(table.calibration(other).time_corr, -1.0);
    }
}
