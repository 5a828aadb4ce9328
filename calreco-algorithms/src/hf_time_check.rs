//! Forward calorimeter anode combination with a rise-time cut.
//!
//! Each forward channel has two anodes. An anode passes when its TDC rise
//! time lies inside that anode's window. The combination of the two anode
//! states selects a pair of energy weights from a 3x3x2 table.

use calreco_core::{ConfigError, HfPreHit, HfRecHit};

/// Number of anode states.
pub const N_ANODE_STATES: usize = 3;

/// Anode state used to index the weight table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnodeState {
    /// No data for the anode.
    NotPresent = 0,
    /// Rise time outside the window.
    FailsTimingCut = 1,
    /// Rise time inside the window.
    PassesTimingCut = 2,
}

/// Energy weights indexed by `[state of anode 0][state of anode 1][anode]`.
pub type EnergyWeights = [[[f32; 2]; N_ANODE_STATES]; N_ANODE_STATES];

/// Rise-time windows `(min, max)` for the two anodes, inclusive.
pub type TimeLimits = [(f32, f32); 2];

/// Combines the two anodes of a forward channel into one hit.
#[derive(Clone, Debug, PartialEq)]
pub struct HfSimpleTimeCheck {
    tlimits: TimeLimits,
    energy_weights: EnergyWeights,
}

impl Default for HfSimpleTimeCheck {
    /// Accept every rise time; sum both anodes when both pass, double a
    /// single passing anode otherwise.
    fn default() -> Self {
        let weights = [
            0.0, 0.0, 0.0, 0.0, 0.0, 2.0, //
            0.0, 0.0, 0.0, 0.0, 0.0, 2.0, //
            2.0, 0.0, 2.0, 0.0, 1.0, 1.0,
        ];
        Self {
            tlimits: [(-1000.0, 1000.0), (-1000.0, 1000.0)],
            energy_weights: unflatten_weights(&weights),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn unflatten_weights(flat: &[f64; 18]) -> EnergyWeights {
    let mut weights = [[[0.0_f32; 2]; N_ANODE_STATES]; N_ANODE_STATES];
    for (i, &w) in flat.iter().enumerate() {
        weights[i / 6][(i / 2) % 3][i % 2] = w as f32;
    }
    weights
}

impl HfSimpleTimeCheck {
    /// Creates the algorithm from explicit tables.
    #[must_use]
    pub fn new(tlimits: TimeLimits, energy_weights: EnergyWeights) -> Self {
        Self {
            tlimits,
            energy_weights,
        }
    }

    /// Creates the algorithm from flat parameter arrays.
    ///
    /// `tlimits` holds `min0, max0, min1, max1`; `energy_weights` is the
    /// row-major flattening of the 3x3x2 table.
    ///
    /// # Errors
    /// Returns [`ConfigError::WrongLength`] unless the arrays have 4 and 18
    /// elements.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_flat(tlimits: &[f64], energy_weights: &[f64]) -> Result<Self, ConfigError> {
        let limits: &[f64; 4] = tlimits.try_into().map_err(|_| ConfigError::WrongLength {
            name: "tlimits".to_string(),
            expected: 4,
            found: tlimits.len(),
        })?;
        let weights: &[f64; 18] =
            energy_weights
                .try_into()
                .map_err(|_| ConfigError::WrongLength {
                    name: "energyWeights".to_string(),
                    expected: 18,
                    found: energy_weights.len(),
                })?;
        Ok(Self::new(
            [
                (limits[0] as f32, limits[1] as f32),
                (limits[2] as f32, limits[3] as f32),
            ],
            unflatten_weights(weights),
        ))
    }

    /// Rise-time windows.
    #[must_use]
    pub fn tlimits(&self) -> &TimeLimits {
        &self.tlimits
    }

    /// Weight table.
    #[must_use]
    pub fn energy_weights(&self) -> &EnergyWeights {
        &self.energy_weights
    }

    /// State of anode `i` of `prehit`.
    #[must_use]
    pub fn anode_state(&self, prehit: &HfPreHit, i: usize) -> AnodeState {
        match (prehit.anode(i), self.tlimits.get(i)) {
            (Some(anode), Some(&(min, max))) => {
                if min <= anode.time_rising && anode.time_rising <= max {
                    AnodeState::PassesTimingCut
                } else {
                    AnodeState::FailsTimingCut
                }
            }
            _ => AnodeState::NotPresent,
        }
    }

    /// Combines the anodes of `prehit`.
    ///
    /// Returns a hit with a null id when neither anode passes the cut.
    #[must_use]
    pub fn reconstruct(&self, prehit: &HfPreHit) -> HfRecHit {
        let states = [self.anode_state(prehit, 0), self.anode_state(prehit, 1)];
        if !states.contains(&AnodeState::PassesTimingCut) {
            return HfRecHit::default();
        }

        let weights = &self.energy_weights[states[0] as usize][states[1] as usize];
        let mut energy = 0.0_f32;
        let mut time = 0.0_f32;
        let mut time_falling = 0.0_f32;
        let mut weight_sum = 0.0_f32;
        for (i, weight) in weights.iter().enumerate() {
            let Some(anode) = prehit.anode(i) else {
                continue;
            };
            let weighted = weight * anode.energy;
            energy += weighted;
            if weighted > 0.0 {
                weight_sum += weighted;
                time += anode.time_rising * weighted;
                time_falling += anode.time_falling * weighted;
            }
        }
        if weight_sum > 0.0 {
            time /= weight_sum;
            time_falling /= weight_sum;
        }
        HfRecHit::new(prehit.id, energy, time, time_falling)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_relative_eq;
    use calreco_core::{ChannelId, HfAnodeInfo, Subdetector};

    fn id() -> ChannelId {
        ChannelId::new(Subdetector::Forward, 30, 1, 1).unwrap()
    }

    fn anode(energy: f32, rise: f32, fall: f32) -> Option<HfAnodeInfo> {
        Some(HfAnodeInfo {
            energy,
            time_rising: rise,
            time_falling: fall,
        })
    }

    fn strict() -> HfSimpleTimeCheck {
        let weights = *HfSimpleTimeCheck::default().energy_weights();
        HfSimpleTimeCheck::new([(0.0, 10.0), (0.0, 10.0)], weights)
    }

    #[test]
    fn test_flat_layout() {
        let algo = HfSimpleTimeCheck::default();
        let w = algo.energy_weights();
        assert_eq!(w[0][2], [0.0, 2.0]);
        assert_eq!(w[2][0], [2.0, 0.0]);
        assert_eq!(w[2][2], [1.0, 1.0]);
        assert_eq!(w[1][1], [0.0, 0.0]);
    }

    #[test]
    fn test_wrong_lengths() {
        let err = HfSimpleTimeCheck::from_flat(&[0.0; 3], &[0.0; 18]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::WrongLength {
                name: "tlimits".to_string(),
                expected: 4,
                found: 3
            }
        );
        let err = HfSimpleTimeCheck::from_flat(&[0.0; 4], &[0.0; 17]).unwrap_err();
        assert!(matches!(err, ConfigError::WrongLength { expected: 18, found: 17, .. }));
    }

    #[test]
    fn test_both_pass() {
        let algo = strict();
        let prehit = HfPreHit::new(id(), anode(10.0, 2.0, 8.0), anode(30.0, 6.0, 12.0));
        let hit = algo.reconstruct(&prehit);
        assert_eq!(hit.id, id());
        assert_eq!(hit.energy, 40.0);
        assert_relative_eq!(hit.time, 5.0);
        assert_relative_eq!(hit.time_falling, 11.0);
    }

    #[test]
    fn test_one_fails() {
        let algo = strict();
        let prehit = HfPreHit::new(id(), anode(10.0, 2.0, 8.0), anode(30.0, 60.0, 70.0));
        assert_eq!(algo.anode_state(&prehit, 1), AnodeState::FailsTimingCut);
        let hit = algo.reconstruct(&prehit);
        assert_eq!(hit.energy, 20.0);
        assert_eq!(hit.time, 2.0);
        assert_eq!(hit.time_falling, 8.0);
    }

    #[test]
    fn test_single_anode_present() {
        let algo = strict();
        let prehit = HfPreHit::new(id(), None, anode(5.0, 3.0, 9.0));
        assert_eq!(algo.anode_state(&prehit, 0), AnodeState::NotPresent);
        let hit = algo.reconstruct(&prehit);
        assert_eq!(hit.energy, 10.0);
        assert_eq!(hit.time, 3.0);
    }

    #[test]
    fn test_none_pass_gives_null_hit() {
        let algo = strict();
        let prehit = HfPreHit::new(id(), anode(10.0, -5.0, 8.0), anode(30.0, 60.0, 70.0));
        assert!(algo.reconstruct(&prehit).id.is_null());
        let empty = HfPreHit::new(id(), None, None);
        assert!(algo.reconstruct(&empty).id.is_null());
    }

    #[test]
    fn test_limits_inclusive() {
        let algo = strict();
        let prehit = HfPreHit::new(id(), anode(1.0, 10.0, 0.0), anode(1.0, 0.0, 0.0));
        assert_eq!(algo.anode_state(&prehit, 0), AnodeState::PassesTimingCut);
        assert_eq!(algo.anode_state(&prehit, 1), AnodeState::PassesTimingCut);
    }

    #[test]
    fn test_zero_energy_time_is_zero() {
        let algo = strict();
        let prehit = HfPreHit::new(id(), anode(0.0, 2.0, 8.0), anode(-1.0, 5.0, 9.0));
        let hit = algo.reconstruct(&prehit);
        assert_eq!(hit.id, id());
        assert_eq!(hit.energy, -1.0);
        assert_eq!(hit.time, 0.0);
        assert_eq!(hit.time_falling, 0.0);
    }
}
