//! Run-dependent response corrections for known weak barrel regions.
//!
//! Two HB- wedges (iphi 6 and iphi 32) lost part of their response. The
//! energy scale is restored by a factor that moves smoothly from a low-energy
//! to a high-energy response along a logistic curve in energy.

use calreco_core::{ChannelId, RunContext, Subdetector};

/// First run in which the iphi 6 wedge no longer needs a correction.
pub const IPHI6_RECOVERY_RUN: u32 = 216_091;

/// Energy above which the high-energy response is used directly.
const HIGH_ENERGY_LIMIT: f64 = 100.0;

const LOW32: [f64; 7] = [0.741, 0.721, 0.730, 0.698, 0.708, 0.751, 0.861];
const HIGH32: [f64; 7] = [0.973, 0.925, 0.900, 0.897, 0.950, 0.935, 1.0];
const LOW6: [f64; 15] = [
    0.635, 0.623, 0.670, 0.633, 0.644, 0.648, 0.600, 0.570, 0.595, 0.554, 0.505, 0.513, 0.515,
    0.561, 0.579,
];
const HIGH6: [f64; 15] = [
    0.875, 0.937, 0.942, 0.900, 0.922, 0.925, 0.901, 0.850, 0.852, 0.818, 0.731, 0.718, 0.670,
    0.806, 0.870,
];

struct Region {
    low: &'static [f64],
    high: &'static [f64],
    slope: f64,
    mid_offset: f64,
    mid_per_ieta: f64,
}

const IPHI32: Region = Region {
    low: &LOW32,
    high: &HIGH32,
    slope: 0.2272,
    mid_offset: 17.14,
    mid_per_ieta: 0.7147,
};

const IPHI6: Region = Region {
    low: &LOW6,
    high: &HIGH6,
    slope: 0.1956,
    mid_offset: 15.96,
    mid_per_ieta: 0.3075,
};

/// Response correction for an HB- cell.
///
/// Returns 1 for cells outside the two affected wedges, or for the iphi 6
/// wedge from run [`IPHI6_RECOVERY_RUN`] on.
#[must_use]
pub fn hb_minus_special_correction(ieta: i32, iphi: u32, energy: f64, run: u32) -> f64 {
    let region = match iphi {
        6 if run < IPHI6_RECOVERY_RUN => &IPHI6,
        32 => &IPHI32,
        _ => return 1.0,
    };
    if ieta >= 0 {
        return 1.0;
    }
    let jeta = (ieta.unsigned_abs() - 1) as usize;
    let (Some(&low), Some(&high)) = (region.low.get(jeta), region.high.get(jeta)) else {
        return 1.0;
    };

    let en = energy.max(0.0);
    if en > HIGH_ENERGY_LIMIT {
        return high;
    }
    let mid = region.mid_offset + region.mid_per_ieta * f64::from(ieta);
    low + (high - low) / (1.0 + (-(en - mid) * region.slope).exp())
}

/// Switch and dispatch for the special corrections.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpecialCorrections {
    /// Apply the corrections at all.
    pub enabled: bool,
}

impl SpecialCorrections {
    /// Enabled or disabled rules.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Multiplicative factor for a hit of `energy` in channel `id`.
    ///
    /// 1 when disabled, for simulation, without a positive run number, or
    /// outside the barrel.
    #[must_use]
    pub fn factor(&self, id: ChannelId, energy: f64, run: &RunContext) -> f64 {
        if !self.enabled {
            return 1.0;
        }
        let Some(run_number) = run.data_run() else {
            return 1.0;
        };
        if id.subdet() != Some(Subdetector::Barrel) {
            return 1.0;
        }
        hb_minus_special_correction(id.ieta(), id.iphi(), energy, run_number)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_outside_regions() {
        assert_eq!(hb_minus_special_correction(-3, 7, 10.0, 200_000), 1.0);
        assert_eq!(hb_minus_special_correction(3, 32, 10.0, 200_000), 1.0);
        // iphi 32 covers ieta -1..-7 only.
        assert_eq!(hb_minus_special_correction(-8, 32, 10.0, 200_000), 1.0);
        assert_eq!(hb_minus_special_correction(-16, 6, 10.0, 200_000), 1.0);
    }

    #[test]
    fn test_extreme_ieta() {
        for iphi in [6, 32] {
            assert_eq!(hb_minus_special_correction(i32::MIN, iphi, 10.0, 200_000), 1.0);
            assert_eq!(hb_minus_special_correction(i32::MAX, iphi, 10.0, 200_000), 1.0);
        }
        assert_eq!(hb_minus_special_correction(-15, 6, 500.0, 200_000), 0.870);
    }

    #[test]
    fn test_iphi6_run_range() {
        assert!(hb_minus_special_correction(-5, 6, 10.0, IPHI6_RECOVERY_RUN - 1) < 1.0);
        assert_eq!(hb_minus_special_correction(-5, 6, 10.0, IPHI6_RECOVERY_RUN), 1.0);
        // iphi 32 stays corrected.
        assert!(hb_minus_special_correction(-5, 32, 10.0, 300_000) < 1.0);
    }

    #[test]
    fn test_high_energy_uses_high_response() {
        assert_eq!(hb_minus_special_correction(-1, 32, 150.0, 250_000), 0.973);
        assert_eq!(hb_minus_special_correction(-7, 32, 101.0, 250_000), 1.0);
        assert_eq!(hb_minus_special_correction(-15, 6, 500.0, 200_000), 0.870);
    }

    #[test]
    fn test_logistic_midpoint() {
        // At the midpoint the factor is halfway between low and high.
        let ieta = -2;
        let mid = 17.14 + 0.7147 * f64::from(ieta);
        let f = hb_minus_special_correction(ieta, 32, mid, 250_000);
        assert_relative_eq!(f, (0.721 + 0.925) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_negative_energy_treated_as_zero() {
        let zero = hb_minus_special_correction(-3, 6, 0.0, 200_000);
        let negative = hb_minus_special_correction(-3, 6, -20.0, 200_000);
        assert_eq!(zero, negative);
        assert!(zero > 0.670 && zero < 0.942);
    }

    #[test]
    fn test_factor_monotonic_in_energy() {
        let mut prev = 0.0;
        for i in 0..=100 {
            let f = hb_minus_special_correction(-4, 32, f64::from(i), 250_000);
            assert!(f >= prev);
            prev = f;
        }
    }

    #[test]
    fn test_factor_dispatch() {
        let id = ChannelId::new(Subdetector::Barrel, -1, 32, 1).unwrap();
        let run = RunContext::data(250_000);
        let on = SpecialCorrections::new(true);
        assert_eq!(on.factor(id, 150.0, &run), 0.973);
        assert_eq!(on.factor(id, 150.0, &RunContext::simulation()), 1.0);
        assert_eq!(on.factor(id, 150.0, &RunContext::data(0)), 1.0);
        assert_eq!(SpecialCorrections::default().factor(id, 150.0, &run), 1.0);

        let endcap = ChannelId::new(Subdetector::Endcap, -1, 32, 1).unwrap();
        assert_eq!(on.factor(endcap, 150.0, &run), 1.0);
    }
}
