//! Event-level noise filter decision.
//!
//! Cuts on the per-event noise summary. The pulse-shape based flags can be
//! overridden by a good jet in the region with reduced bias voltage, where
//! those flags fire falsely more often.

use calreco_core::{ConfigError, Error, ParameterSet, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-event summary of noise indicators.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NoiseSummary {
    pub min_e2_over_e10: f64,
    pub max_e2_over_e10: f64,
    pub max_hpd_hits: i32,
    pub max_rbx_hits: i32,
    pub max_hpd_no_other_hits: i32,
    pub max_zeros: i32,
    /// Earliest time of a hit above 25 GeV (ns).
    pub min_25gev_hit_time: f64,
    /// Latest time of a hit above 25 GeV (ns).
    pub max_25gev_hit_time: f64,
    pub min_rbx_emf: f64,
    pub num_isolated_noise_channels: i32,
    pub isolated_noise_sum_e: f64,
    pub isolated_noise_sum_et: f64,
    pub has_bad_rbx_ts4ts5: bool,
    pub has_bad_rbx_rechit_r45_loose: bool,
    pub has_bad_rbx_rechit_r45_tight: bool,
}

/// Reconstructed jet, reduced to what the filter needs.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Jet {
    pub eta: f64,
    pub phi: f64,
    pub neutral_hadron_fraction: f64,
}

impl Jet {
    /// True inside `0 < eta < 1.4`, `-1.8 < phi < -1.4`.
    #[must_use]
    pub fn in_low_bias_region(&self) -> bool {
        self.eta > 0.0 && self.eta < 1.4 && self.phi > -1.8 && self.phi < -1.4
    }
}

/// Thresholds of the noise filter.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NoiseFilterConfig {
    pub min_ratio: f64,
    pub max_ratio: f64,
    pub min_hpd_hits: i32,
    pub min_rbx_hits: i32,
    pub min_hpd_no_other_hits: i32,
    pub min_zeros: i32,
    pub min_high_e_hit_time: f64,
    pub max_high_e_hit_time: f64,
    pub max_rbx_emf: f64,
    pub min_num_isolated_noise_channels: i32,
    pub min_isolated_noise_sum_e: f64,
    pub min_isolated_noise_sum_et: f64,
    pub use_ts4ts5: bool,
    pub use_rbx_rechit_r45_loose: bool,
    pub use_rbx_rechit_r45_tight: bool,
    /// Let a good jet in the low bias region veto the pulse-shape flags.
    pub ignore_ts4ts5_if_jet_in_low_bv_region: bool,
    /// Index of the last jet inspected.
    pub max_jet_index: i32,
    /// Neutral hadron fraction limit for a good jet; negative accepts all.
    pub max_nhf: f64,
}

impl Default for NoiseFilterConfig {
    fn default() -> Self {
        Self {
            min_ratio: -999.0,
            max_ratio: 999.0,
            min_hpd_hits: 17,
            min_rbx_hits: 999,
            min_hpd_no_other_hits: 10,
            min_zeros: 10,
            min_high_e_hit_time: -9999.0,
            max_high_e_hit_time: 9999.0,
            max_rbx_emf: -999.0,
            min_num_isolated_noise_channels: 10,
            min_isolated_noise_sum_e: 50.0,
            min_isolated_noise_sum_et: 25.0,
            use_ts4ts5: true,
            use_rbx_rechit_r45_loose: false,
            use_rbx_rechit_r45_tight: false,
            ignore_ts4ts5_if_jet_in_low_bv_region: true,
            max_jet_index: 0,
            max_nhf: 0.9,
        }
    }
}

impl NoiseFilterConfig {
    /// Reads thresholds from `ps`; absent parameters keep their defaults.
    ///
    /// # Errors
    /// A parameter that is present with the wrong type.
    pub fn from_parameter_set(ps: &ParameterSet) -> std::result::Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            min_ratio: ps.get_double_or("minRatio", d.min_ratio)?,
            max_ratio: ps.get_double_or("maxRatio", d.max_ratio)?,
            min_hpd_hits: ps.get_i32_or("minHPDHits", d.min_hpd_hits)?,
            min_rbx_hits: ps.get_i32_or("minRBXHits", d.min_rbx_hits)?,
            min_hpd_no_other_hits: ps.get_i32_or("minHPDNoOtherHits", d.min_hpd_no_other_hits)?,
            min_zeros: ps.get_i32_or("minZeros", d.min_zeros)?,
            min_high_e_hit_time: ps.get_double_or("minHighEHitTime", d.min_high_e_hit_time)?,
            max_high_e_hit_time: ps.get_double_or("maxHighEHitTime", d.max_high_e_hit_time)?,
            max_rbx_emf: ps.get_double_or("maxRBXEMF", d.max_rbx_emf)?,
            min_num_isolated_noise_channels: ps.get_i32_or(
                "minNumIsolatedNoiseChannels",
                d.min_num_isolated_noise_channels,
            )?,
            min_isolated_noise_sum_e: ps
                .get_double_or("minIsolatedNoiseSumE", d.min_isolated_noise_sum_e)?,
            min_isolated_noise_sum_et: ps
                .get_double_or("minIsolatedNoiseSumEt", d.min_isolated_noise_sum_et)?,
            use_ts4ts5: ps.get_bool_or("useTS4TS5", d.use_ts4ts5)?,
            use_rbx_rechit_r45_loose: ps
                .get_bool_or("useRBXRechitR45Loose", d.use_rbx_rechit_r45_loose)?,
            use_rbx_rechit_r45_tight: ps
                .get_bool_or("useRBXRechitR45Tight", d.use_rbx_rechit_r45_tight)?,
            ignore_ts4ts5_if_jet_in_low_bv_region: ps.get_bool_or(
                "IgnoreTS4TS5ifJetInLowBVRegion",
                d.ignore_ts4ts5_if_jet_in_low_bv_region,
            )?,
            max_jet_index: ps.get_i32_or("maxjetindex", d.max_jet_index)?,
            max_nhf: ps.get_double_or("maxNHF", d.max_nhf)?,
        })
    }
}

/// Pass/fail decision for one event.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NoiseFilter {
    config: NoiseFilterConfig,
}

impl NoiseFilter {
    /// Creates a filter with the given thresholds.
    #[must_use]
    pub fn new(config: NoiseFilterConfig) -> Self {
        Self { config }
    }

    /// Active thresholds.
    #[must_use]
    pub fn config(&self) -> &NoiseFilterConfig {
        &self.config
    }

    /// True if one of the first `max_jet_index + 1` jets is a good jet in the
    /// low bias region. An absent collection finds none.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn good_jet_in_low_bv_region(&self, jets: Option<&[Jet]>) -> bool {
        let Some(jets) = jets else {
            return false;
        };
        let take = if self.config.max_jet_index < 0 {
            0
        } else {
            self.config.max_jet_index as usize + 1
        };
        jets.iter().take(take).any(|jet| {
            jet.in_low_bias_region()
                && (self.config.max_nhf < 0.0 || jet.neutral_hadron_fraction < self.config.max_nhf)
        })
    }

    /// Evaluates the filter. `true` means the event is kept.
    ///
    /// # Errors
    /// Returns [`Error::MissingInput`] when the noise summary is absent.
    pub fn passes(&self, summary: Option<&NoiseSummary>, jets: Option<&[Jet]>) -> Result<bool> {
        let summary = summary.ok_or_else(|| Error::MissingInput("noise summary".to_string()))?;
        let c = &self.config;

        let good_jet =
            c.ignore_ts4ts5_if_jet_in_low_bv_region && self.good_jet_in_low_bv_region(jets);
        if c.ignore_ts4ts5_if_jet_in_low_bv_region && jets.is_none() {
            log::debug!("no jet collection, low bias region not treated specially");
        }

        let fail = summary.min_e2_over_e10 < c.min_ratio
            || summary.max_e2_over_e10 > c.max_ratio
            || summary.max_hpd_hits >= c.min_hpd_hits
            || summary.max_rbx_hits >= c.min_rbx_hits
            || summary.max_hpd_no_other_hits >= c.min_hpd_no_other_hits
            || summary.max_zeros >= c.min_zeros
            || summary.min_25gev_hit_time < c.min_high_e_hit_time
            || summary.max_25gev_hit_time > c.max_high_e_hit_time
            || summary.min_rbx_emf < c.max_rbx_emf
            || summary.num_isolated_noise_channels >= c.min_num_isolated_noise_channels
            || summary.isolated_noise_sum_e >= c.min_isolated_noise_sum_e
            || summary.isolated_noise_sum_et >= c.min_isolated_noise_sum_et
            || (c.use_ts4ts5 && summary.has_bad_rbx_ts4ts5 && !good_jet)
            || (c.use_rbx_rechit_r45_loose && summary.has_bad_rbx_rechit_r45_loose && !good_jet)
            || (c.use_rbx_rechit_r45_tight && summary.has_bad_rbx_rechit_r45_tight && !good_jet);
        Ok(!fail)
    }
}
