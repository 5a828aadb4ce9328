//! Method 0 reconstruction for barrel and endcap channels.
//!
//! Energy is the calibrated sum over a fixed window of time slices around
//! the sample of interest, scaled by the pulse containment correction. Time
//! comes from the energy sharing around the peak slice, corrected for the
//! charge-dependent slew and the channel time calibration.

use crate::containment::{
    DetectorConditions, PulseContainmentManager, PULSE_CONTAINMENT_FRACTIONAL_ERROR,
};
use crate::special::SpecialCorrections;
use crate::time_slew::{self, BiasSetting};
use crate::timing::{weighted_peak_ratio, TimeShiftTable, SAMPLE_SPACING_NS};
use calreco_core::{
    ChannelCalibration, ChannelWaveform, ConfigError, HbheRecHit, RunContext, UNKNOWN_TIME,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Method 0 configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimpleHbheConfig {
    /// Offset of the first summed slice relative to the SOI.
    pub first_sample_shift: i32,
    /// Number of summed slices. Must be positive.
    pub samples_to_add: u32,
    /// Pulse phase (ns) for the containment correction.
    pub phase_ns: f32,
    /// Apply the containment correction unless a channel overrides it.
    pub correct_for_containment: bool,
    /// Apply the run-dependent HB- corrections on data.
    pub apply_special_corrections: bool,
}

impl Default for SimpleHbheConfig {
    fn default() -> Self {
        Self {
            first_sample_shift: 0,
            samples_to_add: 2,
            phase_ns: 6.0,
            correct_for_containment: true,
            apply_special_corrections: false,
        }
    }
}

impl SimpleHbheConfig {
    /// Sets the window start offset.
    #[must_use]
    pub fn with_first_sample_shift(mut self, shift: i32) -> Self {
        self.first_sample_shift = shift;
        self
    }

    /// Sets the window length.
    #[must_use]
    pub fn with_samples_to_add(mut self, samples: u32) -> Self {
        self.samples_to_add = samples;
        self
    }

    /// Sets the default containment phase.
    #[must_use]
    pub fn with_phase_ns(mut self, phase_ns: f32) -> Self {
        self.phase_ns = phase_ns;
        self
    }

    /// Enables or disables the containment correction.
    #[must_use]
    pub fn with_containment(mut self, enabled: bool) -> Self {
        self.correct_for_containment = enabled;
        self
    }

    /// Enables or disables the special corrections.
    #[must_use]
    pub fn with_special_corrections(mut self, enabled: bool) -> Self {
        self.apply_special_corrections = enabled;
        self
    }

    /// Checks the window length.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] if `samples_to_add` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.samples_to_add == 0 {
            return Err(ConfigError::InvalidValue {
                name: "samplesToAdd".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.samples_to_add < 3 {
            log::warn!(
                "samplesToAdd = {}: the timing peak may use slices outside the summed window",
                self.samples_to_add
            );
        }
        Ok(())
    }
}

/// Method 0 energy and time reconstruction.
#[derive(Debug)]
pub struct SimpleHbheAlgo {
    config: SimpleHbheConfig,
    special: SpecialCorrections,
    pulse_corr: PulseContainmentManager,
    time_shift: TimeShiftTable,
}

impl SimpleHbheAlgo {
    /// Creates the algorithm after validating `config`.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the configuration is invalid.
    pub fn new(config: SimpleHbheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            special: SpecialCorrections::new(config.apply_special_corrections),
            config,
            pulse_corr: PulseContainmentManager::new(PULSE_CONTAINMENT_FRACTIONAL_ERROR),
            time_shift: TimeShiftTable::hbheho(),
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SimpleHbheConfig {
        &self.config
    }

    /// Containment cache, for inspection.
    #[must_use]
    pub fn containment(&self) -> &PulseContainmentManager {
        &self.pulse_corr
    }

    /// Installs the conditions of a new run.
    pub fn begin_run(&mut self, conditions: &DetectorConditions) {
        self.pulse_corr.begin_run(conditions.clone());
    }

    /// Releases run-scoped state.
    pub fn end_run(&mut self) {
        self.pulse_corr.end_run();
    }

    /// Summation window `[begin, end)` for a waveform.
    #[must_use]
    pub fn window(&self, info: &ChannelWaveform) -> (usize, usize) {
        let soi = i64::try_from(info.soi()).unwrap_or(i64::MAX);
        let begin = soi
            .saturating_add(i64::from(self.config.first_sample_shift))
            .max(0);
        let begin = usize::try_from(begin).unwrap_or(usize::MAX);
        (begin, begin.saturating_add(self.config.samples_to_add as usize))
    }

    /// Reconstructs one channel.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn reconstruct(
        &self,
        info: &ChannelWaveform,
        calib: &ChannelCalibration,
        run: &RunContext,
    ) -> HbheRecHit {
        let (begin, end) = self.window(info);
        let fc_ampl = info.charge_in_window(begin, end);

        let (apply_containment, phase_ns) = calib.reco_params.map_or(
            (self.config.correct_for_containment, self.config.phase_ns),
            |p| (p.correct_for_phase_containment, p.correction_phase_ns),
        );
        let mut energy = self.m0_energy(info, fc_ampl, apply_containment, phase_ns);
        energy *= self.special.factor(info.id(), energy, run);

        let time = self.m0_time(info, fc_ampl, calib);
        HbheRecHit::new(info.id(), energy as f32, time)
    }

    /// Windowed energy, optionally containment corrected.
    #[must_use]
    pub fn m0_energy(
        &self,
        info: &ChannelWaveform,
        fc_ampl: f64,
        apply_containment: bool,
        phase_ns: f32,
    ) -> f64 {
        let (begin, end) = self.window(info);
        let energy = info.energy_in_window(begin, end);
        if !apply_containment {
            return energy;
        }
        let correction = self
            .pulse_corr
            .get(info.id(), self.config.samples_to_add, phase_ns)
            .correction(fc_ampl);
        energy * correction
    }

    /// Hit time in ns, or [`UNKNOWN_TIME`] for fewer than three samples or an
    /// empty window.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss
    )]
    pub fn m0_time(&self, info: &ChannelWaveform, fc_ampl: f64, calib: &ChannelCalibration) -> f32 {
        let n_samples = info.n_samples();
        if n_samples <= 2 {
            return UNKNOWN_TIME;
        }
        let (begin, end) = self.window(info);
        let Some(peak) = info.peak_energy_ts(begin, end) else {
            return UNKNOWN_TIME;
        };
        let max_i = peak.clamp(1, n_samples - 2);

        let t0 = info.ts_energy(max_i - 1) as f32;
        let max_a = info.ts_energy(max_i) as f32;
        let t2 = info.ts_energy(max_i + 1) as f32;
        let ratio = weighted_peak_ratio(t0, max_a, t2);

        let slices = max_i as i64 - info.soi() as i64;
        let mut time = slices as f32 * SAMPLE_SPACING_NS + self.time_shift.shift_ns(ratio);
        time -= time_slew::delay(fc_ampl.max(1.0), BiasSetting::Medium) as f32;
        time - calib.time_corr
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use calreco_core::{ChannelId, RecoParams, Subdetector};

    fn waveform(id: ChannelId, soi: usize, charges: &[f64]) -> ChannelWaveform {
        let mut w = ChannelWaveform::new(false);
        w.set_channel_info(id, charges.len(), soi, 0, false, false, false);
        for (ts, &q) in charges.iter().enumerate() {
            w.set_sample(ts, 0, q, 1.0, 0.0);
        }
        w
    }

    fn barrel() -> ChannelId {
        ChannelId::new(Subdetector::Barrel, -1, 32, 1).unwrap()
    }

    #[test]
    fn test_zero_samples_to_add_rejected() {
        let config = SimpleHbheConfig::default().with_samples_to_add(0);
        assert!(matches!(
            SimpleHbheAlgo::new(config),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_window_clamped_at_zero() {
        let algo = SimpleHbheAlgo::new(SimpleHbheConfig::default().with_first_sample_shift(-3))
            .unwrap();
        let w = waveform(barrel(), 1, &[1.0; 8]);
        assert_eq!(algo.window(&w), (0, 2));
    }

    #[test]
    fn test_containment_increases_energy() {
        let config = SimpleHbheConfig::default()
            .with_first_sample_shift(-1)
            .with_samples_to_add(3);
        let with = SimpleHbheAlgo::new(config).unwrap();
        let without = SimpleHbheAlgo::new(config.with_containment(false)).unwrap();
        let w = waveform(barrel(), 4, &[0.0, 0.0, 0.0, 1.0, 10.0, 20.0, 5.0, 1.0, 0.0, 0.0]);
        let calib = ChannelCalibration::default();
        let run = RunContext::simulation();
        let raw = without.reconstruct(&w, &calib, &run);
        let corrected = with.reconstruct(&w, &calib, &run);
        assert_eq!(raw.energy, 31.0);
        assert!(corrected.energy > raw.energy);
        assert_eq!(raw.time, corrected.time);
    }

    #[test]
    fn test_reco_params_override() {
        let config = SimpleHbheConfig::default().with_samples_to_add(3);
        let algo = SimpleHbheAlgo::new(config).unwrap();
        let w = waveform(barrel(), 4, &[0.0, 0.0, 0.0, 1.0, 10.0, 20.0, 5.0, 1.0, 0.0, 0.0]);
        let run = RunContext::simulation();
        let plain = ChannelCalibration::default().with_reco_params(RecoParams {
            correct_for_phase_containment: false,
            correction_phase_ns: 6.0,
        });
        let hit = algo.reconstruct(&w, &plain, &run);
        assert_eq!(hit.energy, 35.0);
        assert_eq!(algo.containment().cached_channels(), 0);
    }

    #[test]
    fn test_time_corr_subtracted() {
        let algo = SimpleHbheAlgo::new(SimpleHbheConfig::default().with_containment(false)).unwrap();
        let w = waveform(barrel(), 4, &[0.0, 0.0, 0.0, 1.0, 10.0, 20.0, 5.0, 1.0, 0.0, 0.0]);
        let run = RunContext::simulation();
        let base = algo.reconstruct(&w, &ChannelCalibration::default(), &run);
        let shifted = algo.reconstruct(
            &w,
            &ChannelCalibration::default().with_time_corr(2.5),
            &run,
        );
        approx::assert_relative_eq!(base.time - shifted.time, 2.5, epsilon = 1e-4);
    }

    #[test]
    fn test_special_correction_on_data() {
        let config = SimpleHbheConfig::default()
            .with_first_sample_shift(-1)
            .with_samples_to_add(3)
            .with_containment(false)
            .with_special_corrections(true);
        let algo = SimpleHbheAlgo::new(config).unwrap();
        // 150 energy units in the window: high-energy response of ieta -1, iphi 32.
        let w = waveform(barrel(), 4, &[0.0, 0.0, 0.0, 50.0, 50.0, 50.0, 0.0, 0.0, 0.0, 0.0]);
        let calib = ChannelCalibration::default();
        let data = algo.reconstruct(&w, &calib, &RunContext::data(250_000));
        let sim = algo.reconstruct(&w, &calib, &RunContext::simulation());
        approx::assert_relative_eq!(data.energy, 150.0 * 0.973, epsilon = 1e-3);
        assert_eq!(sim.energy, 150.0);
    }

    #[test]
    fn test_begin_run_resets_cache() {
        let mut algo = SimpleHbheAlgo::new(SimpleHbheConfig::default()).unwrap();
        let w = waveform(barrel(), 4, &[0.0, 0.0, 0.0, 1.0, 10.0, 20.0, 5.0, 1.0, 0.0, 0.0]);
        let _ = algo.reconstruct(&w, &ChannelCalibration::default(), &RunContext::data(1));
        assert_eq!(algo.containment().cached_channels(), 1);
        algo.begin_run(&DetectorConditions::default());
        assert_eq!(algo.containment().cached_channels(), 0);
        let _ = algo.reconstruct(&w, &ChannelCalibration::default(), &RunContext::data(1));
        algo.end_run();
        assert_eq!(algo.containment().cached_channels(), 0);
    }
}
