//! Per-channel waveform buffer.
//!
//! [`ChannelWaveform`] holds the unpacked charge, gain, ADC and TDC rise
//! time of up to [`MAX_SAMPLES`] time slices for one channel in one event.
//! All reads are bounded by the number of filled slices, so windows that run
//! past the end of the data simply contribute nothing.

use crate::calibration::{ChannelCalibration, N_CAPIDS};
use crate::channel::ChannelId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Capacity of the time slice arrays.
pub const MAX_SAMPLES: usize = 10;

/// Rise time used when the pulse stays below the TDC discriminator.
pub const UNKNOWN_T_UNDERSHOOT: f32 = -100.0;

/// Rise time used when the pulse stays above the TDC discriminator.
pub const UNKNOWN_T_OVERSHOOT: f32 = -110.0;

/// Rise time used when no TDC information is available at all.
pub const UNKNOWN_T_NOTDC: f32 = -120.0;

/// Unpacked charge and timing information for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelWaveform {
    id: ChannelId,
    /// Charge in fC for all time slices.
    charge: [f64; MAX_SAMPLES],
    /// fC to energy conversion factor (can depend on CAPID).
    gain: [f64; MAX_SAMPLES],
    /// Signal rise time from TDC in ns, if provided.
    rise_time: [f32; MAX_SAMPLES],
    /// Raw QIE ADC values.
    adc: [u8; MAX_SAMPLES],
    n_samples: usize,
    soi: usize,
    /// CAPID of the sample of interest.
    capid: i32,
    has_time_info: bool,
    dropped: bool,
    link_error: bool,
    capid_error: bool,
}

impl Default for ChannelWaveform {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ChannelWaveform {
    /// Creates an empty, dropped waveform.
    #[must_use]
    pub fn new(has_time_info: bool) -> Self {
        Self {
            id: ChannelId::NULL,
            charge: [0.0; MAX_SAMPLES],
            gain: [0.0; MAX_SAMPLES],
            rise_time: [0.0; MAX_SAMPLES],
            adc: [0; MAX_SAMPLES],
            n_samples: 0,
            soi: 0,
            capid: 0,
            has_time_info,
            dropped: true,
            link_error: false,
            capid_error: false,
        }
    }

    /// Resets the metadata to the empty, dropped state.
    pub fn clear(&mut self) {
        self.id = ChannelId::NULL;
        self.n_samples = 0;
        self.soi = 0;
        self.capid = 0;
        self.dropped = true;
        self.link_error = false;
        self.capid_error = false;
    }

    /// Sets the channel metadata.
    ///
    /// `n_samples` larger than [`MAX_SAMPLES`] is truncated; the extra
    /// slices are lost. `soi` is clamped to [`MAX_SAMPLES`], and a `soi`
    /// outside the filled slices is logged.
    #[allow(clippy::too_many_arguments)]
    pub fn set_channel_info(
        &mut self,
        id: ChannelId,
        n_samples: usize,
        soi: usize,
        capid: i32,
        link_error: bool,
        capid_error: bool,
        dropped: bool,
    ) {
        if n_samples > MAX_SAMPLES {
            log::warn!("{id}: {n_samples} samples truncated to {MAX_SAMPLES}");
        }
        let n_samples = n_samples.min(MAX_SAMPLES);
        if n_samples > 0 && soi >= n_samples {
            log::warn!("{id}: soi {soi} outside {n_samples} samples");
        }
        self.id = id;
        self.n_samples = n_samples;
        self.soi = soi.min(MAX_SAMPLES);
        self.capid = capid;
        self.dropped = dropped;
        self.link_error = link_error;
        self.capid_error = capid_error;
    }

    /// Marks the channel so that the batch reconstructor skips it.
    pub fn tag_as_dropped(&mut self) {
        self.dropped = true;
    }

    /// Fills one time slice.
    ///
    /// The caller is expected to keep `ts < n_samples()`. Writes past the
    /// buffer capacity are discarded.
    pub fn set_sample(&mut self, ts: usize, raw_adc: u8, charge: f64, gain: f64, rise_time: f32) {
        if ts >= MAX_SAMPLES {
            log::warn!("{}: sample {ts} beyond capacity ignored", self.id);
            return;
        }
        self.charge[ts] = charge;
        self.gain[ts] = gain;
        self.rise_time[ts] = rise_time;
        self.adc[ts] = raw_adc;
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Number of filled time slices.
    #[inline]
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Sample of interest.
    #[inline]
    #[must_use]
    pub fn soi(&self) -> usize {
        self.soi
    }

    #[inline]
    #[must_use]
    pub fn capid(&self) -> i32 {
        self.capid
    }

    #[inline]
    #[must_use]
    pub fn has_time_info(&self) -> bool {
        self.has_time_info
    }

    #[inline]
    #[must_use]
    pub fn is_dropped(&self) -> bool {
        self.dropped
    }

    #[inline]
    #[must_use]
    pub fn has_link_error(&self) -> bool {
        self.link_error
    }

    #[inline]
    #[must_use]
    pub fn has_capid_error(&self) -> bool {
        self.capid_error
    }

    /// Charges of the filled slices.
    #[must_use]
    pub fn charges(&self) -> &[f64] {
        &self.charge[..self.n_samples]
    }

    /// Gains of the filled slices.
    #[must_use]
    pub fn gains(&self) -> &[f64] {
        &self.gain[..self.n_samples]
    }

    /// Raw ADC values of the filled slices.
    #[must_use]
    pub fn adcs(&self) -> &[u8] {
        &self.adc[..self.n_samples]
    }

    /// TDC rise times of the filled slices, `None` without TDC information.
    #[must_use]
    pub fn rise_times(&self) -> Option<&[f32]> {
        self.has_time_info.then(|| &self.rise_time[..self.n_samples])
    }

    // Indexed access. Indices must be below MAX_SAMPLES.

    #[inline]
    #[must_use]
    pub fn ts_charge(&self, ts: usize) -> f64 {
        self.charge[ts]
    }

    #[inline]
    #[must_use]
    pub fn ts_energy(&self, ts: usize) -> f64 {
        self.charge[ts] * self.gain[ts]
    }

    #[inline]
    #[must_use]
    pub fn ts_gain(&self, ts: usize) -> f64 {
        self.gain[ts]
    }

    #[inline]
    #[must_use]
    pub fn ts_adc(&self, ts: usize) -> u8 {
        self.adc[ts]
    }

    #[inline]
    #[must_use]
    pub fn ts_rise_time(&self, ts: usize) -> f32 {
        if self.has_time_info {
            self.rise_time[ts]
        } else {
            UNKNOWN_T_NOTDC
        }
    }

    /// Clamps `[begin, end)` to the filled slices.
    #[inline]
    fn window(&self, begin: usize, end: usize) -> std::ops::Range<usize> {
        let end = end.min(self.n_samples);
        begin.min(end)..end
    }

    /// Total charge in `[begin, end)`. The slice at `end` is not included.
    #[must_use]
    pub fn charge_in_window(&self, begin: usize, end: usize) -> f64 {
        self.charge[self.window(begin, end)].iter().sum()
    }

    /// Total energy (charge times gain) in `[begin, end)`.
    #[must_use]
    pub fn energy_in_window(&self, begin: usize, end: usize) -> f64 {
        let range = self.window(begin, end);
        self.charge[range.clone()]
            .iter()
            .zip(&self.gain[range])
            .map(|(q, g)| q * g)
            .sum()
    }

    /// Index of the slice with the largest energy in `[begin, end)`.
    ///
    /// Ties go to the earliest slice. Returns `None` if the window holds no
    /// filled slice.
    #[must_use]
    pub fn peak_energy_ts(&self, begin: usize, end: usize) -> Option<usize> {
        let mut peak = None;
        let mut max_energy = f64::NEG_INFINITY;
        for ts in self.window(begin, end) {
            let e = self.ts_energy(ts);
            if e > max_energy {
                max_energy = e;
                peak = Some(ts);
            }
        }
        peak
    }
}

/// One digitized time slice before pedestal subtraction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawSample {
    /// Raw QIE ADC code.
    pub adc: u8,
    /// Linearized charge in fC, pedestal included.
    pub charge_fc: f64,
    /// TDC rise time in ns, if the front end provides one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub rise_time: Option<f32>,
}

/// Digitized frame for one channel as delivered by the unpacker.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawChannelFrame {
    pub id: ChannelId,
    pub soi: usize,
    /// CAPID of the sample of interest.
    pub soi_capid: i32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub link_error: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub capid_error: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub dropped: bool,
    pub samples: Vec<RawSample>,
}

impl RawChannelFrame {
    /// CAPID of time slice `ts`, following the rotation from the SOI.
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub fn capid_of(&self, ts: usize) -> usize {
        let offset = ts as i64 - self.soi as i64;
        (i64::from(self.soi_capid) + offset).rem_euclid(N_CAPIDS as i64) as usize
    }

    /// Converts the frame into a [`ChannelWaveform`].
    ///
    /// Each slice gets the pedestal subtracted and the gain of its own CAPID.
    #[must_use]
    pub fn to_waveform(&self, calib: &ChannelCalibration) -> ChannelWaveform {
        let has_time_info = self.samples.iter().any(|s| s.rise_time.is_some());
        let mut waveform = ChannelWaveform::new(has_time_info);
        waveform.set_channel_info(
            self.id,
            self.samples.len(),
            self.soi,
            self.soi_capid,
            self.link_error,
            self.capid_error,
            self.dropped,
        );
        for (ts, sample) in self.samples.iter().take(MAX_SAMPLES).enumerate() {
            let capid = self.capid_of(ts);
            waveform.set_sample(
                ts,
                sample.adc,
                sample.charge_fc - calib.pedestal(capid),
                calib.gain(capid),
                sample.rise_time.unwrap_or(UNKNOWN_T_NOTDC),
            );
        }
        waveform
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::float_cmp,
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    use super::*;
    use crate::channel::Subdetector;
    use approx::assert_relative_eq;

    fn make_waveform(energies: &[f64], soi: usize) -> ChannelWaveform {
        let id = ChannelId::new(Subdetector::Barrel, 5, 10, 1).unwrap();
        let mut wf = ChannelWaveform::new(false);
        wf.set_channel_info(id, energies.len(), soi, 0, false, false, false);
        for (ts, &e) in energies.iter().enumerate() {
            wf.set_sample(ts, 0, e, 1.0, UNKNOWN_T_NOTDC);
        }
        wf
    }

    #[test]
    fn test_new_waveform_is_dropped() {
        let wf = ChannelWaveform::default();
        assert!(wf.is_dropped());
        assert!(wf.id().is_null());
        assert_eq!(wf.n_samples(), 0);
        assert_eq!(wf.charge_in_window(0, MAX_SAMPLES), 0.0);
    }

    #[test]
    fn test_n_samples_clamped() {
        let id = ChannelId::new(Subdetector::Endcap, 20, 3, 2).unwrap();
        let mut wf = ChannelWaveform::new(false);
        wf.set_channel_info(id, 15, 4, 2, false, false, false);
        assert_eq!(wf.n_samples(), MAX_SAMPLES);
        assert!(!wf.is_dropped());
        wf.tag_as_dropped();
        assert!(wf.is_dropped());
    }

    #[test]
    fn test_soi_clamped() {
        let id = ChannelId::new(Subdetector::Barrel, 2, 7, 1).unwrap();
        let mut wf = ChannelWaveform::new(false);
        wf.set_channel_info(id, 10, usize::MAX, 0, false, false, false);
        assert_eq!(wf.soi(), MAX_SAMPLES);
        wf.set_channel_info(id, 10, 9, 0, false, false, false);
        assert_eq!(wf.soi(), 9);
    }

    #[test]
    fn test_sample_beyond_capacity_ignored() {
        let energies = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let mut wf = make_waveform(&energies, 4);
        let before = wf.clone();
        wf.set_sample(MAX_SAMPLES, 99, 1000.0, 5.0, 3.0);
        wf.set_sample(usize::MAX, 99, 1000.0, 5.0, 3.0);
        assert_eq!(wf, before);
        assert_eq!(wf.charges(), &energies);
        assert_eq!(wf.charge_in_window(0, MAX_SAMPLES + 5), 55.0);
    }

    #[test]
    fn test_charge_in_window_matches_sum() {
        let charges = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let wf = make_waveform(&charges, 2);
        for begin in 0..8 {
            for end in 0..12 {
                let expected: f64 = (begin..end.min(charges.len())).map(|i| charges[i]).sum();
                assert_eq!(wf.charge_in_window(begin, end), expected);
            }
        }
        assert_eq!(wf.charge_in_window(6, 10), 0.0);
        assert_eq!(wf.charge_in_window(9, 3), 0.0);
    }

    #[test]
    fn test_energy_uses_per_slice_gain() {
        let id = ChannelId::new(Subdetector::Barrel, 1, 1, 1).unwrap();
        let mut wf = ChannelWaveform::new(false);
        wf.set_channel_info(id, 3, 1, 0, false, false, false);
        wf.set_sample(0, 1, 10.0, 0.5, UNKNOWN_T_NOTDC);
        wf.set_sample(1, 2, 20.0, 0.25, UNKNOWN_T_NOTDC);
        wf.set_sample(2, 3, 40.0, 0.1, UNKNOWN_T_NOTDC);
        assert_relative_eq!(wf.energy_in_window(0, 3), 5.0 + 5.0 + 4.0);
        assert_relative_eq!(wf.ts_energy(2), 4.0);
        assert_eq!(wf.adcs(), &[1, 2, 3]);
    }

    #[test]
    fn test_peak_is_maximum_in_window() {
        let energies = [0.0, 3.0, 7.0, 2.0, 9.0, 9.0, 1.0];
        let wf = make_waveform(&energies, 3);
        for begin in 0..energies.len() {
            for end in begin + 1..=energies.len() + 2 {
                let peak = wf.peak_energy_ts(begin, end).unwrap();
                assert!((begin..end).contains(&peak));
                for ts in begin..end.min(energies.len()) {
                    assert!(wf.ts_energy(peak) >= wf.ts_energy(ts));
                }
            }
        }
        // First maximum wins on ties.
        assert_eq!(wf.peak_energy_ts(0, 7), Some(4));
    }

    #[test]
    fn test_peak_outside_filled_slices() {
        let wf = make_waveform(&[1.0, 2.0, 3.0], 1);
        assert_eq!(wf.peak_energy_ts(3, 6), None);
        assert_eq!(wf.peak_energy_ts(2, 2), None);
    }

    #[test]
    fn test_rise_time_without_tdc() {
        let wf = make_waveform(&[1.0, 2.0], 0);
        assert!(wf.rise_times().is_none());
        assert_eq!(wf.ts_rise_time(0), UNKNOWN_T_NOTDC);
    }

    #[test]
    fn test_raw_frame_conversion() {
        let calib = ChannelCalibration {
            pedestals: [1.0, 2.0, 3.0, 4.0],
            gains: [0.1, 0.2, 0.3, 0.4],
            ..ChannelCalibration::default()
        };
        let frame = RawChannelFrame {
            id: ChannelId::new(Subdetector::Barrel, 3, 4, 1).unwrap(),
            soi: 2,
            soi_capid: 1,
            link_error: false,
            capid_error: false,
            dropped: false,
            samples: (0..4)
                .map(|i| RawSample {
                    adc: i as u8,
                    charge_fc: 10.0 * f64::from(i + 1),
                    rise_time: (i == 2).then_some(12.5),
                })
                .collect(),
        };

        // soi=2 has capid 1, so slices 0..4 rotate through 3, 0, 1, 2.
        assert_eq!(frame.capid_of(0), 3);
        assert_eq!(frame.capid_of(1), 0);
        assert_eq!(frame.capid_of(3), 2);

        let wf = frame.to_waveform(&calib);
        assert_eq!(wf.n_samples(), 4);
        assert_eq!(wf.soi(), 2);
        assert!(!wf.is_dropped());
        assert!(wf.has_time_info());
        assert_relative_eq!(wf.ts_charge(0), 10.0 - 4.0);
        assert_relative_eq!(wf.ts_gain(0), 0.4);
        assert_relative_eq!(wf.ts_charge(2), 30.0 - 2.0);
        assert_relative_eq!(wf.ts_gain(2), 0.2);
        assert_eq!(wf.ts_rise_time(2), 12.5);
        assert_eq!(wf.ts_rise_time(1), UNKNOWN_T_NOTDC);
    }
}
