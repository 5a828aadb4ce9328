//! Sub-sample timing interpolation.
//!
//! The hit time inside the peak time slice is derived from the energy
//! sharing between the peak slice and its two neighbours. The weighted
//! ratio `(peak + 2 * next) / (prev + peak + next)` grows as the pulse moves
//! later; a lookup table maps it to a time shift in ns.

/// Spacing between consecutive time slices (ns).
pub const SAMPLE_SPACING_NS: f32 = 25.0;

/// Time shift (ns) versus weighted peak-sample ratio for the barrel, endcap
/// and outer subdetectors. Uniform bins starting at ratio 0.5.
const HBHEHO_SHIFT_NS: [f32; 61] = [
    -5.4400, -5.0889, -4.7349, -4.3776, -4.0167, -3.6520, //
    -3.2832, -2.9103, -2.5331, -2.1514, -1.7653, -1.3745, //
    -0.9791, -0.5788, -0.1737, 0.2363, 0.6513, 1.0714, //
    1.4967, 1.9271, 2.3627, 2.8037, 3.2500, 3.7017, //
    4.1589, 4.6215, 5.0897, 5.5635, 6.0429, 6.5280, //
    7.0187, 7.5153, 8.0176, 8.5257, 9.0397, 9.5595, //
    10.0853, 10.6171, 11.1548, 11.6986, 12.2484, 12.8043, //
    13.3664, 13.9345, 14.5089, 15.0894, 15.6762, 16.2693, //
    16.8686, 17.4742, 18.0862, 18.7045, 19.3293, 19.9604, //
    20.5980, 21.2420, 21.8926, 22.5496, 23.2132, 23.8833, //
    24.5600,
];

/// Uniformly binned lookup from weighted peak ratio to time shift.
#[derive(Clone, Debug)]
pub struct TimeShiftTable {
    origin: f32,
    scale: f32,
    shifts: &'static [f32],
}

impl TimeShiftTable {
    /// Table for the barrel, endcap and outer subdetectors.
    #[must_use]
    pub fn hbheho() -> Self {
        Self {
            origin: 0.5,
            scale: 0.999,
            shifts: &HBHEHO_SHIFT_NS,
        }
    }

    /// Time shift for `ratio`, linearly interpolated.
    ///
    /// Ratios below the first bin or above the last one return the edge
    /// values.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn shift_ns(&self, ratio: f32) -> f32 {
        let last = self.shifts.len() - 1;
        let flx = last as f32 * (ratio - self.origin) / self.scale;
        if flx.is_nan() || flx <= 0.0 {
            return self.shifts[0];
        }
        let index = flx.floor() as usize;
        if index >= last {
            return self.shifts[last];
        }
        let y1 = self.shifts[index];
        let y2 = self.shifts[index + 1];
        y1 + (y2 - y1) * (flx - index as f32)
    }
}

impl Default for TimeShiftTable {
    fn default() -> Self {
        Self::hbheho()
    }
}

/// Weighted peak-sample ratio of three consecutive energies.
///
/// Negative excursions are removed by shifting all three values so that the
/// smallest one is zero. A zero total gives a ratio of 0.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn weighted_peak_ratio(t0: f32, peak: f32, t2: f32) -> f32 {
    let min = t0.min(peak).min(t2);
    let (t0, peak, t2) = if min < 0.0 {
        (t0 - min, peak - min, t2 - min)
    } else {
        (t0, peak, t2)
    };
    let sum = t0 + peak + t2;
    if sum == 0.0 {
        0.0
    } else {
        (peak + 2.0 * t2) / sum
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp, clippy::cast_precision_loss)]
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_table_edges() {
        let table = TimeShiftTable::hbheho();
        assert_eq!(table.shift_ns(0.0), -5.44);
        assert_eq!(table.shift_ns(0.5), -5.44);
        assert_relative_eq!(table.shift_ns(1.499), 24.56, epsilon = 1e-3);
        assert_eq!(table.shift_ns(2.0), 24.56);
        assert_eq!(table.shift_ns(f32::NAN), -5.44);
    }

    #[test]
    fn test_table_interpolates_between_bins() {
        let table = TimeShiftTable::hbheho();
        // Halfway between bin 0 and bin 1.
        let ratio = 0.5 + 0.5 * 0.999 / 60.0;
        assert_relative_eq!(table.shift_ns(ratio), (-5.44 - 5.0889) / 2.0, epsilon = 1e-3);
    }

    #[test]
    fn test_table_is_monotonic() {
        let table = TimeShiftTable::hbheho();
        let mut prev = table.shift_ns(0.0);
        for i in 0..=200 {
            let t = table.shift_ns(0.4 + i as f32 * 0.006);
            assert!(t >= prev);
            prev = t;
        }
    }

    #[test]
    fn test_ratio() {
        assert_relative_eq!(weighted_peak_ratio(10.0, 20.0, 5.0), 30.0 / 35.0);
        assert_relative_eq!(weighted_peak_ratio(0.0, 10.0, 0.0), 1.0);
        assert_eq!(weighted_peak_ratio(0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_ratio_negative_excursion() {
        // Shifted to (0, 12, 4).
        assert_relative_eq!(weighted_peak_ratio(-2.0, 10.0, 2.0), 20.0 / 16.0);
        // All equal and negative collapses to zero.
        assert_eq!(weighted_peak_ratio(-3.0, -3.0, -3.0), 0.0);
    }
}
