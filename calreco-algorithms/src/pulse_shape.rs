//! Normalized pulse shapes.
//!
//! A shape is stored as its cumulative integral on a 1 ns grid, normalized
//! to unit area. Time zero is the start of the pulse.

/// Two-component pulse shape sampled at 1 ns.
#[derive(Clone, Debug, PartialEq)]
pub struct PulseShape {
    /// `cdf[i]` is the fraction of the pulse contained in `[0, i]` ns.
    cdf: Vec<f64>,
}

impl PulseShape {
    /// Builds a shape from per-nanosecond amplitudes.
    ///
    /// Negative amplitudes are treated as zero. An all-zero input gives a
    /// shape whose whole area sits in the first nanosecond.
    #[must_use]
    pub fn from_samples(samples: &[f64]) -> Self {
        let total: f64 = samples.iter().map(|&a| a.max(0.0)).sum();
        let mut cdf = Vec::with_capacity(samples.len() + 1);
        cdf.push(0.0);
        if total <= 0.0 {
            cdf.push(1.0);
            return Self { cdf };
        }
        let mut acc = 0.0;
        for &a in samples {
            acc += a.max(0.0) / total;
            cdf.push(acc.min(1.0));
        }
        if let Some(last) = cdf.last_mut() {
            *last = 1.0;
        }
        Self { cdf }
    }

    /// Mixture of two gamma-like components, `t^k exp(-t / tau)`.
    ///
    /// `slow_fraction` of the area goes to the component with `tau_slow`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn two_component(
        k: i32,
        tau_fast: f64,
        tau_slow: f64,
        slow_fraction: f64,
        length_ns: usize,
    ) -> Self {
        let component = |t: f64, tau: f64| {
            // Normalized gamma density with shape k + 1.
            let norm: f64 = (1..=k).map(f64::from).product::<f64>() * tau.powi(k + 1);
            t.powi(k) * (-t / tau).exp() / norm
        };
        let samples: Vec<f64> = (0..length_ns)
            .map(|i| {
                let t = i as f64 + 0.5;
                (1.0 - slow_fraction) * component(t, tau_fast)
                    + slow_fraction * component(t, tau_slow)
            })
            .collect();
        Self::from_samples(&samples)
    }

    /// Hybrid photodiode shape used in the barrel and endcap.
    #[must_use]
    pub fn hpd() -> Self {
        Self::two_component(2, 4.0, 30.0, 0.10, 250)
    }

    /// Faster shape used in the outer barrel.
    #[must_use]
    pub fn sipm() -> Self {
        Self::two_component(2, 3.0, 20.0, 0.05, 200)
    }

    /// Forward calorimeter shape.
    #[must_use]
    pub fn hf() -> Self {
        Self::two_component(1, 2.0, 8.0, 0.05, 100)
    }

    /// Length of the tabulated shape in ns.
    #[must_use]
    pub fn length_ns(&self) -> usize {
        self.cdf.len() - 1
    }

    /// Fraction of the pulse contained in `[0, t]`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn cumulative(&self, t: f64) -> f64 {
        if t.is_nan() || t <= 0.0 {
            return 0.0;
        }
        let len = self.length_ns();
        if t >= len as f64 {
            return 1.0;
        }
        let i = t.floor() as usize;
        let frac = t - i as f64;
        self.cdf[i] + (self.cdf[i + 1] - self.cdf[i]) * frac
    }

    /// Fraction of the pulse contained in `[t0, t1]`.
    #[must_use]
    pub fn integral(&self, t0: f64, t1: f64) -> f64 {
        if t1 <= t0 {
            return 0.0;
        }
        self.cumulative(t1) - self.cumulative(t0)
    }
}
