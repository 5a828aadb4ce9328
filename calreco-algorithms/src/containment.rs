//! Pulse containment correction.
//!
//! Only part of a pulse falls inside the integration window. The correction
//! is the inverse of the contained fraction; it depends on the charge
//! through the time slew, so it is tabulated once per (channel, window,
//! phase) and interpolated per hit.

use crate::pulse_shape::PulseShape;
use crate::time_slew::{self, BiasSetting};
use crate::timing::SAMPLE_SPACING_NS;
use calreco_core::{ChannelId, Subdetector};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Tolerance used by Method 0.
pub const PULSE_CONTAINMENT_FRACTIONAL_ERROR: f32 = 0.002;

const MIN_CHARGE_FC: f64 = 1.0;
const MAX_CHARGE_FC: f64 = 1.0e5;
const INITIAL_INTERVALS: usize = 16;
const MAX_INTERVALS: usize = 1 << 16;
const CHECKS_PER_INTERVAL: usize = 8;

/// Pulse shapes and bias setting valid for one run.
#[derive(Clone, Debug)]
pub struct DetectorConditions {
    /// Conditions tag, for logging.
    pub tag: String,
    /// Front-end bias used for the slew in the containment model.
    pub bias: BiasSetting,
    shapes: HashMap<Subdetector, Arc<PulseShape>>,
    default_shape: Arc<PulseShape>,
}

impl Default for DetectorConditions {
    fn default() -> Self {
        let hpd = Arc::new(PulseShape::hpd());
        let mut shapes = HashMap::new();
        shapes.insert(Subdetector::Barrel, Arc::clone(&hpd));
        shapes.insert(Subdetector::Endcap, Arc::clone(&hpd));
        shapes.insert(Subdetector::Outer, Arc::new(PulseShape::sipm()));
        shapes.insert(Subdetector::Forward, Arc::new(PulseShape::hf()));
        Self {
            tag: "default".to_string(),
            bias: BiasSetting::Medium,
            shapes,
            default_shape: hpd,
        }
    }
}

impl DetectorConditions {
    /// Default shapes under a different tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Replaces the pulse shape of one subdetector.
    #[must_use]
    pub fn with_shape(mut self, subdet: Subdetector, shape: PulseShape) -> Self {
        self.shapes.insert(subdet, Arc::new(shape));
        self
    }

    /// Sets the bias setting.
    #[must_use]
    pub fn with_bias(mut self, bias: BiasSetting) -> Self {
        self.bias = bias;
        self
    }

    /// Pulse shape for a channel. Null ids get the barrel shape.
    #[must_use]
    pub fn shape_for(&self, id: ChannelId) -> &Arc<PulseShape> {
        id.subdet()
            .and_then(|subdet| self.shapes.get(&subdet))
            .unwrap_or(&self.default_shape)
    }
}

/// Containment of one pulse shape in a fixed window.
#[derive(Clone, Copy, Debug)]
pub struct ContainmentWindow<'a> {
    shape: &'a PulseShape,
    window_ns: f64,
    phase_ns: f64,
    bias: BiasSetting,
}

impl<'a> ContainmentWindow<'a> {
    /// Window of `num_samples` time slices; the pulse starts `phase_ns` plus
    /// the slew after the window opens.
    #[must_use]
    pub fn new(shape: &'a PulseShape, num_samples: u32, phase_ns: f32, bias: BiasSetting) -> Self {
        Self {
            shape,
            window_ns: f64::from(num_samples) * f64::from(SAMPLE_SPACING_NS),
            phase_ns: f64::from(phase_ns),
            bias,
        }
    }

    /// Fraction of a pulse of `fc` femtocoulombs inside the window.
    #[must_use]
    pub fn fraction(&self, fc: f64) -> f64 {
        let start = self.phase_ns + time_slew::delay(fc, self.bias);
        self.shape.integral(-start, self.window_ns - start)
    }

    /// Exact correction factor. A zero contained fraction gives 1.
    #[must_use]
    pub fn correction(&self, fc: f64) -> f64 {
        let fraction = self.fraction(fc);
        if fraction > 0.0 {
            1.0 / fraction
        } else {
            1.0
        }
    }
}

/// Tabulated containment correction versus charge.
///
/// The table is uniform in `ln(fC)` over `[1, 1e5]` fC. Charges outside the
/// range use the edge values.
#[derive(Clone, Debug)]
pub struct PulseContainmentCorrection {
    step: f64,
    values: Vec<f64>,
}

impl PulseContainmentCorrection {
    /// Builds a table accurate to `max_fractional_error`.
    ///
    /// The grid is doubled until linear interpolation agrees with the exact
    /// correction at seven interior check points of every interval.
    #[must_use]
    pub fn new(window: &ContainmentWindow<'_>, max_fractional_error: f32) -> Self {
        let tolerance = f64::from(max_fractional_error);
        let mut intervals = INITIAL_INTERVALS;
        loop {
            let table = Self::tabulate(window, intervals);
            if table.max_relative_error(window) <= tolerance {
                return table;
            }
            if intervals >= MAX_INTERVALS {
                log::warn!(
                    "containment table did not reach tolerance {tolerance} with {intervals} intervals"
                );
                return table;
            }
            intervals *= 2;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn tabulate(window: &ContainmentWindow<'_>, intervals: usize) -> Self {
        let ln_max = MAX_CHARGE_FC.ln();
        let ln_min = MIN_CHARGE_FC.ln();
        let step = (ln_max - ln_min) / intervals as f64;
        let values = (0..=intervals)
            .map(|i| window.correction((ln_min + step * i as f64).exp()))
            .collect();
        Self { step, values }
    }

    #[allow(clippy::cast_precision_loss)]
    fn max_relative_error(&self, window: &ContainmentWindow<'_>) -> f64 {
        let ln_min = MIN_CHARGE_FC.ln();
        let mut worst = 0.0_f64;
        for i in 0..self.values.len() - 1 {
            for k in 1..CHECKS_PER_INTERVAL {
                let frac = k as f64 / CHECKS_PER_INTERVAL as f64;
                let fc = (ln_min + self.step * (i as f64 + frac)).exp();
                let exact = window.correction(fc);
                let approx = self.correction(fc);
                worst = worst.max((approx - exact).abs() / exact);
            }
        }
        worst
    }

    /// Correction factor for a pulse of `fc` femtocoulombs.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn correction(&self, fc: f64) -> f64 {
        let last = self.values.len() - 1;
        if fc.is_nan() || fc <= MIN_CHARGE_FC {
            return self.values[0];
        }
        if fc >= MAX_CHARGE_FC {
            return self.values[last];
        }
        let x = (fc.ln() - MIN_CHARGE_FC.ln()) / self.step;
        let index = (x.floor() as usize).min(last - 1);
        let frac = x - index as f64;
        let (y1, y2) = (self.values[index], self.values[index + 1]);
        y1 + (y2 - y1) * frac
    }

    /// Number of grid points.
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.values.len()
    }
}

type ChannelKey = (ChannelId, u32, u32);
type ShapeKey = (Option<Subdetector>, u32, u32);

struct RunCache {
    conditions: DetectorConditions,
    by_channel: HashMap<ChannelKey, Arc<PulseContainmentCorrection>>,
    by_shape: HashMap<ShapeKey, Arc<PulseContainmentCorrection>>,
}

impl RunCache {
    fn new(conditions: DetectorConditions) -> Self {
        Self {
            conditions,
            by_channel: HashMap::new(),
            by_shape: HashMap::new(),
        }
    }

    fn clear(&mut self) {
        self.by_channel.clear();
        self.by_shape.clear();
    }
}

/// Run-scoped cache of containment corrections.
///
/// Lookups from many threads share a read lock; a missing entry is built
/// under the write lock. Channels with the same pulse shape share a table.
pub struct PulseContainmentManager {
    max_fractional_error: f32,
    cache: RwLock<RunCache>,
}

impl std::fmt::Debug for PulseContainmentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseContainmentManager")
            .field("max_fractional_error", &self.max_fractional_error)
            .field("cached_channels", &self.cached_channels())
            .finish_non_exhaustive()
    }
}

impl PulseContainmentManager {
    /// Creates an empty manager with default conditions.
    #[must_use]
    pub fn new(max_fractional_error: f32) -> Self {
        Self {
            max_fractional_error,
            cache: RwLock::new(RunCache::new(DetectorConditions::default())),
        }
    }

    /// Tolerance of the tabulated corrections.
    #[must_use]
    pub fn max_fractional_error(&self) -> f32 {
        self.max_fractional_error
    }

    /// Correction for `id` integrated over `num_samples` slices at `phase_ns`.
    pub fn get(
        &self,
        id: ChannelId,
        num_samples: u32,
        phase_ns: f32,
    ) -> Arc<PulseContainmentCorrection> {
        let key = (id, num_samples, phase_ns.to_bits());
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(correction) = cache.by_channel.get(&key) {
                return Arc::clone(correction);
            }
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(correction) = cache.by_channel.get(&key) {
            return Arc::clone(correction);
        }
        let shape_key = (id.subdet(), num_samples, phase_ns.to_bits());
        let correction = if let Some(shared) = cache.by_shape.get(&shape_key) {
            Arc::clone(shared)
        } else {
            let conditions = &cache.conditions;
            let window = ContainmentWindow::new(
                conditions.shape_for(id),
                num_samples,
                phase_ns,
                conditions.bias,
            );
            let built = Arc::new(PulseContainmentCorrection::new(
                &window,
                self.max_fractional_error,
            ));
            log::trace!(
                "built containment table for {id}: {num_samples} samples, phase {phase_ns} ns, {} points",
                built.n_points()
            );
            cache.by_shape.insert(shape_key, Arc::clone(&built));
            built
        };
        cache.by_channel.insert(key, Arc::clone(&correction));
        correction
    }

    /// Installs the conditions of a new run and drops every cached table.
    pub fn begin_run(&mut self, conditions: DetectorConditions) {
        log::debug!("containment cache reset for conditions \"{}\"", conditions.tag);
        let cache = self.cache.get_mut().unwrap_or_else(PoisonError::into_inner);
        *cache = RunCache::new(conditions);
    }

    /// Drops every cached table.
    pub fn end_run(&mut self) {
        self.cache
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of cached (channel, window, phase) entries.
    #[must_use]
    pub fn cached_channels(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_channel
            .len()
    }

    /// Tag of the installed conditions.
    #[must_use]
    pub fn conditions_tag(&self) -> String {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .conditions
            .tag
            .clone()
    }
}
