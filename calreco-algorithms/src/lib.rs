//! calreco-algorithms: Channel reconstruction algorithms.
//!
//! This crate provides:
//! - **Method 0** - windowed energy sum with containment correction and
//!   peak-ratio timing for barrel/endcap channels
//! - **`HFSimpleTimeCheck`** - rise-time gated anode combination for the
//!   forward calorimeter
//! - **Pulse containment** - run-scoped, thread-safe correction cache
//! - **Batch reconstruction** - per-event driver, sequential or parallel
//! - **Noise filter** - event-level pass/fail decision
//!

mod batch;
pub mod containment;
mod description;
mod hf_time_check;
mod method0;
mod noise_filter;
pub mod pulse_shape;
pub mod special;
pub mod time_slew;
pub mod timing;

pub use batch::{
    BatchOutput, BatchReconstructor, BatchStatistics, ChannelInput, ReconstructionAlgorithm,
};
pub use containment::{
    DetectorConditions, PulseContainmentCorrection, PulseContainmentManager,
    PULSE_CONTAINMENT_FRACTIONAL_ERROR,
};
pub use description::{
    parse_algorithm, parse_hbhe_algorithm, parse_hbhe_config, parse_hf_algorithm, Algorithm,
    HF_SIMPLE_TIME_CHECK_CLASS, SIMPLE_HBHE_CLASS,
};
pub use hf_time_check::{AnodeState, EnergyWeights, HfSimpleTimeCheck, TimeLimits};
pub use method0::{SimpleHbheAlgo, SimpleHbheConfig};
pub use noise_filter::{Jet, NoiseFilter, NoiseFilterConfig, NoiseSummary};
pub use pulse_shape::PulseShape;
pub use special::SpecialCorrections;
pub use time_slew::BiasSetting;
pub use timing::TimeShiftTable;
