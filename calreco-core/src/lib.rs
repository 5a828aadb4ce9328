//! calreco-core: Core types for calorimeter channel reconstruction.
//!
//! This crate provides the channel identifier, the fixed-capacity waveform
//! buffer, reconstructed hit types, calibration records and the typed
//! parameter sets used to configure reconstruction algorithms.
//!

pub mod calibration;
pub mod channel;
pub mod error;
pub mod hit;
pub mod params;
pub mod run;
pub mod waveform;

pub use calibration::{CalibrationProvider, CalibrationTable, ChannelCalibration, RecoParams};
pub use channel::{ChannelCoords, ChannelId, Subdetector};
pub use error::{ConfigError, Error, Result};
pub use hit::{HbheRecHit, HfAnodeInfo, HfPreHit, HfRecHit, RecHit, UNKNOWN_TIME};
pub use params::{ParamValue, ParameterSet};
pub use run::RunContext;
pub use waveform::{ChannelWaveform, RawChannelFrame, RawSample, MAX_SAMPLES};
