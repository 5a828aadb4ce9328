//! Serialized record types for event and calibration files.

use calreco_algorithms::{Jet, NoiseSummary};
use calreco_core::{
    CalibrationProvider, CalibrationTable, ChannelCalibration, ChannelId, ChannelWaveform,
    HfPreHit, RawChannelFrame, RunContext,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// One event as stored in an event file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub run: u32,
    pub event: u64,
    #[serde(default)]
    pub is_data: bool,
    /// Barrel/endcap frames. `None` when the collection is missing.
    pub channels: Option<Vec<RawChannelFrame>>,
    /// Forward pre-hits, if recorded.
    #[serde(default)]
    pub forward: Option<Vec<HfPreHit>>,
    #[serde(default)]
    pub noise_summary: Option<NoiseSummary>,
    #[serde(default)]
    pub jets: Option<Vec<Jet>>,
}

impl EventRecord {
    /// Run context of the event.
    #[must_use]
    pub fn run_context(&self) -> RunContext {
        RunContext {
            run_number: Some(self.run),
            is_data: self.is_data,
        }
    }

    /// Calibrated waveforms for the barrel/endcap frames, in file order.
    ///
    /// Returns `None` when the event has no frame collection.
    pub fn waveforms<C>(&self, calibrations: &C) -> Option<Vec<ChannelWaveform>>
    where
        C: CalibrationProvider + ?Sized,
    {
        self.channels.as_ref().map(|frames| {
            frames
                .par_iter()
                .map(|frame| frame.to_waveform(&calibrations.calibration(frame.id)))
                .collect()
        })
    }
}

/// Top-level layout of an event file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFile {
    pub events: Vec<EventRecord>,
}

/// Calibration constants of one channel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub id: ChannelId,
    #[serde(flatten)]
    pub calibration: ChannelCalibration,
}

/// Top-level layout of a calibration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFile {
    pub channels: Vec<CalibrationRecord>,
    /// Constants for channels missing from `channels`.
    #[serde(default)]
    pub fallback: Option<ChannelCalibration>,
}

impl CalibrationFile {
    /// Builds a lookup table. Later duplicates replace earlier entries.
    #[must_use]
    pub fn into_table(self) -> CalibrationTable {
        let mut table = CalibrationTable::new();
        if let Some(fallback) = self.fallback {
            table = table.with_fallback(fallback);
        }
        for record in self.channels {
            if table.contains(record.id) {
                log::warn!("duplicate calibration for channel {}", record.id);
            }
            table.insert(record.id, record.calibration);
        }
        table
    }
}

/// One reconstructed hit as written to JSON-lines output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    pub event: u64,
    pub subdet: String,
    pub ieta: i32,
    pub iphi: u32,
    pub depth: u32,
    pub energy: f32,
    pub time: f32,
}
