//! calreco-io: Event, calibration and configuration I/O for calreco.
//!
//! This crate reads JSON inputs through memory-mapped files via memmap2
//! and writes reconstructed hits as CSV or JSON lines.
//!

mod error;
mod reader;
pub mod records;
mod writer;

pub use error::{Error, Result};
pub use reader::{load_calibrations, load_parameter_set, EventFileReader, MappedFileReader};
pub use records::{CalibrationFile, CalibrationRecord, EventFile, EventRecord, HitRecord};
pub use writer::{HitFileWriter, OutputFormat};
