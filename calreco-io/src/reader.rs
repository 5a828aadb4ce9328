//! Memory-mapped file readers.
//!

use crate::records::{CalibrationFile, EventFile, EventRecord};
use crate::{Error, Result};
use calreco_core::{CalibrationTable, ParameterSet};
use memmap2::Mmap;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A memory-mapped file reader.
///
/// Uses memmap2 to access file contents without copying the whole file
/// into memory.
pub struct MappedFileReader {
    mmap: Option<Mmap>,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // Zero-length files cannot be mapped on every platform.
        let mmap = if file.metadata()?.len() == 0 {
            None
        } else {
            // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
            // This is the standard safety contract for memory mapping.
            #[allow(unsafe_code)]
            let mmap = unsafe { Mmap::map(&file)? };
            Some(mmap)
        };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Path the reader was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses the whole file as JSON.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] for an empty file and
    /// [`Error::Json`] for malformed content.
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.is_empty() {
            return Err(Error::InvalidFormat(format!(
                "{} is empty",
                self.path.display()
            )));
        }
        Ok(serde_json::from_slice(self.as_bytes())?)
    }
}

/// Reader for JSON event files.
pub struct EventFileReader {
    events: Vec<EventRecord>,
    path: PathBuf,
}

impl EventFileReader {
    /// Opens and parses an event file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid event
    /// file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(&path)?;
        let file: EventFile = reader.parse_json()?;
        log::debug!(
            "read {} events from {}",
            file.events.len(),
            reader.path().display()
        );
        Ok(Self {
            events: file.events,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Events in file order.
    #[must_use]
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Consumes the reader, returning its events.
    #[must_use]
    pub fn into_events(self) -> Vec<EventRecord> {
        self.events
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the file holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Path of the event file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Distinct run numbers in order of first appearance.
    #[must_use]
    pub fn runs(&self) -> Vec<u32> {
        let mut runs: Vec<u32> = Vec::new();
        for event in &self.events {
            if !runs.contains(&event.run) {
                runs.push(event.run);
            }
        }
        runs
    }
}

/// Loads a calibration file into a lookup table.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load_calibrations<P: AsRef<Path>>(path: P) -> Result<CalibrationTable> {
    let reader = MappedFileReader::open(path)?;
    let file: CalibrationFile = reader.parse_json()?;
    let table = file.into_table();
    log::debug!(
        "loaded {} channel calibrations from {}",
        table.len(),
        reader.path().display()
    );
    Ok(table)
}

/// Loads an algorithm parameter set.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a JSON object of
/// parameters.
pub fn load_parameter_set<P: AsRef<Path>>(path: P) -> Result<ParameterSet> {
    MappedFileReader::open(path)?.parse_json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_mapped_reader() {
        let file = write_temp("{\"a\": 1}");
        let reader = MappedFileReader::open(file.path()).unwrap();
        assert_eq!(reader.len(), 8);
        assert!(!reader.is_empty());
        assert_eq!(reader.as_bytes(), b"{\"a\": 1}");
    }

    #[test]
    fn test_empty_file_is_invalid() {
        let file = NamedTempFile::new().unwrap();
        let reader = MappedFileReader::open(file.path()).unwrap();
        assert!(reader.is_empty());
        let err = reader.parse_json::<ParameterSet>().unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            MappedFileReader::open("/nonexistent/calreco/events.json"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        let file = write_temp("{\"events\": [");
        assert!(matches!(
            EventFileReader::open(file.path()),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_event_file_runs() {
        let file = write_temp(
            r#"{"events": [
                {"run": 5, "event": 1, "channels": []},
                {"run": 5, "event": 2, "channels": []},
                {"run": 3, "event": 3, "channels": null}
            ]}"#,
        );
        let reader = EventFileReader::open(file.path()).unwrap();
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.runs(), vec![5, 3]);
        assert!(reader.events()[2].channels.is_none());
    }

    #[test]
    fn test_load_parameter_set() {
        let file = write_temp(
            r#"{"Class": "SimpleHBHEPhase1Algo", "firstSampleShift": -1,
                "samplesToAdd": 3, "phaseNS": 6.0}"#,
        );
        let ps = load_parameter_set(file.path()).unwrap();
        assert_eq!(ps.get_string("Class").unwrap(), "SimpleHBHEPhase1Algo");
        assert_eq!(ps.get_i32("firstSampleShift").unwrap(), -1);
        assert_eq!(ps.get_i32("samplesToAdd").unwrap(), 3);
    }
}
