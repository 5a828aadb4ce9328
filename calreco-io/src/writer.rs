//! File writers for reconstructed hits.

use crate::records::HitRecord;
use crate::Result;
use calreco_core::{RecHit, Subdetector};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Output file layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Comma-separated values with a header line.
    Csv,
    /// One JSON object per line.
    JsonLines,
}

impl OutputFormat {
    /// Guesses the format from a file extension; anything but `.jsonl` and
    /// `.json` is CSV.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some("jsonl" | "json") => Self::JsonLines,
            _ => Self::Csv,
        }
    }
}

const CSV_HEADER: &str = "event,subdet,ieta,iphi,depth,energy,time";

/// Writer for reconstructed hits.
pub struct HitFileWriter<W: Write = BufWriter<File>> {
    writer: W,
    format: OutputFormat,
    hits_written: usize,
}

impl HitFileWriter {
    /// Creates a new file writer. CSV files start with a header line.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, format: OutputFormat) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), format)
    }
}

impl<W: Write> HitFileWriter<W> {
    /// Wraps an arbitrary writer.
    ///
    /// # Errors
    /// Returns an error if the CSV header cannot be written.
    pub fn new(mut writer: W, format: OutputFormat) -> Result<Self> {
        if format == OutputFormat::Csv {
            writeln!(writer, "{CSV_HEADER}")?;
        }
        Ok(Self {
            writer,
            format,
            hits_written: 0,
        })
    }

    /// Writes the hits of one event.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_hits<H: RecHit>(&mut self, event: u64, hits: &[H]) -> Result<()> {
        for hit in hits {
            let id = hit.id();
            let subdet = id.subdet().map_or("NULL", Subdetector::label);
            match self.format {
                OutputFormat::Csv => writeln!(
                    self.writer,
                    "{},{},{},{},{},{},{}",
                    event,
                    subdet,
                    id.ieta(),
                    id.iphi(),
                    id.depth(),
                    hit.energy(),
                    hit.time()
                )?,
                OutputFormat::JsonLines => {
                    let record = HitRecord {
                        event,
                        subdet: subdet.to_string(),
                        ieta: id.ieta(),
                        iphi: id.iphi(),
                        depth: id.depth(),
                        energy: hit.energy(),
                        time: hit.time(),
                    };
                    serde_json::to_writer(&mut self.writer, &record)?;
                    self.writer.write_all(b"\n")?;
                }
            }
        }
        self.hits_written += hits.len();
        Ok(())
    }

    /// Number of hits written so far.
    #[must_use]
    pub fn hits_written(&self) -> usize {
        self.hits_written
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes and returns the inner writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calreco_core::{ChannelId, HbheRecHit, HfRecHit, UNKNOWN_TIME};
    use tempfile::NamedTempFile;

    fn hits() -> Vec<HbheRecHit> {
        vec![
            HbheRecHit::new(
                ChannelId::new(Subdetector::Barrel, -7, 32, 1).unwrap(),
                12.5,
                3.25,
            ),
            HbheRecHit::new(
                ChannelId::new(Subdetector::Endcap, 20, 3, 2).unwrap(),
                0.5,
                UNKNOWN_TIME,
            ),
        ]
    }

    #[test]
    fn test_write_csv() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = HitFileWriter::create(file.path(), OutputFormat::Csv).unwrap();
        writer.write_hits(42, &hits()).unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.hits_written(), 2);

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "42,HB,-7,32,1,12.5,3.25");
        assert_eq!(lines[2], "42,HE,20,3,2,0.5,-9999");
    }

    #[test]
    fn test_write_json_lines() {
        let mut writer = HitFileWriter::new(Vec::new(), OutputFormat::JsonLines).unwrap();
        writer.write_hits(7, &hits()).unwrap();
        let forward = [HfRecHit::new(
            ChannelId::new(Subdetector::Forward, 30, 1, 1).unwrap(),
            8.0,
            2.0,
            4.0,
        )];
        writer.write_hits(8, &forward).unwrap();
        let bytes = writer.into_inner().unwrap();
        let content = String::from_utf8(bytes).unwrap();

        let records: Vec<HitRecord> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].subdet, "HB");
        assert_eq!(records[0].ieta, -7);
        assert_eq!(records[2].event, 8);
        assert_eq!(records[2].subdet, "HF");
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(OutputFormat::from_path("hits.jsonl"), OutputFormat::JsonLines);
        assert_eq!(OutputFormat::from_path("hits.csv"), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_path("hits"), OutputFormat::Csv);
    }
}
