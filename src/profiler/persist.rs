//! CSV persistence of the execution log.
//!
//! The persisted artifact is a two-column table:
//!
//! ```text
//! Timestamp,ResponseTime
//! 2025-03-04T10:15:02Z,1.532981
//! 2025-03-04T10:15:03Z,1.497113
//! ```
//!
//! Timestamps are RFC 3339 UTC with second precision, response times are
//! seconds with microsecond precision. Every write replaces the whole file.

use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::profiler::error::ProfilerError;
use crate::profiler::log::ExecutionSample;

/// Header row of the persisted file.
pub const CSV_HEADER: [&str; 2] = ["Timestamp", "ResponseTime"];

/// Destination for a full snapshot of the execution log.
///
/// Implementations replace any previous output with the given samples and
/// return the number of data rows written.
pub trait LogPersister: Send + Sync {
    fn persist(&self, samples: &[ExecutionSample]) -> Result<usize, ProfilerError>;

    /// Human-readable location for log messages.
    fn location(&self) -> String;
}

/// Writes the execution log to a CSV file, overwriting it each time.
#[derive(Debug, Clone)]
pub struct CsvPersister {
    path: PathBuf,
}

impl CsvPersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn persist_error(&self, source: csv::Error) -> ProfilerError {
        ProfilerError::Persist {
            path: self.path.clone(),
            source,
        }
    }
}

impl LogPersister for CsvPersister {
    fn persist(&self, samples: &[ExecutionSample]) -> Result<usize, ProfilerError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.path)
            .map_err(|e| self.persist_error(e))?;

        writer
            .write_record(CSV_HEADER)
            .map_err(|e| self.persist_error(e))?;
        for sample in samples {
            writer
                .write_record([
                    format_timestamp(&sample.timestamp),
                    format_response_time(sample.response_time),
                ])
                .map_err(|e| self.persist_error(e))?;
        }
        writer
            .flush()
            .map_err(|e| self.persist_error(csv::Error::from(e)))?;

        Ok(samples.len())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Format a sample timestamp as RFC 3339 with a `Z` suffix.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format a response time as decimal seconds.
pub fn format_response_time(response_time: Duration) -> String {
    format!("{:.6}", response_time.as_secs_f64())
}

/// Read a persisted execution log back into samples.
///
/// Fails if the header does not match [`CSV_HEADER`] or any row is malformed.
pub fn read_samples(path: &Path) -> Result<Vec<ExecutionSample>, ProfilerError> {
    let persist_error = |source: csv::Error| ProfilerError::Persist {
        path: path.to_path_buf(),
        source,
    };
    let malformed = |line: u64, message: String| ProfilerError::MalformedLog {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(persist_error)?;

    let headers = reader.headers().map_err(persist_error)?.clone();
    if headers.iter().ne(CSV_HEADER.iter().copied()) {
        return Err(malformed(
            1,
            format!("expected header {:?}, found {:?}", CSV_HEADER, headers),
        ));
    }

    let mut samples = Vec::new();
    for record in reader.records() {
        let record = record.map_err(persist_error)?;
        let line = record.position().map_or(0, |p| p.line());
        let (Some(raw_timestamp), Some(raw_response)) = (record.get(0), record.get(1)) else {
            return Err(malformed(line, "expected 2 columns".to_string()));
        };

        let timestamp = DateTime::parse_from_rfc3339(raw_timestamp)
            .map_err(|e| malformed(line, format!("bad timestamp '{raw_timestamp}': {e}")))?
            .with_timezone(&Utc);
        let seconds: f64 = raw_response
            .parse()
            .map_err(|e| malformed(line, format!("bad response time '{raw_response}': {e}")))?;
        let response_time = Duration::try_from_secs_f64(seconds)
            .map_err(|e| malformed(line, format!("bad response time '{raw_response}': {e}")))?;

        samples.push(ExecutionSample {
            timestamp,
            response_time,
        });
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(secs: i64, millis: u64) -> ExecutionSample {
        ExecutionSample {
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            response_time: Duration::from_millis(millis),
        }
    }

    #[test]
    fn test_format_timestamp_is_rfc3339_utc() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 4, 10, 15, 2).unwrap();
        assert_eq!(format_timestamp(&ts), "2025-03-04T10:15:02Z");
    }

    #[test]
    fn test_format_response_time_seconds() {
        assert_eq!(format_response_time(Duration::from_millis(1532)), "1.532000");
        assert_eq!(format_response_time(Duration::ZERO), "0.000000");
    }

    #[test]
    fn test_persist_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let persister = CsvPersister::new(&path);

        let rows = persister
            .persist(&[sample(0, 1500), sample(1, 250)])
            .unwrap();
        assert_eq!(rows, 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Timestamp,ResponseTime");
        assert_eq!(lines[1], "2023-11-14T22:13:20Z,1.500000");
        assert_eq!(lines[2], "2023-11-14T22:13:21Z,0.250000");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_persist_overwrites_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let persister = CsvPersister::new(&path);

        persister
            .persist(&[sample(0, 10), sample(1, 20), sample(2, 30)])
            .unwrap();
        persister.persist(&[sample(3, 40)]).unwrap();

        let samples = read_samples(&path).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].response_time, Duration::from_millis(40));
    }

    #[test]
    fn test_persist_empty_log_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        CsvPersister::new(&path).persist(&[]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Timestamp,ResponseTime\n"
        );
    }

    #[test]
    fn test_persist_into_missing_directory_fails() {
        let persister = CsvPersister::new("/nonexistent/dir/out.csv");
        let result = persister.persist(&[sample(0, 1)]);
        assert!(matches!(result, Err(ProfilerError::Persist { .. })));
    }

    #[test]
    fn test_read_samples_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let written = vec![sample(0, 1500), sample(1, 2), sample(5, 0)];
        CsvPersister::new(&path).persist(&written).unwrap();

        let read = read_samples(&path).unwrap();
        assert_eq!(read, written);
    }

    #[test]
    fn test_read_samples_rejects_wrong_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "When,Latency\n2025-03-04T10:15:02Z,1.0\n").unwrap();
        assert!(matches!(
            read_samples(&path),
            Err(ProfilerError::MalformedLog { line: 1, .. })
        ));
    }

    #[test]
    fn test_read_samples_rejects_negative_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(
            &path,
            "Timestamp,ResponseTime\n2025-03-04T10:15:02Z,-1.0\n",
        )
        .unwrap();
        match read_samples(&path) {
            Err(ProfilerError::MalformedLog { line, message, .. }) => {
                assert_eq!(line, 2);
                assert!(message.contains("-1.0"));
            }
            other => panic!("Expected MalformedLog, got {other:?}"),
        }
    }
}
