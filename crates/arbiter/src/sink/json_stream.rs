//! NDJSON (newline-delimited JSON) stream sink.
//!
//! Each row is serialized straight into a buffered writer, no intermediate
//! `String`.
//!
//! ```ignore
//! let mut sink = JsonStreamSink::stdout();
//! sink.write_events(&rows)?;
//! sink.write_summary(&summary)?;
//! let n = sink.finish()?;
//! ```

use super::{EventRow, RunSummaryRow};
use serde::Serialize;
use std::io::{self, BufWriter, Write};

/// Buffered NDJSON writer over any `Write`.
pub struct JsonStreamSink<W: Write> {
    writer: BufWriter<W>,
    rows_written: usize,
}

impl JsonStreamSink<io::Stdout> {
    /// Write NDJSON to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonStreamSink<W> {
    /// Create a sink wrapping any writer (file, Vec<u8>, etc.).
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(64 * 1024, writer),
            rows_written: 0,
        }
    }

    /// Write all event rows.
    pub fn write_events(&mut self, rows: &[EventRow]) -> io::Result<()> {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    /// Write the run summary row.
    pub fn write_summary(&mut self, row: &RunSummaryRow) -> io::Result<()> {
        self.write_row(row)
    }

    /// Flush and return how many rows were written.
    pub fn finish(mut self) -> io::Result<usize> {
        self.writer.flush()?;
        Ok(self.rows_written)
    }

    /// Number of rows written so far.
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    fn write_row<T: Serialize>(&mut self, row: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, row).map_err(io::Error::other)?;
        self.writer.write_all(b"\n")?;
        self.rows_written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndjson_one_row_per_line() {
        let mut buf = Vec::new();
        let mut sink = JsonStreamSink::new(&mut buf);

        let events = vec![
            EventRow {
                row_type: "event",
                seq: 0,
                client: 1,
                outcome: "granted",
                units: vec![2, 0, 1],
                reason: None,
                detail: None,
            },
            EventRow {
                row_type: "event",
                seq: 1,
                client: 0,
                outcome: "denied",
                units: vec![5, 5, 5],
                reason: Some("unsafe"),
                detail: Some("granting would leave the system in an unsafe state".into()),
            },
        ];
        let summary = RunSummaryRow {
            row_type: "summary",
            clients: 2,
            resources: 3,
            total: vec![7, 7, 7],
            final_available: vec![7, 7, 7],
            requests: 40,
            grants: 31,
            denials: 9,
            releases: 2,
            elapsed_ms: 3,
        };

        sink.write_events(&events).unwrap();
        assert_eq!(sink.rows_written(), 2);
        sink.write_summary(&summary).unwrap();
        let n = sink.finish().unwrap();
        assert_eq!(n, 3);

        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.trim().split('\n').collect();
        assert_eq!(lines.len(), 3);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["reason"], "unsafe");
        let last: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(last["row_type"], "summary");
        assert_eq!(last["grants"], 31);
    }
}
