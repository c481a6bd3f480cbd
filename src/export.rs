//! CSV export of the rows shown by the active view.
//!
//! The file is opened once in append mode; each snapshot is formatted in
//! full and written with a single write followed by a flush, so a reader
//! never sees a partial snapshot.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::model::WaitInfo;
use crate::view::ActivityRow;

pub const HEADER: &str = "datetimeutc;pid;xmin;database;appname;user;client;cpu;memory;read;write;duration;wait;io_wait;state;query";

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Io(e) => write!(f, "CSV export: {}", e),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

/// Appends snapshots to a CSV file.
pub struct CsvExporter {
    file: File,
    path: PathBuf,
}

impl CsvExporter {
    /// Opens (or creates) the file; the header goes in only if it is empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if file.metadata()?.len() == 0 {
            file.write_all(format!("{}\n", HEADER).as_bytes())?;
            file.flush()?;
        }
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one row per given activity row, all stamped with `at`.
    pub fn write_snapshot(
        &mut self,
        at: DateTime<Utc>,
        rows: &[ActivityRow<'_>],
    ) -> Result<(), ExportError> {
        if rows.is_empty() {
            return Ok(());
        }
        let stamp = at.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let mut buf = String::new();
        for row in rows {
            buf.push_str(&format_row(&stamp, row));
            buf.push('\n');
        }
        self.file.write_all(buf.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn opt<T>(value: Option<T>, f: impl FnOnce(T) -> String) -> String {
    value.map(f).unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn wait_field(wait: &WaitInfo) -> String {
    match wait {
        WaitInfo::None => "N".to_string(),
        other => other.label(),
    }
}

/// One CSV line without the trailing newline.
pub fn format_row(stamp: &str, row: &ActivityRow<'_>) -> String {
    let delta = row.delta;
    let p = &delta.process;
    let fields = [
        stamp.to_string(),
        p.pid.to_string(),
        opt(p.xmin, |x| x.to_string()),
        opt(p.database.as_deref(), str::to_string),
        p.application_name.clone(),
        opt(p.user.as_deref(), str::to_string),
        opt(p.client.as_deref(), str::to_string),
        opt(delta.cpu, |v| format!("{:.2}", v)),
        opt(delta.mem, |v| format!("{:.2}", v)),
        opt(delta.read, |v| format!("{:.2}", v)),
        opt(delta.write, |v| format!("{:.2}", v)),
        opt(p.duration, |v| format!("{:.6}", v)),
        wait_field(&p.wait),
        opt(delta.io_wait, |w| if w { "Y" } else { "N" }.to_string()),
        p.state.clone(),
        opt(p.query.as_deref(), str::to_string),
    ];
    fields
        .iter()
        .map(|f| quote(f))
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProcessRow;
    use crate::rates::DeltaRow;
    use chrono::TimeZone;
    use std::fs;

    /// Splits `;`-separated, fully quoted records; newlines inside quotes
    /// belong to the field.
    fn parse_records(content: &str) -> Vec<Vec<String>> {
        let mut records = Vec::new();
        let mut fields = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut chars = content.chars().peekable();
        while let Some(c) = chars.next() {
            match (c, in_quotes) {
                ('"', true) if chars.peek() == Some(&'"') => {
                    current.push('"');
                    chars.next();
                }
                ('"', _) => in_quotes = !in_quotes,
                (';', false) => fields.push(std::mem::take(&mut current)),
                ('\n', false) => {
                    fields.push(std::mem::take(&mut current));
                    records.push(std::mem::take(&mut fields));
                }
                (c, _) => current.push(c),
            }
        }
        records
    }

    fn delta(pid: i32, query: &str) -> DeltaRow {
        DeltaRow {
            process: ProcessRow {
                pid,
                database: Some("app".to_string()),
                user: Some("alice".to_string()),
                application_name: "psql".to_string(),
                state: "active".to_string(),
                duration: Some(1.5),
                query: Some(query.to_string()),
                ..ProcessRow::default()
            },
            cpu: Some(12.5),
            ..DeltaRow::default()
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap()
    }

    #[test]
    fn header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let rows = vec![delta(1, "SELECT 1")];
        let selected: Vec<ActivityRow<'_>> = rows
            .iter()
            .map(|d| ActivityRow { delta: d, lock: None })
            .collect();

        let mut exporter = CsvExporter::open(&path).unwrap();
        exporter.write_snapshot(at(), &selected).unwrap();
        drop(exporter);
        let mut exporter = CsvExporter::open(&path).unwrap();
        exporter.write_snapshot(at(), &selected).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(content.matches("datetimeutc").count(), 1);
    }

    #[test]
    fn fields_are_quoted_and_formatted() {
        let d = delta(42, "SELECT \"x\";\n  FROM t");
        let line = format_row("2024-03-01T12:30:05Z", &ActivityRow { delta: &d, lock: None });
        assert!(line.starts_with("\"2024-03-01T12:30:05Z\";\"42\";\"N/A\";\"app\""));
        assert!(line.contains("\"12.50\";\"N/A\";\"N/A\";\"N/A\";\"1.500000\";\"N\";\"N/A\""));
        assert!(line.ends_with("\"SELECT \"\"x\"\";\n  FROM t\""));
    }

    #[test]
    fn reparsed_rows_match_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.csv");
        let rows = vec![
            delta(3, "UPDATE t SET a = ';'"),
            delta(1, "SELECT \"quoted\""),
            delta(2, "VACUUM"),
            delta(4, "SELECT \"a;b\"\n  FROM t\n WHERE c = ';'"),
        ];
        let selected: Vec<ActivityRow<'_>> = rows
            .iter()
            .map(|d| ActivityRow { delta: d, lock: None })
            .collect();
        CsvExporter::open(&path)
            .unwrap()
            .write_snapshot(at(), &selected)
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let records = parse_records(&content);
        assert_eq!(records[0].join(";"), HEADER);
        let parsed = &records[1..];
        assert_eq!(parsed.len(), rows.len());
        for (fields, source) in parsed.iter().zip(&rows) {
            assert_eq!(fields.len(), 16);
            assert_eq!(fields[0], "2024-03-01T12:30:05Z");
            assert_eq!(fields[1], source.process.pid.to_string());
            assert_eq!(fields[3], "app");
            assert_eq!(fields[4], "psql");
            assert_eq!(fields[5], "alice");
            assert_eq!(fields[14], "active");
            assert_eq!(Some(fields[15].as_str()), source.process.query.as_deref());
        }
    }

    #[test]
    fn empty_snapshot_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        CsvExporter::open(&path).unwrap().write_snapshot(at(), &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("{}\n", HEADER));
    }
}
