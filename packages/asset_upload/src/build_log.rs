//! Append-only build log.
//!
//! ```text
//!
//! --- Build started at 2024-05-01T10:00:00.000Z ---
//! ✅ Uploaded index.html → https://cdn.gov-cloud.ai/MAC/index.html
//! ❌ Failed script.js → Network error: HTTP 500 - Internal Server Error
//! --- Build finished at 2024-05-01T10:00:01.250Z ---
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::upload::Asset;

pub struct BuildLog<W: Write> {
    out: W,
}

impl BuildLog<File> {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> BuildLog<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn started(&mut self, at: DateTime<Utc>) -> io::Result<()> {
        write!(self.out, "\n--- Build started at {} ---\n", timestamp(at))
    }

    pub fn uploaded(&mut self, asset: Asset, public_url: &str) -> io::Result<()> {
        writeln!(self.out, "✅ Uploaded {} → {}", asset, public_url)
    }

    pub fn failed(&mut self, asset: Asset, error: &dyn std::fmt::Display) -> io::Result<()> {
        writeln!(self.out, "❌ Failed {} → {}", asset, error)
    }

    pub fn finished(&mut self, at: DateTime<Utc>) -> io::Result<()> {
        writeln!(self.out, "--- Build finished at {} ---", timestamp(at))?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// UTC with millisecond precision and a `Z` suffix.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_log_lines() {
        let mut log = BuildLog::new(Vec::new());
        log.started(at(1_714_557_600_000)).unwrap();
        log.uploaded(Asset::IndexHtml, "https://cdn.gov-cloud.ai/MAC/index.html")
            .unwrap();
        log.failed(Asset::ScriptJs, &"Network error: boom").unwrap();
        log.finished(at(1_714_557_601_250)).unwrap();

        let text = String::from_utf8(log.into_inner()).unwrap();
        assert_eq!(
            text,
            "\n--- Build started at 2024-05-01T10:00:00.000Z ---\n\
             ✅ Uploaded index.html → https://cdn.gov-cloud.ai/MAC/index.html\n\
             ❌ Failed script.js → Network error: boom\n\
             --- Build finished at 2024-05-01T10:00:01.250Z ---\n"
        );
    }

    #[test]
    fn test_open_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("log.txt");
        std::fs::write(&path, "previous\n").unwrap();

        let mut log = BuildLog::open(&path).unwrap();
        log.started(at(0)).unwrap();
        log.finished(at(0)).unwrap();
        drop(log);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("previous\n\n--- Build started at 1970-01-01T00:00:00.000Z"));
    }
}
