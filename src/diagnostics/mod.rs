//! Append-only diagnostic records for failed poll cycles.
//!
//! Each record lands in its own timestamped file under the debug folder and
//! preserves the raw response text that triggered the failure. Nothing in
//! the process ever reads these back; a failed write is logged and dropped.

use chrono::Local;
use log::error;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub struct DiagnosticsLog {
    dir: PathBuf,
}

impl DiagnosticsLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn record(&self, kind: &str, message: &str, raw: &str) {
        if let Err(err) = self.try_record(kind, message, raw) {
            error!("Failed to write diagnostic record: {}", err);
        }
    }

    fn try_record(&self, kind: &str, message: &str, raw: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let stamp = Local::now().format("%d_%m_%y_%H:%M:%S");
        let path = self.dir.join(format!("error_log_{}.txt", stamp));
        let mut file = OpenOptions::new().append(true).create(true).open(path)?;
        writeln!(file, "{}: {}\n\ncontent: {}\n", kind, message, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_creates_a_timestamped_file_with_the_raw_body() {
        let dir = tempfile::tempdir().unwrap();
        let log = DiagnosticsLog::new(dir.path().to_path_buf());
        log.record("DecodeError", "expected value at line 1", "<html>oops</html>");

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let path = entries[0].as_ref().unwrap().path();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("error_log_"));
        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.contains("DecodeError: expected value at line 1"));
        assert!(contents.contains("content: <html>oops</html>"));
    }

    #[test]
    fn missing_debug_folder_is_created_on_first_record() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("debug");
        let log = DiagnosticsLog::new(nested.clone());
        log.record("DecodeError", "boom", "raw");
        assert!(nested.is_dir());
    }
}
