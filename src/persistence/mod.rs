//! Keyed record persistence
//!
//! A level file is a list of line records. Record 0 is level metadata, record 1
//! the high score table, the rest entity placements. Rewrites replace a single
//! record and leave every other line verbatim; the file is replaced atomically
//! (temp file in the same directory, then rename). Single writer assumed.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::PersistenceError;

/// Record index of the high score table in a level file
pub const HIGH_SCORE_RECORD: usize = 1;

/// Read/rewrite access to keyed records
pub trait RecordStore {
    /// Read every record
    fn read_records(&self) -> Result<Vec<String>, PersistenceError>;

    /// Read one record
    fn read_record(&self, key: usize) -> Result<String, PersistenceError> {
        let records = self.read_records()?;
        let len = records.len();
        records
            .into_iter()
            .nth(key)
            .ok_or(PersistenceError::MissingRecord { key, len })
    }

    /// Replace the record at `key`, leaving the others untouched
    fn rewrite_record(&mut self, key: usize, record: &str) -> Result<(), PersistenceError>;
}

/// Line-record store backed by a text file
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    path: PathBuf,
}

impl FileRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for FileRecordStore {
    fn read_records(&self) -> Result<Vec<String>, PersistenceError> {
        let text = fs::read_to_string(&self.path)?;
        Ok(text.lines().map(str::to_string).collect())
    }

    fn rewrite_record(&mut self, key: usize, record: &str) -> Result<(), PersistenceError> {
        let text = fs::read_to_string(&self.path)?;
        let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
        // Lines keep their own terminators so untouched ones are written back byte for byte
        let mut lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
        let len = lines.len();
        if key > len {
            return Err(PersistenceError::MissingRecord { key, len });
        }
        // Records are lines; a newline would shift every later key
        let record = record.replace(['\n', '\r'], " ");

        if key == len {
            // A header-only file has no table line yet
            if let Some(last) = lines.last_mut() {
                if !last.ends_with('\n') {
                    last.push_str(newline);
                }
            }
            lines.push(record + newline);
        } else {
            let line = &mut lines[key];
            let terminator = line_terminator(line);
            *line = record + terminator;
        }

        atomic_write(&self.path, lines.concat().as_bytes())?;
        log::debug!("Rewrote record {} of {}", key, self.path.display());
        Ok(())
    }
}

fn line_terminator(line: &str) -> &'static str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else if line.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}

/// In-memory store, used where no file backs the level
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    pub records: Vec<String>,
}

impl RecordStore for MemoryRecordStore {
    fn read_records(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.records.clone())
    }

    fn rewrite_record(&mut self, key: usize, record: &str) -> Result<(), PersistenceError> {
        if key == self.records.len() {
            self.records.push(String::new());
        }
        let len = self.records.len();
        let slot = self
            .records
            .get_mut(key)
            .ok_or(PersistenceError::MissingRecord { key, len })?;
        *slot = record.to_string();
        Ok(())
    }
}

/// Write `contents` to `path` via a sibling temp file and rename.
///
/// A crash mid-write leaves either the old file or the new one, never a mix.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), PersistenceError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "record".to_string());
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn level_file(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("level1.ab");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_rewrite_replaces_only_high_score_line() {
        let dir = TempDir::new().unwrap();
        let path = level_file(
            &dir,
            "1 1000 3000 4500 0 0.5\nalice:100;bob:80;\npig 2 0.5 0.5\n\n# tower\nwood 4 1 0.2 2\n",
        );
        let mut store = FileRecordStore::new(&path);

        store
            .rewrite_record(HIGH_SCORE_RECORD, "alice:100;carol:90;bob:80;")
            .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "1 1000 3000 4500 0 0.5\nalice:100;carol:90;bob:80;\npig 2 0.5 0.5\n\n# tower\nwood 4 1 0.2 2\n"
        );
        assert!(!dir.path().join(".level1.ab.tmp").exists());
    }

    #[test]
    fn test_rewrite_empty_high_score_line() {
        let dir = TempDir::new().unwrap();
        let path = level_file(&dir, "1 1 2 3 0 0\n\npig 2 0.5 0.5\n");
        let mut store = FileRecordStore::new(&path);

        store.rewrite_record(HIGH_SCORE_RECORD, "dave:7;").unwrap();
        assert_eq!(store.read_record(HIGH_SCORE_RECORD).unwrap(), "dave:7;");
        assert_eq!(store.read_record(2).unwrap(), "pig 2 0.5 0.5");
    }

    #[test]
    fn test_header_only_file_gains_table_line() {
        let dir = TempDir::new().unwrap();
        let path = level_file(&dir, "1 1 2 3 0 0\n");
        let mut store = FileRecordStore::new(&path);
        store.rewrite_record(HIGH_SCORE_RECORD, "x:1;").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1 1 2 3 0 0\nx:1;\n");
    }

    #[test]
    fn test_rewrite_keeps_line_endings() {
        let dir = TempDir::new().unwrap();
        let path = level_file(&dir, "1 1 2 3 0 0\r\nalice:1;\r\npig 2 0.5 0.5\r\n");
        let mut store = FileRecordStore::new(&path);
        store.rewrite_record(HIGH_SCORE_RECORD, "bob:2;alice:1;").unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "1 1 2 3 0 0\r\nbob:2;alice:1;\r\npig 2 0.5 0.5\r\n"
        );

        // Last line without a terminator stays without one
        let path = level_file(&dir, "1 1 2 3 0 0\nalice:1;");
        let mut store = FileRecordStore::new(&path);
        store.rewrite_record(HIGH_SCORE_RECORD, "bob:2;").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1 1 2 3 0 0\nbob:2;");
    }

    #[test]
    fn test_missing_record() {
        let dir = TempDir::new().unwrap();
        let path = level_file(&dir, "1 1 2 3 0 0\n");
        let mut store = FileRecordStore::new(&path);
        let err = store.rewrite_record(5, "x:1;").unwrap_err();
        assert!(matches!(err, PersistenceError::MissingRecord { key: 5, len: 1 }));
        // Untouched on failure
        assert_eq!(fs::read_to_string(&path).unwrap(), "1 1 2 3 0 0\n");
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut store = FileRecordStore::new(dir.path().join("nope.ab"));
        assert!(matches!(
            store.rewrite_record(HIGH_SCORE_RECORD, "x:1;"),
            Err(PersistenceError::Io(_))
        ));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryRecordStore {
            records: vec!["meta".into(), "".into()],
        };
        store.rewrite_record(HIGH_SCORE_RECORD, "a:1;").unwrap();
        assert_eq!(store.read_record(HIGH_SCORE_RECORD).unwrap(), "a:1;");
    }
}
