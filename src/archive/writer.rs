//! Idempotent record persistence
//!
//! A record is serialized to bytes first. If a record already exists at the
//! same path the bytes are compared; identical bytes leave the file (and its
//! mtime) untouched, anything else replaces the whole file through a
//! temporary file renamed over the target.

use crate::archive::preview::PreviewTemplate;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Stable address of an archive record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    /// Numeric id used to pick the shard directory
    pub shard_id: i64,

    /// File stem, e.g. `aops-c6h123p456` or `mse4711`
    pub name: String,
}

impl RecordKey {
    pub fn new(shard_id: i64, name: impl Into<String>) -> Self {
        Self {
            shard_id,
            name: name.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The on-disk content of one archived item
///
/// Fields are declared in sorted order so the serialized keys are sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub text: String,
    pub url: String,
}

impl ArchiveRecord {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tags: None,
            text: text.into(),
            url: url.into(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Serializes the record to its canonical byte form
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, AsciiSpacedFormatter);
        self.serialize(&mut ser)?;
        Ok(buf)
    }
}

/// Result of a write attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOutcome {
    Created,
    Overwritten,
    Unchanged,
    /// The record exists and overwriting was disabled; nothing was fetched
    Skipped,
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Overwritten => "overwritten",
            Self::Unchanged => "unchanged",
            Self::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// Writes records into `<root>/<shard>/<name>.json`
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    root: PathBuf,
    divisions: u64,
    preview: Option<PreviewTemplate>,
}

impl ArchiveWriter {
    /// Creates a writer; `divisions` is clamped to at least one shard
    pub fn new(root: impl Into<PathBuf>, divisions: u64) -> Self {
        Self {
            root: root.into(),
            divisions: divisions.max(1),
            preview: None,
        }
    }

    /// Enables `.html` previews next to each written record
    pub fn with_preview(mut self, template: PreviewTemplate) -> Self {
        self.preview = Some(template);
        self
    }

    pub fn previews_enabled(&self) -> bool {
        self.preview.is_some()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn shard_dir(&self, key: &RecordKey) -> PathBuf {
        let shard = key.shard_id.rem_euclid(self.divisions as i64);
        self.root.join(shard.to_string())
    }

    pub fn record_path(&self, key: &RecordKey) -> PathBuf {
        self.shard_dir(key).join(format!("{}.json", key.name))
    }

    pub fn preview_path(&self, key: &RecordKey) -> PathBuf {
        self.shard_dir(key).join(format!("{}.html", key.name))
    }

    /// Returns true if a record file exists for this key
    pub fn exists(&self, key: &RecordKey) -> bool {
        self.record_path(key).is_file()
    }

    /// Persists a record unless identical bytes are already on disk
    ///
    /// # Arguments
    ///
    /// * `key` - Address of the record
    /// * `record` - Candidate content
    ///
    /// # Returns
    ///
    /// * `Ok(WriteOutcome::Created)` - No record existed
    /// * `Ok(WriteOutcome::Overwritten)` - A different record was replaced
    /// * `Ok(WriteOutcome::Unchanged)` - The stored bytes already matched
    /// * `Err(ArchiveError)` - Serialization or filesystem failure
    pub fn write(&self, key: &RecordKey, record: &ArchiveRecord) -> Result<WriteOutcome> {
        let bytes = record.to_bytes()?;
        let path = self.record_path(key);

        let outcome = match fs::read(&path) {
            Ok(existing) if existing == bytes => {
                tracing::debug!("[identical, no touch] {}", path.display());
                return Ok(WriteOutcome::Unchanged);
            }
            Ok(_) => WriteOutcome::Overwritten,
            Err(e) if e.kind() == io::ErrorKind::NotFound => WriteOutcome::Created,
            Err(e) => return Err(e.into()),
        };

        let dir = self.shard_dir(key);
        fs::create_dir_all(&dir)?;
        write_atomic(&dir, &path, &bytes)?;

        if let Some(template) = &self.preview {
            let html = template.render(&record.text, &record.url);
            write_atomic(&dir, &self.preview_path(key), html.as_bytes())?;
        }

        tracing::debug!("[{}] {}", outcome, path.display());
        Ok(outcome)
    }
}

/// Writes the complete buffer to a temp file in `dir`, then renames it
fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> Result<()> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// JSON layout with `", "` / `": "` separators and ASCII-only output
///
/// Characters outside printable ASCII are written as `\uXXXX` escapes
/// (surrogate pairs above the BMP), so stored records are stable bytes
/// regardless of the platform encoding.
struct AsciiSpacedFormatter;

impl serde_json::ser::Formatter for AsciiSpacedFormatter {
    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            if c.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(text: &str) -> ArchiveRecord {
        ArchiveRecord::new("https://example.com/q/1", text)
    }

    #[test]
    fn test_serialization_layout() {
        let bytes = record("a\n\"b\"")
            .with_tags(vec!["algebra".into(), "geometry".into()])
            .to_bytes()
            .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"tags": ["algebra", "geometry"], "text": "a\n\"b\"", "url": "https://example.com/q/1"}"#
        );
    }

    #[test]
    fn test_non_ascii_is_escaped() {
        let bytes = record("é 😀").to_bytes().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"text": "\u00e9 \ud83d\ude00", "url": "https://example.com/q/1"}"#
        );
    }

    #[test]
    fn test_delete_stays_raw_and_controls_are_escaped() {
        let bytes = record("a\u{7f}b\t\u{1f}").to_bytes().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "{\"text\": \"a\u{7f}b\\t\\u001f\", \"url\": \"https://example.com/q/1\"}"
        );
    }

    #[test]
    fn test_created_then_unchanged() {
        let dir = TempDir::new().unwrap();
        let writer = ArchiveWriter::new(dir.path(), 500);
        let key = RecordKey::new(1234, "mse1234");

        assert_eq!(writer.write(&key, &record("x")).unwrap(), WriteOutcome::Created);
        let mtime = fs::metadata(writer.record_path(&key)).unwrap().modified().unwrap();

        assert_eq!(writer.write(&key, &record("x")).unwrap(), WriteOutcome::Unchanged);
        let again = fs::metadata(writer.record_path(&key)).unwrap().modified().unwrap();
        assert_eq!(mtime, again);
    }

    #[test]
    fn test_created_then_overwritten() {
        let dir = TempDir::new().unwrap();
        let writer = ArchiveWriter::new(dir.path(), 500);
        let key = RecordKey::new(7, "mse7");

        assert_eq!(writer.write(&key, &record("old")).unwrap(), WriteOutcome::Created);
        assert_eq!(writer.write(&key, &record("new")).unwrap(), WriteOutcome::Overwritten);

        let stored = fs::read(writer.record_path(&key)).unwrap();
        assert_eq!(stored, record("new").to_bytes().unwrap());
    }

    #[test]
    fn test_shard_path() {
        let writer = ArchiveWriter::new("/archive", 500);
        let key = RecordKey::new(1234, "aops-c6h1234p99");
        assert_eq!(
            writer.record_path(&key),
            PathBuf::from("/archive/234/aops-c6h1234p99.json")
        );
    }

    #[test]
    fn test_preview_written_only_on_change() {
        let dir = TempDir::new().unwrap();
        let writer = ArchiveWriter::new(dir.path(), 10)
            .with_preview(PreviewTemplate::new("<p>{PREVIEW}</p><a>{URL}</a>"));
        let key = RecordKey::new(3, "mse3");

        writer.write(&key, &record("l1\nl2")).unwrap();
        let preview_path = writer.preview_path(&key);
        assert_eq!(
            fs::read_to_string(&preview_path).unwrap(),
            "<p>l1</br>l2</p><a>https://example.com/q/1</a>"
        );

        fs::remove_file(&preview_path).unwrap();
        assert_eq!(writer.write(&key, &record("l1\nl2")).unwrap(), WriteOutcome::Unchanged);
        assert!(!preview_path.exists());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let writer = ArchiveWriter::new(dir.path(), 1);
        let key = RecordKey::new(0, "one");
        writer.write(&key, &record("a")).unwrap();
        writer.write(&key, &record("b")).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path().join("0")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
