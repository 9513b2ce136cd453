//! Corpus walking
//!
//! A corpus is a single file or a directory tree. `.jsonl` files hold one
//! document per line; any other allowed extension holds one document.

use crate::Result;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

/// One raw document and where it came from (`path` or `path:line`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusDoc {
    pub source_id: String,
    pub raw: String,
}

/// Lists corpus files with an allowed extension, sorted for a stable order
pub fn corpus_files(root: &Path, allow_extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if root.is_file() {
        if has_allowed_extension(root, allow_extensions) {
            files.push(root.to_path_buf());
        }
        return Ok(files);
    }
    collect_files(root, allow_extensions, &mut files)?;
    Ok(files)
}

fn collect_files(dir: &Path, allow_extensions: &[String], out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_files(&path, allow_extensions, out)?;
        } else if has_allowed_extension(&path, allow_extensions) {
            out.push(path);
        }
    }
    Ok(())
}

fn has_allowed_extension(path: &Path, allow_extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| allow_extensions.iter().any(|a| a == ext))
}

/// Lazily reads documents from corpus files, stopping after `max_items`
pub struct CorpusReader {
    files: std::vec::IntoIter<PathBuf>,
    current: Option<(PathBuf, Lines<BufReader<File>>, usize)>,
    remaining: Option<u64>,
}

impl CorpusReader {
    /// `max_items == 0` means no limit
    pub fn open(root: &Path, allow_extensions: &[String], max_items: u64) -> Result<Self> {
        let files = corpus_files(root, allow_extensions)?;
        tracing::info!("{} corpus files under {}", files.len(), root.display());
        Ok(Self {
            files: files.into_iter(),
            current: None,
            remaining: (max_items > 0).then_some(max_items),
        })
    }

    fn take_one(&mut self) {
        if let Some(n) = self.remaining.as_mut() {
            *n -= 1;
        }
    }
}

impl Iterator for CorpusReader {
    type Item = Result<CorpusDoc>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining == Some(0) {
                return None;
            }

            if let Some((path, lines, line_no)) = self.current.as_mut() {
                match lines.next() {
                    Some(Ok(line)) => {
                        let source_id = format!("{}:{}", path.display(), line_no);
                        *line_no += 1;
                        if line.trim().is_empty() {
                            continue;
                        }
                        self.take_one();
                        return Some(Ok(CorpusDoc { source_id, raw: line }));
                    }
                    Some(Err(e)) => {
                        self.current = None;
                        return Some(Err(e.into()));
                    }
                    None => {
                        self.current = None;
                        continue;
                    }
                }
            }

            let path = self.files.next()?;
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                match File::open(&path) {
                    Ok(file) => self.current = Some((path, BufReader::new(file).lines(), 0)),
                    Err(e) => return Some(Err(e.into())),
                }
                continue;
            }

            self.take_one();
            return Some(
                fs::read_to_string(&path)
                    .map(|raw| CorpusDoc {
                        source_id: path.display().to_string(),
                        raw,
                    })
                    .map_err(Into::into),
            );
        }
    }
}
