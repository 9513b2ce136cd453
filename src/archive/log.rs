//! Append-only crawl and error logs
//!
//! Both logs are observational only. Resumption never reads them back.

use crate::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// One line per successfully archived item
#[derive(Debug, Clone)]
pub struct CrawlLog {
    path: PathBuf,
}

impl CrawlLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, line: &str) -> Result<()> {
        append_line(&self.path, line)
    }
}

/// Context lines for every error that was swallowed
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `[error] <context>`
    ///
    /// A failure to write the error log is reported through tracing and
    /// otherwise ignored, so it never masks the original error.
    pub fn record(&self, context: &str) {
        tracing::error!("{}", context);
        if let Err(e) = append_line(&self.path, &format!("[error] {}", context)) {
            tracing::warn!("Failed to append to {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_logs_append() {
        let dir = TempDir::new().unwrap();
        let crawl = CrawlLog::new(dir.path().join("logs/aops.log"));
        crawl.record("category 6, topic_id: 1").unwrap();
        crawl.record("category 6, topic_id: 2").unwrap();

        let errors = ErrorLog::new(dir.path().join("error.log"));
        errors.record("topic /community/c6h3 (timeout)");

        assert_eq!(
            std::fs::read_to_string(crawl.path()).unwrap(),
            "category 6, topic_id: 1\ncategory 6, topic_id: 2\n"
        );
        assert_eq!(
            std::fs::read_to_string(errors.path()).unwrap(),
            "[error] topic /community/c6h3 (timeout)\n"
        );
    }
}
