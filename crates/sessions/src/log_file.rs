//! Filesystem side of a session: its append-only log file.

use std::{io, path::Path};

use {
    async_trait::async_trait,
    chrono::{DateTime, SecondsFormat, Utc},
    tokio::{fs::OpenOptions, io::AsyncWriteExt},
    tracing::trace,
};

/// Storage for session log lines.
///
/// Failures come back as values; implementations must never panic or exit.
#[async_trait]
pub trait LogWriter: Send + Sync {
    /// Create the file if it is missing. Idempotent.
    async fn ensure_file(&self, path: &Path) -> io::Result<()>;

    /// Open for append, write `line`, sync to disk and close.
    async fn append_line(&self, path: &Path, line: &str) -> io::Result<()>;
}

/// [`LogWriter`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLogWriter;

#[async_trait]
impl LogWriter for FsLogWriter {
    async fn ensure_file(&self, path: &Path) -> io::Result<()> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map(drop)
    }

    async fn append_line(&self, path: &Path, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(path).await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        file.sync_all().await?;
        trace!(path = %path.display(), bytes = line.len(), "appended log line");
        Ok(())
    }
}

/// `<RFC3339 nanos> Log: <content>\n`, with embedded line breaks escaped so
/// one call always yields one line.
pub fn format_log_line(at: DateTime<Utc>, content: &str) -> String {
    let content = content.replace('\r', "\\r").replace('\n', "\\n");
    format!(
        "{} Log: {content}\n",
        at.to_rfc3339_opts(SecondsFormat::Nanos, true)
    )
}

#[cfg(test)]
mod tests {
    use {super::*, chrono::TimeZone};

    #[test]
    fn formats_one_line() {
        let at = Utc.timestamp_opt(1_700_000_000, 5).unwrap();
        assert_eq!(
            format_log_line(at, "started"),
            "2023-11-14T22:13:20.000000005Z Log: started\n"
        );
    }

    #[test]
    fn escapes_line_breaks() {
        let line = format_log_line(Utc::now(), "a\nb\r\nc");
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.ends_with("Log: a\\nb\\r\\nc\n"));
    }

    #[tokio::test]
    async fn ensure_then_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        let writer = FsLogWriter;

        writer.ensure_file(&path).await.unwrap();
        writer.ensure_file(&path).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        writer.append_line(&path, "one\n").await.unwrap();
        writer.append_line(&path, "two\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[tokio::test]
    async fn missing_directory_is_an_error_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("session.log");
        assert!(FsLogWriter.ensure_file(&path).await.is_err());
        assert!(FsLogWriter.append_line(&path, "x\n").await.is_err());
    }
}
