//! Append-only persistence of raw tool outputs.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Local;
use rand::Rng;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const SUFFIX_LEN: usize = 4;
const MAX_NAME_ATTEMPTS: usize = 16;

/// Identifies an entry written to a [`LogStore`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LogEntry {
    /// The unique name of the entry.
    pub name: String,
    /// The tool whose output was stored.
    pub tool_name: String,
}

/// The error returned when an entry cannot be written.
#[derive(Debug, thiserror::Error)]
pub enum LogStoreError {
    /// The underlying storage failed.
    #[error("failed to write log entry: {0}")]
    Io(#[from] io::Error),
    /// No unused entry name was found.
    #[error("no unique log entry name available for `{0}`")]
    NameExhausted(String),
}

/// A sink for tool outputs.
///
/// Every call to [`append`](LogStore::append) creates a new entry. Entries
/// are never overwritten or deleted by the store.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Stores `content` as a new entry for `tool_name`.
    async fn append(
        &self,
        tool_name: &str,
        content: &str,
    ) -> Result<LogEntry, LogStoreError>;
}

/// A [`LogStore`] that writes one file per entry into a directory.
///
/// Files are named `<timestamp>_<tool>_<suffix>.out`, where the timestamp
/// is local time formatted as `YYYYMMDDTHHMMSS.mmm` and the suffix is four
/// random lowercase letters.
#[derive(Clone, Debug)]
pub struct FsLogStore {
    dir: PathBuf,
}

impl FsLogStore {
    /// Creates a store that writes into `dir`. The directory is created on
    /// the first write.
    #[inline]
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the directory entries are written to.
    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl LogStore for FsLogStore {
    async fn append(
        &self,
        tool_name: &str,
        content: &str,
    ) -> Result<LogEntry, LogStoreError> {
        fs::create_dir_all(&self.dir).await?;

        let timestamp = Local::now().format("%Y%m%dT%H%M%S%.3f").to_string();
        let tool_part = sanitize(tool_name);
        for _ in 0..MAX_NAME_ATTEMPTS {
            let name =
                format!("{timestamp}_{tool_part}_{}.out", random_suffix());
            let path = self.dir.join(&name);
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            let mut file = match file {
                Ok(file) => file,
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    trace!("log entry {name} exists, drawing another suffix");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            file.write_all(content.as_bytes()).await?;
            file.flush().await?;

            debug!("wrote {} bytes to {}", content.len(), path.display());
            return Ok(LogEntry {
                name,
                tool_name: tool_name.to_owned(),
            });
        }
        Err(LogStoreError::NameExhausted(tool_name.to_owned()))
    }
}

/// A [`LogStore`] that keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    entries: Mutex<Vec<(LogEntry, String)>>,
}

impl MemoryLogStore {
    /// Creates an empty store.
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns all entries with their content, oldest first.
    pub fn entries(&self) -> Vec<(LogEntry, String)> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn append(
        &self,
        tool_name: &str,
        content: &str,
    ) -> Result<LogEntry, LogStoreError> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = LogEntry {
            name: format!("{}_{tool_name}", entries.len()),
            tool_name: tool_name.to_owned(),
        };
        entries.push((entry.clone(), content.to_owned()));
        Ok(entry)
    }
}

fn sanitize(tool_name: &str) -> String {
    let name: String = tool_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        "unknown".to_owned()
    } else {
        name
    }
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_entries_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsLogStore::new(dir.path().join("logs"));

        let mut names = vec![];
        for i in 0..20 {
            let entry = store
                .append("read_file", &format!("content {i}"))
                .await
                .unwrap();
            names.push(entry.name);
        }
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 20);

        let mut files =
            std::fs::read_dir(store.dir()).unwrap().collect::<Vec<_>>();
        assert_eq!(files.len(), 20);

        let file = files.pop().unwrap().unwrap();
        let name = file.file_name().into_string().unwrap();
        let (timestamp, rest) = name.split_once('_').unwrap();
        assert_eq!(timestamp.len(), "20240101T120000.000".len());
        assert_eq!(&timestamp[8..9], "T");
        assert!(rest.starts_with("read_file_"));
        assert!(rest.ends_with(".out"));
        let suffix = &rest["read_file_".len()..rest.len() - ".out".len()];
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase()));

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.starts_with("content "));
    }

    #[tokio::test]
    async fn test_fs_tool_name_is_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsLogStore::new(dir.path());
        let entry = store.append("../evil", "").await.unwrap();
        assert!(entry.name.contains("____evil_"));
        assert_eq!(entry.tool_name, "../evil");
        assert!(dir.path().join(&entry.name).exists());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryLogStore::new();
        store.append("sleep", "").await.unwrap();
        store.append("web_search", "results").await.unwrap();

        let entries = store.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].0.tool_name, "web_search");
        assert_eq!(entries[1].1, "results");
    }
}
