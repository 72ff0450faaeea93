//! A small key-value store backed by a `.env` file.
//!
//! Only `KEY=value` lines are interpreted. Comments, blank lines and
//! entries this process never touches are written back as they were read.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The error returned when the file cannot be read or written.
#[derive(Debug, thiserror::Error)]
pub enum EnvStoreError {
    /// The file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// The file path.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// The file path.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
}

#[derive(Clone, Debug)]
enum Line {
    Entry {
        key: String,
        value: String,
        // The original text, dropped once the value changes.
        raw: Option<String>,
    },
    Other(String),
}

/// The contents of a `.env` file.
#[derive(Clone, Debug)]
pub struct EnvStore {
    path: PathBuf,
    lines: Vec<Line>,
}

impl EnvStore {
    /// Reads the file at `path`. A missing file yields an empty store.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, EnvStoreError> {
        let path = path.into();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("{} does not exist, starting empty", path.display());
                String::new()
            }
            Err(source) => return Err(EnvStoreError::Read { path, source }),
        };
        let lines = text.lines().map(parse_line).collect();
        Ok(Self { path, lines })
    }

    /// Returns the path of the backing file.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the value of `key`. Later definitions win.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().rev().find_map(|line| match line {
            Line::Entry { key: k, value, .. } if k.as_str() == key => {
                Some(value.as_str())
            }
            _ => None,
        })
    }

    /// Sets `key` to `value`, in place if the key exists already.
    ///
    /// Changes are kept in memory until [`save`](Self::save) is called.
    pub fn set<V: Into<String>>(&mut self, key: &str, value: V) {
        let value = value.into();
        let existing =
            self.lines.iter_mut().rev().find_map(|line| match line {
                Line::Entry {
                    key: k,
                    value: old,
                    raw,
                } if k.as_str() == key => Some((old, raw)),
                _ => None,
            });
        match existing {
            Some((old, raw)) => {
                if *old != value {
                    *old = value;
                    *raw = None;
                }
            }
            None => self.lines.push(Line::Entry {
                key: key.to_owned(),
                value,
                raw: None,
            }),
        }
    }

    /// Removes every definition of `key` and returns the effective value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let previous = self.get(key).map(str::to_owned);
        self.lines.retain(|line| match line {
            Line::Entry { key: k, .. } => k.as_str() != key,
            Line::Other(_) => true,
        });
        previous
    }

    /// Writes the store back to its file.
    pub fn save(&self) -> Result<(), EnvStoreError> {
        let mut text = String::new();
        for line in &self.lines {
            match line {
                Line::Entry {
                    raw: Some(raw), ..
                }
                | Line::Other(raw) => text.push_str(raw),
                Line::Entry {
                    key,
                    value,
                    raw: None,
                } => {
                    text.push_str(key);
                    text.push('=');
                    text.push_str(&quote(value));
                }
            }
            text.push('\n');
        }
        fs::write(&self.path, text).map_err(|source| EnvStoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

fn parse_line(raw: &str) -> Line {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Line::Other(raw.to_owned());
    }
    let assignment = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let Some((key, value)) = assignment.split_once('=') else {
        return Line::Other(raw.to_owned());
    };
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Line::Other(raw.to_owned());
    }
    Line::Entry {
        key: key.to_owned(),
        value: unquote(value.trim()),
        raw: Some(raw.to_owned()),
    }
}

fn unquote(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some('\'') => {
            if let Some(end) = value[1..].find('\'') {
                return value[1..1 + end].to_owned();
            }
        }
        Some('"') => {
            let mut out = String::with_capacity(value.len());
            while let Some(c) = chars.next() {
                match c {
                    // Anything after the closing quote is a comment.
                    '"' => return out,
                    '\\' => match chars.next() {
                        Some('n') => out.push('\n'),
                        Some(other) => out.push(other),
                        None => out.push('\\'),
                    },
                    c => out.push(c),
                }
            }
        }
        _ => {}
    }
    // Unquoted values may carry a trailing comment.
    match value.find(" #") {
        Some(idx) => value[..idx].trim_end().to_owned(),
        None => value.to_owned(),
    }
}

fn quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '_' | '-' | '.' | '/' | ':')
        });
    if plain {
        return value.to_owned();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = EnvStore::open(dir.path().join(".env")).unwrap();
        assert_eq!(store.get("THREAD_ID"), None);
    }

    #[test]
    fn test_parse_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "# ids\nexport A=1\nB = 'two words'\nC=\"say \\\"hi\\\"\"\n\
             D=plain # note\nE=\"quoted # kept\" # note\nF='single' # note\n\
             not an entry\n",
        )
        .unwrap();

        let store = EnvStore::open(&path).unwrap();
        assert_eq!(store.get("A"), Some("1"));
        assert_eq!(store.get("B"), Some("two words"));
        assert_eq!(store.get("C"), Some("say \"hi\""));
        assert_eq!(store.get("D"), Some("plain"));
        assert_eq!(store.get("E"), Some("quoted # kept"));
        assert_eq!(store.get("F"), Some("single"));
        assert_eq!(store.get("not an entry"), None);
    }

    #[test]
    fn test_save_preserves_unrelated_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "# secrets\nOPENAI_API_KEY=sk-123\n\nTHREAD_ID=thread_old\n",
        )
        .unwrap();

        let mut store = EnvStore::open(&path).unwrap();
        store.set("THREAD_ID", "thread_new");
        store.set("ASSISTANT_ID", "asst_1");
        store.set("NOTE", "needs quoting");
        store.save().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "# secrets\nOPENAI_API_KEY=sk-123\n\nTHREAD_ID=thread_new\n\
             ASSISTANT_ID=asst_1\nNOTE=\"needs quoting\"\n"
        );

        let reopened = EnvStore::open(&path).unwrap();
        assert_eq!(reopened.get("NOTE"), Some("needs quoting"));
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "THREAD_ID=a\nKEEP=1\nTHREAD_ID=b\n").unwrap();

        let mut store = EnvStore::open(&path).unwrap();
        assert_eq!(store.remove("THREAD_ID").as_deref(), Some("b"));
        assert_eq!(store.remove("THREAD_ID"), None);
        store.save().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "KEEP=1\n");
    }
}
