//! Document Store - one directory per document kind
//!
//! Bytes go to a temp file in the target directory and are renamed into
//! place, so a reader sees either the previous artifact or the complete new
//! one and a failed save leaves nothing behind.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Upper bound on `_N` suffixes tried for a unique name
const MAX_SUFFIX: u32 = 10_000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid document name: {0:?}")]
    InvalidName(String),

    #[error("No free name left for {0:?}")]
    NamesExhausted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Last write wins on a colliding name
    Overwrite,
    /// Never replace: `name.pdf`, then `name_1.pdf`, `name_2.pdf`, ...
    Unique,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub filename: String,
    pub path: PathBuf,
}

pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    /// Open the store, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(
        &self,
        filename: &str,
        bytes: &[u8],
        policy: WritePolicy,
    ) -> Result<StoredFile, StoreError> {
        check_name(filename)?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| self.io_error(&self.dir, e))?;
        tmp.write_all(bytes).map_err(|e| self.io_error(tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(tmp.path(), e))?;

        match policy {
            WritePolicy::Overwrite => {
                let path = self.dir.join(filename);
                tmp.persist(&path).map_err(|e| self.io_error(&path, e.error))?;
                Ok(StoredFile { filename: filename.to_string(), path })
            }
            WritePolicy::Unique => {
                for n in 0..=MAX_SUFFIX {
                    let candidate = suffixed(filename, n);
                    let path = self.dir.join(&candidate);
                    match tmp.persist_noclobber(&path) {
                        Ok(_) => return Ok(StoredFile { filename: candidate, path }),
                        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => tmp = e.file,
                        Err(e) => return Err(self.io_error(&path, e.error)),
                    }
                }
                Err(StoreError::NamesExhausted(filename.to_string()))
            }
        }
    }

    fn io_error(&self, path: &Path, source: io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn check_name(filename: &str) -> Result<(), StoreError> {
    if filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains(['/', '\\', '\0'])
    {
        return Err(StoreError::InvalidName(filename.to_string()));
    }
    Ok(())
}

/// `receipt.pdf` -> `receipt_3.pdf`; `n == 0` is the name itself
fn suffixed(filename: &str, n: u32) -> String {
    if n == 0 {
        return filename.to_string();
    }
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{}_{}.{}", stem, n, ext),
        None => format!("{}_{}", filename, n),
    }
}
