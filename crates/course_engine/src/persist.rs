use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("refusing to write outside the output directory: {0}")]
    UnsafePath(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Atomically writes files below `dir`: content goes to a temp file in the
/// target's directory and is renamed into place on commit.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Write `content` to `{dir}/{relative}`, replacing any existing file.
    pub fn write(&self, relative: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        let mut pending = self.begin(relative)?;
        pending.write_chunk(content)?;
        pending.commit()
    }

    /// Start an incremental write. Nothing appears at the target path until
    /// [`PendingFile::commit`]; dropping the pending file discards it.
    pub fn begin(&self, relative: &str) -> Result<PendingFile, PersistError> {
        let target = resolve_target(&self.dir, relative)?;
        let parent = target.parent().unwrap_or(&self.dir).to_path_buf();
        ensure_output_dir(&parent)?;
        let tmp = NamedTempFile::new_in(&parent)?;
        Ok(PendingFile {
            tmp,
            target,
            written: 0,
        })
    }
}

pub struct PendingFile {
    tmp: NamedTempFile,
    target: PathBuf,
    written: u64,
}

impl PendingFile {
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), PersistError> {
        self.tmp.write_all(chunk)?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn commit(mut self) -> Result<PathBuf, PersistError> {
        self.tmp.flush()?;
        self.tmp.as_file_mut().sync_all()?;
        self.tmp
            .persist(&self.target)
            .map_err(|e| PersistError::Io(e.error))?;
        Ok(self.target)
    }
}

/// Only plain relative components are accepted so a server-provided path can
/// never escape `dir`.
fn resolve_target(dir: &Path, relative: &str) -> Result<PathBuf, PersistError> {
    let relative_path = Path::new(relative);
    let mut has_file = false;
    for component in relative_path.components() {
        match component {
            Component::Normal(_) => has_file = true,
            Component::CurDir => {}
            _ => return Err(PersistError::UnsafePath(relative.to_string())),
        }
    }
    if !has_file {
        return Err(PersistError::UnsafePath(relative.to_string()));
    }
    Ok(dir.join(relative_path))
}
