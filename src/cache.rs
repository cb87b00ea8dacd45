//! On-disk cache of algorithm results.
//!
//! LEXIMIN runs can take long and LEGACY samples are only comparable
//! when reused, so every run is stored as a JSON blob keyed by instance
//! name, panel size and an algorithm tag (LEGACY carries its seed in the
//! tag: `legacy_first` for seed 0, `legacy_second` for seed 1). The
//! blobs are opaque to everything but this module and
//! [`AlgorithmRun`]'s serde implementation.

#[cfg(test)]
mod tests;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::analysis::AlgorithmRun;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Error while accessing the cache directory")]
    Io(#[from] std::io::Error),
    #[error("Invalid cache blob")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Cache key of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub instance_name: String,
    pub panel_size: usize,
    pub tag: String,
}

impl Key {
    pub fn new<N: Into<String>, T: Into<String>>(instance_name: N, panel_size: usize, tag: T) -> Self {
        Key {
            instance_name: instance_name.into(),
            panel_size,
            tag: tag.into(),
        }
    }

    fn path(&self, dir: &Path) -> PathBuf {
        dir.join(format!(
            "{}_{}_{}.json",
            self.instance_name, self.panel_size, self.tag
        ))
    }
}

/// Loads a cached run, or `None` when the key was never stored.
pub fn load(dir: &Path, key: &Key) -> Result<Option<AlgorithmRun>> {
    let path = key.path(dir);
    if !path.exists() {
        return Ok(None);
    }
    let file = BufReader::new(File::open(path)?);
    Ok(Some(serde_json::from_reader(file)?))
}

/// Stores a run under its key, creating the cache directory if needed.
pub fn store(dir: &Path, key: &Key, run: &AlgorithmRun) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let file = BufWriter::new(File::create(key.path(dir))?);
    serde_json::to_writer(file, run)?;
    Ok(())
}
