//! Unique temporary file names for intermediate and final outputs.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use crate::error::Result;

/// Scratch directory that hands out fresh file paths
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Scratch space under the system temp directory
    pub fn system() -> Self {
        Self::new(std::env::temp_dir().join("clipcrop"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve a unique path with the given extension.
    ///
    /// The directory is created if needed and a stale file at the chosen path
    /// is removed before the path is returned.
    pub fn unique_path(&self, extension: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;

        let name = format!(
            "{}-{:016x}.{}",
            Utc::now().format("%Y%m%d%H%M%S%3f"),
            rand::random::<u64>(),
            extension.trim_start_matches('.'),
        );
        let path = self.root.join(name);
        remove_if_exists(&path)?;

        Ok(path)
    }
}

impl Default for ScratchDir {
    fn default() -> Self {
        Self::system()
    }
}

/// Delete a file if it is there
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
