//! Toolchain discovery
//!
//! A locator answers one question for the patcher: which directories must
//! be on the search path for the compiler to be found.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The toolchain could not be found; the build proceeds unpatched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not locate the {name} toolchain (searched: {searched})")]
pub struct ToolchainMissing {
    pub name: String,
    pub searched: String,
}

/// Finds the directories a toolchain needs on the search path
pub trait ToolchainLocator: Send + Sync {
    /// Directories to put on the search path; empty when nothing is needed
    fn locate(&self) -> Result<Vec<PathBuf>, ToolchainMissing>;
}

/// No toolchain patch is ever needed
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToolchain;

impl ToolchainLocator for NoToolchain {
    fn locate(&self) -> Result<Vec<PathBuf>, ToolchainMissing> {
        Ok(Vec::new())
    }
}

/// A named toolchain installed under known bin directories
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryToolchain {
    pub name: String,
    /// Candidate bin directories, in search-path order
    pub dirs: Vec<PathBuf>,
}

impl DirectoryToolchain {
    pub fn new(name: impl Into<String>, dirs: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dirs,
        }
    }

    /// Whether this describes a toolchain at all
    pub fn is_configured(&self) -> bool {
        !self.dirs.is_empty()
    }
}

impl ToolchainLocator for DirectoryToolchain {
    fn locate(&self) -> Result<Vec<PathBuf>, ToolchainMissing> {
        if self.dirs.is_empty() {
            return Ok(Vec::new());
        }

        let found: Vec<PathBuf> = self.dirs.iter().filter(|d| d.is_dir()).cloned().collect();
        if found.is_empty() {
            return Err(ToolchainMissing {
                name: self.name.clone(),
                searched: self
                    .dirs
                    .iter()
                    .map(|d| d.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_toolchain_needs_nothing() {
        assert_eq!(DirectoryToolchain::default().locate(), Ok(vec![]));
        assert_eq!(NoToolchain.locate(), Ok(vec![]));
    }

    #[test]
    fn test_existing_dirs_are_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let toolchain = DirectoryToolchain::new("gcc", vec![missing, dir.path().to_path_buf()]);

        assert_eq!(toolchain.locate(), Ok(vec![dir.path().to_path_buf()]));
    }

    #[test]
    fn test_missing_toolchain_warning() {
        let toolchain = DirectoryToolchain::new("Rtools", vec![PathBuf::from("/no/such/rtools/bin")]);
        let err = toolchain.locate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not locate the Rtools toolchain (searched: /no/such/rtools/bin)"
        );
    }
}
