//! Temporary search-path patch bracketing one build

use std::ffi::OsString;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::toolchain::ToolchainLocator;
use super::vars::SharedEnvironment;

/// Value of a variable before it was patched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedVar {
    pub key: String,
    /// `None` when the variable was unset
    pub previous: Option<OsString>,
}

/// Outcome of [`EnvPatcher::apply`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOutcome {
    /// Whether the variable was modified
    pub patched: bool,
    /// Shown to the user if the build later fails
    pub warning: Option<String>,
    /// Present exactly when `patched` is true
    pub saved: Option<SavedVar>,
}

impl PatchOutcome {
    fn unpatched(warning: Option<String>) -> Self {
        Self {
            patched: false,
            warning,
            saved: None,
        }
    }
}

/// Prepends toolchain directories to a path-list variable
pub struct EnvPatcher {
    env: SharedEnvironment,
    locator: Box<dyn ToolchainLocator>,
    variable: String,
}

impl EnvPatcher {
    pub fn new(
        env: SharedEnvironment,
        locator: Box<dyn ToolchainLocator>,
        variable: impl Into<String>,
    ) -> Self {
        Self {
            env,
            locator,
            variable: variable.into(),
        }
    }

    /// Name of the patched variable
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Current value of the patched variable
    pub fn current(&self) -> Option<OsString> {
        self.env.var(&self.variable)
    }

    /// Add the toolchain directories that are not already present.
    ///
    /// A missing toolchain is not fatal: the variable is left untouched and
    /// the outcome carries a warning.
    pub fn apply(&self) -> PatchOutcome {
        let dirs = match self.locator.locate() {
            Ok(dirs) => dirs,
            Err(missing) => {
                warn!(variable = %self.variable, "{}", missing);
                return PatchOutcome::unpatched(Some(missing.to_string()));
            }
        };

        let current = self.env.var(&self.variable);
        let entries: Vec<PathBuf> = current
            .as_deref()
            .map(|v| std::env::split_paths(v).collect())
            .unwrap_or_default();

        let mut additions: Vec<PathBuf> = Vec::new();
        for dir in dirs {
            if !entries.contains(&dir) && !additions.contains(&dir) {
                additions.push(dir);
            }
        }
        if additions.is_empty() {
            debug!(variable = %self.variable, "Toolchain already on search path");
            return PatchOutcome::unpatched(None);
        }

        let patched = match std::env::join_paths(additions.iter().chain(entries.iter())) {
            Ok(value) => value,
            Err(e) => {
                warn!(variable = %self.variable, "Cannot extend search path: {}", e);
                return PatchOutcome::unpatched(Some(format!(
                    "could not add toolchain directories to {}: {}",
                    self.variable, e
                )));
            }
        };

        self.env.set_var(&self.variable, &patched);
        info!(
            variable = %self.variable,
            added = additions.len(),
            "Patched search path for toolchain"
        );

        PatchOutcome {
            patched: true,
            warning: None,
            saved: Some(SavedVar {
                key: self.variable.clone(),
                previous: current,
            }),
        }
    }

    /// Put the variable back exactly as it was before `apply`
    pub fn restore(&self, saved: SavedVar) {
        match saved.previous {
            Some(value) => self.env.set_var(&saved.key, &value),
            None => self.env.remove_var(&saved.key),
        }
        debug!(variable = %saved.key, "Restored search path");
    }
}
