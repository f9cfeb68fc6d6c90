//! External binary-patch invocation
//!
//! Delta packs carry bsdiff patches; applying one is delegated to an
//! external utility with the `bspatch` calling convention:
//! `<command> <source> <output> <patch>`.

use relcheck_errors::{Error, PackError};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Applies binary patches through an external process
#[derive(Debug, Clone)]
pub struct PatchApplier {
    command: PathBuf,
}

impl PatchApplier {
    #[must_use]
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Apply `patch` to `source`, writing the reconstructed content to
    /// `output`.
    ///
    /// # Errors
    ///
    /// Returns an error if the utility cannot be executed or exits
    /// non-zero.
    pub async fn apply(&self, source: &Path, output: &Path, patch: &Path) -> Result<(), Error> {
        let result = Command::new(&self.command)
            .arg(source)
            .arg(output)
            .arg(patch)
            .output()
            .await
            .map_err(|e| PackError::PatchFailed {
                delta: patch.display().to_string(),
                message: format!("failed to execute {}: {e}", self.command.display()),
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(PackError::PatchFailed {
                delta: patch.display().to_string(),
                message: format!("{} exited with {}: {}", self.command.display(), result.status, stderr.trim()),
            }
            .into());
        }

        Ok(())
    }
}
