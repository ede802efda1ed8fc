//! Output publishing.
//!
//! A rendered file becomes visible to consumers only through an atomic
//! rename: it is first copied into the output directory under a hidden
//! temporary name, then renamed to its final name. A crash mid-publish
//! leaves a hidden partial, never a half-written output under the final
//! name.

use std::path::{Path, PathBuf};

use reelcut_common::{ReelcutError, ReelcutResult};

/// Seam for the published-output destination.
pub trait OutputStore {
    /// Publish a rendered file, returning the output locator.
    fn publish(
        &self,
        job_id: &str,
        rendered: &Path,
    ) -> impl std::future::Future<Output = ReelcutResult<String>> + Send;
}

/// Publishes into a local directory.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl OutputStore for LocalDirStore {
    async fn publish(&self, job_id: &str, rendered: &Path) -> ReelcutResult<String> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            ReelcutError::publish(format!(
                "cannot create output directory {}: {e}",
                self.root.display()
            ))
        })?;

        let partial = self.root.join(format!(".{job_id}.mp4.partial"));
        let target = self.root.join(format!("{job_id}.mp4"));

        tokio::fs::copy(rendered, &partial).await.map_err(|e| {
            ReelcutError::publish(format!(
                "copying {} into the output directory failed: {e}",
                rendered.display()
            ))
        })?;
        tokio::fs::rename(&partial, &target).await.map_err(|e| {
            ReelcutError::publish(format!("finalizing {} failed: {e}", target.display()))
        })?;

        tracing::info!(job = job_id, output = %target.display(), "Output published");
        Ok(target.display().to_string())
    }
}
