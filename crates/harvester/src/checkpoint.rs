//! Checkpoint store
//!
//! Durably records the next page to fetch, keyed by run identifier. The
//! value is written only after the fan-out barrier for a page completes, so
//! on restart the pipeline resumes at the first page that is not known to be
//! fully processed. A crash between barrier and checkpoint write reprocesses
//! at most one whole page, which the idempotent sink absorbs.

use std::path::{Path, PathBuf};

use harvester_common::{HarvestError, Result};

/// File-backed checkpoint, one file per run id
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new(dir: impl AsRef<Path>, run_id: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{run_id}.page")),
        }
    }

    /// Load the next page to fetch, or `None` if this run has no checkpoint
    /// yet (caller supplies the configured start page).
    pub async fn load(&self) -> Result<Option<u64>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let page = contents.trim().parse::<u64>().map_err(|e| {
            HarvestError::Checkpoint(format!(
                "corrupt checkpoint {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(Some(page))
    }

    /// Durably record the next page to fetch.
    ///
    /// Write-then-rename so a crash mid-write never leaves a torn value.
    pub async fn save(&self, page: u64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("page.tmp");
        tokio::fs::write(&tmp, page.to_string()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let checkpoint = FileCheckpoint::new(dir.path(), "run-1");
        assert_eq!(checkpoint.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let checkpoint = FileCheckpoint::new(dir.path(), "run-1");

        checkpoint.save(6).await.unwrap();
        assert_eq!(checkpoint.load().await.unwrap(), Some(6));

        checkpoint.save(7).await.unwrap();
        assert_eq!(checkpoint.load().await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_runs_are_isolated() {
        let dir = TempDir::new().unwrap();
        let a = FileCheckpoint::new(dir.path(), "run-a");
        let b = FileCheckpoint::new(dir.path(), "run-b");

        a.save(10).await.unwrap();
        assert_eq!(b.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_is_an_error() {
        let dir = TempDir::new().unwrap();
        let checkpoint = FileCheckpoint::new(dir.path(), "run-1");

        tokio::fs::write(checkpoint.path(), "not-a-number")
            .await
            .unwrap();

        assert!(matches!(
            checkpoint.load().await,
            Err(HarvestError::Checkpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_save_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("deep/nested");
        let checkpoint = FileCheckpoint::new(&nested, "run-1");

        checkpoint.save(1).await.unwrap();
        assert_eq!(checkpoint.load().await.unwrap(), Some(1));
    }
}
