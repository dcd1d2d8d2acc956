use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::error::IngestError;
use crate::models::AssetClass;

/// Moves finished assets from staging into the class-specific destination
/// tree and retires the asset being replaced, if any.
#[derive(Clone)]
pub struct AssetRelocator {
    config: MediaConfig,
}

impl AssetRelocator {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    /// Relocates `source` into the directory for `class` and returns the
    /// relative path to store against the owning record.
    ///
    /// The destination directory must already exist. A `previous` asset is
    /// deleted only after the new one is durably in place, so a failed
    /// relocation never leaves the owning record pointing at nothing.
    pub async fn relocate(
        &self,
        source: &Path,
        class: AssetClass,
        previous: Option<&str>,
    ) -> Result<String, IngestError> {
        let dest_dir = self.config.class_dir(class);
        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| IngestError::Relocation("source path has no file name".to_string()))?;

        // Already in the destination tree: nothing to move, but a replaced
        // asset still gets retired
        if self.already_in_destination(source, &dest_dir).await {
            tracing::debug!("{} already resides in {}", file_name, dest_dir.display());
            if let Some(previous) = previous {
                self.delete_previous(previous, &dest_dir.join(file_name)).await;
            }
            return Ok(self.config.relative_path(class, file_name));
        }

        let dest_name = self.available_name(&dest_dir, file_name).await?;
        let dest_path = dest_dir.join(&dest_name);

        match tokio::fs::rename(source, &dest_path).await {
            Ok(()) => {}
            Err(e) => {
                // Rename cannot cross filesystems; fall back to a verified copy
                tracing::debug!(
                    "Rename into {} failed ({}), falling back to copy",
                    dest_path.display(),
                    e
                );
                self.copy_then_delete(source, &dest_path).await?;
            }
        }

        if let Some(previous) = previous {
            self.delete_previous(previous, &dest_path).await;
        }

        Ok(self.config.relative_path(class, &dest_name))
    }

    async fn already_in_destination(&self, source: &Path, dest_dir: &Path) -> bool {
        let Some(parent) = source.parent() else {
            return false;
        };
        match (
            tokio::fs::canonicalize(parent).await,
            tokio::fs::canonicalize(dest_dir).await,
        ) {
            (Ok(parent), Ok(dest)) => parent == dest,
            _ => false,
        }
    }

    /// Picks a destination filename that is not yet taken. Concurrent
    /// uploads land on distinct names, as a guarantee rather than a
    /// probability.
    async fn available_name(&self, dest_dir: &Path, file_name: &str) -> Result<String, IngestError> {
        let taken = tokio::fs::try_exists(dest_dir.join(file_name))
            .await
            .map_err(|e| {
                IngestError::Relocation(format!("failed to probe destination: {}", e))
            })?;
        if !taken {
            return Ok(file_name.to_string());
        }

        let path = Path::new(file_name);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(file_name);
        let suffixed = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}-{}.{}", stem, Uuid::new_v4().simple(), ext),
            None => format!("{}-{}", stem, Uuid::new_v4().simple()),
        };
        tracing::warn!(
            "Destination name {} is taken, storing as {}",
            file_name,
            suffixed
        );
        Ok(suffixed)
    }

    async fn copy_then_delete(&self, source: &Path, dest: &Path) -> Result<(), IngestError> {
        let copied = tokio::fs::copy(source, dest).await.map_err(|e| {
            IngestError::Relocation(format!("copy to {} failed: {}", dest.display(), e))
        })?;

        let finished = self.finish_copy(source, dest, copied).await;
        if finished.is_err() {
            // Leave no half-moved asset in the destination tree
            let _ = tokio::fs::remove_file(dest).await;
        }
        finished
    }

    async fn finish_copy(&self, source: &Path, dest: &Path, copied: u64) -> Result<(), IngestError> {
        let dest_file = tokio::fs::File::open(dest).await.map_err(|e| {
            IngestError::Relocation(format!("failed to reopen {}: {}", dest.display(), e))
        })?;
        dest_file.sync_all().await.map_err(|e| {
            IngestError::Relocation(format!("failed to sync {}: {}", dest.display(), e))
        })?;

        let expected = tokio::fs::metadata(source)
            .await
            .map_err(|e| IngestError::Relocation(format!("failed to stat source: {}", e)))?
            .len();
        if copied != expected {
            return Err(IngestError::Relocation(format!(
                "short copy to {}: {} of {} bytes",
                dest.display(),
                copied,
                expected
            )));
        }

        tokio::fs::remove_file(source).await.map_err(|e| {
            IngestError::Relocation(format!("failed to remove source after copy: {}", e))
        })
    }

    /// Best-effort removal of the asset being replaced. The new asset is
    /// already durable at this point, so failures are logged, not raised.
    async fn delete_previous(&self, previous: &str, new_asset: &Path) {
        let Some(path) = self.config.resolve_relative(previous) else {
            tracing::warn!("Ignoring unresolvable previous asset path {}", previous);
            return;
        };
        if path == new_asset {
            return;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::info!("Removed replaced asset {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove replaced asset {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(root: &Path) -> MediaConfig {
        MediaConfig {
            upload_root: root.join("uploads"),
            ..MediaConfig::default()
        }
    }

    #[tokio::test]
    async fn test_copy_then_delete_moves_content() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        config.provision().unwrap();
        let relocator = AssetRelocator::new(config.clone());

        let source = dir.path().join("staged.bin");
        tokio::fs::write(&source, b"payload bytes").await.unwrap();
        let dest = config.class_dir(AssetClass::Product).join("staged.bin");

        relocator.copy_then_delete(&source, &dest).await.unwrap();

        assert!(!source.exists());
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"payload bytes");
    }

    #[tokio::test]
    async fn test_copy_then_delete_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        config.provision().unwrap();
        let relocator = AssetRelocator::new(config.clone());

        let source = dir.path().join("never-staged.bin");
        let dest = config.class_dir(AssetClass::Product).join("never-staged.bin");

        let err = relocator.copy_then_delete(&source, &dest).await.unwrap_err();
        assert!(matches!(err, IngestError::Relocation(_)));
        assert!(!dest.exists());
    }
}
