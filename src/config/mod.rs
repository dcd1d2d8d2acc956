use std::env;
use std::path::{Component, Path, PathBuf};

use crate::models::AssetClass;

/// Configuration for the media ingestion pipeline.
///
/// All size and quality thresholds are injected here rather than hard-coded
/// at their use sites, so tests can run against small targets without
/// touching production values.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Byte budget the compressor aims for (default: 200 KiB)
    pub target_bytes: u64,

    /// Absolute input ceiling; larger uploads are rejected outright
    /// (default: 1 MiB)
    pub max_input_bytes: u64,

    /// Lower bound of the encoder quality search (default: 10)
    pub quality_min: u8,

    /// Upper bound of the encoder quality search (default: 90)
    pub quality_max: u8,

    /// Convergence tolerance of the quality search in bytes (default: 1024)
    pub tolerance_bytes: u64,

    /// Root of the destination directory tree on disk (default: ./uploads)
    pub upload_root: PathBuf,

    /// Prefix of the relative paths handed to the persistence layer
    /// (default: "uploads")
    pub public_prefix: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            target_bytes: 200 * 1024,
            max_input_bytes: 1024 * 1024,
            quality_min: 10,
            quality_max: 90,
            tolerance_bytes: 1024,
            upload_root: PathBuf::from("./uploads"),
            public_prefix: "uploads".to_string(),
        }
    }
}

impl MediaConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            target_bytes: env::var("MEDIA_TARGET_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.target_bytes),

            max_input_bytes: env::var("MEDIA_MAX_INPUT_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_input_bytes),

            quality_min: env::var("MEDIA_QUALITY_MIN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.quality_min),

            quality_max: env::var("MEDIA_QUALITY_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.quality_max),

            tolerance_bytes: env::var("MEDIA_TOLERANCE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.tolerance_bytes),

            upload_root: env::var("MEDIA_UPLOAD_ROOT")
                .map(PathBuf::from)
                .unwrap_or(default.upload_root),

            public_prefix: env::var("MEDIA_PUBLIC_PREFIX").unwrap_or(default.public_prefix),
        }
    }

    /// Create config for development (small budgets, local tree)
    pub fn development() -> Self {
        Self {
            target_bytes: 32 * 1024,
            max_input_bytes: 256 * 1024,
            upload_root: PathBuf::from("./uploads-dev"),
            ..Self::default()
        }
    }

    /// Destination directory on disk for an asset class.
    pub fn class_dir(&self, class: AssetClass) -> PathBuf {
        self.upload_root.join(class.dir_name())
    }

    /// Relative path stored against the owning record, e.g.
    /// `uploads/categories/c-1690000000-abc.jpg`.
    pub fn relative_path(&self, class: AssetClass, file_name: &str) -> String {
        format!("{}/{}/{}", self.public_prefix, class.dir_name(), file_name)
    }

    /// Maps a stored relative path back onto the filesystem. Returns `None`
    /// for paths that escape the upload tree.
    pub fn resolve_relative(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative);
        let rel = relative
            .strip_prefix(&self.public_prefix)
            .unwrap_or(relative);

        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            tracing::warn!("Refusing to resolve suspicious asset path: {:?}", relative);
            return None;
        }

        Some(self.upload_root.join(rel))
    }

    /// Creates the destination directory for every asset class.
    ///
    /// Run once at process startup, before any upload is accepted; the
    /// pipeline itself assumes the directories exist.
    pub fn provision(&self) -> std::io::Result<()> {
        for class in AssetClass::ALL {
            let dir = self.class_dir(class);
            std::fs::create_dir_all(&dir)?;
            tracing::debug!("Provisioned asset directory {}", dir.display());
        }
        tracing::info!(
            "Asset directory tree ready under {}",
            self.upload_root.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MediaConfig::default();
        assert_eq!(config.target_bytes, 200 * 1024);
        assert_eq!(config.max_input_bytes, 1024 * 1024);
        assert_eq!(config.quality_min, 10);
        assert_eq!(config.quality_max, 90);
        assert_eq!(config.tolerance_bytes, 1024);
        assert_eq!(config.public_prefix, "uploads");
    }

    #[test]
    fn test_from_env_override() {
        unsafe { env::set_var("MEDIA_TARGET_BYTES", "4096") };
        let config = MediaConfig::from_env();
        unsafe { env::remove_var("MEDIA_TARGET_BYTES") };
        assert_eq!(config.target_bytes, 4096);
        assert_eq!(config.max_input_bytes, 1024 * 1024);
    }

    #[test]
    fn test_class_dir_and_relative_path() {
        let config = MediaConfig::default();
        assert_eq!(
            config.class_dir(AssetClass::PaymentSlip),
            PathBuf::from("./uploads/payment-slips")
        );
        assert_eq!(
            config.relative_path(AssetClass::Category, "c-123.jpg"),
            "uploads/categories/c-123.jpg"
        );
    }

    #[test]
    fn test_resolve_relative() {
        let config = MediaConfig::default();
        assert_eq!(
            config.resolve_relative("uploads/categories/a.jpg"),
            Some(PathBuf::from("./uploads/categories/a.jpg"))
        );
        // Already root-relative paths resolve too
        assert_eq!(
            config.resolve_relative("categories/a.jpg"),
            Some(PathBuf::from("./uploads/categories/a.jpg"))
        );
        // Traversal is refused
        assert_eq!(config.resolve_relative("uploads/../../etc/passwd"), None);
    }

    #[test]
    fn test_provision_creates_class_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = MediaConfig {
            upload_root: dir.path().join("uploads"),
            ..MediaConfig::default()
        };

        config.provision().unwrap();

        for class in AssetClass::ALL {
            assert!(config.class_dir(class).is_dir());
        }
    }
}
