use std::path::PathBuf;

/// Scoped ownership of a temporary file.
///
/// The file is removed when the guard drops, unless `disarm` transferred
/// ownership elsewhere first. Because removal happens in `Drop`, it also
/// fires when the surrounding future is cancelled mid-pipeline, so an
/// abandoned request cleans up exactly like a failed one.
#[derive(Debug)]
pub struct TempGuard {
    path: Option<PathBuf>,
}

impl TempGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Releases the file from the guard without removing it.
    pub fn disarm(mut self) {
        self.path = None;
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!("Removed temporary file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!("Failed to remove temporary file {}: {}", path.display(), e)
                }
            }
        }
    }
}
