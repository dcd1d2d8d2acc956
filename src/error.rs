use thiserror::Error;

/// Failures surfaced by the media ingestion pipeline.
///
/// Every variant maps to a caller-visible failure signal; none is fatal to
/// the process. The pipeline performs best-effort cleanup of any files
/// written before the failure, so a failed upload never leaves orphaned
/// temporaries behind.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("No file was supplied for upload")]
    MissingInput,

    #[error("File size {size} bytes exceeds maximum allowed {limit} bytes")]
    OversizedInput { size: u64, limit: u64 },

    #[error("Unsupported media type: {0}")]
    UnsupportedFormat(String),

    #[error("Compression failed: {0}")]
    Compression(String),

    #[error("Relocation failed: {0}")]
    Relocation(String),
}

impl IngestError {
    /// The pipeline stage the failure belongs to, for logs and reports.
    pub fn stage(&self) -> &'static str {
        match self {
            IngestError::MissingInput => "received",
            IngestError::OversizedInput { .. } | IngestError::UnsupportedFormat(_) => "gated",
            IngestError::Compression(_) => "compressed",
            IngestError::Relocation(_) => "relocated",
        }
    }
}
