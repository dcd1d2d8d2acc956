use futures::future::join_all;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

use crate::config::MediaConfig;
use crate::error::IngestError;
use crate::models::{BatchItemReport, IngestRequest, StagedAsset, StoredAsset};
use crate::services::compressor::{Compressor, SizeTargetCompressor};
use crate::services::relocator::AssetRelocator;
use crate::utils::format::{MediaFormat, detect_format};
use crate::utils::guard::TempGuard;

/// Drives one upload through gate -> compress -> relocate and guarantees
/// that no temporary file survives any exit path, including cancellation.
#[derive(Clone)]
pub struct MediaPipeline {
    config: MediaConfig,
    compressor: Arc<dyn Compressor>,
    relocator: AssetRelocator,
}

impl MediaPipeline {
    pub fn new(config: MediaConfig) -> Self {
        let compressor: Arc<dyn Compressor> = Arc::new(SizeTargetCompressor::new(config.clone()));
        Self::with_compressor(config, compressor)
    }

    pub fn with_compressor(config: MediaConfig, compressor: Arc<dyn Compressor>) -> Self {
        Self {
            relocator: AssetRelocator::new(config.clone()),
            compressor,
            config,
        }
    }

    /// Processes one upload and returns the relative path for persistence.
    ///
    /// On every failure the staged file and any derived output are removed;
    /// on success exactly one file remains, inside the destination tree.
    pub async fn ingest(&self, request: IngestRequest) -> Result<StoredAsset, IngestError> {
        let IngestRequest {
            staged,
            class,
            previous_path,
        } = request;
        let staged = staged.ok_or(IngestError::MissingInput)?;

        // The staged file belongs to this invocation from here on: every
        // early return, and a dropped future, releases it via the guard.
        let staged_guard = TempGuard::new(staged.path.clone());

        if staged.size > self.config.max_input_bytes {
            return Err(IngestError::OversizedInput {
                size: staged.size,
                limit: self.config.max_input_bytes,
            });
        }

        let format = self.gate_format(&staged).await?;
        tracing::info!(
            "Accepted {} upload {} ({} bytes, {})",
            class,
            staged.original_filename,
            staged.size,
            format
        );

        let outcome = self.compressor.compress(&staged, format).await?;
        let output_guard = TempGuard::new(outcome.path.clone());

        let relative_path = self
            .relocator
            .relocate(&outcome.path, class, previous_path.as_deref())
            .await?;

        // Ownership of the bytes has moved into the destination tree
        staged_guard.disarm();
        output_guard.disarm();

        tracing::info!(
            "Stored {} asset at {} ({} bytes)",
            class,
            relative_path,
            outcome.size
        );

        Ok(StoredAsset {
            relative_path,
            size: outcome.size,
            format: outcome.format,
        })
    }

    /// Processes a multi-file upload, one worker task per file.
    ///
    /// Files fail independently: the report carries a per-file outcome
    /// rather than an all-or-nothing result.
    pub async fn ingest_batch(&self, requests: Vec<IngestRequest>) -> Vec<BatchItemReport> {
        let mut filenames = Vec::with_capacity(requests.len());
        let mut handles = Vec::with_capacity(requests.len());

        for request in requests {
            let filename = request
                .staged
                .as_ref()
                .map(|s| s.original_filename.clone())
                .unwrap_or_default();
            filenames.push(filename);

            let pipeline = self.clone();
            handles.push(tokio::spawn(async move { pipeline.ingest(request).await }));
        }

        let results = join_all(handles).await;
        filenames
            .into_iter()
            .zip(results)
            .map(|(filename, joined)| match joined {
                Ok(Ok(asset)) => BatchItemReport::succeeded(filename, asset),
                Ok(Err(e)) => {
                    tracing::error!("Upload {} failed at {} stage: {}", filename, e.stage(), e);
                    BatchItemReport::failed(filename, e.to_string())
                }
                Err(e) => {
                    tracing::error!("Upload worker for {} did not complete: {}", filename, e);
                    BatchItemReport::failed(filename, format!("upload worker failed: {}", e))
                }
            })
            .collect()
    }

    /// Validates the staged file is readable and of a format the pipeline
    /// can handle. Magic bytes win over the declared content type.
    async fn gate_format(&self, staged: &StagedAsset) -> Result<MediaFormat, IngestError> {
        let mut file = match tokio::fs::File::open(&staged.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IngestError::MissingInput);
            }
            Err(e) => {
                return Err(IngestError::Compression(format!(
                    "failed to open staged file: {}",
                    e
                )));
            }
        };

        let mut header = [0u8; 512];
        let n = file.read(&mut header).await.map_err(|e| {
            IngestError::Compression(format!("failed to read staged file header: {}", e))
        })?;

        let format = detect_format(&header[..n], staged.content_type.as_deref());
        if format == MediaFormat::Unknown {
            return Err(IngestError::UnsupportedFormat(
                staged
                    .content_type
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
            ));
        }
        Ok(format)
    }
}
