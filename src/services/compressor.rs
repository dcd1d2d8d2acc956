use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use image::ImageResult;
use image::codecs::jpeg::JpegEncoder;
use std::io::Write;
use tokio::task;

use crate::config::MediaConfig;
use crate::error::IngestError;
use crate::models::{CompressionOutcome, StagedAsset};
use crate::utils::format::MediaFormat;
use crate::utils::guard::TempGuard;
use crate::utils::naming;

/// Produces an output file at or below the configured byte budget.
#[async_trait]
pub trait Compressor: Send + Sync {
    async fn compress(
        &self,
        staged: &StagedAsset,
        format: MediaFormat,
    ) -> Result<CompressionOutcome, IngestError>;
}

/// Compressor that searches for the largest encoding that fits the budget.
///
/// Raster payloads go through a bounded binary search over the JPEG encoder
/// quality; documents get one lossless gzip pass. The search is best-effort:
/// the last buffer it produced is accepted even when the tolerance window
/// was never hit.
pub struct SizeTargetCompressor {
    config: MediaConfig,
}

impl SizeTargetCompressor {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    async fn compress_raster(
        &self,
        staged: &StagedAsset,
        bytes: Vec<u8>,
    ) -> Result<CompressionOutcome, IngestError> {
        let target = self.config.target_bytes;
        let tolerance = self.config.tolerance_bytes;
        let quality_min = self.config.quality_min;
        let quality_max = self.config.quality_max;

        let searched = task::spawn_blocking(move || -> Result<_, IngestError> {
            let img = image::load_from_memory(&bytes)
                .map_err(|e| IngestError::Compression(format!("failed to decode image: {}", e)))?;
            let rgb = img.to_rgb8();

            quality_search(&rgb, target, tolerance, quality_min, quality_max)
                .map_err(|e| IngestError::Compression(format!("failed to re-encode image: {}", e)))?
                .ok_or_else(|| IngestError::Compression("quality search bounds are empty".to_string()))
        })
        .await
        .map_err(|e| IngestError::Compression(format!("encoder task failed: {}", e)))??;

        let (buf, quality, probes) = searched;

        let out_name =
            naming::compressed_name(staged.staged_filename(), MediaFormat::Jpeg.extension());
        let out_path = staged.path.with_file_name(out_name);

        // The original survives until the new file is confirmed written;
        // the guard removes a partial output if anything below fails.
        let partial = TempGuard::new(out_path.clone());
        tokio::fs::write(&out_path, &buf).await.map_err(|e| {
            IngestError::Compression(format!("failed to write re-encoded output: {}", e))
        })?;
        tokio::fs::remove_file(&staged.path).await.map_err(|e| {
            IngestError::Compression(format!("failed to remove staged original: {}", e))
        })?;
        partial.disarm();

        tracing::info!(
            "Re-encoded {} at quality {} ({} -> {} bytes, {} probes)",
            staged.original_filename,
            quality,
            staged.size,
            buf.len(),
            probes
        );

        Ok(CompressionOutcome {
            path: out_path,
            size: buf.len() as u64,
            format: MediaFormat::Jpeg,
            quality: Some(quality),
        })
    }

    async fn compress_document(
        &self,
        staged: &StagedAsset,
        format: MediaFormat,
        bytes: Vec<u8>,
    ) -> Result<CompressionOutcome, IngestError> {
        let compressed = task::spawn_blocking(move || -> Result<Vec<u8>, IngestError> {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(&bytes)
                .map_err(|e| IngestError::Compression(format!("compression write error: {}", e)))?;
            encoder
                .finish()
                .map_err(|e| IngestError::Compression(format!("compression finish error: {}", e)))
        })
        .await
        .map_err(|e| IngestError::Compression(format!("compression task failed: {}", e)))??;

        // Lossless is the only safe option for structured documents; if
        // that is not enough, the payload is rejected rather than damaged.
        if compressed.len() as u64 > self.config.target_bytes {
            return Err(IngestError::UnsupportedFormat(format!(
                "{} payload cannot be reduced to {} bytes without data loss",
                format, self.config.target_bytes
            )));
        }

        let out_path = staged
            .path
            .with_file_name(naming::archived_name(staged.staged_filename()));

        let partial = TempGuard::new(out_path.clone());
        tokio::fs::write(&out_path, &compressed).await.map_err(|e| {
            IngestError::Compression(format!("failed to write archived output: {}", e))
        })?;
        tokio::fs::remove_file(&staged.path).await.map_err(|e| {
            IngestError::Compression(format!("failed to remove staged original: {}", e))
        })?;
        partial.disarm();

        tracing::info!(
            "Archived {} losslessly ({} -> {} bytes)",
            staged.original_filename,
            staged.size,
            compressed.len()
        );

        Ok(CompressionOutcome {
            path: out_path,
            size: compressed.len() as u64,
            format,
            quality: None,
        })
    }
}

#[async_trait]
impl Compressor for SizeTargetCompressor {
    async fn compress(
        &self,
        staged: &StagedAsset,
        format: MediaFormat,
    ) -> Result<CompressionOutcome, IngestError> {
        if staged.size > self.config.max_input_bytes {
            // The staged file is left in place; its removal is the
            // caller's responsibility on every failure path.
            return Err(IngestError::OversizedInput {
                size: staged.size,
                limit: self.config.max_input_bytes,
            });
        }

        if staged.size <= self.config.target_bytes {
            tracing::debug!(
                "{} already within budget ({} <= {} bytes), skipping re-encode",
                staged.original_filename,
                staged.size,
                self.config.target_bytes
            );
            return Ok(CompressionOutcome {
                path: staged.path.clone(),
                size: staged.size,
                format,
                quality: None,
            });
        }

        let bytes = tokio::fs::read(&staged.path)
            .await
            .map_err(|e| IngestError::Compression(format!("failed to read staged file: {}", e)))?;

        if format.is_raster() {
            self.compress_raster(staged, bytes).await
        } else if format.is_compressible_document() {
            self.compress_document(staged, format, bytes).await
        } else {
            Err(IngestError::UnsupportedFormat(format.to_string()))
        }
    }
}

/// Binary search over the JPEG quality parameter.
///
/// Invariant: encoded size grows with quality, so the window halves each
/// probe and the search runs at most ceil(log2(quality range)) encodes.
/// Returns the last buffer produced together with its quality and the
/// number of probes; `None` when the bounds were empty to begin with.
fn quality_search(
    rgb: &image::RgbImage,
    target: u64,
    tolerance: u64,
    quality_min: u8,
    quality_max: u8,
) -> ImageResult<Option<(Vec<u8>, u8, u32)>> {
    let mut low = i32::from(quality_min);
    let mut high = i32::from(quality_max);
    let mut last: Option<(Vec<u8>, u8)> = None;
    let mut probes = 0u32;

    while low <= high {
        let quality = ((low + high) / 2) as u8;
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality).encode_image(rgb)?;
        probes += 1;

        let size = buf.len() as u64;
        tracing::debug!("Quality probe {}: q={} -> {} bytes", probes, quality, size);

        let within_tolerance = size.abs_diff(target) <= tolerance;
        if size > target {
            high = i32::from(quality) - 1;
        } else {
            low = i32::from(quality) + 1;
        }
        last = Some((buf, quality));

        if within_tolerance {
            break;
        }
    }

    Ok(last.map(|(buf, quality)| (buf, quality, probes)))
}
