use media_ingest::{
    Compressor, IngestError, MediaConfig, MediaFormat, SizeTargetCompressor, StagedAsset,
};
use std::path::Path;

fn test_config(root: &Path) -> MediaConfig {
    MediaConfig {
        upload_root: root.join("uploads"),
        ..MediaConfig::default()
    }
}

fn noise_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut state = 0x9E3779B97F4A7C15u64;
    let img = image::RgbImage::from_fn(width, height, |_, _| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let b = state.to_le_bytes();
        image::Rgb([b[0], b[1], b[2]])
    });
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 90)
        .encode_image(&img)
        .unwrap();
    buf
}

fn small_png() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        64,
        64,
        image::Rgb([120, 180, 40]),
    ));
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn pseudo_random_bytes(len: usize) -> Vec<u8> {
    let mut state = 0xDEADBEEFCAFEBABEu64;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 33) as u8
        })
        .collect()
}

async fn stage(dir: &Path, name: &str, bytes: &[u8], content_type: &str) -> StagedAsset {
    let path = dir.join(name);
    tokio::fs::write(&path, bytes).await.unwrap();
    StagedAsset::describe(&path, name, Some(content_type))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_input_within_budget_is_returned_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let compressor = SizeTargetCompressor::new(test_config(dir.path()));

    let bytes = small_png();
    let staged = stage(dir.path(), "tiny.png", &bytes, "image/png").await;

    let outcome = compressor
        .compress(&staged, MediaFormat::Png)
        .await
        .unwrap();

    assert_eq!(outcome.path, staged.path);
    assert_eq!(outcome.size, bytes.len() as u64);
    assert_eq!(outcome.format, MediaFormat::Png);
    assert_eq!(outcome.quality, None);
    // No re-encoding: the staged file itself is the output
    assert_eq!(tokio::fs::read(&staged.path).await.unwrap(), bytes);
}

#[tokio::test]
async fn test_oversized_input_is_rejected_without_deletion() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let limit = config.max_input_bytes;
    let compressor = SizeTargetCompressor::new(config);

    let bytes = pseudo_random_bytes(2 * 1024 * 1024);
    let staged = stage(dir.path(), "huge.jpg", &bytes, "image/jpeg").await;

    let err = compressor
        .compress(&staged, MediaFormat::Jpeg)
        .await
        .unwrap_err();

    match err {
        IngestError::OversizedInput { size, limit: l } => {
            assert_eq!(size, bytes.len() as u64);
            assert_eq!(l, limit);
        }
        other => panic!("expected OversizedInput, got {:?}", other),
    }
    // Removal of the rejected staged file is the caller's job
    assert!(staged.path.exists());
}

#[tokio::test]
async fn test_raster_above_budget_is_reencoded_toward_target() {
    let dir = tempfile::tempdir().unwrap();
    let config = MediaConfig {
        max_input_bytes: 8 * 1024 * 1024,
        ..test_config(dir.path())
    };
    let target = config.target_bytes;
    let compressor = SizeTargetCompressor::new(config);

    let bytes = noise_jpeg(800, 800);
    assert!(bytes.len() as u64 > target, "fixture must exceed the budget");
    let staged = stage(dir.path(), "1690000000-abc.jpg", &bytes, "image/jpeg").await;

    let outcome = compressor
        .compress(&staged, MediaFormat::Jpeg)
        .await
        .unwrap();

    let out_name = outcome.path.file_name().unwrap().to_str().unwrap();
    assert_eq!(out_name, "c-1690000000-abc.jpg");
    assert_eq!(outcome.format, MediaFormat::Jpeg);
    assert!((10..=90).contains(&outcome.quality.unwrap()));

    assert!(outcome.size < bytes.len() as u64);
    // Best-effort search: close to the target, never wildly above it
    assert!(outcome.size <= target + 64 * 1024);

    // The original was superseded and removed; the output decodes cleanly
    assert!(!staged.path.exists());
    let written = tokio::fs::read(&outcome.path).await.unwrap();
    assert_eq!(written.len() as u64, outcome.size);
    image::load_from_memory(&written).unwrap();
}

#[tokio::test]
async fn test_compressible_document_is_archived_losslessly() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let target = config.target_bytes;
    let compressor = SizeTargetCompressor::new(config);

    let bytes = "lorem ipsum dolor sit amet, consectetur adipiscing elit. "
        .repeat(12_000)
        .into_bytes();
    assert!(bytes.len() as u64 > target);
    let staged = stage(dir.path(), "1690000000-abc.txt", &bytes, "text/plain").await;

    let outcome = compressor
        .compress(&staged, MediaFormat::Text)
        .await
        .unwrap();

    let out_name = outcome.path.file_name().unwrap().to_str().unwrap();
    assert_eq!(out_name, "c-1690000000-abc.txt.gz");
    assert_eq!(outcome.format, MediaFormat::Text);
    assert_eq!(outcome.quality, None);
    assert!(outcome.size < target);
    assert!(!staged.path.exists());

    // The archive must restore the exact original bytes
    let written = tokio::fs::read(&outcome.path).await.unwrap();
    let mut decoder = flate2::read::GzDecoder::new(written.as_slice());
    let mut restored = Vec::new();
    std::io::Read::read_to_end(&mut decoder, &mut restored).unwrap();
    assert_eq!(restored, bytes);
}

#[tokio::test]
async fn test_incompressible_document_is_rejected_not_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let compressor = SizeTargetCompressor::new(test_config(dir.path()));

    // High-entropy payload: a lossless pass cannot shrink it under budget
    let bytes = pseudo_random_bytes(400 * 1024);
    let staged = stage(dir.path(), "1690000000-abc.csv", &bytes, "text/csv").await;

    let err = compressor
        .compress(&staged, MediaFormat::Csv)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedFormat(_)));

    // Nothing was written and the staged file is untouched
    assert!(staged.path.exists());
    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_unsupported_format_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let compressor = SizeTargetCompressor::new(test_config(dir.path()));

    let bytes = pseudo_random_bytes(300 * 1024);
    let staged = stage(dir.path(), "blob.bin", &bytes, "application/octet-stream").await;

    let err = compressor
        .compress(&staged, MediaFormat::Unknown)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedFormat(_)));
    assert!(staged.path.exists());
}
