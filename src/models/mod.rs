use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::format::MediaFormat;

/// A temporary file handed over by the upload receiver.
///
/// Exclusively owned by one pipeline invocation: the file is either
/// superseded by a derived asset or removed before the invocation returns.
#[derive(Debug, Clone)]
pub struct StagedAsset {
    /// Absolute path of the staged temporary file.
    pub path: PathBuf,
    /// Filename as supplied by the client, unsanitized.
    pub original_filename: String,
    /// Content type declared by the client, if any.
    pub content_type: Option<String>,
    /// Size of the staged file in bytes.
    pub size: u64,
}

impl StagedAsset {
    /// Describes an already-staged file, reading its size from disk.
    pub async fn describe(
        path: impl Into<PathBuf>,
        original_filename: &str,
        content_type: Option<&str>,
    ) -> std::io::Result<Self> {
        let path = path.into();
        let size = tokio::fs::metadata(&path).await?.len();
        Ok(Self {
            path,
            original_filename: original_filename.to_string(),
            content_type: content_type.map(|ct| ct.to_string()),
            size,
        })
    }

    /// The filename the receiver staged the file under.
    pub fn staged_filename(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("asset")
    }
}

/// Logical category of an uploaded asset, fixed once a request is accepted.
/// Determines the destination directory and naming rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetClass {
    Product,
    Category,
    Profile,
    PaymentSlip,
}

impl AssetClass {
    pub const ALL: [AssetClass; 4] = [
        AssetClass::Product,
        AssetClass::Category,
        AssetClass::Profile,
        AssetClass::PaymentSlip,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            AssetClass::Product => "products",
            AssetClass::Category => "categories",
            AssetClass::Profile => "profiles",
            AssetClass::PaymentSlip => "payment-slips",
        }
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Result of one successful compression pass. Produced exactly once per
/// accepted upload and never mutated afterward.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionOutcome {
    /// Path of the output file; equals the staged path when no re-encoding
    /// was needed.
    pub path: PathBuf,
    /// Final size in bytes.
    pub size: u64,
    /// Format of the bytes actually written.
    pub format: MediaFormat,
    /// Quality parameter the search settled on, for re-encoded rasters.
    pub quality: Option<u8>,
}

/// The durable record of an ingested asset. The relative path is the only
/// artifact that outlives the request; the persistence layer stores it
/// verbatim and prefixes a public base URL when serving.
#[derive(Debug, Clone, Serialize)]
pub struct StoredAsset {
    pub relative_path: String,
    pub size: u64,
    pub format: MediaFormat,
}

/// One upload to run through the pipeline.
#[derive(Debug)]
pub struct IngestRequest {
    /// `None` models a multipart request that carried no file field.
    pub staged: Option<StagedAsset>,
    pub class: AssetClass,
    /// Relative path of the asset being replaced, if any. Deleted only
    /// after the new asset is durably in place.
    pub previous_path: Option<String>,
}

/// Per-file result of a multi-file upload. Files in a batch are processed
/// independently; one failure never aborts the others.
#[derive(Debug, Serialize)]
pub struct BatchItemReport {
    pub filename: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<StoredAsset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItemReport {
    pub fn succeeded(filename: String, asset: StoredAsset) -> Self {
        Self {
            filename,
            success: true,
            asset: Some(asset),
            error: None,
        }
    }

    pub fn failed(filename: String, error: String) -> Self {
        Self {
            filename,
            success: false,
            asset: None,
            error: Some(error),
        }
    }
}
