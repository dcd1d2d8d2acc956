pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::MediaConfig;
pub use error::IngestError;
pub use models::{
    AssetClass, BatchItemReport, CompressionOutcome, IngestRequest, StagedAsset, StoredAsset,
};
pub use services::compressor::{Compressor, SizeTargetCompressor};
pub use services::pipeline::MediaPipeline;
pub use services::relocator::AssetRelocator;
pub use utils::format::MediaFormat;
