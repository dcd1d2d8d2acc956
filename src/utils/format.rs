use serde::Serialize;

/// Media format of an uploaded payload, as detected from its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
    Pdf,
    Svg,
    Text,
    Csv,
    Unknown,
}

impl MediaFormat {
    pub fn from_mime(mime: &str) -> Self {
        let normalized = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match normalized.as_str() {
            "image/jpeg" | "image/jpg" => MediaFormat::Jpeg,
            "image/png" => MediaFormat::Png,
            "image/webp" => MediaFormat::WebP,
            "image/gif" => MediaFormat::Gif,
            "application/pdf" => MediaFormat::Pdf,
            "image/svg+xml" => MediaFormat::Svg,
            "text/csv" => MediaFormat::Csv,
            m if m.starts_with("text/") => MediaFormat::Text,
            _ => MediaFormat::Unknown,
        }
    }

    /// Raster formats are re-encoded through the adaptive quality search.
    pub fn is_raster(&self) -> bool {
        matches!(
            self,
            MediaFormat::Jpeg | MediaFormat::Png | MediaFormat::WebP | MediaFormat::Gif
        )
    }

    /// Formats that tolerate a lossless byte-stream compression pass.
    pub fn is_compressible_document(&self) -> bool {
        matches!(
            self,
            MediaFormat::Pdf | MediaFormat::Svg | MediaFormat::Text | MediaFormat::Csv
        )
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Jpeg => "jpg",
            MediaFormat::Png => "png",
            MediaFormat::WebP => "webp",
            MediaFormat::Gif => "gif",
            MediaFormat::Pdf => "pdf",
            MediaFormat::Svg => "svg",
            MediaFormat::Text => "txt",
            MediaFormat::Csv => "csv",
            MediaFormat::Unknown => "bin",
        }
    }
}

impl std::fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MediaFormat::Jpeg => "jpeg",
            MediaFormat::Png => "png",
            MediaFormat::WebP => "webp",
            MediaFormat::Gif => "gif",
            MediaFormat::Pdf => "pdf",
            MediaFormat::Svg => "svg",
            MediaFormat::Text => "text",
            MediaFormat::Csv => "csv",
            MediaFormat::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Detects the media format of a payload.
///
/// Magic bytes win over the declared content type: clients routinely send
/// wrong or generic MIME types with multipart uploads. The declared type is
/// only consulted when the header bytes match no known signature, which
/// covers text-based formats without reliable magic (SVG, CSV, plain text).
pub fn detect_format(header: &[u8], declared: Option<&str>) -> MediaFormat {
    if let Some(kind) = infer::get(header) {
        let detected = MediaFormat::from_mime(kind.mime_type());
        if detected != MediaFormat::Unknown {
            return detected;
        }
    }

    declared
        .and_then(|ct| ct.parse::<mime::Mime>().ok())
        .map(|m| MediaFormat::from_mime(m.essence_str()))
        .unwrap_or(MediaFormat::Unknown)
}
