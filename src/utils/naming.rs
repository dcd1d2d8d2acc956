use anyhow::{Result, anyhow};
use chrono::Utc;
use std::path::Path;
use uuid::Uuid;

/// Sanitizes an uploaded filename to prevent path traversal and injection.
/// Returns the sanitized filename or an error if nothing usable remains.
pub fn sanitize_filename(filename: &str) -> Result<String> {
    // Keep only the filename component, dropping any directory part
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() {
        return Err(anyhow!("Filename cannot be empty"));
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == '/'
                || c == '\\'
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.starts_with('.') {
        return Err(anyhow!("Hidden files (starting with '.') are not allowed"));
    }

    Ok(sanitized)
}

/// Builds the staging filename for an upload: `<unix-ts>-<uuid>.<ext>`.
///
/// The UUID component makes same-destination collisions between concurrent
/// uploads impossible rather than merely unlikely.
pub fn staged_name(original_filename: &str) -> Result<String> {
    let safe = sanitize_filename(original_filename)?;
    let ext = Path::new(&safe)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| "bin".to_string());

    Ok(format!(
        "{}-{}.{}",
        Utc::now().timestamp(),
        Uuid::new_v4().simple(),
        ext
    ))
}

/// Names a re-encoded derivative of a staged file: `c-<stem>.<ext>`.
/// The extension reflects the format actually written.
pub fn compressed_name(staged_filename: &str, ext: &str) -> String {
    let stem = Path::new(staged_filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(staged_filename);
    format!("c-{}.{}", stem, ext)
}

/// Names a losslessly archived derivative: `c-<staged filename>.gz`.
/// The full original name is kept so the inner format stays identifiable.
pub fn archived_name(staged_filename: &str) -> String {
    format!("c-{}.gz", staged_filename)
}
