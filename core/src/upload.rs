use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::models::ValidationError;

/// Largest raw image accepted for upload, in bytes.
pub const MAX_IMAGE_BYTES: u64 = 2_500_000;

/// Only the upper bound is enforced. An empty file encodes to `data:<mime>;base64,`.
pub fn check_image_size(size: u64) -> Result<(), ValidationError> {
    if size > MAX_IMAGE_BYTES {
        return Err(ValidationError::ImageTooLarge { size });
    }
    Ok(())
}

/// Guess an image mime type from a file extension.
#[must_use]
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}

/// Encode raw image bytes as a self-contained data URL.
pub fn encode_data_url(bytes: &[u8], mime: &str) -> Result<String, ValidationError> {
    check_image_size(bytes.len() as u64)?;
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}

/// Read an image file into a data URL. The size limit is checked before the
/// file contents are read.
pub fn read_image_file(path: &Path) -> Result<String, ValidationError> {
    let unreadable = |e: std::io::Error| {
        ValidationError::UnreadableImage(format!("{}: {e}", path.display()))
    };
    let meta = std::fs::metadata(path).map_err(unreadable)?;
    check_image_size(meta.len())?;
    let bytes = std::fs::read(path).map_err(unreadable)?;
    encode_data_url(&bytes, mime_for_path(path))
}

/// Split a base64 data URL into its mime type and decoded bytes.
pub fn decode_data_url(url: &str) -> anyhow::Result<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| anyhow::anyhow!("Not a data URL"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| anyhow::anyhow!("Malformed data URL: missing ','"))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| anyhow::anyhow!("Only base64 data URLs are supported"))?;
    let bytes = STANDARD.decode(payload)?;
    Ok((mime.to_string(), bytes))
}

/// Check an already encoded image handed in by a client: it must be a
/// base64 data URL whose decoded size is within the upload limit.
pub fn validate_data_url(url: &str) -> Result<(), ValidationError> {
    let (_, bytes) =
        decode_data_url(url).map_err(|e| ValidationError::UnreadableImage(e.to_string()))?;
    check_image_size(bytes.len() as u64)
}

/// File extension for a mime type, used when writing images back out.
#[must_use]
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/bmp" => "bmp",
        "image/avif" => "avif",
        _ => "bin",
    }
}
