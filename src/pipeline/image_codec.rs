//! Raw image bytes → base64 payload for inline transport.
//!
//! No resizing or recompression: the service sees exactly the bytes the user
//! picked. The MIME type is sniffed from magic bytes first, then the file
//! extension, then defaults to JPEG (phone cameras).

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use image::ImageFormat;

use super::types::EncodedImage;
use super::AnalysisError;

/// Inline payload ceiling accepted by the inference service.
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

const DEFAULT_MIME: &str = "image/jpeg";

/// Encode in-memory image bytes.
pub fn encode(image_bytes: &[u8]) -> Result<EncodedImage, AnalysisError> {
    encode_with_hint(image_bytes, None)
}

/// Read and encode an image file.
pub fn encode_file(path: &Path) -> Result<EncodedImage, AnalysisError> {
    let bytes = std::fs::read(path).map_err(|e| {
        AnalysisError::DecodeError(format!("cannot read {}: {e}", path.display()))
    })?;
    encode_with_hint(&bytes, Some(path))
}

/// Image as the user handed it over, not yet encoded.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

impl ImageSource {
    pub fn encode(&self) -> Result<EncodedImage, AnalysisError> {
        match self {
            ImageSource::Bytes(bytes) => encode(bytes),
            ImageSource::File(path) => encode_file(path),
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Bytes(bytes) => write!(f, "{} bytes in memory", bytes.len()),
            ImageSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

fn encode_with_hint(image_bytes: &[u8], path: Option<&Path>) -> Result<EncodedImage, AnalysisError> {
    if image_bytes.is_empty() {
        return Err(AnalysisError::DecodeError("image is empty".into()));
    }
    if image_bytes.len() > MAX_IMAGE_BYTES {
        return Err(AnalysisError::DecodeError(format!(
            "image is {} bytes, maximum is {MAX_IMAGE_BYTES}",
            image_bytes.len()
        )));
    }

    let mime_type = sniff_mime(image_bytes)
        .or_else(|| path.and_then(mime_from_extension))
        .unwrap_or(DEFAULT_MIME)
        .to_string();

    tracing::debug!(bytes = image_bytes.len(), mime = %mime_type, "Image encoded");

    Ok(EncodedImage {
        mime_type,
        data: base64::engine::general_purpose::STANDARD.encode(image_bytes),
        byte_len: image_bytes.len(),
    })
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Tiff => Some("image/tiff"),
        _ => None,
    }
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let guess = mime_guess::from_path(path).first()?;
    if guess.type_() != mime_guess::mime::IMAGE {
        return None;
    }
    match guess.subtype().as_str() {
        "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn encodes_standard_base64() {
        let encoded = encode(b"hello").unwrap();
        assert_eq!(encoded.data, "aGVsbG8=");
        assert_eq!(encoded.byte_len, 5);
    }

    #[test]
    fn sniffs_png() {
        assert_eq!(encode(PNG_MAGIC).unwrap().mime_type, "image/png");
    }

    #[test]
    fn sniffs_jpeg() {
        assert_eq!(encode(JPEG_MAGIC).unwrap().mime_type, "image/jpeg");
    }

    #[test]
    fn unknown_bytes_default_to_jpeg() {
        assert_eq!(encode(b"not an image").unwrap().mime_type, "image/jpeg");
    }

    #[test]
    fn extension_used_when_magic_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.webp");
        std::fs::write(&path, b"opaque").unwrap();
        assert_eq!(encode_file(&path).unwrap().mime_type, "image/webp");
    }

    #[test]
    fn empty_input_is_decode_error() {
        assert!(matches!(encode(b""), Err(AnalysisError::DecodeError(_))));
    }

    #[test]
    fn oversized_input_is_decode_error() {
        let big = vec![0u8; MAX_IMAGE_BYTES + 1];
        assert!(matches!(encode(&big), Err(AnalysisError::DecodeError(_))));
    }

    #[test]
    fn source_encodes_bytes_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, PNG_MAGIC).unwrap();
        assert_eq!(ImageSource::File(path).encode().unwrap().mime_type, "image/png");
        assert_eq!(ImageSource::Bytes(JPEG_MAGIC.to_vec()).encode().unwrap().byte_len, 10);
        assert!(matches!(
            ImageSource::Bytes(Vec::new()).encode(),
            Err(AnalysisError::DecodeError(_))
        ));
    }

    #[test]
    fn missing_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = encode_file(&dir.path().join("absent.jpg")).unwrap_err();
        assert!(matches!(err, AnalysisError::DecodeError(_)));
        assert!(err.to_string().contains("absent.jpg"));
    }
}
