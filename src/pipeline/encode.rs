//! Attachment encoding: `ResumeDocument` → base64 `ImageData`.
//!
//! Multimodal APIs take attachments as base64 strings with a MIME type in
//! the JSON request body. PDFs are passed through untouched. Images are
//! passed through too unless their longest edge exceeds
//! `max_image_pixels`, in which case they are downscaled and re-encoded as
//! PNG to keep the request under provider upload limits.

use crate::error::Cv2CareerError;
use crate::pipeline::input::{DocumentKind, ResumeDocument};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::imageops::FilterType;
use image::ImageReader;
use std::io::Cursor;
use tracing::debug;

/// Encode a résumé as a model attachment.
pub fn encode_document(doc: &ResumeDocument, max_pixels: u32) -> Result<ImageData, Cv2CareerError> {
    if doc.kind.is_image() {
        if let Some(png) = downscale_if_needed(doc, max_pixels)? {
            return Ok(to_image_data(&png, DocumentKind::Png));
        }
    }
    Ok(to_image_data(&doc.bytes, doc.kind))
}

fn to_image_data(bytes: &[u8], kind: DocumentKind) -> ImageData {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} → {} bytes base64", kind.mime_type(), b64.len());
    let data = ImageData::new(b64, kind.mime_type());
    if kind.is_image() {
        data.with_detail("high")
    } else {
        data
    }
}

/// Returns re-encoded PNG bytes when the image is larger than `max_pixels`
/// on either edge, `None` when it can be sent as-is.
fn downscale_if_needed(doc: &ResumeDocument, max_pixels: u32) -> Result<Option<Vec<u8>>, Cv2CareerError> {
    let unsupported = |e: image::ImageError| Cv2CareerError::UnsupportedDocument {
        name: doc.name.clone(),
        detail: format!("image could not be decoded: {e}"),
    };

    let reader = ImageReader::new(Cursor::new(&doc.bytes))
        .with_guessed_format()
        .map_err(|e| Cv2CareerError::Internal(format!("image format probe: {e}")))?;
    let (w, h) = reader.into_dimensions().map_err(unsupported)?;
    if w.max(h) <= max_pixels {
        return Ok(None);
    }

    let img = image::load_from_memory(&doc.bytes).map_err(unsupported)?;
    let resized = img.resize(max_pixels, max_pixels, FilterType::Lanczos3);
    debug!(
        "Downscaled '{}' from {}x{} to {}x{}",
        doc.name,
        w,
        h,
        resized.width(),
        resized.height()
    );

    let mut buf = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(unsupported)?;
    Ok(Some(buf))
}
