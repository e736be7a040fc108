//! Rules for ingredient photos accepted for upload.

use chrono::{DateTime, Utc};

/// Largest accepted photo, in bytes.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Storage prefix for ingredient photos.
pub const PHOTO_PREFIX: &str = "ingredient-photos";

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("Please select an image file")]
    NotAnImage,
    #[error("Image size must be less than 10MB")]
    TooLarge,
    #[error("Image is empty")]
    Empty,
}

/// Check an upload's declared content type and size.
pub fn validate_upload(content_type: Option<&str>, len: usize) -> Result<(), UploadRejection> {
    if !content_type.is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("image/")) {
        return Err(UploadRejection::NotAnImage);
    }
    if len == 0 {
        return Err(UploadRejection::Empty);
    }
    if len > MAX_IMAGE_BYTES {
        return Err(UploadRejection::TooLarge);
    }
    Ok(())
}

/// File extension for an upload: the caller's hint if usable, else derived from the content type.
pub fn extension_for(hint: Option<&str>, content_type: &str) -> String {
    let cleaned = hint
        .map(|h| h.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|h| !h.is_empty() && h.len() <= 8 && h.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(ext) = cleaned {
        return ext;
    }
    let subtype = content_type
        .split(';')
        .next()
        .and_then(|ct| ct.trim().split_once('/'))
        .map(|(_, sub)| sub.to_ascii_lowercase())
        .unwrap_or_default();
    match subtype.as_str() {
        "jpeg" | "pjpeg" => "jpg".into(),
        "png" | "gif" | "webp" | "heic" | "avif" | "bmp" => subtype,
        _ => "jpg".into(),
    }
}

/// Object path `ingredient-photos/{unix_millis}.{ext}`.
pub fn photo_path(ext: &str, now: DateTime<Utc>) -> String {
    format!("{}/{}.{}", PHOTO_PREFIX, now.timestamp_millis(), ext)
}
