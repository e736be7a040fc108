//! Ingredient detection from a photo via a hosted multimodal model.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use strum_macros::{AsRefStr, Display};
use tracing::{error, info};

use crate::anthropic_client::{ContentBlock, LanguageModel};
use crate::dto::DetectedIngredient;
use crate::images::MAX_IMAGE_BYTES;
use crate::reply::decode_array;

/// Entries at or below this confidence are dropped.
pub const CONFIDENCE_THRESHOLD: f64 = 0.3;

const MAX_TOKENS: u32 = 500;

const DETECTION_PROMPT: &str = "Analyze this image and identify all food ingredients visible.
Return a JSON array of objects with \"name\" and \"confidence\" (0-1) for each ingredient.
Only include actual food ingredients, not cookware or utensils.
Be specific (e.g., \"red bell pepper\" instead of just \"pepper\").

Example format:
[{\"name\": \"tomato\", \"confidence\": 0.95}, {\"name\": \"red onion\", \"confidence\": 0.87}]";

#[derive(thiserror::Error, Debug)]
pub enum DetectionError {
    #[error("Failed to detect ingredients")]
    Failed,
}

/// Image encodings the model accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum ImageMediaType {
    #[strum(serialize = "image/jpeg")]
    Jpeg,
    #[strum(serialize = "image/png")]
    Png,
    #[strum(serialize = "image/gif")]
    Gif,
    #[strum(serialize = "image/webp")]
    Webp,
}

impl ImageMediaType {
    /// Classify a `Content-Type` header value; anything unrecognized is JPEG.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let ct = content_type.unwrap_or_default().to_ascii_lowercase();
        if ct.contains("png") {
            ImageMediaType::Png
        } else if ct.contains("gif") {
            ImageMediaType::Gif
        } else if ct.contains("webp") {
            ImageMediaType::Webp
        } else {
            ImageMediaType::Jpeg
        }
    }
}

/// Keep only ingredients with confidence strictly above [`CONFIDENCE_THRESHOLD`].
pub fn retain_confident(ingredients: Vec<DetectedIngredient>) -> Vec<DetectedIngredient> {
    ingredients
        .into_iter()
        .filter(|i| i.confidence > CONFIDENCE_THRESHOLD)
        .collect()
}

#[derive(thiserror::Error, Debug)]
enum Cause {
    #[error("failed to fetch image: {0}")]
    Fetch(String),
    #[error("failed to fetch image: status {0}")]
    FetchStatus(u16),
    #[error("image exceeds the upload size limit")]
    TooLarge,
    #[error(transparent)]
    Model(#[from] crate::anthropic_client::ModelError),
    #[error(transparent)]
    Reply(#[from] crate::reply::ReplyError),
}

pub struct IngredientDetector {
    http: reqwest::Client,
    model: Arc<dyn LanguageModel>,
}

impl IngredientDetector {
    pub fn new(http: reqwest::Client, model: Arc<dyn LanguageModel>) -> Self {
        Self { http, model }
    }

    /// Fetch the image at `image_url` and ask the model what ingredients it shows.
    pub async fn detect(&self, image_url: &str) -> Result<Vec<DetectedIngredient>, DetectionError> {
        match self.try_detect(image_url).await {
            Ok(found) => {
                info!(%image_url, count = found.len(), "ingredients detected");
                Ok(found)
            }
            Err(e) => {
                error!(%image_url, "error detecting ingredients: {e}");
                Err(DetectionError::Failed)
            }
        }
    }

    async fn try_detect(&self, image_url: &str) -> Result<Vec<DetectedIngredient>, Cause> {
        let mut res = self
            .http
            .get(image_url)
            .send()
            .await
            .map_err(|e| Cause::Fetch(e.to_string()))?;
        if !res.status().is_success() {
            return Err(Cause::FetchStatus(res.status().as_u16()));
        }
        let media_type = ImageMediaType::from_content_type(
            res.headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        if res.content_length().is_some_and(|len| len > MAX_IMAGE_BYTES as u64) {
            return Err(Cause::TooLarge);
        }
        let mut bytes = Vec::new();
        while let Some(chunk) = res.chunk().await.map_err(|e| Cause::Fetch(e.to_string()))? {
            if bytes.len() + chunk.len() > MAX_IMAGE_BYTES {
                return Err(Cause::TooLarge);
            }
            bytes.extend_from_slice(&chunk);
        }

        let content = vec![
            ContentBlock::base64_image(media_type.as_ref(), STANDARD.encode(&bytes)),
            ContentBlock::text(DETECTION_PROMPT),
        ];
        let reply = self.model.complete(None, content, MAX_TOKENS).await?;
        let parsed: Vec<DetectedIngredient> = decode_array(&reply)?;
        Ok(retain_confident(parsed))
    }
}
