//! Image acquisition for generated content.
//!
//! Each article gets a cover image, a square social image when it targets a
//! social platform, and inline images for the website body. Providers are
//! tried in order; a failed image is dropped rather than failing the article.

pub mod openai;
pub mod unsplash;

pub use openai::OpenAiImageProvider;
pub use unsplash::UnsplashProvider;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::campaign::Platform;
use crate::config::ImageConfig;
use crate::error::ImageError;

/// What an image is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImagePurpose {
    Cover,
    Social,
    Inline,
}

/// A reference to an acquired image, stored with the content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub alt_text: String,
    pub purpose: ImagePurpose,
    /// Provider that produced the image (`unsplash`, `dall-e-3`, ...).
    pub source: String,
    pub platforms: Vec<Platform>,
    /// `featured` or `after-paragraph-N`.
    pub position: String,
}

/// One image to acquire.
#[derive(Debug, Clone)]
pub struct ImageRequest<'a> {
    pub keyword: &'a str,
    pub title: &'a str,
    pub purpose: ImagePurpose,
    /// Zero-based position among inline images.
    pub index: usize,
}

impl ImageRequest<'_> {
    pub fn position(&self) -> String {
        match self.purpose {
            ImagePurpose::Inline => format!("after-paragraph-{}", self.index + 1),
            _ => "featured".to_string(),
        }
    }

    /// Capitalized purpose name for alt text.
    pub fn purpose_label(&self) -> &'static str {
        match self.purpose {
            ImagePurpose::Cover => "Cover",
            ImagePurpose::Social => "Social",
            ImagePurpose::Inline => "Inline",
        }
    }
}

/// How many images an article for these platforms should carry.
pub fn image_count(platforms: &[Platform]) -> usize {
    if platforms.contains(&Platform::Website) {
        2
    } else {
        1
    }
}

/// Decide the purpose of each image.
///
/// Always a cover, then a social image when any social platform is
/// targeted, then inline images up to `count` when the website is targeted.
pub fn plan_purposes(platforms: &[Platform], count: usize) -> Vec<ImagePurpose> {
    let mut purposes = vec![ImagePurpose::Cover];
    if platforms.iter().any(Platform::is_social) {
        purposes.push(ImagePurpose::Social);
    }
    if platforms.contains(&Platform::Website) && count > purposes.len() {
        let remaining = count - purposes.len();
        purposes.extend(std::iter::repeat_n(ImagePurpose::Inline, remaining));
    }
    purposes.truncate(count);
    purposes
}

/// Platforms an image of the given purpose is shown on.
fn platforms_for(purpose: ImagePurpose, targets: &[Platform]) -> Vec<Platform> {
    match purpose {
        ImagePurpose::Cover => targets.to_vec(),
        ImagePurpose::Social => targets.iter().copied().filter(Platform::is_social).collect(),
        ImagePurpose::Inline => vec![Platform::Website],
    }
}

/// An image source.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Acquire a single image.
    async fn fetch(&self, request: &ImageRequest<'_>) -> Result<ImageRef, ImageError>;

    /// Acquire images for an article. Failures are logged and skipped, so
    /// the result may hold fewer than `count` images, or none.
    async fn acquire_images(
        &self,
        keyword: &str,
        title: &str,
        platforms: &[Platform],
        count: usize,
    ) -> Vec<ImageRef> {
        let mut images = Vec::new();
        let mut inline_index = 0;
        for purpose in plan_purposes(platforms, count) {
            let index = if purpose == ImagePurpose::Inline {
                inline_index += 1;
                inline_index - 1
            } else {
                0
            };
            let request = ImageRequest {
                keyword,
                title,
                purpose,
                index,
            };
            match self.fetch(&request).await {
                Ok(mut image) => {
                    image.platforms = platforms_for(purpose, platforms);
                    images.push(image);
                }
                Err(e) => warn!(keyword, ?purpose, provider = self.name(), "Image acquisition failed: {e}"),
            }
        }
        debug!(keyword, count = images.len(), "Images acquired");
        images
    }
}

/// Tries each provider in order until one returns an image.
pub struct FallbackImageProvider {
    providers: Vec<Arc<dyn ImageProvider>>,
}

impl FallbackImageProvider {
    pub fn new(providers: Vec<Arc<dyn ImageProvider>>) -> Self {
        Self { providers }
    }

    /// Build the provider chain from configuration: AI generation first when
    /// an OpenAI key is present, Unsplash second.
    pub fn from_config(config: &ImageConfig) -> Self {
        let mut providers: Vec<Arc<dyn ImageProvider>> = Vec::new();
        if let Some(key) = &config.openai_api_key {
            providers.push(Arc::new(OpenAiImageProvider::new(key.clone(), &config.model)));
        }
        if let Some(key) = &config.unsplash_access_key {
            providers.push(Arc::new(UnsplashProvider::new(key.clone())));
        }
        Self::new(providers)
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Names of the configured providers, in order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }
}

#[async_trait]
impl ImageProvider for FallbackImageProvider {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn fetch(&self, request: &ImageRequest<'_>) -> Result<ImageRef, ImageError> {
        let mut last_error = ImageError::NotConfigured {
            provider: "images".to_string(),
        };
        for provider in &self.providers {
            match provider.fetch(request).await {
                Ok(image) => return Ok(image),
                Err(e) => {
                    debug!(provider = provider.name(), "Image provider failed, trying next: {e}");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}
