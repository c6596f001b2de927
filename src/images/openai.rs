//! OpenAI image generation (DALL-E).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::error::ImageError;
use crate::images::{ImageProvider, ImagePurpose, ImageRef, ImageRequest};

const GENERATIONS_URL: &str = "https://api.openai.com/v1/images/generations";

pub struct OpenAiImageProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl OpenAiImageProvider {
    pub fn new(api_key: SecretString, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: Option<String>,
}

/// Prompt for an image of the given purpose.
pub fn image_prompt(request: &ImageRequest<'_>) -> String {
    match request.purpose {
        ImagePurpose::Cover => format!(
            "Professional blog header image for article titled '{}', modern and clean design, topic: {}",
            request.title, request.keyword
        ),
        ImagePurpose::Social => format!(
            "Eye-catching social media image for topic: {}, vibrant and engaging",
            request.keyword
        ),
        ImagePurpose::Inline => format!(
            "Illustration for {}, professional and informative",
            request.keyword
        ),
    }
}

fn image_size(purpose: ImagePurpose) -> &'static str {
    match purpose {
        ImagePurpose::Social => "1024x1024",
        ImagePurpose::Cover | ImagePurpose::Inline => "1792x1024",
    }
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn fetch(&self, request: &ImageRequest<'_>) -> Result<ImageRef, ImageError> {
        let body = json!({
            "model": self.model,
            "prompt": image_prompt(request),
            "size": image_size(request.purpose),
            "quality": "standard",
            "n": 1,
        });

        let resp = self
            .client
            .post(GENERATIONS_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ImageError::RequestFailed {
                provider: self.model.clone(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ImageError::RequestFailed {
                provider: self.model.clone(),
                reason: format!("HTTP {status}: {text}"),
            });
        }

        let generated: GenerationResponse =
            resp.json().await.map_err(|e| ImageError::RequestFailed {
                provider: self.model.clone(),
                reason: e.to_string(),
            })?;

        let url = generated
            .data
            .into_iter()
            .find_map(|img| img.url)
            .ok_or_else(|| ImageError::NoResults {
                provider: self.model.clone(),
                query: request.keyword.to_string(),
            })?;

        Ok(ImageRef {
            url,
            alt_text: format!("{} image for {}", request.purpose_label(), request.title),
            purpose: request.purpose,
            source: self.model.clone(),
            platforms: Vec::new(),
            position: request.position(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(purpose: ImagePurpose) -> ImageRequest<'static> {
        ImageRequest {
            keyword: "零知识证明",
            title: "ZK 入门",
            purpose,
            index: 0,
        }
    }

    #[test]
    fn cover_prompt_mentions_title() {
        let prompt = image_prompt(&request(ImagePurpose::Cover));
        assert!(prompt.contains("'ZK 入门'"));
        assert!(prompt.contains("零知识证明"));
    }

    #[test]
    fn social_images_are_square() {
        assert_eq!(image_size(ImagePurpose::Social), "1024x1024");
        assert_eq!(image_size(ImagePurpose::Cover), "1792x1024");
    }

    #[test]
    fn response_without_url_parses() {
        let parsed: GenerationResponse =
            serde_json::from_str(r#"{"created": 1, "data": [{"b64_json": "xx"}]}"#).unwrap();
        assert!(parsed.data[0].url.is_none());
    }
}
