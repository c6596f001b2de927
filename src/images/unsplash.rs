//! Unsplash stock-photo search.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::ImageError;
use crate::images::{ImageProvider, ImagePurpose, ImageRef, ImageRequest};

const SEARCH_URL: &str = "https://api.unsplash.com/search/photos";

pub struct UnsplashProvider {
    client: reqwest::Client,
    access_key: SecretString,
}

impl UnsplashProvider {
    pub fn new(access_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    urls: PhotoUrls,
    alt_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    regular: String,
}

fn orientation(purpose: ImagePurpose) -> &'static str {
    match purpose {
        ImagePurpose::Social => "squarish",
        ImagePurpose::Cover | ImagePurpose::Inline => "landscape",
    }
}

fn request_failed(reason: impl ToString) -> ImageError {
    ImageError::RequestFailed {
        provider: "unsplash".to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl ImageProvider for UnsplashProvider {
    fn name(&self) -> &str {
        "unsplash"
    }

    async fn fetch(&self, request: &ImageRequest<'_>) -> Result<ImageRef, ImageError> {
        let resp = self
            .client
            .get(SEARCH_URL)
            .header(
                "Authorization",
                format!("Client-ID {}", self.access_key.expose_secret()),
            )
            .query(&[
                ("query", request.keyword),
                ("per_page", "1"),
                ("orientation", orientation(request.purpose)),
            ])
            .send()
            .await
            .map_err(request_failed)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(request_failed(format!("HTTP {status}: {body}")));
        }

        let search: SearchResponse = resp.json().await.map_err(request_failed)?;
        let photo = search
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ImageError::NoResults {
                provider: "unsplash".to_string(),
                query: request.keyword.to_string(),
            })?;

        Ok(ImageRef {
            url: photo.urls.regular,
            alt_text: photo
                .alt_description
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| format!("{} image for {}", request.purpose_label(), request.keyword)),
            purpose: request.purpose,
            source: "unsplash".to_string(),
            platforms: Vec::new(),
            position: request.position(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn social_images_are_square() {
        assert_eq!(orientation(ImagePurpose::Social), "squarish");
        assert_eq!(orientation(ImagePurpose::Cover), "landscape");
        assert_eq!(orientation(ImagePurpose::Inline), "landscape");
    }

    #[test]
    fn search_response_parses() {
        let raw = r#"{"total": 1, "results": [{"id": "x", "urls": {"regular": "https://images.unsplash.com/x"}, "alt_description": null}]}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].urls.regular, "https://images.unsplash.com/x");
        assert!(parsed.results[0].alt_description.is_none());
    }
}
