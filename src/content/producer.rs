//! Turns one keyword into one stored content item.
//!
//! The keyword is claimed before generation so two writers never use the
//! same keyword; a failed generation puts it back in the pool.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::campaign::{Campaign, ContentStatus, Keyword, NewContent};
use crate::content::{ArticleRequest, GenerationProvider};
use crate::error::Error;
use crate::images::{ImageProvider, image_count};
use crate::store::Database;

/// Summary of a stored article.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducedArticle {
    pub content_id: Uuid,
    pub keyword: String,
    pub title: String,
    pub image_count: usize,
    pub status: ContentStatus,
}

pub struct ArticleProducer {
    store: Arc<dyn Database>,
    generator: Arc<dyn GenerationProvider>,
    images: Arc<dyn ImageProvider>,
}

impl ArticleProducer {
    pub fn new(
        store: Arc<dyn Database>,
        generator: Arc<dyn GenerationProvider>,
        images: Arc<dyn ImageProvider>,
    ) -> Self {
        Self {
            store,
            generator,
            images,
        }
    }

    /// Write, illustrate and store an article for `keyword`.
    ///
    /// Returns `Ok(None)` when another writer claimed the keyword first.
    pub async fn produce(
        &self,
        campaign: &Campaign,
        keyword: &Keyword,
    ) -> Result<Option<ProducedArticle>, Error> {
        if !self.store.claim_keyword(keyword.id).await? {
            debug!(keyword = %keyword.text, "Keyword already claimed, skipping");
            return Ok(None);
        }

        match self.write(campaign, keyword).await {
            Ok(article) => Ok(Some(article)),
            Err(e) => {
                warn!(keyword = %keyword.text, campaign_id = %campaign.id, "Article production failed: {e}");
                if let Err(release_err) = self.store.release_keyword(keyword.id).await {
                    warn!(keyword = %keyword.text, "Could not release keyword: {release_err}");
                }
                Err(e)
            }
        }
    }

    async fn write(&self, campaign: &Campaign, keyword: &Keyword) -> Result<ProducedArticle, Error> {
        let platforms = campaign.platforms();
        let request = ArticleRequest {
            keyword: &keyword.text,
            topic: &campaign.plan_name,
            knowledge: &keyword.knowledge,
            platforms: &platforms,
        };
        let article = self.generator.generate_article(&request).await?;

        let images = self
            .images
            .acquire_images(
                &keyword.text,
                &article.title,
                &platforms,
                image_count(&platforms),
            )
            .await;

        let status = if campaign.auto_approve {
            ContentStatus::Approved
        } else {
            ContentStatus::Pending
        };

        let image_total = images.len();
        let content_id = self
            .store
            .create_content(&NewContent {
                campaign_id: Some(campaign.id),
                keyword_id: Some(keyword.id),
                title: article.title.clone(),
                body: article.html_body.clone(),
                seo_metadata: article.seo_metadata(&keyword.text),
                social_snippet: article.social_snippet.clone(),
                images,
                platforms,
                status,
                scheduled_at: None,
            })
            .await?;

        info!(
            keyword = %keyword.text,
            content_id = %content_id,
            images = image_total,
            %status,
            "Article stored"
        );

        Ok(ProducedArticle {
            content_id,
            keyword: keyword.text.clone(),
            title: article.title,
            image_count: image_total,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::campaign::{KeywordStatus, NewCampaign, Platform};
    use crate::config::CampaignDefaults;
    use crate::content::GeneratedArticle;
    use crate::error::{GenerationError, ImageError};
    use crate::images::{ImagePurpose, ImageRef, ImageRequest};
    use crate::store::LibSqlBackend;

    struct FixedGenerator {
        fail: bool,
    }

    #[async_trait]
    impl GenerationProvider for FixedGenerator {
        async fn generate_article(
            &self,
            request: &ArticleRequest<'_>,
        ) -> Result<GeneratedArticle, GenerationError> {
            if self.fail {
                return Err(GenerationError::Malformed("not json".into()));
            }
            Ok(GeneratedArticle {
                title: format!("{} 指南", request.keyword),
                slug: "guide".into(),
                meta_description: "d".into(),
                html_body: "<article>body</article>".into(),
                social_snippet: "s".into(),
            })
        }

        async fn generate_questions(&self, _keyword: &str) -> Vec<String> {
            Vec::new()
        }

        async fn structure_answers(
            &self,
            _keyword: &str,
            _questions: &[String],
            answer: &str,
        ) -> Result<String, GenerationError> {
            Ok(answer.to_string())
        }
    }

    struct OneImage;

    #[async_trait]
    impl ImageProvider for OneImage {
        fn name(&self) -> &str {
            "one"
        }

        async fn fetch(&self, request: &ImageRequest<'_>) -> Result<ImageRef, ImageError> {
            if request.purpose != ImagePurpose::Cover {
                return Err(ImageError::NoResults {
                    provider: "one".into(),
                    query: request.keyword.into(),
                });
            }
            Ok(ImageRef {
                url: "https://img.example/cover.jpg".into(),
                alt_text: request.title.into(),
                purpose: request.purpose,
                source: "one".into(),
                platforms: Vec::new(),
                position: request.position(),
            })
        }
    }

    async fn setup(auto_approve: bool) -> (Arc<LibSqlBackend>, Campaign, Keyword) {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let defaults = CampaignDefaults {
            auto_approve,
            website_webhook_url: Some("https://site.example/hook".into()),
            ..CampaignDefaults::default()
        };
        let today = chrono::Utc::now().date_naive();
        let new = NewCampaign::from_request(Some("Rust"), Some(30), 1, today, &defaults).unwrap();
        let campaign = db.create_campaign(&new).await.unwrap();
        db.add_keywords(&["tokio".to_string()], Some(campaign.id)).await.unwrap();
        let keyword = db.get_available_keyword(campaign.id).await.unwrap().unwrap();
        (db, campaign, keyword)
    }

    #[tokio::test]
    async fn produce_stores_content_and_consumes_keyword() {
        let (db, campaign, keyword) = setup(false).await;
        let producer = ArticleProducer::new(
            db.clone(),
            Arc::new(FixedGenerator { fail: false }),
            Arc::new(OneImage),
        );

        let produced = producer.produce(&campaign, &keyword).await.unwrap().unwrap();
        assert_eq!(produced.title, "tokio 指南");
        assert_eq!(produced.status, ContentStatus::Pending);
        assert_eq!(produced.image_count, 1);

        let item = db.get_content(produced.content_id).await.unwrap().unwrap();
        assert_eq!(item.platforms, vec![Platform::Website, Platform::Twitter]);
        assert_eq!(item.seo_metadata["schema_markup"]["keywords"], "tokio");

        let kw = db.get_keyword(keyword.id).await.unwrap().unwrap();
        assert_eq!(kw.status, KeywordStatus::Used);
    }

    #[tokio::test]
    async fn auto_approve_campaign_stores_approved_content() {
        let (db, campaign, keyword) = setup(true).await;
        let producer = ArticleProducer::new(
            db.clone(),
            Arc::new(FixedGenerator { fail: false }),
            Arc::new(OneImage),
        );
        let produced = producer.produce(&campaign, &keyword).await.unwrap().unwrap();
        assert_eq!(produced.status, ContentStatus::Approved);
        assert_eq!(db.count_by_status(ContentStatus::Approved).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn claimed_keyword_is_not_produced_twice() {
        let (db, campaign, keyword) = setup(false).await;
        let producer = ArticleProducer::new(
            db.clone(),
            Arc::new(FixedGenerator { fail: false }),
            Arc::new(OneImage),
        );
        assert!(producer.produce(&campaign, &keyword).await.unwrap().is_some());
        assert!(producer.produce(&campaign, &keyword).await.unwrap().is_none());
        assert_eq!(db.count_by_status(ContentStatus::Pending).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_generation_releases_keyword() {
        let (db, campaign, keyword) = setup(false).await;
        let producer = ArticleProducer::new(
            db.clone(),
            Arc::new(FixedGenerator { fail: true }),
            Arc::new(OneImage),
        );
        let err = producer.produce(&campaign, &keyword).await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));

        let kw = db.get_keyword(keyword.id).await.unwrap().unwrap();
        assert_eq!(kw.status, KeywordStatus::Available);
        assert_eq!(db.count_by_status(ContentStatus::Pending).await.unwrap(), 0);
    }
}
