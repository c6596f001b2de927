//! Content generation: articles, interview questions and knowledge transcripts.

pub mod engine;
pub mod json;
pub mod producer;
pub mod prompts;

pub use engine::ContentEngine;
pub use producer::{ArticleProducer, ProducedArticle};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::campaign::Platform;
use crate::error::GenerationError;

/// Inputs for one article.
#[derive(Debug, Clone)]
pub struct ArticleRequest<'a> {
    pub keyword: &'a str,
    /// Campaign plan name, used as the topic direction.
    pub topic: &'a str,
    /// Collected domain knowledge, possibly empty.
    pub knowledge: &'a str,
    pub platforms: &'a [Platform],
}

/// Article fields as returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArticle {
    pub title: String,
    pub slug: String,
    pub meta_description: String,
    pub html_body: String,
    pub social_snippet: String,
}

impl GeneratedArticle {
    /// SEO metadata stored with the content item, including schema.org markup.
    pub fn seo_metadata(&self, keyword: &str) -> Value {
        json!({
            "slug": self.slug,
            "description": self.meta_description,
            "schema_markup": {
                "@context": "https://schema.org",
                "@type": "Article",
                "headline": self.title,
                "description": self.meta_description,
                "author": {
                    "@type": "Organization",
                    "name": "SEO Content Hub",
                },
                "datePublished": "",
                "keywords": keyword,
            },
        })
    }
}

/// Produces article text and the knowledge-collection exchange.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Write one article. Fails on a malformed or incomplete model reply.
    async fn generate_article(
        &self,
        request: &ArticleRequest<'_>,
    ) -> Result<GeneratedArticle, GenerationError>;

    /// Two or three open questions about a keyword. Never fails; falls back
    /// to fixed templates.
    async fn generate_questions(&self, keyword: &str) -> Vec<String>;

    /// Turn a free-form answer into a Q/A transcript.
    async fn structure_answers(
        &self,
        keyword: &str,
        questions: &[String],
        answer: &str,
    ) -> Result<String, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seo_metadata_carries_schema_markup() {
        let article = GeneratedArticle {
            title: "零知识证明入门".into(),
            slug: "zk-proof-intro".into(),
            meta_description: "desc".into(),
            html_body: "<article></article>".into(),
            social_snippet: "🔐 #ZK".into(),
        };
        let meta = article.seo_metadata("零知识证明");
        assert_eq!(meta["slug"], "zk-proof-intro");
        assert_eq!(meta["schema_markup"]["@type"], "Article");
        assert_eq!(meta["schema_markup"]["headline"], "零知识证明入门");
        assert_eq!(meta["schema_markup"]["keywords"], "零知识证明");
    }
}
