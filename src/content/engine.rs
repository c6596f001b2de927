//! LLM-backed `GenerationProvider`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::content::json::{extract_json_array, extract_json_object};
use crate::content::prompts;
use crate::content::{ArticleRequest, GeneratedArticle, GenerationProvider};
use crate::error::GenerationError;
use crate::knowledge::{fallback_questions, normalize_questions};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

const ARTICLE_TEMPERATURE: f32 = 0.7;
const ARTICLE_MAX_TOKENS: u32 = 2000;
const INTERVIEW_TEMPERATURE: f32 = 0.5;
const INTERVIEW_MAX_TOKENS: u32 = 800;

/// Generates content through a chat-completion model.
pub struct ContentEngine {
    llm: Arc<dyn LlmProvider>,
}

impl ContentEngine {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    async fn ask(
        &self,
        system: &str,
        user: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(user),
        ])
        .with_temperature(temperature)
        .with_max_tokens(max_tokens);

        let response = self.llm.complete(request).await?;
        debug!(
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Completion received"
        );
        Ok(response.content)
    }
}

/// Parse and validate the model's article JSON.
pub fn parse_article(raw: &str) -> Result<GeneratedArticle, GenerationError> {
    let json_str = extract_json_object(raw);
    let article: GeneratedArticle = serde_json::from_str(&json_str)
        .map_err(|e| GenerationError::Malformed(e.to_string()))?;

    if article.title.trim().is_empty() {
        return Err(GenerationError::MissingField("title"));
    }
    if article.html_body.trim().is_empty() {
        return Err(GenerationError::MissingField("html_body"));
    }
    Ok(article)
}

#[async_trait]
impl GenerationProvider for ContentEngine {
    async fn generate_article(
        &self,
        request: &ArticleRequest<'_>,
    ) -> Result<GeneratedArticle, GenerationError> {
        let prompt = prompts::article_prompt(
            request.keyword,
            request.topic,
            request.knowledge,
            request.platforms,
        );
        let raw = self
            .ask(
                prompts::ARTICLE_SYSTEM_PROMPT,
                prompt,
                ARTICLE_TEMPERATURE,
                ARTICLE_MAX_TOKENS,
            )
            .await?;

        let article = parse_article(&raw)?;
        info!(keyword = request.keyword, title = %article.title, "Article generated");
        Ok(article)
    }

    async fn generate_questions(&self, keyword: &str) -> Vec<String> {
        let raw = match self
            .ask(
                prompts::INTERVIEW_SYSTEM_PROMPT,
                prompts::questions_prompt(keyword),
                INTERVIEW_TEMPERATURE,
                INTERVIEW_MAX_TOKENS,
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(keyword, "Question generation failed, using templates: {e}");
                return fallback_questions(keyword);
            }
        };

        match serde_json::from_str::<Vec<String>>(&extract_json_array(&raw)) {
            Ok(questions) => normalize_questions(keyword, questions),
            Err(e) => {
                warn!(keyword, "Unparsable questions, using templates: {e}");
                fallback_questions(keyword)
            }
        }
    }

    async fn structure_answers(
        &self,
        keyword: &str,
        questions: &[String],
        answer: &str,
    ) -> Result<String, GenerationError> {
        let transcript = self
            .ask(
                prompts::INTERVIEW_SYSTEM_PROMPT,
                prompts::structure_prompt(keyword, questions, answer),
                INTERVIEW_TEMPERATURE,
                INTERVIEW_MAX_TOKENS,
            )
            .await?;

        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(transcript.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::campaign::Platform;
    use crate::error::LlmError;
    use crate::llm::{CompletionResponse, FinishReason};

    /// Returns canned replies in order and records the prompts it saw.
    struct MockLlm {
        replies: Mutex<Vec<Result<String, ()>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl MockLlm {
        fn new(replies: Vec<Result<&str, ()>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(|r| r.map(String::from)).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock-writer"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            if let Some(last) = request.messages.last() {
                self.prompts.lock().unwrap().push(last.content.clone());
            }
            let next = {
                let mut replies = self.replies.lock().unwrap();
                if replies.is_empty() { Err(()) } else { replies.remove(0) }
            };
            match next {
                Ok(content) => Ok(CompletionResponse {
                    content,
                    input_tokens: 100,
                    output_tokens: 50,
                    finish_reason: FinishReason::Stop,
                    response_id: None,
                }),
                Err(()) => Err(LlmError::RequestFailed {
                    provider: "mock".into(),
                    reason: "unavailable".into(),
                }),
            }
        }
    }

    const ARTICLE_JSON: &str = r#"{"title": "零知识证明入门", "slug": "zk-intro", "meta_description": "d", "html_body": "<article>x</article>", "social_snippet": "s"}"#;

    fn request<'a>(knowledge: &'a str, platforms: &'a [Platform]) -> ArticleRequest<'a> {
        ArticleRequest {
            keyword: "零知识证明",
            topic: "Web3 SEO Campaign",
            knowledge,
            platforms,
        }
    }

    #[tokio::test]
    async fn article_parses_fenced_json() {
        let fenced = format!("```json\n{ARTICLE_JSON}\n```");
        let llm = Arc::new(MockLlm::new(vec![Ok(fenced.as_str())]));
        let engine = ContentEngine::new(llm.clone());

        let article = engine
            .generate_article(&request("Q: 用途\nA: 隐私", &[Platform::Website]))
            .await
            .unwrap();
        assert_eq!(article.title, "零知识证明入门");
        assert!(llm.prompts.lock().unwrap()[0].contains("A: 隐私"));
    }

    #[tokio::test]
    async fn article_malformed_reply_is_error() {
        let llm = Arc::new(MockLlm::new(vec![Ok("sorry, I can't")]));
        let engine = ContentEngine::new(llm);
        let err = engine.generate_article(&request("", &[])).await.unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(_)));
    }

    #[test]
    fn article_missing_body_is_error() {
        let raw = r#"{"title": "t", "slug": "s", "meta_description": "d", "html_body": " ", "social_snippet": ""}"#;
        assert!(matches!(
            parse_article(raw),
            Err(GenerationError::MissingField("html_body"))
        ));
    }

    #[tokio::test]
    async fn article_llm_failure_propagates() {
        let engine = ContentEngine::new(Arc::new(MockLlm::new(vec![Err(())])));
        let err = engine.generate_article(&request("", &[])).await.unwrap_err();
        assert!(matches!(err, GenerationError::Llm(_)));
    }

    #[tokio::test]
    async fn questions_are_capped_at_three() {
        let llm = Arc::new(MockLlm::new(vec![Ok(r#"["一？", "二？", "", "三？", "四？"]"#)]));
        let engine = ContentEngine::new(llm);
        let questions = engine.generate_questions("零知识证明").await;
        assert_eq!(questions, vec!["一？", "二？", "三？"]);
    }

    #[tokio::test]
    async fn questions_fall_back_on_failure() {
        let engine = ContentEngine::new(Arc::new(MockLlm::new(vec![Err(())])));
        let questions = engine.generate_questions("零知识证明").await;
        assert_eq!(questions, fallback_questions("零知识证明"));

        let engine = ContentEngine::new(Arc::new(MockLlm::new(vec![Ok("no json")])));
        assert_eq!(engine.generate_questions("k").await.len(), 3);
    }

    #[tokio::test]
    async fn structure_answers_trims_reply() {
        let engine = ContentEngine::new(Arc::new(MockLlm::new(vec![Ok("  Q: a\nA: b \n")])));
        let transcript = engine
            .structure_answers("k", &["a".to_string()], "b")
            .await
            .unwrap();
        assert_eq!(transcript, "Q: a\nA: b");

        let engine = ContentEngine::new(Arc::new(MockLlm::new(vec![Ok("   ")])));
        assert!(matches!(
            engine.structure_answers("k", &[], "b").await,
            Err(GenerationError::Empty)
        ));
    }
}
