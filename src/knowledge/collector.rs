//! Drives a keyword through the knowledge-collection Q&A.
//!
//! Every transition is a compare-and-set against the stored status, so a
//! keyword advanced by someone else is reported as a conflict instead of
//! being overwritten.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{info, warn};

use crate::campaign::Keyword;
use crate::content::GenerationProvider;
use crate::error::{DatabaseError, KnowledgeError};
use crate::knowledge::CollectionStatus;
use crate::store::{CollectionUpdate, Database};

/// Phrases that end the Q&A without answers, matched anywhere in the message.
pub const SKIP_TOKENS: &[&str] = &["跳过", "直接生成"];

/// `skip` as a standalone word, so "skipped" in an answer does not count.
static SKIP_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z])skip(?:$|[^a-z])").expect("valid skip pattern")
});

/// Most questions asked per keyword.
pub const MAX_QUESTIONS: usize = 3;
/// Fewest usable questions before falling back to templates.
pub const MIN_QUESTIONS: usize = 2;

pub fn is_skip_request(message: &str) -> bool {
    SKIP_TOKENS.iter().any(|token| message.contains(token)) || SKIP_WORD.is_match(message)
}

/// Fixed questions used when the model cannot supply any.
pub fn fallback_questions(keyword: &str) -> Vec<String> {
    vec![
        format!("关于「{keyword}」，你或你的团队有哪些一手经验或真实案例？"),
        format!("读者在了解「{keyword}」时最常见的误区或痛点是什么？"),
        format!("关于「{keyword}」，有哪些独特的观点、数据或建议希望文章重点体现？"),
    ]
}

/// Trim, drop blanks and cap at three; too few usable questions means templates.
pub fn normalize_questions(keyword: &str, questions: Vec<String>) -> Vec<String> {
    let questions: Vec<String> = questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .take(MAX_QUESTIONS)
        .collect();

    if questions.len() < MIN_QUESTIONS {
        fallback_questions(keyword)
    } else {
        questions
    }
}

/// Deterministic transcript used when the answer cannot be restructured.
pub fn fallback_transcript(questions: &[String], answer: &str) -> String {
    let mut transcript = String::new();
    for (i, question) in questions.iter().enumerate() {
        transcript.push_str(&format!("Q{}: {question}\n", i + 1));
    }
    transcript.push_str(&format!("A: {}", answer.trim()));
    transcript
}

pub struct KnowledgeCollector {
    store: Arc<dyn Database>,
    generator: Arc<dyn GenerationProvider>,
}

impl KnowledgeCollector {
    pub fn new(store: Arc<dyn Database>, generator: Arc<dyn GenerationProvider>) -> Self {
        Self { store, generator }
    }

    /// Ask questions about a keyword and park it as `AwaitingAnswers` in this session.
    pub async fn request_questions(
        &self,
        keyword: &Keyword,
        session_id: &str,
    ) -> Result<Vec<String>, KnowledgeError> {
        self.check_transition(keyword, CollectionStatus::AwaitingAnswers)?;

        let questions = normalize_questions(
            &keyword.text,
            self.generator.generate_questions(&keyword.text).await,
        );

        let update = CollectionUpdate::new(CollectionStatus::AwaitingAnswers)
            .with_questions(&questions, session_id);
        if !self
            .store
            .update_keyword_collection_status(keyword.id, keyword.collection_status, update)
            .await?
        {
            return Err(KnowledgeError::Conflict {
                id: keyword.id,
                expected: keyword.collection_status.to_string(),
            });
        }

        info!(keyword = %keyword.text, session_id, count = questions.len(), "Knowledge questions sent");
        Ok(questions)
    }

    /// Store the user's reply as the keyword's knowledge and mark it `Ready`.
    ///
    /// Unreadable pending questions leave the keyword untouched.
    pub async fn record_answers(
        &self,
        keyword: &Keyword,
        answer: &str,
    ) -> Result<Keyword, KnowledgeError> {
        self.check_transition(keyword, CollectionStatus::Ready)?;

        let questions = keyword
            .questions()
            .map_err(|e| KnowledgeError::CorruptQuestions {
                id: keyword.id,
                reason: e.to_string(),
            })?;
        if questions.is_empty() {
            return Err(KnowledgeError::CorruptQuestions {
                id: keyword.id,
                reason: "no pending questions stored".to_string(),
            });
        }

        let transcript = match self
            .generator
            .structure_answers(&keyword.text, &questions, answer)
            .await
        {
            Ok(transcript) => transcript,
            Err(e) => {
                warn!(keyword = %keyword.text, "Could not structure answers, keeping raw transcript: {e}");
                fallback_transcript(&questions, answer)
            }
        };

        let update = CollectionUpdate::new(CollectionStatus::Ready).with_knowledge(&transcript);
        self.settle(keyword, update).await
    }

    /// End the Q&A without answers, keeping whatever knowledge exists.
    pub async fn skip(&self, keyword: &Keyword) -> Result<Keyword, KnowledgeError> {
        self.check_transition(keyword, CollectionStatus::Skipped)?;
        self.settle(keyword, CollectionUpdate::new(CollectionStatus::Skipped))
            .await
    }

    fn check_transition(
        &self,
        keyword: &Keyword,
        target: CollectionStatus,
    ) -> Result<(), KnowledgeError> {
        if keyword.collection_status.can_transition_to(target) {
            Ok(())
        } else {
            Err(KnowledgeError::InvalidTransition {
                id: keyword.id,
                from: keyword.collection_status.to_string(),
                to: target.to_string(),
            })
        }
    }

    async fn settle(
        &self,
        keyword: &Keyword,
        update: CollectionUpdate<'_>,
    ) -> Result<Keyword, KnowledgeError> {
        if !self
            .store
            .update_keyword_collection_status(keyword.id, keyword.collection_status, update)
            .await?
        {
            return Err(KnowledgeError::Conflict {
                id: keyword.id,
                expected: keyword.collection_status.to_string(),
            });
        }

        info!(keyword = %keyword.text, status = %update.status, "Knowledge collection settled");
        self.store
            .get_keyword(keyword.id)
            .await?
            .ok_or_else(|| {
                KnowledgeError::Database(DatabaseError::NotFound {
                    entity: "keyword".to_string(),
                    id: keyword.id.to_string(),
                })
            })
    }
}
