//! Loads the question catalogue and keeps it for the lifetime of the app.
//!
//! The catalogue ships as one JSON document. A successful fetch is parsed,
//! validated question by question, and cached; a failed fetch serves an empty
//! catalogue for this call and leaves the cache empty so the next call
//! retries.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use quiz_core::model::{Catalogue, Question, QuizUnit, UnitId};

use crate::error::QuestionSourceError;

//
// ─── SOURCE ────────────────────────────────────────────────────────────────────
//

/// Where the raw catalogue document comes from.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Fetch the raw document.
    ///
    /// # Errors
    ///
    /// Returns `QuestionSourceError` when the document cannot be retrieved
    /// or decoded.
    async fn fetch(&self) -> Result<CatalogueDocument, QuestionSourceError>;
}

/// Fetches the catalogue JSON over HTTP.
pub struct HttpQuestionSource {
    client: Client,
    url: String,
}

impl HttpQuestionSource {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    /// Reads `HOPQUIZ_QUESTIONS_URL`; `None` when unset or blank.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var("HOPQUIZ_QUESTIONS_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(Self::new)
    }
}

#[async_trait]
impl QuestionSource for HttpQuestionSource {
    async fn fetch(&self) -> Result<CatalogueDocument, QuestionSourceError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(QuestionSourceError::HttpStatus(response.status()));
        }
        Ok(response.json().await?)
    }
}

/// Serves a fixed document, for tests and bundled catalogues.
#[derive(Debug, Clone)]
pub struct StaticQuestionSource {
    document: CatalogueDocument,
}

impl StaticQuestionSource {
    #[must_use]
    pub fn new(document: CatalogueDocument) -> Self {
        Self { document }
    }
}

#[async_trait]
impl QuestionSource for StaticQuestionSource {
    async fn fetch(&self) -> Result<CatalogueDocument, QuestionSourceError> {
        Ok(self.document.clone())
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Read-only question repository with a fetch-once cache.
pub struct CatalogueService {
    source: Arc<dyn QuestionSource>,
    cache: RwLock<Option<Arc<Catalogue>>>,
}

impl CatalogueService {
    #[must_use]
    pub fn new(source: Arc<dyn QuestionSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(None),
        }
    }

    /// The catalogue, fetching it on first use.
    ///
    /// Never fails: a fetch error logs a warning and yields an empty
    /// catalogue without caching it, so a later call can still succeed.
    pub async fn load(&self) -> Arc<Catalogue> {
        if let Some(catalogue) = self.cache.read().await.as_ref() {
            return Arc::clone(catalogue);
        }

        let mut slot = self.cache.write().await;
        // Another task may have filled the cache while we waited.
        if let Some(catalogue) = slot.as_ref() {
            return Arc::clone(catalogue);
        }

        match self.source.fetch().await {
            Ok(document) => {
                let catalogue = Arc::new(build_catalogue(document));
                *slot = Some(Arc::clone(&catalogue));
                catalogue
            }
            Err(err) => {
                warn!(error = %err, "question fetch failed, serving an empty catalogue");
                Arc::new(Catalogue::empty())
            }
        }
    }

    /// Questions for one unit, with the unknown-id-to-first-unit fallback.
    pub async fn questions_for(&self, unit: UnitId) -> Vec<Question> {
        self.load().await.questions_for(unit).to_vec()
    }

    /// The pooled questions of every unit, for the ultimate quiz.
    pub async fn all_questions(&self) -> Vec<Question> {
        self.load().await.all_questions()
    }
}

/// Validates the raw document into the domain catalogue. Malformed questions
/// are skipped with a warning; the rest of their unit survives.
fn build_catalogue(document: CatalogueDocument) -> Catalogue {
    let units = document
        .weeks
        .into_iter()
        .map(|week| {
            let unit = UnitId::new(week.week_number);
            let questions = week
                .questions
                .into_iter()
                .enumerate()
                .filter_map(|(index, raw)| {
                    match Question::new(raw.question, raw.options, &raw.answer, raw.solution) {
                        Ok(question) => Some(question),
                        Err(err) => {
                            warn!(unit = %unit, index, error = %err, "skipping malformed question");
                            None
                        }
                    }
                })
                .collect();
            QuizUnit::new(unit, questions)
        })
        .collect();
    Catalogue::new(units)
}

//
// ─── DOCUMENT SHAPES ───────────────────────────────────────────────────────────
//

/// The catalogue JSON as published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogueDocument {
    pub weeks: Vec<UnitDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitDocument {
    pub week_number: u32,
    pub questions: Vec<QuestionDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDocument {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub solution: Option<String>,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn question_doc(prompt: &str, answer: &str) -> QuestionDocument {
        QuestionDocument {
            question: prompt.to_string(),
            options: vec!["a) one".to_string(), "b) two".to_string()],
            answer: answer.to_string(),
            solution: None,
        }
    }

    fn two_week_document() -> CatalogueDocument {
        CatalogueDocument {
            weeks: vec![
                UnitDocument {
                    week_number: 1,
                    questions: vec![question_doc("q1", "a"), question_doc("q2", "b")],
                },
                UnitDocument {
                    week_number: 2,
                    questions: vec![question_doc("q3", "a,b")],
                },
            ],
        }
    }

    struct CountingSource {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl QuestionSource for CountingSource {
        async fn fetch(&self) -> Result<CatalogueDocument, QuestionSourceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(QuestionSourceError::HttpStatus(
                    reqwest::StatusCode::SERVICE_UNAVAILABLE,
                ));
            }
            Ok(two_week_document())
        }
    }

    #[tokio::test]
    async fn catalogue_is_fetched_once_and_cached() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            fail_first: false,
        });
        let service = CatalogueService::new(Arc::clone(&source) as Arc<dyn QuestionSource>);

        let first = service.load().await;
        let second = service.load().await;
        assert_eq!(first.len(), 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fetch_serves_empty_without_caching() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            fail_first: true,
        });
        let service = CatalogueService::new(Arc::clone(&source) as Arc<dyn QuestionSource>);

        let degraded = service.load().await;
        assert!(degraded.is_empty());

        // The failure was not cached; the retry succeeds.
        let recovered = service.load().await;
        assert_eq!(recovered.len(), 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_questions_are_skipped() {
        let mut document = two_week_document();
        document.weeks[0]
            .questions
            .push(question_doc("orphan answer", "z"));
        document.weeks[0].questions.push(QuestionDocument {
            question: "  ".to_string(),
            options: vec!["a) x".to_string()],
            answer: "a".to_string(),
            solution: None,
        });

        let service = CatalogueService::new(Arc::new(StaticQuestionSource::new(document)));
        let questions = service.questions_for(UnitId::new(1)).await;
        assert_eq!(questions.len(), 2);
    }

    #[tokio::test]
    async fn unknown_unit_falls_back_to_first() {
        let service =
            CatalogueService::new(Arc::new(StaticQuestionSource::new(two_week_document())));
        let questions = service.questions_for(UnitId::new(99)).await;
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].prompt(), "q1");
    }

    #[tokio::test]
    async fn all_questions_pools_every_unit_in_order() {
        let service =
            CatalogueService::new(Arc::new(StaticQuestionSource::new(two_week_document())));
        let pool = service.all_questions().await;
        assert_eq!(pool.len(), 3);
        assert_eq!(pool[2].prompt(), "q3");
    }
}
