//! Question routing: classify, dispatch to a backend, synthesize an answer.

mod classifier;
mod retrieval;
mod synthesizer;

pub use classifier::{ClassifierScores, KeywordClassifier};
pub use retrieval::{build_context, VectorAnswer, VectorRetriever};
pub use synthesizer::{AnswerSynthesizer, SYNTHESIS_FAILURE};

use crate::error::{FinqueryError, Result};
use crate::sql::SqlAgent;
use crate::vector_store::{Collection, RetrievedChunk};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Source label used for answers from the SQL path.
pub const STRUCTURED_SOURCE: &str = "Structured Data (SQL Query)";

/// The backend a question is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteLabel {
    PressReleases,
    SecReports,
    StructuredData,
}

impl RouteLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteLabel::PressReleases => "press_releases",
            RouteLabel::SecReports => "sec_reports",
            RouteLabel::StructuredData => "structured_data",
        }
    }

    /// Vector collection behind this route, if any.
    pub fn collection(&self) -> Option<Collection> {
        match self {
            RouteLabel::PressReleases => Some(Collection::PressReleases),
            RouteLabel::SecReports => Some(Collection::SecReports),
            RouteLabel::StructuredData => None,
        }
    }
}

impl std::str::FromStr for RouteLabel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "press_releases" | "press" => Ok(RouteLabel::PressReleases),
            "sec_reports" | "sec" => Ok(RouteLabel::SecReports),
            "structured_data" | "structured" | "sql" => Ok(RouteLabel::StructuredData),
            _ => Err(format!("Unknown route: {}", s)),
        }
    }
}

impl std::fmt::Display for RouteLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a question was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Answered,
    NoResults,
    InvalidQuery,
    UpstreamError,
    DatabaseError,
}

/// The assistant's reply to one question.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub route: RouteLabel,
    pub source_info: String,
    pub outcome: AnswerOutcome,
    /// Retrieved chunks (vector routes only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<RetrievedChunk>,
    /// Executed SQL (structured route only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

/// Routes each question to one backend and returns its answer.
pub struct Assistant {
    classifier: KeywordClassifier,
    structured: SqlAgent,
    press_releases: VectorRetriever,
    sec_reports: VectorRetriever,
}

impl Assistant {
    pub fn new(
        classifier: KeywordClassifier,
        structured: SqlAgent,
        press_releases: VectorRetriever,
        sec_reports: VectorRetriever,
    ) -> Self {
        Self {
            classifier,
            structured,
            press_releases,
            sec_reports,
        }
    }

    pub fn classifier(&self) -> &KeywordClassifier {
        &self.classifier
    }

    pub fn sql_agent(&self) -> &SqlAgent {
        &self.structured
    }

    pub fn retriever(&self, collection: Collection) -> &VectorRetriever {
        match collection {
            Collection::PressReleases => &self.press_releases,
            Collection::SecReports => &self.sec_reports,
        }
    }

    /// Classify and answer a question.
    #[instrument(skip(self))]
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let question = check_question(question)?;
        let scores = self.classifier.scores(question);
        let route = scores.route();
        info!(
            press = scores.press,
            sec = scores.sec,
            structured = scores.structured,
            "Routing question to {}",
            route
        );
        self.dispatch(question, route).await
    }

    /// Answer a question on a fixed route, skipping classification.
    #[instrument(skip(self))]
    pub async fn ask_with_route(&self, question: &str, route: RouteLabel) -> Result<Answer> {
        let question = check_question(question)?;
        self.dispatch(question, route).await
    }

    async fn dispatch(&self, question: &str, route: RouteLabel) -> Result<Answer> {
        let answer = match route.collection() {
            Some(collection) => {
                let reply = self.retriever(collection).answer(question, None).await;
                Answer {
                    text: reply.text,
                    route,
                    source_info: reply.source_info,
                    outcome: reply.outcome,
                    sources: reply.sources,
                    sql: None,
                }
            }
            None => {
                let reply = self.structured.answer(question).await;
                Answer {
                    text: reply.text,
                    route,
                    source_info: STRUCTURED_SOURCE.to_string(),
                    outcome: reply.outcome,
                    sources: Vec::new(),
                    sql: reply.sql,
                }
            }
        };

        info!(outcome = ?answer.outcome, "Answered via {}", answer.source_info);
        Ok(answer)
    }
}

fn check_question(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(FinqueryError::InvalidInput(
            "Question must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}
