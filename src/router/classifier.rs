//! Keyword-based intent classification.

use super::RouteLabel;
use crate::config::RoutingSettings;
use serde::Serialize;

/// Keyword hits per route for one question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassifierScores {
    pub press: usize,
    pub sec: usize,
    pub structured: usize,
}

impl ClassifierScores {
    /// Pick the route with the highest score, preferring press releases, then
    /// SEC reports, on ties. A question with no hits goes to structured data.
    pub fn route(&self) -> RouteLabel {
        if self.press == 0 && self.sec == 0 && self.structured == 0 {
            RouteLabel::StructuredData
        } else if self.press >= self.sec && self.press >= self.structured {
            RouteLabel::PressReleases
        } else if self.sec >= self.structured {
            RouteLabel::SecReports
        } else {
            RouteLabel::StructuredData
        }
    }
}

/// Scores a question against three keyword lists.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    press: Vec<String>,
    sec: Vec<String>,
    structured: Vec<String>,
}

impl KeywordClassifier {
    pub fn new(settings: &RoutingSettings) -> Self {
        let lower = |words: &[String]| -> Vec<String> {
            words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        };

        Self {
            press: lower(&settings.press_keywords),
            sec: lower(&settings.sec_keywords),
            structured: lower(&settings.structured_keywords),
        }
    }

    /// Count keywords occurring anywhere in the question (substring match).
    pub fn scores(&self, question: &str) -> ClassifierScores {
        let question = question.to_lowercase();
        let hits = |words: &[String]| words.iter().filter(|w| question.contains(w.as_str())).count();

        ClassifierScores {
            press: hits(&self.press),
            sec: hits(&self.sec),
            structured: hits(&self.structured),
        }
    }

    pub fn classify(&self, question: &str) -> RouteLabel {
        self.scores(question).route()
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(&RoutingSettings::default())
    }
}
