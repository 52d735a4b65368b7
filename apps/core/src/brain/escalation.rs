//! Risk-keyword detection.
//!
//! A message escalates when any configured phrase appears as a substring of the
//! lowercased message. Phrases are checked in configuration order and the first hit wins,
//! so one turn produces at most one notification.

use crate::config::DEFAULT_ESCALATION_KEYWORDS;

#[derive(Debug, Clone)]
pub struct EscalationDetector {
    keywords: Vec<String>,
}

impl Default for EscalationDetector {
    fn default() -> Self {
        Self::new(DEFAULT_ESCALATION_KEYWORDS.iter().map(|k| k.to_string()))
    }
}

impl EscalationDetector {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    /// Returns the first configured keyword found in `text`, if any.
    pub fn detect(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.keywords
            .iter()
            .find(|keyword| lowered.contains(keyword.as_str()))
            .map(String::as_str)
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}
