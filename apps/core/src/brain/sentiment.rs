//! Sentiment polarity backed by the VADER lexicon and rule set.
//!
//! The `compound` score is already normalized to [-1, 1]. Text without any scored word
//! comes out at 0.0.

use crate::error::AppError;
use crate::services::SentimentScorer;
use async_trait::async_trait;
use tracing::warn;
use vader_sentiment::SentimentIntensityAnalyzer;

const COMPOUND: &str = "compound";

/// Sentiment scorer using VADER's bundled lexicon.
pub struct VaderSentiment {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl Default for VaderSentiment {
    fn default() -> Self {
        Self::new()
    }
}

impl VaderSentiment {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }

    /// Computes the polarity of `text`, always within [-1, 1].
    pub fn score(&self, text: &str) -> f32 {
        let scores = self.analyzer.polarity_scores(text);
        match scores.get(COMPOUND) {
            Some(compound) => (*compound as f32).clamp(-1.0, 1.0),
            None => {
                warn!("Sentiment analyzer returned no compound score");
                0.0
            }
        }
    }
}

#[async_trait]
impl SentimentScorer for VaderSentiment {
    async fn polarity(&self, text: &str) -> Result<f32, AppError> {
        Ok(self.score(text))
    }
}
