//! Mood labels derived from cumulative sentiment polarity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Below this polarity the conversation reads as sad.
pub const SAD_CEILING: f32 = 0.1;
/// Up to and including this polarity the conversation reads as neutral.
pub const NEUTRAL_CEILING: f32 = 0.5;

/// Coarse sentiment label for a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Sad,
    Neutral,
    Happy,
}

impl Mood {
    /// Maps a polarity in [-1, 1] to a mood.
    ///
    /// `p < 0.1` is sad, `0.1 <= p <= 0.5` is neutral, anything above is happy.
    /// Exactly 0.5 stays neutral. NaN is treated as sad.
    pub fn from_polarity(polarity: f32) -> Self {
        if polarity.is_nan() || polarity < SAD_CEILING {
            Mood::Sad
        } else if polarity <= NEUTRAL_CEILING {
            Mood::Neutral
        } else {
            Mood::Happy
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mood::Sad => "sad",
            Mood::Neutral => "neutral",
            Mood::Happy => "happy",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
