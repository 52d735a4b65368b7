//! # Brain Module
//!
//! Fast, local decision logic run on every turn, before any collaborator is called.
//!
//! ## Components
//! - `escalation`: risk-keyword detection on the current message
//! - `sentiment`: VADER polarity scoring
//! - `mood`: polarity to mood label mapping

pub mod escalation;
pub mod mood;
pub mod sentiment;

pub use escalation::EscalationDetector;
pub use mood::Mood;
pub use sentiment::VaderSentiment;
