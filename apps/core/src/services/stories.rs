use crate::brain::Mood;
use crate::config::SearchConfig;
use crate::error::AppError;
use crate::models::Story;
use crate::services::{ensure_success, http_client, StorySource};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument};

const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

pub const STORY_APOLOGY: &str =
    "Sorry, I couldn't fetch a story at the moment. Please try again later.";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    title: Option<String>,
    snippet: Option<String>,
    link: Option<String>,
}

pub fn story_query(mood: Mood) -> String {
    format!("real motivational stories for {} mood", mood)
}

/// Story search backed by the Google Custom Search JSON API.
pub struct WebStorySearch {
    client: reqwest::Client,
    api_key: Option<String>,
    engine_id: String,
    url: String,
}

impl WebStorySearch {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            client: http_client(SEARCH_TIMEOUT),
            api_key: config.api_key.clone(),
            engine_id: config.engine_id.clone(),
            url: config.url.clone(),
        }
    }
}

#[async_trait]
impl StorySource for WebStorySearch {
    #[instrument(skip(self))]
    async fn find_story(&self, mood: Mood) -> Result<Option<Story>, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("GOOGLE_API is not set".to_string()))?;
        let query = story_query(mood);

        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("key", api_key),
                ("cx", self.engine_id.as_str()),
                ("q", query.as_str()),
                ("num", "1"),
            ])
            .send()
            .await?;
        let results: SearchResponse = ensure_success(response, "Story search").await?.json().await?;

        // A result missing any of the three fields is treated like no result at all.
        let story = results.items.into_iter().next().and_then(|item| {
            Some(Story {
                title: item.title?,
                snippet: item.snippet?,
                link: item.link?,
            })
        });
        info!(found = story.is_some(), "Story search finished");
        Ok(story)
    }
}
