//! Environment-driven configuration.
//!
//! Every collaborator is configured from environment variables (optionally seeded from a
//! `.env` file by `main`). Credentials are optional at load time; `preflight` reports the
//! missing ones and the affected collaborator fails when it is first used.

use crate::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

pub const DEFAULT_ESCALATION_KEYWORDS: &[&str] = &[
    "suicide",
    "self-harm",
    "end my life",
    "suicidal thoughts",
    "kill myself",
];

/// Chat-completion endpoint settings.
#[derive(Debug, Clone, Validate)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    #[validate(length(min = 1))]
    pub base_url: String,
    #[validate(length(min = 1))]
    pub model: String,
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama3-8b-8192".to_string(),
            temperature: 0.5,
        }
    }
}

/// Embedding model and vector index settings.
#[derive(Debug, Clone, Validate)]
pub struct RetrievalConfig {
    #[validate(length(min = 1))]
    pub ollama_url: String,
    #[validate(length(min = 1))]
    pub embedding_model: String,
    pub pinecone_api_key: Option<String>,
    pub pinecone_index_host: Option<String>,
    #[validate(range(min = 1, max = 50))]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            embedding_model: "mxbai-embed-large".to_string(),
            pinecone_api_key: None,
            pinecone_index_host: None,
            top_k: 4,
        }
    }
}

/// Voice capture and transcription settings.
#[derive(Debug, Clone, Validate)]
pub struct SpeechConfig {
    pub azure_key: Option<String>,
    pub azure_region: Option<String>,
    /// Overrides the endpoint derived from the region.
    pub azure_endpoint: Option<String>,
    #[validate(length(min = 2))]
    pub language: String,
    #[validate(length(min = 1))]
    pub trigger_phrase: String,
    #[validate(range(min = 1, max = 60))]
    pub record_secs: u64,
    /// Pre-recorded clip used instead of a microphone.
    pub input_wav: Option<String>,
}

impl SpeechConfig {
    pub fn record_duration(&self) -> Duration {
        Duration::from_secs(self.record_secs)
    }

    /// Resolves the short-audio recognition endpoint.
    pub fn endpoint(&self) -> Option<String> {
        if let Some(endpoint) = &self.azure_endpoint {
            return Some(endpoint.clone());
        }
        self.azure_region.as_ref().map(|region| {
            format!(
                "https://{}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1",
                region
            )
        })
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            azure_key: None,
            azure_region: None,
            azure_endpoint: None,
            language: "en-US".to_string(),
            trigger_phrase: "record voice".to_string(),
            record_secs: 5,
            input_wav: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeolocationConfig {
    pub api_key: Option<String>,
    pub ip_lookup_url: String,
    pub lookup_url: String,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            ip_lookup_url: "https://api.ipify.org".to_string(),
            lookup_url: "https://apiip.net/api/check".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub engine_id: String,
    pub url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            engine_id: "2532473ff45e94bfe".to_string(),
            url: "https://www.googleapis.com/customsearch/v1".to_string(),
        }
    }
}

/// Outbound mail relay settings.
#[derive(Debug, Clone, Validate)]
pub struct MailConfig {
    #[validate(length(min = 1))]
    pub server: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[validate(email)]
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            server: "smtp.gmail.com".to_string(),
            port: 587,
            username: None,
            password: None,
            from: "therapybot@example.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Validate)]
pub struct EscalationConfig {
    #[validate(email)]
    pub recipient: String,
    #[validate(length(min = 1))]
    pub keywords: Vec<String>,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            recipient: "escalations@example.com".to_string(),
            keywords: DEFAULT_ESCALATION_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub llm: LlmConfig,
    #[validate(nested)]
    pub retrieval: RetrievalConfig,
    #[validate(nested)]
    pub speech: SpeechConfig,
    pub geolocation: GeolocationConfig,
    pub search: SearchConfig,
    #[validate(nested)]
    pub mail: MailConfig,
    #[validate(nested)]
    pub escalation: EscalationConfig,
}

impl AppConfig {
    /// Reads the configuration from the process environment and validates it.
    pub fn from_env() -> Result<Self, AppError> {
        let llm_defaults = LlmConfig::default();
        let retrieval_defaults = RetrievalConfig::default();
        let speech_defaults = SpeechConfig::default();
        let geo_defaults = GeolocationConfig::default();
        let search_defaults = SearchConfig::default();
        let mail_defaults = MailConfig::default();
        let escalation_defaults = EscalationConfig::default();

        let config = Self {
            llm: LlmConfig {
                api_key: env_opt("GROQ_API_KEY"),
                base_url: env_or("GROQ_BASE_URL", llm_defaults.base_url),
                model: env_or("GROQ_MODEL", llm_defaults.model),
                temperature: env_parse("LLM_TEMPERATURE", llm_defaults.temperature)?,
            },
            retrieval: RetrievalConfig {
                ollama_url: env_or("OLLAMA_URL", retrieval_defaults.ollama_url),
                embedding_model: env_or("EMBEDDING_MODEL", retrieval_defaults.embedding_model),
                pinecone_api_key: env_opt("PINECONE_API_KEY"),
                pinecone_index_host: env_opt("PINECONE_INDEX_HOST"),
                top_k: env_parse("RETRIEVAL_TOP_K", retrieval_defaults.top_k)?,
            },
            speech: SpeechConfig {
                azure_key: env_opt("AZURE_SPEECH_KEY"),
                azure_region: env_opt("AZURE_SPEECH_REGION"),
                azure_endpoint: env_opt("AZURE_SPEECH_ENDPOINT"),
                language: env_or("SPEECH_LANGUAGE", speech_defaults.language),
                trigger_phrase: env_or("VOICE_TRIGGER", speech_defaults.trigger_phrase),
                record_secs: env_parse("VOICE_DURATION_SECS", speech_defaults.record_secs)?,
                input_wav: env_opt("VOICE_INPUT_WAV"),
            },
            geolocation: GeolocationConfig {
                api_key: env_opt("GEOLOCATION_API_KEY"),
                ip_lookup_url: env_or("IP_LOOKUP_URL", geo_defaults.ip_lookup_url),
                lookup_url: env_or("GEOLOCATION_URL", geo_defaults.lookup_url),
            },
            search: SearchConfig {
                api_key: env_opt("GOOGLE_API"),
                engine_id: env_or("GOOGLE_SEARCH_ID", search_defaults.engine_id),
                url: env_or("GOOGLE_SEARCH_URL", search_defaults.url),
            },
            mail: MailConfig {
                server: env_or("SMTP_SERVER", mail_defaults.server),
                port: env_parse("SMTP_PORT", mail_defaults.port)?,
                username: env_opt("SMTP_USERNAME"),
                password: env_opt("SMTP_PASSWORD"),
                from: env_or("SMTP_FROM", mail_defaults.from),
            },
            escalation: EscalationConfig {
                recipient: env_or("ESCALATION_RECIPIENT", escalation_defaults.recipient),
                keywords: env_opt("ESCALATION_KEYWORDS")
                    .map(|raw| parse_keywords(&raw))
                    .unwrap_or(escalation_defaults.keywords),
            },
        };

        config.validate()?;
        Ok(config)
    }
}

/// Splits a comma-separated keyword list, normalizing to lowercase.
fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: String) -> String {
    env_opt(key).unwrap_or(default)
}

fn env_parse<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| AppError::Config(format!("{} has invalid value '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}
