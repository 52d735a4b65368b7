//! Preflight Check System
//!
//! Verifies, before the first session opens, which collaborators the current configuration
//! can actually reach. Missing credentials never stop startup: the affected collaborator
//! fails at call time and the turn reports it to the user.

use crate::config::AppConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};
use validator::Validate;

// --- Constants ---
const OLLAMA_HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

/// Result of a single check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }
}

/// Complete preflight check report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightReport {
    pub all_passed: bool,
    pub checks: Vec<CheckResult>,
    /// False when answers cannot be produced at all.
    pub ready_to_start: bool,
    pub summary: String,
}

impl PreflightReport {
    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// Runs every check, including the network probe of the embedding server.
pub async fn run_preflight_checks(config: &AppConfig) -> PreflightReport {
    info!("Running preflight checks");

    let mut checks = static_checks(config);
    checks.push(check_embedding_server(&config.retrieval.ollama_url).await);

    build_report(checks)
}

/// Configuration-only checks; performs no I/O.
pub fn quick_preflight_check(config: &AppConfig) -> PreflightReport {
    build_report(static_checks(config))
}

fn static_checks(config: &AppConfig) -> Vec<CheckResult> {
    vec![
        check_config_valid(config),
        check_llm(config),
        check_vector_store(config),
        check_speech(config),
        check_geolocation(config),
        check_story_search(config),
        check_mail(config),
    ]
}

fn build_report(checks: Vec<CheckResult>) -> PreflightReport {
    let all_passed = checks.iter().all(|c| c.passed);
    let critical_passed = checks
        .iter()
        .filter(|c| is_critical_check(&c.name))
        .all(|c| c.passed);

    let summary = if all_passed {
        "All checks passed. System ready.".to_string()
    } else if critical_passed {
        "Some collaborators are not configured. Affected features will report errors.".to_string()
    } else {
        "Critical checks failed. Answers cannot be produced.".to_string()
    };

    for check in &checks {
        if check.passed {
            info!("  {}: {}", check.name, check.message);
        } else {
            warn!("  {}: {}", check.name, check.message);
            if let Some(details) = &check.details {
                warn!("      Details: {}", details);
            }
        }
    }
    info!("Summary: {}", summary);

    PreflightReport {
        all_passed,
        checks,
        ready_to_start: critical_passed,
        summary,
    }
}

fn is_critical_check(name: &str) -> bool {
    matches!(name, "config" | "llm")
}

// --- Individual Checks ---

fn check_config_valid(config: &AppConfig) -> CheckResult {
    match config.validate() {
        Ok(()) => CheckResult::pass("config", "Configuration is valid"),
        Err(e) => CheckResult::fail("config", "Configuration is invalid", Some(e.to_string())),
    }
}

fn missing(vars: &[(&str, bool)]) -> Option<String> {
    let names: Vec<&str> = vars
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(format!("Missing: {}", names.join(", ")))
    }
}

fn check_llm(config: &AppConfig) -> CheckResult {
    match missing(&[("GROQ_API_KEY", config.llm.api_key.is_some())]) {
        None => CheckResult::pass("llm", &format!("Using model {}", config.llm.model)),
        Some(details) => CheckResult::fail("llm", "Chat completions unavailable", Some(details)),
    }
}

fn check_vector_store(config: &AppConfig) -> CheckResult {
    let retrieval = &config.retrieval;
    match missing(&[
        ("PINECONE_API_KEY", retrieval.pinecone_api_key.is_some()),
        ("PINECONE_INDEX_HOST", retrieval.pinecone_index_host.is_some()),
    ]) {
        None => CheckResult::pass(
            "vector_store",
            &format!("Retrieving top {} passages", retrieval.top_k),
        ),
        Some(details) => {
            CheckResult::fail("vector_store", "Knowledge retrieval unavailable", Some(details))
        }
    }
}

fn check_speech(config: &AppConfig) -> CheckResult {
    let speech = &config.speech;
    if let Some(details) = missing(&[
        ("AZURE_SPEECH_KEY", speech.azure_key.is_some()),
        (
            "AZURE_SPEECH_REGION or AZURE_SPEECH_ENDPOINT",
            speech.endpoint().is_some(),
        ),
    ]) {
        return CheckResult::fail("speech", "Voice messages unavailable", Some(details));
    }

    let source = match &speech.input_wav {
        Some(path) => format!("WAV file {}", path),
        None if cfg!(feature = "microphone") => "default microphone".to_string(),
        None => {
            return CheckResult::fail(
                "speech",
                "No audio source",
                Some("Set VOICE_INPUT_WAV or build with the microphone feature".to_string()),
            )
        }
    };
    CheckResult::pass("speech", &format!("Recording from {}", source))
}

fn check_geolocation(config: &AppConfig) -> CheckResult {
    match missing(&[("GEOLOCATION_API_KEY", config.geolocation.api_key.is_some())]) {
        None => CheckResult::pass("geolocation", "Location lookup configured"),
        Some(details) => CheckResult::fail(
            "geolocation",
            "Escalations will be sent without location",
            Some(details),
        ),
    }
}

fn check_story_search(config: &AppConfig) -> CheckResult {
    match missing(&[("GOOGLE_API", config.search.api_key.is_some())]) {
        None => CheckResult::pass("stories", "Story search configured"),
        Some(details) => CheckResult::fail(
            "stories",
            "Stories will fall back to an apology",
            Some(details),
        ),
    }
}

fn check_mail(config: &AppConfig) -> CheckResult {
    let mail = &config.mail;
    match missing(&[
        ("SMTP_USERNAME", mail.username.is_some()),
        ("SMTP_PASSWORD", mail.password.is_some()),
    ]) {
        None => CheckResult::pass(
            "mail",
            &format!(
                "Escalations go to {} via {}:{}",
                config.escalation.recipient, mail.server, mail.port
            ),
        ),
        Some(details) => CheckResult::fail("mail", "Escalation emails will fail", Some(details)),
    }
}

async fn check_embedding_server(ollama_url: &str) -> CheckResult {
    let url = format!("{}/api/tags", ollama_url.trim_end_matches('/'));
    let client = match reqwest::Client::builder()
        .timeout(OLLAMA_HEALTH_TIMEOUT)
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            return CheckResult::fail(
                "embedding_server",
                "Failed to create HTTP client",
                Some(e.to_string()),
            )
        }
    };

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            CheckResult::pass("embedding_server", &format!("Reachable at {}", ollama_url))
        }
        Ok(resp) => CheckResult::fail(
            "embedding_server",
            "Embedding server returned an error",
            Some(format!("Status: {}", resp.status())),
        ),
        Err(e) => CheckResult::fail(
            "embedding_server",
            "Embedding server not reachable",
            Some(e.to_string()),
        ),
    }
}
