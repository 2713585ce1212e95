//! Recommendation engine
//!
//! Turns a snapshot into advice. Two strategies exist: fixed threshold rules
//! and delegation to a hosted text-generation model. The strategy is chosen
//! once, when the session controller is built.

use crate::config::{Config, EngineKind};
use crate::prompts;
use devopt_common::llm_client::{GeminiClient, LlmClient, LlmError};
use devopt_common::{Recommendation, Snapshot};
use tracing::{info, warn};

pub const HIGH_CPU_ADVICE: &str =
    "High CPU usage detected. Consider closing unnecessary applications or upgrading your CPU.";
pub const HIGH_MEMORY_ADVICE: &str =
    "High memory usage detected. Consider closing unused programs or adding more RAM.";
pub const DISK_FULL_ADVICE: &str =
    "Disk usage is above 90%. Consider cleaning up unnecessary files or expanding storage.";
pub const MISSING_SETTINGS_ADVICE: &str =
    "No editor settings found. Configure your editor to improve readability and productivity.";
pub const SMALL_FONT_ADVICE: &str =
    "Increase 'editor.fontSize' to at least 14 for better readability.";
pub const WHITESPACE_ADVICE: &str =
    "Set 'editor.renderWhitespace' to 'all' to spot stray whitespace.";

/// Placeholder when the service answers without candidates
pub const NO_CANDIDATES_MESSAGE: &str = "No candidates returned from the AI service.";
/// Placeholder when the first candidate carries no text, or only whitespace
pub const NO_TEXT_MESSAGE: &str = "No readable response generated from the AI service.";

/// Produces advice for a snapshot
pub trait RecommendationEngine: Send + Sync {
    fn produce(&self, snapshot: &Snapshot) -> Recommendation;

    /// Short name for logs and the dashboard
    fn name(&self) -> &'static str;
}

/// Threshold rules evaluated in a fixed order
#[derive(Debug, Clone, Default)]
pub struct RuleBasedEngine;

impl RecommendationEngine for RuleBasedEngine {
    fn produce(&self, snapshot: &Snapshot) -> Recommendation {
        let advice = generate_advice(snapshot);
        info!("Rule engine produced {} advisories", advice.len());
        Recommendation::Advisories(advice)
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}

/// Evaluate every rule against the snapshot, in table order
pub fn generate_advice(snapshot: &Snapshot) -> Vec<String> {
    let mut advice = Vec::new();

    advice.extend(check_cpu(snapshot));
    advice.extend(check_memory(snapshot));
    advice.extend(check_disk(snapshot));
    advice.extend(check_editor_settings(snapshot));

    advice
}

/// Rule 1: sustained CPU load
fn check_cpu(snapshot: &Snapshot) -> Option<String> {
    (snapshot.cpu_percent > 80.0).then(|| HIGH_CPU_ADVICE.to_string())
}

/// Rule 2: memory pressure
fn check_memory(snapshot: &Snapshot) -> Option<String> {
    (snapshot.memory.percent > 80.0).then(|| HIGH_MEMORY_ADVICE.to_string())
}

/// Rule 3: root filesystem nearly full
fn check_disk(snapshot: &Snapshot) -> Option<String> {
    (snapshot.disk.percent > 90.0).then(|| DISK_FULL_ADVICE.to_string())
}

/// Rule 4: editor readability
fn check_editor_settings(snapshot: &Snapshot) -> Vec<String> {
    let settings = &snapshot.ide_settings;
    if settings.is_empty() {
        return vec![MISSING_SETTINGS_ADVICE.to_string()];
    }

    let mut result = Vec::new();

    let font_size = settings
        .get("editor.fontSize")
        .and_then(|v| v.as_f64())
        .unwrap_or(12.0);
    if font_size < 14.0 {
        result.push(SMALL_FONT_ADVICE.to_string());
    }

    if settings.get("editor.renderWhitespace").and_then(|v| v.as_str()) != Some("all") {
        result.push(WHITESPACE_ADVICE.to_string());
    }

    result
}

/// Delegates advice to a text-generation client
pub struct AiEngine {
    client: Box<dyn LlmClient>,
}

impl AiEngine {
    pub fn new(client: Box<dyn LlmClient>) -> Self {
        Self { client }
    }
}

impl RecommendationEngine for AiEngine {
    fn produce(&self, snapshot: &Snapshot) -> Recommendation {
        let prompt = prompts::optimization_prompt(snapshot);
        info!("Requesting recommendations ({} byte prompt)", prompt.len());

        let text = match self.client.generate(&prompt) {
            Ok(candidates) => match candidates.first() {
                None => {
                    warn!("Model returned no candidates");
                    NO_CANDIDATES_MESSAGE.to_string()
                }
                Some(candidate) if candidate.parts.iter().all(|p| p.trim().is_empty()) => {
                    warn!("First candidate has no text");
                    NO_TEXT_MESSAGE.to_string()
                }
                Some(candidate) => candidate.parts.join(" "),
            },
            Err(e) => {
                warn!("Error generating response: {}", e);
                format!("Error generating response: {}", e)
            }
        };

        Recommendation::Prose(text)
    }

    fn name(&self) -> &'static str {
        "ai"
    }
}

/// Build the configured engine; the AI engine needs an API key
pub fn build_engine(config: &Config) -> Result<Box<dyn RecommendationEngine>, LlmError> {
    match config.engine {
        EngineKind::Rules => Ok(Box::new(RuleBasedEngine)),
        EngineKind::Ai => {
            let llm = config.llm.clone().with_api_key_from_env();
            let client = GeminiClient::new(llm)?;
            Ok(Box::new(AiEngine::new(Box::new(client))))
        }
    }
}
