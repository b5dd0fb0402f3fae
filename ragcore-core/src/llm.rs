//! The LLM client boundary. Every stage that needs model calls (KG
//! extraction, community summarisation, GraphRAG's answer extraction)
//! goes through this trait, matching spec §6's prompt-contract model:
//! the pipeline owns prompts and parsing, the client owns transport.

use crate::error::CoreError;

pub trait LlmClient: Send + Sync {
    /// Generates a completion for `prompt` under `system`, optionally
    /// constrained to a named response format (e.g. `"json"`).
    fn generate(&self, system: &str, prompt: &str, format: Option<&str>) -> Result<String, CoreError>;

    /// Generates an embedding vector for `text`.
    fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError>;
}

/// A deterministic stand-in used by tests and as a CLI default when no
/// real model endpoint is configured: echoes bounded, hash-derived
/// output instead of calling out to a model.
pub struct EchoLlmClient;

impl LlmClient for EchoLlmClient {
    fn generate(&self, _system: &str, prompt: &str, format: Option<&str>) -> Result<String, CoreError> {
        let excerpt: String = prompt.chars().take(80).collect();
        if format == Some("json") {
            Ok(format!(
                "{{\"label\": \"{}\", \"description\": \"{}\"}}",
                excerpt.replace('"', "'"),
                excerpt.replace('"', "'")
            ))
        } else {
            Ok(excerpt)
        }
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError> {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(text.as_bytes());
        Ok(digest.iter().take(16).map(|b| *b as f32 / 255.0).collect())
    }
}
