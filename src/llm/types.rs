//! Wire types for the Gemini generateContent endpoint.
//!
//! Request-side only - responses are walked as `serde_json::Value` in
//! parse.rs because the interesting paths are deep and mostly optional.

use serde::{Deserialize, Serialize};

/// Generation parameters sent with every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

impl GenerationConfig {
    /// Config for a single plain-text generation.
    pub fn single() -> Self {
        Self {
            temperature: 0.8,
            top_k: 40,
            top_p: 0.9,
            max_output_tokens: 150,
        }
    }

    /// Config for the batched JSON-contract call - bigger token budget
    /// because the answer holds up to five suggestions.
    pub fn batched() -> Self {
        Self {
            max_output_tokens: 500,
            ..Self::single()
        }
    }
}

/// One content-safety policy entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

/// The fixed safety policy: block medium-and-above across all four
/// harm categories.
pub fn default_safety_settings() -> Vec<SafetySetting> {
    const CATEGORIES: [&str; 4] = [
        "HARM_CATEGORY_HARASSMENT",
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
    ];
    CATEGORIES
        .iter()
        .map(|c| SafetySetting {
            category: (*c).to_string(),
            threshold: "BLOCK_MEDIUM_AND_ABOVE".to_string(),
        })
        .collect()
}
