//! Model integration: prompt building, the Gemini client, and response
//! parsing for both the plain and JSON-contract shapes.

pub mod gemini;
pub mod parse;
pub mod prompts;
pub mod types;

pub use gemini::{GeminiClient, ModelClient, RetryPolicy, GEMINI_ENDPOINT, GEMINI_MODEL};
pub use prompts::{build_prompt, SUGGESTION_KEY};
pub use types::GenerationConfig;
