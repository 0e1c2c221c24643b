//! redraft - generation core for an AI text-rewriting assistant.
//!
//! The user selects text somewhere, picks an action (default comment,
//! beautify, or a custom prompt template), and gets back one or more
//! AI-written suggestions. This crate owns everything between the action
//! and the rendered result:
//!
//! - prompt construction with language detection ([`llm::prompts`],
//!   [`language`])
//! - the Gemini HTTP client with typed error classification and bounded
//!   retry ([`llm::gemini`], [`error`])
//! - response parsing for plain-text and batched-JSON replies
//!   ([`llm::parse`])
//! - batched-then-legacy fallback orchestration ([`pipeline`])
//! - request-id correlation so late results never hit the wrong UI context
//!   ([`correlator`])
//! - settings persistence for the API key and prompt templates
//!   ([`settings`])
//!
//! The UI itself is the embedding host's problem; it plugs in through the
//! [`surface::UiSurface`] trait and receives [`surface::UiEvent`]s.

pub mod correlator;
pub mod error;
pub mod language;
pub mod llm;
pub mod pipeline;
pub mod settings;
pub mod surface;

pub use correlator::{spawn_sweeper, RequestId, RequestStatus, RequestTracker};
pub use error::GenerationError;
pub use llm::{GeminiClient, GenerationConfig, ModelClient, RetryPolicy};
pub use pipeline::{
    dispatch_generation, generate_beautify, generate_default, generate_multiple,
    generate_with_template, GenerationOutcome, TemplateSelection,
};
pub use settings::{PromptTemplate, Settings, SettingsPatch, SettingsStore};
pub use surface::{Delivery, UiEvent, UiSurface};
