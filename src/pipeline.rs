//! Generation orchestration - the multi-step flow behind every user action.
//!
//! Per request: read settings → resolve template → batched JSON call →
//! (on failure) N parallel single calls → aggregate → deliver exactly one
//! terminal event through the request tracker.
//!
//! State machine per generation:
//! `Idle -> BatchAttempted -> {Success | LegacyAttempted} -> {Success | AllFailed}`.
//! The batched form is never retried inside one request; its first failure
//! goes straight to the legacy path.

use crate::correlator::{RequestId, RequestStatus, RequestTracker};
use crate::error::GenerationError;
use crate::language::{detect_language, language_name};
use crate::llm::gemini::ModelClient;
use crate::llm::parse::{parse_json_array, parse_text};
use crate::llm::prompts::{self, SUGGESTION_KEY};
use crate::llm::types::GenerationConfig;
use crate::settings::{PromptTemplate, Settings, SettingsStore};
use crate::surface::{Delivery, UiEvent, UiSurface};
use futures::future::join_all;
use std::future::Future;
use std::time::Duration;

/// Orchestration-level retry for legacy calls: 3 attempts, 1 s base
/// doubling, capped at 10 s. Independent from the model client's own
/// 429/5xx retry loop.
const LEGACY_MAX_ATTEMPTS: u32 = 3;
const LEGACY_BASE_DELAY: Duration = Duration::from_secs(1);
const LEGACY_MAX_DELAY: Duration = Duration::from_secs(10);

/// The result of one user-triggered generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    /// Suggestions in the order calls were issued (batched path: the
    /// API-reported array order). Never empty.
    pub responses: Vec<String>,
    /// Legacy calls that failed while at least one succeeded. Logged,
    /// never surfaced to the user.
    pub partial_failure_count: usize,
}

/// Which prompt drives a generation.
#[derive(Debug, Clone)]
pub enum TemplateSelection {
    /// Built-in professional-comment template with the default count.
    Default,
    /// Built-in beautifier template with the beautify default count.
    Beautify,
    /// A user template from the settings store, by id.
    Custom(String),
}

/// Resolve a selection against loaded settings.
pub fn resolve_template(
    settings: &Settings,
    selection: &TemplateSelection,
) -> Result<PromptTemplate, GenerationError> {
    match selection {
        TemplateSelection::Default => Ok(prompts::default_comment_template(
            settings.default_response_count,
        )),
        TemplateSelection::Beautify => Ok(prompts::beautify_template(
            settings.default_beautify_response_count,
        )),
        TemplateSelection::Custom(id) => settings
            .custom_prompts
            .iter()
            .find(|p| p.id == *id)
            .cloned()
            .ok_or_else(|| GenerationError::Unknown("Custom prompt not found".to_string())),
    }
}

/// Generate `template.response_count` suggestions for `source_text`.
///
/// Batched JSON path first; key errors propagate untouched; any other
/// batched failure falls back to per-item generation exactly once.
pub async fn generate_multiple(
    client: &dyn ModelClient,
    source_text: &str,
    template: &PromptTemplate,
) -> Result<GenerationOutcome, GenerationError> {
    let language = language_name(detect_language(source_text));
    let count = template.response_count.max(1) as usize;

    if count == 1 {
        let prompt = prompts::build_prompt(template, source_text, 1, language);
        let config = GenerationConfig::single();
        let text = retry_with_backoff(|| single_generation(client, &prompt, &config)).await?;
        return Ok(GenerationOutcome {
            responses: vec![text],
            partial_failure_count: 0,
        });
    }

    // Batched path: one call, JSON contract.
    let prompt = prompts::build_prompt(template, source_text, template.response_count, language);
    let batched = async {
        let response = client.generate(&prompt, &GenerationConfig::batched()).await?;
        parse_json_array(&response, SUGGESTION_KEY, count)
    }
    .await;

    match batched {
        Ok(responses) => {
            log::info!("[PIPELINE] Batched path: {} suggestions", responses.len());
            Ok(GenerationOutcome {
                responses,
                partial_failure_count: 0,
            })
        }
        Err(err) if err.is_key_error() => Err(err),
        Err(err) => {
            log::warn!(
                "[PIPELINE] Batched path failed ({}), falling back to {} separate calls",
                err,
                count
            );
            generate_legacy(client, source_text, template, count, language).await
        }
    }
}

/// Legacy fallback: N independent single-suggestion calls, fired together,
/// awaited all-settled - a partial failure never aborts the rest.
async fn generate_legacy(
    client: &dyn ModelClient,
    source_text: &str,
    template: &PromptTemplate,
    count: usize,
    language: &str,
) -> Result<GenerationOutcome, GenerationError> {
    let prompt = prompts::build_prompt(template, source_text, 1, language);
    let config = GenerationConfig::single();
    let calls = (0..count)
        .map(|_| retry_with_backoff(|| single_generation(client, &prompt, &config)));
    let results = join_all(calls).await;
    aggregate_settled(results)
}

/// One plain call plus text extraction. An empty content path is a format
/// error, not an empty suggestion.
async fn single_generation(
    client: &dyn ModelClient,
    prompt: &str,
    config: &GenerationConfig,
) -> Result<String, GenerationError> {
    let response = client.generate(prompt, config).await?;
    let text = parse_text(&response);
    if text.is_empty() {
        return Err(GenerationError::UnexpectedFormat(
            "empty candidate content".to_string(),
        ));
    }
    Ok(text)
}

/// Fold all-settled legacy results in issue order. Failure only when every
/// call failed; otherwise the failures are counted and logged.
fn aggregate_settled(
    results: Vec<Result<String, GenerationError>>,
) -> Result<GenerationOutcome, GenerationError> {
    let total = results.len();
    let mut responses = Vec::with_capacity(total);
    let mut first_error = None;

    for result in results {
        match result {
            Ok(text) => responses.push(text),
            Err(err) => {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    if responses.is_empty() {
        return Err(first_error
            .unwrap_or_else(|| GenerationError::Unknown("Failed to generate any responses".into())));
    }

    let partial_failure_count = total - responses.len();
    if partial_failure_count > 0 {
        log::warn!(
            "[PIPELINE] {} out of {} API calls failed",
            partial_failure_count,
            total
        );
    }
    Ok(GenerationOutcome {
        responses,
        partial_failure_count,
    })
}

/// Generic backoff wrapper for legacy calls. Key errors pass through
/// immediately; a server-specified retry-after overrides the computed
/// delay.
pub(crate) async fn retry_with_backoff<T, F, Fut>(mut call: F) -> Result<T, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_key_error() => return Err(err),
            Err(err) => {
                if attempt + 1 >= LEGACY_MAX_ATTEMPTS {
                    return Err(err);
                }
                let delay = match err.retry_after_secs() {
                    Some(secs) => Duration::from_secs(secs),
                    None => (LEGACY_BASE_DELAY * 2u32.pow(attempt)).min(LEGACY_MAX_DELAY),
                };
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

// ── End-to-end dispatch ──────────────────────────────────────────────

/// Convenience entry points mirroring the UI-to-core contract. Each reads
/// the settings store once and runs the full generation.
pub async fn generate_default(
    client: &dyn ModelClient,
    store: &SettingsStore,
    source_text: &str,
) -> Result<GenerationOutcome, GenerationError> {
    generate_for_selection(client, store, source_text, &TemplateSelection::Default).await
}

pub async fn generate_with_template(
    client: &dyn ModelClient,
    store: &SettingsStore,
    source_text: &str,
    template_id: &str,
) -> Result<GenerationOutcome, GenerationError> {
    generate_for_selection(
        client,
        store,
        source_text,
        &TemplateSelection::Custom(template_id.to_string()),
    )
    .await
}

pub async fn generate_beautify(
    client: &dyn ModelClient,
    store: &SettingsStore,
    source_text: &str,
) -> Result<GenerationOutcome, GenerationError> {
    generate_for_selection(client, store, source_text, &TemplateSelection::Beautify).await
}

async fn generate_for_selection(
    client: &dyn ModelClient,
    store: &SettingsStore,
    source_text: &str,
    selection: &TemplateSelection,
) -> Result<GenerationOutcome, GenerationError> {
    let settings = store.settings();
    if settings.api_key.is_empty() {
        return Err(GenerationError::ApiKeyMissing);
    }
    let template = resolve_template(&settings, selection)?;
    generate_multiple(client, source_text, &template).await
}

/// Run a full user action: issue a request id, raise the loading state,
/// generate, and deliver exactly one terminal event to the UI surface.
///
/// A single response is auto-copied to the clipboard; multiple responses
/// open the picker. Delivery failures never fail the generation - the
/// surface's platform fallback is used instead. Stale requests (no longer
/// tracked when the result lands) are dropped silently.
pub async fn dispatch_generation(
    client: &dyn ModelClient,
    store: &SettingsStore,
    tracker: &RequestTracker,
    surface: &dyn UiSurface,
    selection: TemplateSelection,
    source_text: &str,
) -> RequestId {
    let request_id = tracker.issue();
    tracker.begin(&request_id);

    let settings = store.settings();
    if settings.api_key.is_empty() {
        deliver_error(tracker, surface, &request_id, &GenerationError::ApiKeyMissing);
        return request_id;
    }

    let template = match resolve_template(&settings, &selection) {
        Ok(t) => t,
        Err(err) => {
            deliver_error(tracker, surface, &request_id, &err);
            return request_id;
        }
    };

    let count = template.response_count;
    let loading = UiEvent::ShowLoading {
        request_id: request_id.clone(),
        message: format!(
            "Generating {} response{}...",
            count,
            if count > 1 { "s" } else { "" }
        ),
    };
    if surface.deliver(&loading) == Delivery::Gone {
        log::warn!("[PIPELINE] Could not show loading notification");
    }

    match generate_multiple(client, source_text, &template).await {
        // Keyed on the configured count, not the delivered count: a
        // degraded legacy run (fewer survivors than requested) still
        // shows the picker rather than silently auto-copying.
        Ok(outcome) if template.response_count == 1 => {
            deliver_single(tracker, surface, &request_id, &outcome.responses[0], &template);
        }
        Ok(outcome) => {
            deliver_picker(tracker, surface, &request_id, outcome.responses, &template);
        }
        Err(err) => {
            log::error!("[PIPELINE] Generation failed: {}", err);
            deliver_error(tracker, surface, &request_id, &err);
        }
    }

    request_id
}

/// Auto-copy flow for a single response.
fn deliver_single(
    tracker: &RequestTracker,
    surface: &dyn UiSurface,
    request_id: &str,
    text: &str,
    template: &PromptTemplate,
) {
    let copy = UiEvent::CopyToClipboard {
        request_id: request_id.to_string(),
        text: text.to_string(),
    };
    match surface.deliver(&copy) {
        Delivery::Acknowledged => {
            if tracker.deliver_terminal(request_id, RequestStatus::Success) {
                let success = UiEvent::ShowSuccess {
                    request_id: request_id.to_string(),
                };
                if surface.deliver(&success) == Delivery::Gone {
                    surface.notify_fallback(
                        &format!("{} Generated!", template.name),
                        "The comment has been copied to your clipboard.",
                    );
                }
                tracker.finish(request_id);
            }
        }
        Delivery::Failed => {
            deliver_error(tracker, surface, request_id, &GenerationError::Clipboard);
        }
        Delivery::Gone => {
            surface.notify_fallback("Error", "Failed to copy comment to clipboard");
        }
    }
}

/// Picker flow for multiple responses.
fn deliver_picker(
    tracker: &RequestTracker,
    surface: &dyn UiSurface,
    request_id: &str,
    responses: Vec<String>,
    template: &PromptTemplate,
) {
    if !tracker.is_active(request_id) {
        log::info!("[PIPELINE] Request {} superseded, dropping picker", request_id);
        return;
    }
    let event = UiEvent::ShowMultipleResponses {
        request_id: request_id.to_string(),
        responses,
        prompt_name: template.name.clone(),
    };
    match surface.deliver(&event) {
        Delivery::Acknowledged => tracker.mark_modal_shown(request_id),
        Delivery::Failed | Delivery::Gone => {
            surface.notify_fallback("Error", "Failed to display responses");
        }
    }
}

/// Exactly one error notification, with platform fallback when the
/// channel is gone. The record stays tracked until the periodic sweep.
fn deliver_error(
    tracker: &RequestTracker,
    surface: &dyn UiSurface,
    request_id: &str,
    err: &GenerationError,
) {
    let message = err.user_message();
    if tracker.deliver_terminal(request_id, RequestStatus::Error) {
        let event = UiEvent::ShowError {
            request_id: request_id.to_string(),
            message: message.clone(),
        };
        if surface.deliver(&event) == Delivery::Gone {
            surface.notify_fallback("Error", &message);
        }
    }
}
