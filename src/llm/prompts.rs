//! Prompt construction for the generation pipeline.
//!
//! Two shapes:
//! - plain prompt - one suggestion, free text, no formatting allowed
//! - JSON-contract prompt - N suggestions as a JSON object with a single
//!   `"sugestoes"` array key, with a literal example appended to bias the
//!   model toward syntactically valid output
//!
//! The built-in templates (default comment, beautifier) also live here;
//! user templates come from the settings store.

use crate::settings::PromptTemplate;

/// The fixed array key the JSON-contract prompt mandates. The original
/// product shipped with the Portuguese word and existing responses depend
/// on it, so it stays.
pub const SUGGESTION_KEY: &str = "sugestoes";

pub const DEFAULT_TEMPLATE_ID: &str = "builtin-default";
pub const BEAUTIFY_TEMPLATE_ID: &str = "builtin-beautify";

/// Ephemeral template backing the default "generate a comment" action.
pub fn default_comment_template(response_count: u8) -> PromptTemplate {
    PromptTemplate {
        id: DEFAULT_TEMPLATE_ID.to_string(),
        name: "Default Professional Comment".to_string(),
        prompt_text: "Generate thoughtful, professional comments that add meaningful \
                      insights or perspectives to the discussion. Ask thoughtful questions \
                      when appropriate and share relevant experiences when fitting."
            .to_string(),
        response_count,
        enabled: true,
    }
}

/// Ephemeral template backing the "beautify this text" action.
pub fn beautify_template(response_count: u8) -> PromptTemplate {
    PromptTemplate {
        id: BEAUTIFY_TEMPLATE_ID.to_string(),
        name: "AI Text Beautifier".to_string(),
        prompt_text: "Improve and enhance the following text while maintaining its core \
                      message and intent. Make it more professional, clear, and engaging. \
                      Keep the same tone and style but polish the language, fix any grammar \
                      issues, and enhance readability. Do not change the fundamental meaning \
                      or add new information."
            .to_string(),
        response_count,
        enabled: true,
    }
}

/// Build the prompt for a generation.
///
/// `response_count == 1` gets the plain instruction form; anything above
/// gets the JSON contract. Counts outside 1..=5 are accepted (the settings
/// store enforces the invariant upstream) but logged as unusual.
pub fn build_prompt(
    template: &PromptTemplate,
    source_text: &str,
    response_count: u8,
    language_name: &str,
) -> String {
    if !(1..=5).contains(&response_count) {
        log::warn!(
            "[PROMPT] Unusual response count: {}. Recommended: 1-5",
            response_count
        );
    }
    if response_count <= 1 {
        plain_prompt(template, source_text, language_name)
    } else {
        json_prompt(template, source_text, response_count, language_name)
    }
}

fn plain_prompt(template: &PromptTemplate, source_text: &str, language_name: &str) -> String {
    format!(
        "{guidance}\n\
         \n\
         Guidelines:\n\
         - The content appears to be in {language} - respond in the same language\n\
         - Keep responses concise (2-3 sentences maximum)\n\
         - Be specific, add value, and keep it authentic\n\
         \n\
         Post content: \"{text}\"\n\
         \n\
         Generate only the comment text, without any additional explanation or formatting.",
        guidance = template.prompt_text,
        language = language_name,
        text = source_text,
    )
}

fn json_prompt(
    template: &PromptTemplate,
    source_text: &str,
    response_count: u8,
    language_name: &str,
) -> String {
    format!(
        "You are a thoughtful professional. Generate {n} unique comment suggestions \
         for the following content.\n\
         \n\
         STRICT FORMATTING RULES:\n\
         - Respond ONLY with a valid JSON object\n\
         - The JSON object must have a single key called \"{key}\"\n\
         - The value of \"{key}\" must be an array of {n} strings\n\
         - Each string must be a unique, professional comment\n\
         - Do not include any explanation, markdown, or additional text\n\
         - Do not wrap in ```json blocks\n\
         \n\
         CONTENT GUIDELINES:\n\
         {guidance}\n\
         \n\
         RESPONSE GUIDELINES:\n\
         - The content appears to be in {language} - respond in the same language\n\
         - Keep responses concise (2-3 sentences maximum)\n\
         - Be specific, add value, and keep it authentic\n\
         - Make each suggestion unique and different from the others\n\
         - Maintain a professional yet personable tone\n\
         \n\
         CONTENT: \"{text}\"\n\
         \n\
         Example format for {n} responses:\n\
         {example}",
        n = response_count,
        key = SUGGESTION_KEY,
        guidance = template.prompt_text,
        language = language_name,
        text = source_text,
        example = example_json(response_count),
    )
}

/// The literal example object appended to the JSON-contract prompt.
///
/// Built through serde so it is always valid JSON with exactly
/// `response_count` placeholder strings.
pub fn example_json(response_count: u8) -> String {
    let placeholders: Vec<String> = (1..=response_count.max(1))
        .map(|i| format!("Unique comment suggestion {} here", i))
        .collect();
    let example = serde_json::json!({ SUGGESTION_KEY: placeholders });
    serde_json::to_string_pretty(&example).expect("static example object")
}
