//! UI surface messaging contract.
//!
//! The core never renders anything. It emits [`UiEvent`]s to whatever host
//! embeds it (content script bridge, desktop window, test double) and the
//! host reports back how delivery went. A missing channel is normal - the
//! user may have navigated away - and must never fail a generation, so the
//! dispatcher falls back to a platform-level notification instead.

use serde::{Deserialize, Serialize};

/// Messages from the core to the UI surface. Serialized with an `action`
/// tag matching the original extension's message shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum UiEvent {
    #[serde(rename_all = "camelCase")]
    ShowLoading { request_id: String, message: String },
    #[serde(rename_all = "camelCase")]
    ShowSuccess { request_id: String },
    #[serde(rename_all = "camelCase")]
    ShowError { request_id: String, message: String },
    #[serde(rename_all = "camelCase")]
    ShowMultipleResponses {
        request_id: String,
        responses: Vec<String>,
        prompt_name: String,
    },
    #[serde(rename_all = "camelCase")]
    CopyToClipboard { request_id: String, text: String },
}

/// Outcome of handing an event to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The surface handled the event.
    Acknowledged,
    /// The surface received the event but reported failure (e.g. the
    /// clipboard write was rejected).
    Failed,
    /// No surface was listening on this channel.
    Gone,
}

/// Implemented by the host embedding the core.
pub trait UiSurface: Send + Sync {
    fn deliver(&self, event: &UiEvent) -> Delivery;

    /// Platform-level notification used when in-page delivery is gone.
    fn notify_fallback(&self, title: &str, message: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_action_tag() {
        let event = UiEvent::ShowLoading {
            request_id: "1700000000000-0".into(),
            message: "Generating 3 responses...".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "showLoading");
        assert_eq!(json["requestId"], "1700000000000-0");

        let event = UiEvent::ShowMultipleResponses {
            request_id: "r".into(),
            responses: vec!["a".into(), "b".into()],
            prompt_name: "Congratulate".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "showMultipleResponses");
        assert_eq!(json["promptName"], "Congratulate");
        assert_eq!(json["responses"][1], "b");
    }

    #[test]
    fn events_round_trip() {
        let event = UiEvent::CopyToClipboard {
            request_id: "r".into(),
            text: "done".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: UiEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
