//! Per-channel message rendering.
//!
//! Rendering is pure: the same `(message, channel, urgency)` always yields the
//! same text, and the text never exceeds the channel's declared maximum length
//! (counted in characters).

use super::channels::{ChannelSpec, RenderStyle};
use crate::models::Urgency;

const ELLIPSIS: &str = "...";

/// Renders a message for one channel.
#[must_use]
pub fn format(message: &str, spec: &ChannelSpec, urgency: Urgency) -> String {
    let body = normalize_whitespace(message);
    let prefix = prefix(spec.style, urgency);
    truncate(&format!("{prefix}{body}"), spec.max_len)
}

fn prefix(style: RenderStyle, urgency: Urgency) -> &'static str {
    match (style, urgency) {
        (RenderStyle::Tagged, Urgency::Standard) | (RenderStyle::Truncate, _) => "",
        (RenderStyle::Tagged, Urgency::Elevated) => "[ELEVATED] ",
        (RenderStyle::Tagged, Urgency::High) => "[HIGH] ",
        (RenderStyle::Tagged, Urgency::Critical) => "[CRITICAL] ",
        (RenderStyle::AlertPrefix(_), Urgency::Critical) => "CRITICAL ALERT: ",
        (RenderStyle::AlertPrefix(p), _) => p,
        (RenderStyle::Spoken, Urgency::Standard | Urgency::Elevated) => "",
        (RenderStyle::Spoken, Urgency::High | Urgency::Critical) => "Attention. ",
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates to `max_len` characters, ending with an ellipsis when cut.
fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    if max_len <= ELLIPSIS.len() {
        return text.chars().take(max_len).collect();
    }
    let kept: String = text.chars().take(max_len - ELLIPSIS.len()).collect();
    format!("{}{ELLIPSIS}", kept.trim_end())
}
