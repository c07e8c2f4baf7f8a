// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Topic and sentiment tags derived when a session ends.

use handoff_core::{ConversationContext, MessageRole};

const TOPIC_TAGS: &[(&str, &[&str])] = &[
    ("product-inquiry", &["product", "feature", "functionality"]),
    ("technical-support", &["error", "bug", "issue", "problem"]),
    ("sales-inquiry", &["price", "cost", "buy", "purchase"]),
];

const POSITIVE_WORDS: &[&str] = &["thank", "great", "excellent", "helpful"];
const NEGATIVE_WORDS: &[&str] = &["frustrated", "angry", "terrible", "worst"];

/// Tags for a finished conversation, in a stable order.
///
/// Only customer messages are scanned. Positive sentiment wins over
/// negative when both appear.
pub fn derive_tags(context: &ConversationContext, escalated: bool) -> Vec<String> {
    let text = context
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::Inbound)
        .map(|m| m.content.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let mut tags: Vec<String> = TOPIC_TAGS
        .iter()
        .filter(|(_, words)| words.iter().any(|w| text.contains(w)))
        .map(|(tag, _)| (*tag).to_string())
        .collect();

    if POSITIVE_WORDS.iter().any(|w| text.contains(w)) {
        tags.push("positive-experience".into());
    } else if NEGATIVE_WORDS.iter().any(|w| text.contains(w)) {
        tags.push("negative-experience".into());
    }

    if escalated {
        tags.push("escalated".into());
    }
    tags
}
