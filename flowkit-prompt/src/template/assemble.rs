//! Folding rendered segments into messages.

use flowkit_core::{Message, Part, PartKind, Role};
use flowkit_models::PENDING_KEY;

use super::Segment;

/// Metadata `purpose` value on messages inserted by `{{history}}`.
pub const HISTORY_PURPOSE: &str = "history";

/// The result of [`assemble_messages`].
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    /// The assembled messages.
    pub messages: Vec<Message>,
    /// Whether a `{{history}}` marker placed the history.
    pub used_history: bool,
}

/// Turn segments into messages.
///
/// Text before the first role marker belongs to a message with
/// `default_role`. The first `{{history}}` splices `history` in (tagged
/// `purpose: "history"`) and switches the following text to the model
/// role. Whitespace-only text parts are dropped, leading and trailing
/// whitespace of each message is trimmed, and messages left without parts
/// are omitted.
pub fn assemble_messages(segments: Vec<Segment>, default_role: Role, history: &[Message]) -> Assembled {
    let mut messages = Vec::new();
    let mut used_history = false;
    let mut role = default_role;
    let mut parts: Vec<Part> = Vec::new();

    for segment in segments {
        match segment {
            Segment::Text(text) => parts.push(Part::text(text)),
            Segment::Media { url, content_type } => parts.push(Part::media(url, content_type)),
            Segment::Section(name) => parts.push(
                Part::text("")
                    .with_metadata("purpose", name)
                    .with_metadata(PENDING_KEY, true),
            ),
            Segment::Role(next) => {
                flush(&mut messages, role, &mut parts);
                role = next;
            }
            Segment::History => {
                flush(&mut messages, role, &mut parts);
                if !used_history {
                    messages.extend(
                        history
                            .iter()
                            .map(|m| m.with_metadata("purpose", HISTORY_PURPOSE)),
                    );
                }
                used_history = true;
                role = Role::Model;
            }
        }
    }
    flush(&mut messages, role, &mut parts);

    Assembled {
        messages,
        used_history,
    }
}

fn is_plain_text(part: &Part) -> bool {
    part.metadata.is_none() && part.is_text()
}

fn flush(messages: &mut Vec<Message>, role: Role, parts: &mut Vec<Part>) {
    let mut parts = std::mem::take(parts);
    parts.retain(|p| !is_plain_text(p) || p.as_text().is_some_and(|t| !t.trim().is_empty()));

    if let Some(first) = parts.first_mut().filter(|p| is_plain_text(p)) {
        if let PartKind::Text { text, .. } = &mut first.kind {
            *text = text.trim_start().to_string();
        }
    }
    if let Some(last) = parts.last_mut().filter(|p| is_plain_text(p)) {
        if let PartKind::Text { text, .. } = &mut last.kind {
            *text = text.trim_end().to_string();
        }
    }

    if !parts.is_empty() {
        messages.push(Message::new(role, parts));
    }
}
