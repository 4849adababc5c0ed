use crate::core::message::{Message, Role};

/// Keep at most `limit` of the most recent messages. If that leaves an
/// assistant reply at the front, it goes too so the replay opens on a
/// user or system message.
pub fn apply_history_limit(mut messages: Vec<Message>, limit: Option<usize>) -> Vec<Message> {
    let Some(limit) = limit else {
        return messages;
    };
    if messages.len() <= limit {
        return messages;
    }

    let mut start = messages.len() - limit;
    if messages.get(start).is_some_and(|m| m.role == Role::Assistant) {
        start += 1;
    }
    messages.drain(..start);
    messages
}

/// Prefix the conversation with the gateway's fixed instruction.
pub fn with_system_directive(directive: &str, messages: Vec<Message>) -> Vec<Message> {
    let mut forwarded = Vec::with_capacity(messages.len() + 1);
    forwarded.push(Message::system(directive));
    forwarded.extend(messages);
    forwarded
}
