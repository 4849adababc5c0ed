//! TUI-less "say" command

use std::error::Error;
use std::io::{self, Write};

use crate::core::chat_stream::GatewayClient;
use crate::core::conversation::{Conversation, TurnStatus};
use crate::core::think::{CLOSE_MARKER, OPEN_MARKER};

pub async fn run_say(prompt: Vec<String>, gateway_url: String) -> Result<(), Box<dyn Error>> {
    let mut conversation = Conversation::new();
    conversation.set_input(prompt.join(" "));
    let Some(request) = conversation.submit() else {
        return Err("Usage: thinkchat say <prompt>".into());
    };

    let (client, mut rx) = GatewayClient::new(gateway_url);
    client.spawn_turn(request);

    // Reasoning goes to stderr as it arrives; the answer is printed once the
    // reply is complete so that it can be piped on its own.
    let mut stderr = io::stderr();
    let mut thinking_shown = 0usize;
    while let Some((message, stream_id)) = rx.recv().await {
        conversation.apply(stream_id, message);
        let Some(turn) = conversation.latest_turn() else {
            break;
        };

        if let Some(thinking) = visible_thinking(turn.text()) {
            if thinking.len() > thinking_shown {
                write!(stderr, "{}", &thinking[thinking_shown..])?;
                stderr.flush()?;
                thinking_shown = thinking.len();
            }
        }

        if !turn.status().is_in_flight() {
            break;
        }
    }

    if thinking_shown > 0 {
        writeln!(stderr)?;
        writeln!(stderr)?;
    }

    match conversation.latest_turn().map(|turn| (turn.status(), turn.reply())) {
        Some((TurnStatus::Complete, reply)) => {
            println!("{}", reply.response);
            Ok(())
        }
        Some((TurnStatus::Failed(reason), _)) => Err(reason.clone().into()),
        _ => Err("the gateway closed the stream before replying".into()),
    }
}

/// Reasoning text that is safe to print so far: everything after the opening
/// marker, minus any tail that could still grow into the closing marker.
fn visible_thinking(text: &str) -> Option<&str> {
    let rest = text.strip_prefix(OPEN_MARKER)?;
    if let Some(close) = rest.find(CLOSE_MARKER) {
        return Some(&rest[..close]);
    }
    let held = (1..CLOSE_MARKER.len())
        .rev()
        .find(|&k| rest.ends_with(&CLOSE_MARKER[..k]))
        .unwrap_or(0);
    Some(&rest[..rest.len() - held])
}
