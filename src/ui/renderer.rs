use std::time::Duration;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::core::conversation::{AssistantTurn, Conversation, Entry, TurnStatus};
use crate::core::think::ReplyPhase;
use crate::ui::chat_loop::ChatScreen;
use crate::ui::markdown::render_markdown;
use crate::ui::theme::Theme;

const USER_PREFIX: &str = "You: ";
const THINKING_GUTTER: &str = "│ ";
const MAX_INPUT_ROWS: u16 = 6;

pub fn ui(f: &mut Frame, screen: &mut ChatScreen) {
    let input_width = f.area().width.saturating_sub(2);
    let input_rows = input_row_count(screen.conversation.input(), input_width);
    let input_height = input_rows.clamp(1, MAX_INPUT_ROWS);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(input_height + 2), // borders
        ])
        .split(f.area());

    let title = Line::from(Span::styled(
        format!("thinkchat v{} • {}", env!("CARGO_PKG_VERSION"), screen.gateway_url),
        screen.theme.title_style,
    ));

    if screen.conversation.is_empty() {
        let header = Paragraph::new(intro_lines(&screen.theme))
            .block(Block::default().title(title))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(header, chunks[0]);
    } else {
        let lines = build_display_lines(
            &screen.conversation,
            &screen.theme,
            screen.pulse_start.elapsed(),
        );

        let messages = Paragraph::new(lines).wrap(Wrap { trim: false });

        let available_height = chunks[0].height.saturating_sub(1); // title row
        let total = wrapped_height(&messages, chunks[0].width);
        let max_offset = total.saturating_sub(available_height);
        screen.max_scroll = max_offset;
        let scroll_offset = if screen.auto_scroll {
            max_offset
        } else {
            screen.scroll_offset.min(max_offset)
        };
        screen.scroll_offset = scroll_offset;

        let messages = messages
            .block(Block::default().title(title))
            .scroll((scroll_offset, 0));
        f.render_widget(messages, chunks[0]);
    }

    draw_input(f, screen, chunks[1], input_rows, input_height);
}

fn draw_input(f: &mut Frame, screen: &ChatScreen, area: Rect, rows: u16, height: u16) {
    let theme = &screen.theme;
    let mut title = vec![Span::styled(
        "Enter to send • Shift+Enter for new line • Ctrl+C to quit ",
        theme.input_title_style,
    )];
    if screen.conversation.is_streaming() {
        title.push(Span::styled(
            pulse_symbol(screen.pulse_start.elapsed()),
            theme.streaming_indicator_style,
        ));
    }

    // Keep the end of long input in view.
    let input_scroll = rows.saturating_sub(height);
    let input = Paragraph::new(input_text(screen.conversation.input()))
        .style(theme.input_text_style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.input_border_style)
                .title(Line::from(title)),
        )
        .wrap(Wrap { trim: false })
        .scroll((input_scroll, 0));
    f.render_widget(input, area);

    let inner_width = area.width.saturating_sub(2);
    let (row, col) = cursor_offset(screen.conversation.input(), inner_width);
    let visible_row = row.saturating_sub(input_scroll);
    if visible_row < height {
        let x = area.x + 1 + col.min(inner_width.saturating_sub(1));
        let y = area.y + 1 + visible_row;
        f.set_cursor_position((x, y));
    }
}

fn intro_lines(theme: &Theme) -> Vec<Line<'static>> {
    vec![
        Line::default(),
        Line::from(Span::styled("thinkchat", theme.header_title_style)),
        Line::default(),
        Line::from(Span::styled(
            "Ask anything. The model reasons out loud first;",
            theme.header_text_style,
        )),
        Line::from(Span::styled(
            "its thinking appears dimmed above the answer.",
            theme.header_text_style,
        )),
        Line::default(),
        Line::from(vec![
            Span::styled("Enter", theme.header_accent_style),
            Span::styled(" send   ", theme.header_text_style),
            Span::styled("Shift+Enter", theme.header_accent_style),
            Span::styled(" new line   ", theme.header_text_style),
            Span::styled("Ctrl+C", theme.header_accent_style),
            Span::styled(" quit", theme.header_text_style),
        ]),
    ]
}

/// Transcript lines for every entry in the conversation.
pub fn build_display_lines(
    conversation: &Conversation,
    theme: &Theme,
    elapsed: Duration,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for entry in conversation.entries() {
        match entry {
            Entry::User(content) => add_user_lines(&mut lines, content, theme),
            Entry::Assistant(turn) => add_assistant_lines(&mut lines, turn, theme, elapsed),
        }
        lines.push(Line::default());
    }
    lines.pop();
    lines
}

fn add_user_lines(lines: &mut Vec<Line<'static>>, content: &str, theme: &Theme) {
    let indent = " ".repeat(USER_PREFIX.len());
    for (i, text) in content.split('\n').enumerate() {
        let lead = if i == 0 {
            Span::styled(USER_PREFIX, theme.user_prefix_style)
        } else {
            Span::raw(indent.clone())
        };
        lines.push(Line::from(vec![
            lead,
            Span::styled(text.to_string(), theme.user_text_style),
        ]));
    }
}

fn add_assistant_lines(
    lines: &mut Vec<Line<'static>>,
    turn: &AssistantTurn,
    theme: &Theme,
    elapsed: Duration,
) {
    let in_flight = turn.status().is_in_flight();
    // A buffer that may still turn into the opening marker is never shown raw.
    let reply = if in_flight && turn.phase() == ReplyPhase::Undecided {
        Default::default()
    } else {
        turn.reply()
    };

    if !reply.thinking.is_empty() {
        for line in render_markdown(&reply.thinking, theme.thinking_text_style, theme) {
            let mut spans = vec![Span::styled(THINKING_GUTTER, theme.thinking_gutter_style)];
            spans.extend(line.spans);
            lines.push(Line::from(spans));
        }
    }

    if !reply.response.is_empty() {
        if !reply.thinking.is_empty() {
            lines.push(Line::default());
        }
        lines.extend(render_markdown(
            &reply.response,
            theme.assistant_text_style,
            theme,
        ));
    }

    match turn.status() {
        TurnStatus::Pending | TurnStatus::Streaming if reply.response.is_empty() => {
            if reply.thinking.is_empty() {
                lines.push(Line::from(Span::styled(
                    pulse_symbol(elapsed),
                    theme.streaming_indicator_style,
                )));
            }
        }
        TurnStatus::Failed(reason) => {
            lines.push(Line::from(Span::styled(
                format!("✗ {reason}"),
                theme.error_text_style,
            )));
        }
        _ => {}
    }
}

/// Pulsing indicator shown while waiting on a reply.
pub fn pulse_symbol(elapsed: Duration) -> &'static str {
    let phase = (elapsed.as_millis() as f32 / 1000.0 * 2.0) % 2.0; // 2 cycles per second
    let intensity = if phase < 1.0 { phase } else { 2.0 - phase };

    if intensity < 0.33 {
        "○"
    } else if intensity < 0.66 {
        "◐"
    } else {
        "●"
    }
}

/// Rows `paragraph` occupies at `width`, counted by ratatui's own wrapper so
/// that scroll limits agree with what is drawn.
fn wrapped_height(paragraph: &Paragraph, width: u16) -> u16 {
    u16::try_from(paragraph.line_count(width)).unwrap_or(u16::MAX)
}

// `str::lines` would drop the trailing empty line the cursor sits on.
fn input_text(input: &str) -> Text<'_> {
    Text::from(input.split('\n').map(Line::raw).collect::<Vec<_>>())
}

fn input_row_count(input: &str, width: u16) -> u16 {
    let paragraph = Paragraph::new(input_text(input)).wrap(Wrap { trim: false });
    wrapped_height(&paragraph, width).max(1)
}

/// Row and column of the cursor, which always sits at the end of the input.
fn cursor_offset(input: &str, width: u16) -> (u16, u16) {
    let last = input.rsplit('\n').next().unwrap_or("");
    let rows_before = input_row_count(input, width).saturating_sub(1);
    let last_width = last.width() as u16;
    let col = if width == 0 {
        0
    } else if last_width > 0 && last_width % width == 0 {
        width
    } else {
        last_width % width
    };
    (rows_before, col)
}
