//! Interactive chat session.
//!
//! Owns the terminal, feeds key events into [`ChatScreen`], and applies
//! stream events from the gateway client between frames.

use std::{
    error::Error,
    io,
    time::{Duration, Instant},
};

use ratatui::crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent,
        KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::core::chat_stream::{GatewayClient, StreamMessage};
use crate::core::conversation::{Conversation, TurnRequest};
use crate::ui::renderer::ui;
use crate::ui::theme::Theme;

const PAGE_SCROLL: u16 = 10;

type ChatTerminal = Terminal<CrosstermBackend<io::Stdout>>;

/// What the event loop should do after a key press.
#[derive(Debug)]
pub enum KeyOutcome {
    Continue,
    Submit(TurnRequest),
    Quit,
}

/// Everything the renderer needs for one frame.
pub struct ChatScreen {
    pub conversation: Conversation,
    pub theme: Theme,
    pub gateway_url: String,
    pub scroll_offset: u16,
    // Updated by the renderer each frame.
    pub max_scroll: u16,
    pub auto_scroll: bool,
    pub pulse_start: Instant,
}

impl ChatScreen {
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            conversation: Conversation::new(),
            theme: Theme::dark_default(),
            gateway_url: gateway_url.into(),
            scroll_offset: 0,
            max_scroll: 0,
            auto_scroll: true,
            pulse_start: Instant::now(),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.kind != KeyEventKind::Press {
            return KeyOutcome::Continue;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return KeyOutcome::Quit;
            }
            KeyCode::Enter if key.modifiers.is_empty() => {
                if let Some(request) = self.conversation.submit() {
                    self.auto_scroll = true;
                    return KeyOutcome::Submit(request);
                }
            }
            KeyCode::Enter
                if key
                    .modifiers
                    .intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
            {
                self.conversation.insert_newline();
            }
            KeyCode::Backspace => self.conversation.backspace(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.conversation.insert_char(c);
            }
            KeyCode::Up => self.scroll_up(1),
            KeyCode::Down => self.scroll_down(1),
            KeyCode::PageUp => self.scroll_up(PAGE_SCROLL),
            KeyCode::PageDown => self.scroll_down(PAGE_SCROLL),
            _ => {}
        }
        KeyOutcome::Continue
    }

    pub fn handle_paste(&mut self, text: &str) {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        self.conversation.insert_str(&normalized);
    }

    pub fn apply_stream_message(&mut self, message: StreamMessage, stream_id: u64) {
        self.conversation.apply(stream_id, message);
    }

    fn scroll_up(&mut self, rows: u16) {
        if self.auto_scroll {
            self.scroll_offset = self.max_scroll;
            self.auto_scroll = false;
        }
        self.scroll_offset = self.scroll_offset.saturating_sub(rows);
    }

    fn scroll_down(&mut self, rows: u16) {
        if self.auto_scroll {
            return;
        }
        self.scroll_offset = self.scroll_offset.saturating_add(rows);
        if self.scroll_offset >= self.max_scroll {
            self.scroll_offset = self.max_scroll;
            self.auto_scroll = true;
        }
    }
}

fn setup_terminal() -> Result<ChatTerminal, Box<dyn Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout)).inspect_err(|_| {
        let _ = disable_raw_mode();
    })?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut ChatTerminal) -> Result<(), Box<dyn Error>> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;
    Ok(())
}

pub async fn run_chat(gateway_url: String) -> Result<(), Box<dyn Error>> {
    let (client, mut rx) = GatewayClient::new(gateway_url.clone());
    let mut screen = ChatScreen::new(gateway_url);

    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &mut screen, &client, &mut rx).await;
    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(
    terminal: &mut ChatTerminal,
    screen: &mut ChatScreen,
    client: &GatewayClient,
    rx: &mut mpsc::UnboundedReceiver<(StreamMessage, u64)>,
) -> Result<(), Box<dyn Error>> {
    info!(url = client.url(), "chat session started");
    loop {
        terminal.draw(|f| ui(f, screen))?;

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => match screen.handle_key(key) {
                    KeyOutcome::Quit => break,
                    KeyOutcome::Submit(request) => {
                        debug!(
                            stream_id = request.stream_id,
                            messages = request.messages.len(),
                            "submitting turn"
                        );
                        client.spawn_turn(request);
                    }
                    KeyOutcome::Continue => {}
                },
                Event::Paste(text) => screen.handle_paste(&text),
                _ => {}
            }
        }

        while let Ok((message, stream_id)) = rx.try_recv() {
            screen.apply_stream_message(message, stream_id);
        }
    }
    info!("chat session ended");
    Ok(())
}
