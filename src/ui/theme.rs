use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone)]
pub struct Theme {
    // Chat message styles
    pub user_prefix_style: Style,
    pub user_text_style: Style,
    pub assistant_text_style: Style,
    pub thinking_text_style: Style,
    pub thinking_gutter_style: Style,
    pub error_text_style: Style,

    // Markdown accents
    pub heading_style: Style,
    pub code_style: Style,
    pub link_style: Style,

    // Intro header
    pub header_title_style: Style,
    pub header_text_style: Style,
    pub header_accent_style: Style,

    // Chrome
    pub title_style: Style,
    pub streaming_indicator_style: Style,
    pub input_border_style: Style,
    pub input_title_style: Style,
    pub input_text_style: Style,
}

impl Theme {
    pub fn dark_default() -> Self {
        Theme {
            user_prefix_style: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            user_text_style: Style::default().fg(Color::Cyan),
            assistant_text_style: Style::default().fg(Color::White),
            thinking_text_style: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
            thinking_gutter_style: Style::default().fg(Color::DarkGray),
            error_text_style: Style::default().fg(Color::LightRed),

            heading_style: Style::default().add_modifier(Modifier::BOLD),
            code_style: Style::default().fg(Color::Yellow),
            link_style: Style::default()
                .fg(Color::LightBlue)
                .add_modifier(Modifier::UNDERLINED),

            header_title_style: Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
            header_text_style: Style::default().fg(Color::Gray),
            header_accent_style: Style::default().fg(Color::White),

            title_style: Style::default().fg(Color::Gray),
            streaming_indicator_style: Style::default().fg(Color::White),
            input_border_style: Style::default().fg(Color::Gray),
            input_title_style: Style::default().fg(Color::Gray),
            input_text_style: Style::default().fg(Color::White),
        }
    }
}
