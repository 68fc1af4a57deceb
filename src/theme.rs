use ratatui::style::{Color, Modifier, Style};

pub struct Theme {
    pub focus_border: Color,
    pub blurred_border: Color,
    pub text: Color,
    pub text_secondary: Color,

    // Document content
    pub link: Style,
    pub recent_item: Style,
    pub page_title: Style,
    pub selection: Style,
    pub editing: Style,
    pub collapsed: Style,

    // Hint markers
    pub hint: Style,
    pub hint_typed: Style,

    pub footer: Style,
    pub mode_badge: Style,
    pub message: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            focus_border: Color::Cyan,
            blurred_border: Color::DarkGray,
            text: Color::White,
            text_secondary: Color::Gray,

            link: Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
            recent_item: Style::default().fg(Color::Cyan),
            page_title: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            selection: Style::default().bg(Color::DarkGray),
            editing: Style::default().bg(Color::Rgb(30, 30, 60)),
            collapsed: Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),

            hint: Style::default().fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD),
            hint_typed: Style::default().fg(Color::Red).bg(Color::Yellow).add_modifier(Modifier::BOLD),

            footer: Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
            mode_badge: Style::default().fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD),
            message: Style::default().fg(Color::Green),
        }
    }
}
