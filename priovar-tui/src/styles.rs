use priovar_portal::Tone;
use ratatui::style::{Color, Modifier, Style};

pub fn title() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

pub fn header() -> Style {
    Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

pub fn selected() -> Style {
    Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD)
}

pub fn value() -> Style {
    Style::default().fg(Color::White)
}

pub fn dim() -> Style {
    Style::default().fg(Color::DarkGray)
}

pub fn system() -> Style {
    Style::default().fg(Color::Gray)
}

pub fn success() -> Style {
    Style::default().fg(Color::LightGreen)
}

pub fn navigation() -> Style {
    Style::default()
        .fg(Color::LightBlue)
        .add_modifier(Modifier::BOLD)
}

pub fn error() -> Style {
    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
}

pub fn control(enabled: bool) -> Style {
    if enabled {
        Style::default()
            .fg(Color::LightGreen)
            .add_modifier(Modifier::BOLD)
    } else {
        dim()
    }
}

pub fn tone(tone: Tone) -> Style {
    match tone {
        Tone::Error => Style::default().fg(Color::Red),
        Tone::Secondary => Style::default().fg(Color::Magenta),
        Tone::Warning => Style::default().fg(Color::Yellow),
        Tone::Success => Style::default().fg(Color::Green),
        Tone::Neutral => dim(),
    }
}
