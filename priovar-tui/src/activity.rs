use chrono::Local;
use ratatui::style::Style;

/// One entry of the activity log under the table.
#[derive(Clone, Debug)]
pub struct ActivityLine {
    pub at: String,
    pub text: String,
    pub style: Style,
}

impl ActivityLine {
    pub fn new(text: String, style: Style) -> Self {
        Self {
            at: Local::now().format("%H:%M:%S").to_string(),
            text,
            style,
        }
    }

    pub fn rendered(&self) -> String {
        format!("{} {}", self.at, self.text)
    }
}
