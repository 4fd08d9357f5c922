#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Refresh,               // /refresh
    Scope(Option<String>), // /scope | /scope requested|clinic
    Find(String),          // /find <patientId>
    Help,                  // /help
    Quit,                  // /quit or /exit
    Unknown(String),
}

pub fn parse_command(input: &str) -> Command {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return Command::Unknown(trimmed.to_string());
    }
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or_default();
    let rest = parts.next().map(str::trim).filter(|s| !s.is_empty());

    match (verb, rest) {
        ("/refresh" | "/r", _) => Command::Refresh,
        ("/scope", arg) => Command::Scope(arg.map(str::to_string)),
        ("/find", Some(id)) => Command::Find(id.to_string()),
        ("/help", _) => Command::Help,
        ("/quit" | "/exit", _) => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}
