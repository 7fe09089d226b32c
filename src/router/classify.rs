/// What a single chat message asks the bot to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandClassification {
    Apply,
    Verify,
    SafeSearch(String),
    PlayMedia(String),
    /// Free text for the completion API, marker already stripped
    Fallback(String),
}

impl CommandClassification {
    /// Commands an unverified user may still run
    pub fn allowed_unverified(&self) -> bool {
        matches!(self, CommandClassification::Apply | CommandClassification::Verify)
    }

    pub fn name(&self) -> &'static str {
        match self {
            CommandClassification::Apply => "apply",
            CommandClassification::Verify => "verify",
            CommandClassification::SafeSearch(_) => "ss",
            CommandClassification::PlayMedia(_) => "play",
            CommandClassification::Fallback(_) => "fallback",
        }
    }
}

/// Whether the message starts with the command marker
pub fn has_marker(message: &str, marker: char) -> bool {
    message.trim_start().starts_with(marker)
}

/// Classify a raw chat message.
///
/// The first whitespace-separated token, lowercased, is the keyword when it
/// carries the marker. `ss` and the play keyword need an argument; without
/// one they are treated as free text like any other unknown command.
pub fn classify(message: &str, marker: char, play_command: Option<&str>) -> CommandClassification {
    let mut tokens = message.split_whitespace();
    let first = tokens.next().unwrap_or_default().to_lowercase();
    let first_arg = tokens.next();

    if let Some(keyword) = first.strip_prefix(marker) {
        match (keyword, first_arg) {
            ("apply", _) => return CommandClassification::Apply,
            ("verify", _) => return CommandClassification::Verify,
            ("ss", Some(url)) => return CommandClassification::SafeSearch(url.to_string()),
            (k, Some(asset)) if play_command == Some(k) => {
                return CommandClassification::PlayMedia(asset.to_string())
            }
            _ => {}
        }
    }

    CommandClassification::Fallback(strip_marker(message, marker))
}

fn strip_marker(message: &str, marker: char) -> String {
    let trimmed = message.trim();
    trimmed
        .strip_prefix(marker)
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}
