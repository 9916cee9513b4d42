//! Named commands relayed from the extension (browser `commands` API)

use std::fmt;
use std::str::FromStr;

use crate::tagger::error::TaggerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleFullscreen,
    IncreaseSpeed,
    DecreaseSpeed,
    SubmitTags,
}

impl Command {
    pub const ALL: [Command; 4] = [
        Command::ToggleFullscreen,
        Command::IncreaseSpeed,
        Command::DecreaseSpeed,
        Command::SubmitTags,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Command::ToggleFullscreen => "toggle-fullscreen",
            Command::IncreaseSpeed => "increase-speed",
            Command::DecreaseSpeed => "decrease-speed",
            Command::SubmitTags => "submit-tags",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = TaggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|c| c.name() == s.trim())
            .ok_or_else(|| TaggerError::Config(format!("unknown command '{}'", s)))
    }
}
