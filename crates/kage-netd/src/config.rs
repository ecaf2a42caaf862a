//! Settings file loader.
//!
//! The settings file is a plain text file of `KEY=VALUE` (or
//! `KEY:VALUE`) lines; `#` introduces a comment. A missing or
//! malformed file is never fatal: the server starts with defaults.

use std::path::Path;

use tracing::{error, warn};

#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Discord webhook URL for presence notifications.
    pub discord_webhook: Option<String>,
}

/// Load settings from `path`. Unknown keys are ignored with a warning;
/// lines without a separator are reported and skipped.
pub fn load(path: &Path) -> Settings {
    let mut settings = Settings::default();
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(_) => {
            warn!(path = %path.display(), "config file not found");
            return settings;
        }
    };
    for line in text.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(pos) = line.find(['=', ':']) else {
            error!(line, "config file syntax error");
            continue;
        };
        let (key, value) = (&line[..pos], &line[pos + 1..]);
        match key {
            "DISCORD_WEBHOOK" => settings.discord_webhook = Some(value.to_string()),
            _ => warn!(key, "unknown config key ignored"),
        }
    }
    settings
}
