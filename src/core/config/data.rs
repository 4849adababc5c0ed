use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_MODEL: &str = "deepseek-r1-distill-llama-70b";
pub const DEFAULT_MAX_HISTORY_MESSAGES: usize = 40;
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Before providing an answer, \
think through your response and wrap your thinking process in <think> tags. \
Then provide your final answer after the closing </think> tag.";

/// Server-side settings for `thinkchat serve`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Socket address the gateway listens on
    pub bind: Option<String>,
    /// Model identifier forwarded to the provider
    pub model: Option<String>,
    /// Instruction prepended to every forwarded conversation
    pub system_prompt: Option<String>,
    /// Most recent messages kept when forwarding; 0 keeps everything
    pub max_history_messages: Option<usize>,
}

/// Settings for the `chat` and `say` clients.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Full URL of the gateway's chat route
    pub gateway_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub client: ClientSettings,
}

impl GatewaySettings {
    pub fn bind(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    /// `None` means the history is forwarded uncapped.
    pub fn history_limit(&self) -> Option<usize> {
        match self.max_history_messages.unwrap_or(DEFAULT_MAX_HISTORY_MESSAGES) {
            0 => None,
            limit => Some(limit),
        }
    }
}

impl ClientSettings {
    pub fn gateway_url(&self) -> String {
        self.gateway_url
            .clone()
            .unwrap_or_else(|| format!("http://{DEFAULT_BIND}/api/chat"))
    }
}

/// Get a user-friendly display string for a path, using `~` for the home
/// directory on Unix-like systems.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
