//! Contains the seam between the tracker and the platform. How the focused window is inspected
//! is up to the [WindowSampler] implementation; [command::CommandWindowSampler] delegates it to
//! an external helper program.

pub mod command;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

/// Bundle identifiers whose process name is unhelpful (Electron apps and friends).
const BUNDLE_ID_TO_APP_NAME: &[(&str, &str)] = &[
    ("com.microsoft.VSCode", "Visual Studio Code"),
    ("com.todesktop.runtime.Cursor", "Cursor"),
    ("com.vscodium", "VSCodium"),
    ("com.tinyspeck.slackmacgap", "Slack"),
    ("com.microsoft.teams2", "Microsoft Teams"),
    ("com.hnc.Discord", "Discord"),
    ("notion.id", "Notion"),
    ("com.figma.Desktop", "Figma"),
    ("com.linear", "Linear"),
    ("com.electron.realtimeboard", "Miro"),
    ("dev.warp.Warp-Stable", "Warp"),
    ("com.googlecode.iterm2", "iTerm2"),
    ("com.spotify.client", "Spotify"),
    ("com.obsproject.obs-studio", "OBS Studio"),
    ("md.obsidian", "Obsidian"),
    ("com.1password.1password", "1Password"),
    ("com.openai.chat", "ChatGPT"),
    ("com.google.Chrome", "Google Chrome"),
    ("com.apple.Safari", "Safari"),
    ("org.mozilla.firefox", "Firefox"),
    ("company.thebrowser.Browser", "Arc"),
    ("com.microsoft.edgemac", "Microsoft Edge"),
    ("com.brave.Browser", "Brave Browser"),
];

const GENERIC_PROCESS_NAMES: &[&str] = &["Electron", "python", "Python", "node", "java"];

/// Raw description of the focused window as reported by a sampler.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActiveWindowData {
    /// Executable or process name. For example 'Electron' or 'Terminal'
    #[serde(default)]
    pub process_name: String,
    /// Name shown to the user, for example in a menu bar.
    #[serde(default, alias = "app_name")]
    pub displayed_name: String,
    #[serde(default)]
    pub bundle_id: String,
    /// Title of the window. For example 'bash in hello' or 'Vibing in YouTube - Chrome'
    #[serde(default)]
    pub window_title: String,
    /// Address of the active tab when the window belongs to a browser.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub tab_title: String,
    /// Milliseconds since the last user input.
    #[serde(default)]
    pub idle_ms: u32,
}

impl ActiveWindowData {
    /// Picks the most trustworthy application name: known bundle id, then the displayed name,
    /// then the process name, then the tail of the bundle id.
    pub fn app_name(&self) -> String {
        if let Some((_, name)) = BUNDLE_ID_TO_APP_NAME
            .iter()
            .find(|(bundle, _)| *bundle == self.bundle_id)
        {
            return name.to_string();
        }

        let usable = |name: &str| !name.is_empty() && !GENERIC_PROCESS_NAMES.contains(&name);
        if usable(&self.displayed_name) {
            return self.displayed_name.clone();
        }
        if usable(&self.process_name) {
            return self.process_name.clone();
        }
        if let Some(tail) = self.bundle_id.rsplit('.').next().filter(|v| !v.is_empty()) {
            return tail.to_string();
        }
        if self.process_name.is_empty() {
            "Unknown".to_string()
        } else {
            self.process_name.clone()
        }
    }
}

/// Snapshot of the focused window at one poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSample {
    pub app_name: String,
    pub window_title: String,
    pub bundle_id: String,
    pub url: String,
    pub tab_title: String,
    pub timestamp: DateTime<Utc>,
    pub is_idle: bool,
}

impl WindowSample {
    pub fn from_window(data: ActiveWindowData, timestamp: DateTime<Utc>, is_idle: bool) -> Self {
        Self {
            app_name: data.app_name(),
            window_title: data.window_title,
            bundle_id: data.bundle_id,
            url: data.url,
            tab_title: data.tab_title,
            timestamp,
            is_idle,
        }
    }
}

/// Intended to serve as a contract every platform adapter must implement.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WindowSampler: Send {
    /// Returns the focused window, or None when nothing is focused.
    async fn sample(&mut self) -> Result<Option<ActiveWindowData>>;
}

#[cfg(test)]
mod tests {
    use super::ActiveWindowData;

    fn window(process: &str, displayed: &str, bundle: &str) -> ActiveWindowData {
        ActiveWindowData {
            process_name: process.into(),
            displayed_name: displayed.into(),
            bundle_id: bundle.into(),
            ..Default::default()
        }
    }

    #[test]
    fn app_name_prefers_known_bundle() {
        assert_eq!(
            window("Electron", "Code", "com.microsoft.VSCode").app_name(),
            "Visual Studio Code"
        );
    }

    #[test]
    fn app_name_skips_generic_names() {
        assert_eq!(window("Terminal", "Terminal", "").app_name(), "Terminal");
        assert_eq!(window("Electron", "Electron", "com.acme.Board").app_name(), "Board");
        assert_eq!(window("node", "", "").app_name(), "node");
        assert_eq!(window("", "", "").app_name(), "Unknown");
    }
}
