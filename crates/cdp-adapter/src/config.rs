use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use which::which;

/// Configuration for launching the browser behind the page controller.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    /// Browser binary; detected from `POLITECRAWL_CHROME` or `PATH` when unset
    pub executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    pub headless: bool,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: None,
            user_data_dir: None,
            headless: true,
        }
    }
}

impl CdpConfig {
    pub fn resolve_executable(&self) -> Option<PathBuf> {
        self.executable.clone().or_else(detect_chrome_executable)
    }
}

fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("POLITECRAWL_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    chrome_executable_names()
        .iter()
        .find_map(|name| which(name).ok())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "chrome",
        ]
    }
}
