use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// User-editable configuration, stored as TOML in the data directory.
///
/// Hotkey combos are plain strings like `"Ctrl+Shift+A"`; an empty string
/// leaves that action unbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api_base_url: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default = "default_evidence_dir_string")]
    pub evidence_dir: PathBuf,
    #[serde(default)]
    pub capture_area_shortcut: String,
    #[serde(default)]
    pub capture_window_shortcut: String,
    #[serde(default)]
    pub capture_codeblock_shortcut: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            access_key: String::new(),
            evidence_dir: default_evidence_dir_string(),
            capture_area_shortcut: String::new(),
            capture_window_shortcut: String::new(),
            capture_codeblock_shortcut: String::new(),
        }
    }
}

fn default_evidence_dir_string() -> PathBuf {
    crate::paths::default_evidence_dir()
}

impl AppConfig {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: AppConfig = toml::from_str(&text)
            .with_context(|| format!("failed to parse config {} (expected TOML)", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory {}", parent.display())
            })?;
        }

        let text = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write config {}", path.display()))?;
        Ok(())
    }
}

/// Write a commented starter config if none exists, so users have something
/// to edit after first launch.
pub fn ensure_sample_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }

    let sample = format!(
        r#"# evidence-tray configuration

# Base URL of the evidence server, e.g. "https://evidence.example.com"
api_base_url = ""

# Access key used to authenticate API requests.
access_key = ""

# Where captured evidence files are written.
evidence_dir = "{}"

# Global hotkeys. Leave empty to keep an action unbound.
capture_area_shortcut = ""
capture_window_shortcut = ""
capture_codeblock_shortcut = ""
"#,
        crate::paths::default_evidence_dir().display()
    );

    std::fs::write(path, sample)
        .with_context(|| format!("failed to write sample config {}", path.display()))?;
    Ok(())
}
