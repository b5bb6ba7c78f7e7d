use crate::models::{Operation, Tag};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedSettings {
    #[serde(default)]
    operation_slug: String,
    #[serde(default)]
    operation_name: String,
    #[serde(default)]
    last_used_tags: Vec<Tag>,
}

type OperationObserver = Box<dyn Fn(&Operation) + Send>;

/// Holds the active operation selection and the last-used tag set.
///
/// Constructed once at startup by the process entry point and handed to the
/// coordinator; there are no ambient lookups. Every mutation is written
/// through to disk so a crash never loses the selection.
pub struct AppSettings {
    path: PathBuf,
    state: PersistedSettings,
    observers: Vec<OperationObserver>,
}

impl AppSettings {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("failed to parse settings {}", path.display()))?
        } else {
            PersistedSettings::default()
        };

        Ok(Self {
            path,
            state,
            observers: Vec::new(),
        })
    }

    /// Register a callback invoked synchronously on every operation change.
    ///
    /// Observers fire in registration order, before `set_operation_details`
    /// returns, and always fire even when the new values equal the old ones.
    pub fn subscribe_operation_changes(&mut self, observer: OperationObserver) {
        self.observers.push(observer);
    }

    /// Set slug and name together. The pair is never split: callers cannot
    /// update one field without the other.
    pub fn set_operation_details(&mut self, slug: impl Into<String>, name: impl Into<String>) {
        self.state.operation_slug = slug.into();
        self.state.operation_name = name.into();
        self.flush();

        let current = Operation::new(
            self.state.operation_slug.clone(),
            self.state.operation_name.clone(),
        );
        for observer in &self.observers {
            observer(&current);
        }
    }

    pub fn clear_operation(&mut self) {
        self.set_operation_details("", "");
    }

    pub fn operation_slug(&self) -> &str {
        &self.state.operation_slug
    }

    pub fn operation_name(&self) -> &str {
        &self.state.operation_name
    }

    pub fn has_operation(&self) -> bool {
        !self.state.operation_slug.is_empty()
    }

    pub fn set_last_used_tags(&mut self, tags: Vec<Tag>) {
        self.state.last_used_tags = tags;
        self.flush();
    }

    pub fn last_used_tags(&self) -> &[Tag] {
        &self.state.last_used_tags
    }

    fn flush(&self) {
        if let Err(err) = self.write_to_disk() {
            eprintln!("failed to persist settings: {err:#}");
        }
    }

    fn write_to_disk(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create settings directory {}", parent.display())
            })?;
        }

        let text = toml::to_string_pretty(&self.state).context("failed to serialize settings")?;
        std::fs::write(&self.path, text)
            .with_context(|| format!("failed to write settings {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
