use crate::models::Operation;

pub const STATUS_LOADING: &str = "Loading operations...";
pub const STATUS_LOADED: &str = "Operations loaded";
pub const STATUS_FAILED: &str = "Unable to load operations";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub slug: String,
    pub name: String,
    pub checked: bool,
}

/// In-memory snapshot of the operation selection menu.
///
/// The coordinator rebuilds this model from scratch on every refresh and the
/// rendering layer regenerates its widgets from the snapshot, so stale items
/// can never leak across rebuilds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationMenuModel {
    pub status_text: String,
    pub can_create: bool,
    pub entries: Vec<MenuEntry>,
}

impl Default for OperationMenuModel {
    fn default() -> Self {
        Self {
            status_text: STATUS_LOADING.to_string(),
            can_create: false,
            entries: Vec::new(),
        }
    }
}

impl OperationMenuModel {
    /// Build a fresh model from a fetched operation list. The entry whose
    /// slug equals `active_slug` is checked; everything else is not.
    pub fn rebuild(operations: &[Operation], active_slug: &str) -> Self {
        let entries = operations
            .iter()
            .map(|op| MenuEntry {
                slug: op.slug.clone(),
                name: op.name.clone(),
                checked: !active_slug.is_empty() && op.slug == active_slug,
            })
            .collect();

        Self {
            status_text: STATUS_LOADED.to_string(),
            can_create: true,
            entries,
        }
    }

    pub fn mark_loading(&mut self) {
        self.status_text = STATUS_LOADING.to_string();
        self.can_create = false;
    }

    /// A failed refresh keeps the previously rendered entries; only the
    /// status line changes.
    pub fn mark_failed(&mut self) {
        self.status_text = STATUS_FAILED.to_string();
        self.can_create = false;
    }

    /// Enforce single selection: check the entry matching `slug` (if any)
    /// and uncheck every other entry.
    pub fn set_checked(&mut self, slug: &str) {
        for entry in &mut self.entries {
            entry.checked = !slug.is_empty() && entry.slug == slug;
        }
    }

    pub fn checked_slug(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.checked)
            .map(|entry| entry.slug.as_str())
    }
}

/// Menu label for the currently active operation.
pub fn operation_label(name: &str) -> String {
    if name.is_empty() {
        "Operation: <None>".to_string()
    } else {
        format!("Operation: {name}")
    }
}
