use crate::config::AppConfig;
use anyhow::Result;
use global_hotkey::GlobalHotKeyManager;
use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use std::collections::HashMap;

/// The closed set of capture triggers a hotkey can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureAction {
    CaptureArea,
    CaptureWindow,
    CaptureCodeblock,
}

/// Platform registration seam. The real backend talks to the OS through
/// `global-hotkey`; tests substitute a recording mock.
pub trait HotkeyBackend {
    fn register(&mut self, hotkey: HotKey) -> Result<()>;
    fn unregister(&mut self, hotkey: HotKey) -> Result<()>;
}

pub struct GlobalHotkeyBackend {
    manager: GlobalHotKeyManager,
}

impl GlobalHotkeyBackend {
    pub fn new() -> Result<Self> {
        Ok(Self {
            manager: GlobalHotKeyManager::new()?,
        })
    }
}

impl HotkeyBackend for GlobalHotkeyBackend {
    fn register(&mut self, hotkey: HotKey) -> Result<()> {
        self.manager.register(hotkey)?;
        Ok(())
    }

    fn unregister(&mut self, hotkey: HotKey) -> Result<()> {
        self.manager.unregister(hotkey)?;
        Ok(())
    }
}

/// Maps configured combo strings to capture actions.
///
/// The binding set is only ever replaced wholesale: `update_bindings`
/// unregisters everything before registering the new combos, so stale or
/// duplicate bindings cannot survive a configuration change. Registration
/// failures (malformed combo, platform refusal) leave that action unbound
/// without surfacing an error.
pub struct HotkeyRegistry<B: HotkeyBackend> {
    backend: B,
    actions_by_id: HashMap<u32, CaptureAction>,
    registered: Vec<HotKey>,
}

impl<B: HotkeyBackend> HotkeyRegistry<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            actions_by_id: HashMap::new(),
            registered: Vec::new(),
        }
    }

    pub fn update_bindings(&mut self, config: &AppConfig) {
        self.unregister_all();
        self.register_key(&config.capture_area_shortcut, CaptureAction::CaptureArea);
        self.register_key(&config.capture_window_shortcut, CaptureAction::CaptureWindow);
        self.register_key(
            &config.capture_codeblock_shortcut,
            CaptureAction::CaptureCodeblock,
        );
    }

    pub fn unregister_all(&mut self) {
        for hotkey in self.registered.drain(..) {
            let _ = self.backend.unregister(hotkey);
        }
        self.actions_by_id.clear();
    }

    fn register_key(&mut self, combo: &str, action: CaptureAction) {
        if combo.trim().is_empty() {
            return;
        }
        let Some(hotkey) = parse_combo(combo) else {
            return;
        };
        if self.backend.register(hotkey).is_err() {
            return;
        }
        self.actions_by_id.insert(hotkey.id(), action);
        self.registered.push(hotkey);
    }

    /// Remove whatever binding currently fires `action`, if any.
    pub fn unregister_key(&mut self, action: CaptureAction) {
        let ids: Vec<u32> = self
            .actions_by_id
            .iter()
            .filter(|(_, bound)| **bound == action)
            .map(|(id, _)| *id)
            .collect();

        for id in ids {
            self.actions_by_id.remove(&id);
            if let Some(pos) = self.registered.iter().position(|hotkey| hotkey.id() == id) {
                let hotkey = self.registered.remove(pos);
                let _ = self.backend.unregister(hotkey);
            }
        }
    }

    /// Resolve a fired platform hotkey id back to its logical action.
    /// Unrecognized ids produce no action.
    pub fn action_for(&self, hotkey_id: u32) -> Option<CaptureAction> {
        self.actions_by_id.get(&hotkey_id).copied()
    }

    pub fn binding_count(&self) -> usize {
        self.registered.len()
    }
}

/// Parse a combo string like `"Ctrl+Shift+A"` into a hotkey.
///
/// Tokens are case-insensitive; the last token must name a key, every other
/// token a modifier. Returns `None` for anything malformed.
pub fn parse_combo(combo: &str) -> Option<HotKey> {
    let mut modifiers = Modifiers::empty();
    let mut code = None;

    for token in combo.split('+') {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        match token.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => modifiers |= Modifiers::CONTROL,
            "shift" => modifiers |= Modifiers::SHIFT,
            "alt" | "option" => modifiers |= Modifiers::ALT,
            "cmd" | "command" | "super" | "meta" | "win" => modifiers |= Modifiers::SUPER,
            _ => {
                if code.is_some() {
                    return None; // two key tokens
                }
                code = Some(parse_key_token(token)?);
            }
        }
    }

    let code = code?;
    let modifiers = if modifiers.is_empty() {
        None
    } else {
        Some(modifiers)
    };
    Some(HotKey::new(modifiers, code))
}

fn parse_key_token(token: &str) -> Option<Code> {
    if token.len() == 1 {
        let ch = token.chars().next()?;
        if ch.is_ascii_alphabetic() {
            return letter_code(ch.to_ascii_uppercase());
        }
        if ch.is_ascii_digit() {
            return digit_code(ch);
        }
        return None;
    }

    match token.to_ascii_lowercase().as_str() {
        "f1" => Some(Code::F1),
        "f2" => Some(Code::F2),
        "f3" => Some(Code::F3),
        "f4" => Some(Code::F4),
        "f5" => Some(Code::F5),
        "f6" => Some(Code::F6),
        "f7" => Some(Code::F7),
        "f8" => Some(Code::F8),
        "f9" => Some(Code::F9),
        "f10" => Some(Code::F10),
        "f11" => Some(Code::F11),
        "f12" => Some(Code::F12),
        "space" => Some(Code::Space),
        "enter" | "return" => Some(Code::Enter),
        "tab" => Some(Code::Tab),
        "esc" | "escape" => Some(Code::Escape),
        "backspace" => Some(Code::Backspace),
        "delete" => Some(Code::Delete),
        "up" => Some(Code::ArrowUp),
        "down" => Some(Code::ArrowDown),
        "left" => Some(Code::ArrowLeft),
        "right" => Some(Code::ArrowRight),
        "home" => Some(Code::Home),
        "end" => Some(Code::End),
        "pageup" => Some(Code::PageUp),
        "pagedown" => Some(Code::PageDown),
        _ => None,
    }
}

fn letter_code(ch: char) -> Option<Code> {
    Some(match ch {
        'A' => Code::KeyA,
        'B' => Code::KeyB,
        'C' => Code::KeyC,
        'D' => Code::KeyD,
        'E' => Code::KeyE,
        'F' => Code::KeyF,
        'G' => Code::KeyG,
        'H' => Code::KeyH,
        'I' => Code::KeyI,
        'J' => Code::KeyJ,
        'K' => Code::KeyK,
        'L' => Code::KeyL,
        'M' => Code::KeyM,
        'N' => Code::KeyN,
        'O' => Code::KeyO,
        'P' => Code::KeyP,
        'Q' => Code::KeyQ,
        'R' => Code::KeyR,
        'S' => Code::KeyS,
        'T' => Code::KeyT,
        'U' => Code::KeyU,
        'V' => Code::KeyV,
        'W' => Code::KeyW,
        'X' => Code::KeyX,
        'Y' => Code::KeyY,
        'Z' => Code::KeyZ,
        _ => return None,
    })
}

fn digit_code(ch: char) -> Option<Code> {
    Some(match ch {
        '0' => Code::Digit0,
        '1' => Code::Digit1,
        '2' => Code::Digit2,
        '3' => Code::Digit3,
        '4' => Code::Digit4,
        '5' => Code::Digit5,
        '6' => Code::Digit6,
        '7' => Code::Digit7,
        '8' => Code::Digit8,
        '9' => Code::Digit9,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::{CaptureAction, HotkeyBackend, HotkeyRegistry, parse_combo};
    use crate::config::AppConfig;
    use anyhow::{Result, anyhow};
    use global_hotkey::hotkey::{Code, HotKey, Modifiers};

    #[derive(Default)]
    struct RecordingBackend {
        registered: Vec<HotKey>,
        unregistered: Vec<HotKey>,
        fail_registration: bool,
    }

    impl HotkeyBackend for RecordingBackend {
        fn register(&mut self, hotkey: HotKey) -> Result<()> {
            if self.fail_registration {
                return Err(anyhow!("platform refused binding"));
            }
            self.registered.push(hotkey);
            Ok(())
        }

        fn unregister(&mut self, hotkey: HotKey) -> Result<()> {
            self.unregistered.push(hotkey);
            Ok(())
        }
    }

    fn config(area: &str, window: &str, codeblock: &str) -> AppConfig {
        AppConfig {
            capture_area_shortcut: area.to_string(),
            capture_window_shortcut: window.to_string(),
            capture_codeblock_shortcut: codeblock.to_string(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn parses_modifier_combos() {
        let hotkey = parse_combo("Ctrl+Shift+A").expect("valid combo");
        assert_eq!(
            hotkey,
            HotKey::new(Some(Modifiers::CONTROL | Modifiers::SHIFT), Code::KeyA)
        );

        let bare = parse_combo("F5").expect("bare key");
        assert_eq!(bare, HotKey::new(None, Code::F5));
    }

    #[test]
    fn rejects_malformed_combos() {
        assert!(parse_combo("").is_none());
        assert!(parse_combo("Ctrl+").is_none());
        assert!(parse_combo("Ctrl+Shift").is_none());
        assert!(parse_combo("A+B").is_none());
        assert!(parse_combo("NotAKey").is_none());
    }

    #[test]
    fn binds_configured_actions_and_resolves_ids() {
        let mut registry = HotkeyRegistry::new(RecordingBackend::default());
        registry.update_bindings(&config("Ctrl+Shift+A", "", "Ctrl+Shift+C"));

        assert_eq!(registry.binding_count(), 2);
        let area_id = parse_combo("Ctrl+Shift+A").unwrap().id();
        let codeblock_id = parse_combo("Ctrl+Shift+C").unwrap().id();
        assert_eq!(registry.action_for(area_id), Some(CaptureAction::CaptureArea));
        assert_eq!(
            registry.action_for(codeblock_id),
            Some(CaptureAction::CaptureCodeblock)
        );
        assert_eq!(registry.action_for(0xdead), None);
    }

    #[test]
    fn rebinding_replaces_every_prior_binding() {
        let mut registry = HotkeyRegistry::new(RecordingBackend::default());
        registry.update_bindings(&config("Ctrl+Shift+A", "Ctrl+Shift+W", ""));
        assert_eq!(registry.binding_count(), 2);

        registry.update_bindings(&config("", "", "Alt+C"));
        assert_eq!(registry.binding_count(), 1);

        let old_area_id = parse_combo("Ctrl+Shift+A").unwrap().id();
        assert_eq!(registry.action_for(old_area_id), None);
        let codeblock_id = parse_combo("Alt+C").unwrap().id();
        assert_eq!(
            registry.action_for(codeblock_id),
            Some(CaptureAction::CaptureCodeblock)
        );
    }

    #[test]
    fn registration_failure_leaves_action_unbound() {
        let backend = RecordingBackend {
            fail_registration: true,
            ..RecordingBackend::default()
        };
        let mut registry = HotkeyRegistry::new(backend);
        registry.update_bindings(&config("Ctrl+Shift+A", "", ""));

        assert_eq!(registry.binding_count(), 0);
        let id = parse_combo("Ctrl+Shift+A").unwrap().id();
        assert_eq!(registry.action_for(id), None);
    }

    #[test]
    fn unregister_key_removes_only_that_action() {
        let mut registry = HotkeyRegistry::new(RecordingBackend::default());
        registry.update_bindings(&config("Ctrl+Shift+A", "Ctrl+Shift+W", ""));

        registry.unregister_key(CaptureAction::CaptureArea);
        assert_eq!(registry.binding_count(), 1);
        let area_id = parse_combo("Ctrl+Shift+A").unwrap().id();
        let window_id = parse_combo("Ctrl+Shift+W").unwrap().id();
        assert_eq!(registry.action_for(area_id), None);
        assert_eq!(
            registry.action_for(window_id),
            Some(CaptureAction::CaptureWindow)
        );
    }

    #[test]
    fn malformed_combo_is_skipped_silently() {
        let mut registry = HotkeyRegistry::new(RecordingBackend::default());
        registry.update_bindings(&config("Bogus+Combo+Here", "Ctrl+Shift+W", ""));
        assert_eq!(registry.binding_count(), 1);
    }
}
