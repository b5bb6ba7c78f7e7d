use anyhow::{Context, Result};
use evidence_tray::capture::{MacOsScreenCapture, SystemClipboard};
use evidence_tray::config::{AppConfig, ensure_sample_config};
use evidence_tray::coordinator::{
    Collaborators, Coordinator, CoordinatorEvent, MessageSeverity, UiEffect,
};
use evidence_tray::evidence::JsonlEvidenceStore;
use evidence_tray::hotkeys::{CaptureAction, GlobalHotkeyBackend, HotkeyRegistry};
use evidence_tray::menu::{OperationMenuModel, operation_label};
use evidence_tray::net::HttpSessionClient;
use evidence_tray::paths::{default_config_path, default_settings_path};
use evidence_tray::settings::AppSettings;
use global_hotkey::{GlobalHotKeyEvent, HotKeyState};
use opener::open;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tao::event::{Event, StartCause};
use tao::event_loop::{ControlFlow, EventLoopBuilder};
use tokio::sync::mpsc;
use tray_icon::menu::{
    CheckMenuItem, Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem, Submenu,
};
use tray_icon::{
    Icon, MouseButton, MouseButtonState, TrayIcon, TrayIconBuilder, TrayIconEvent,
};

enum UserEvent {
    Menu(MenuEvent),
    Hotkey(GlobalHotKeyEvent),
    Tray(TrayIconEvent),
    Coordinator(CoordinatorEvent),
}

struct TrayUi {
    current_op_item: MenuItem,
    op_status_item: MenuItem,
    new_op_item: MenuItem,
    op_submenu: Submenu,
    op_items: Vec<CheckMenuItem>,
    op_index: HashMap<MenuId, (String, String)>,
    message_item: MenuItem,
    tray_icon: Option<TrayIcon>,
}

impl TrayUi {
    /// Throw away every previously rendered operation item and regenerate
    /// the submenu from the model snapshot.
    fn render_menu(&mut self, model: &OperationMenuModel) {
        self.op_status_item.set_text(model.status_text.clone());
        self.new_op_item.set_enabled(model.can_create);

        for item in self.op_items.drain(..) {
            let _ = self.op_submenu.remove(&item);
        }
        self.op_index.clear();

        for entry in &model.entries {
            let item = CheckMenuItem::new(entry.name.clone(), true, entry.checked, None);
            self.op_index
                .insert(item.id().clone(), (entry.slug.clone(), entry.name.clone()));
            if self.op_submenu.append(&item).is_ok() {
                self.op_items.push(item);
            }
        }
    }

    fn show_message(&mut self, title: &str, body: &str, severity: MessageSeverity) {
        let prefix = match severity {
            MessageSeverity::Info => "",
            MessageSeverity::Warning => "⚠ ",
        };
        self.message_item.set_text(format!("{prefix}{title}"));
        self.message_item.set_enabled(true);
        if let Some(icon) = self.tray_icon.as_ref() {
            let _ = icon.set_tooltip(Some(format!("Evidence Tray: {title}. {body}")));
        }
        eprintln!("{title}: {body}");
    }
}

fn main() -> Result<()> {
    let config_path = default_config_path();
    let _ = ensure_sample_config(&config_path);
    let config = AppConfig::load(&config_path)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();
    let proxy = event_loop.create_proxy();

    let proxy_for_menu = proxy.clone();
    MenuEvent::set_event_handler(Some(move |event| {
        let _ = proxy_for_menu.send_event(UserEvent::Menu(event));
    }));
    let proxy_for_hotkey = proxy.clone();
    GlobalHotKeyEvent::set_event_handler(Some(move |event| {
        let _ = proxy_for_hotkey.send_event(UserEvent::Hotkey(event));
    }));
    let proxy_for_tray = proxy.clone();
    TrayIconEvent::set_event_handler(Some(move |event| {
        let _ = proxy_for_tray.send_event(UserEvent::Tray(event));
    }));

    // Global hotkeys are best-effort: a failed manager init just leaves
    // every action unbound.
    let mut registry = match GlobalHotkeyBackend::new() {
        Ok(backend) => {
            let mut registry = HotkeyRegistry::new(backend);
            registry.update_bindings(&config);
            Some(registry)
        }
        Err(err) => {
            eprintln!("global hotkeys unavailable: {err:#}");
            None
        }
    };

    let settings = AppSettings::load(default_settings_path())?;
    let evidence_dir = config.evidence_dir.clone();
    let store = JsonlEvidenceStore::open(evidence_dir.join("evidence.jsonl"))
        .context("failed to open evidence journal")?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (effects_tx, mut effects_rx) = mpsc::unbounded_channel();

    let mut coordinator = Coordinator::new(
        settings,
        Collaborators {
            client: Arc::new(HttpSessionClient::new(
                config.api_base_url.clone(),
                config.access_key.clone(),
            )),
            screen_capture: Arc::new(MacOsScreenCapture),
            clipboard: Arc::new(SystemClipboard),
            evidence_store: Arc::new(store),
            evidence_dir,
        },
        events_tx,
        effects_tx,
        runtime.handle().clone(),
    );

    // Completions from spawned tasks come back through the tao proxy so the
    // coordinator only ever runs on this thread.
    let proxy_for_events = proxy.clone();
    runtime.spawn(async move {
        while let Some(event) = events_rx.recv().await {
            if proxy_for_events
                .send_event(UserEvent::Coordinator(event))
                .is_err()
            {
                break;
            }
        }
    });

    // Fixed tray menu
    let codeblock_item = MenuItem::new("Add Codeblock from Clipboard", true, None);
    let area_item = MenuItem::new("Capture Screen Area", true, None);
    let window_item = MenuItem::new("Capture Window", true, None);
    let current_op_item = MenuItem::new(operation_label(coordinator.settings().operation_name()), false, None);
    let op_status_item = MenuItem::new("Loading operations...", false, None);
    let new_op_item = MenuItem::new("New Operation", false, None);
    let message_item = MenuItem::new("No recent messages", false, None);
    let open_evidence_item = MenuItem::new("Open Evidence Folder", true, None);
    let settings_item = MenuItem::new("Settings...", true, None);
    let quit_item = MenuItem::new("Quit", true, None);

    let op_submenu = Submenu::new("Select Operation", true);
    op_submenu.append(&op_status_item)?;
    op_submenu.append(&new_op_item)?;
    op_submenu.append(&PredefinedMenuItem::separator())?;

    let menu = Menu::new();
    menu.append(&codeblock_item)?;
    menu.append(&area_item)?;
    menu.append(&window_item)?;
    menu.append(&PredefinedMenuItem::separator())?;
    menu.append(&current_op_item)?;
    menu.append(&op_submenu)?;
    menu.append(&PredefinedMenuItem::separator())?;
    menu.append(&message_item)?;
    menu.append(&open_evidence_item)?;
    menu.append(&settings_item)?;
    menu.append(&quit_item)?;

    let mut ui = TrayUi {
        current_op_item,
        op_status_item,
        new_op_item,
        op_submenu,
        op_items: Vec::new(),
        op_index: HashMap::new(),
        message_item,
        tray_icon: None,
    };

    event_loop.run(move |event, _target, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::NewEvents(StartCause::Init) => {
                if ui.tray_icon.is_none() {
                    let built = TrayIconBuilder::new()
                        .with_menu(Box::new(menu.clone()))
                        .with_tooltip("Evidence Tray")
                        .with_icon(build_tray_icon())
                        .build();
                    match built {
                        Ok(icon) => ui.tray_icon = Some(icon),
                        Err(err) => eprintln!("failed to init tray icon: {err}"),
                    }
                }

                // Delay the first fetch so all listeners are attached, then
                // check for updates shortly after and daily thereafter.
                coordinator
                    .schedule_startup(Duration::from_millis(500), Duration::from_secs(5));
                apply_effects(&mut ui, &mut effects_rx);
            }
            Event::UserEvent(UserEvent::Coordinator(coordinator_event)) => {
                coordinator.handle_event(coordinator_event);
                apply_effects(&mut ui, &mut effects_rx);
            }
            Event::UserEvent(UserEvent::Hotkey(hotkey_event)) => {
                if hotkey_event.state == HotKeyState::Pressed
                    && let Some(action) = registry
                        .as_ref()
                        .and_then(|registry| registry.action_for(hotkey_event.id))
                {
                    coordinator.handle_event(CoordinatorEvent::CaptureTriggered(action));
                    apply_effects(&mut ui, &mut effects_rx);
                }
            }
            Event::UserEvent(UserEvent::Tray(tray_event)) => {
                if let TrayIconEvent::Click {
                    button: MouseButton::Left,
                    button_state: MouseButtonState::Down,
                    ..
                } = tray_event
                {
                    coordinator.handle_event(CoordinatorEvent::TrayActivated);
                    apply_effects(&mut ui, &mut effects_rx);
                }
            }
            Event::UserEvent(UserEvent::Menu(menu_event)) => {
                if menu_event.id == codeblock_item.id() {
                    coordinator.handle_event(CoordinatorEvent::CaptureTriggered(
                        CaptureAction::CaptureCodeblock,
                    ));
                } else if menu_event.id == area_item.id() {
                    coordinator.handle_event(CoordinatorEvent::CaptureTriggered(
                        CaptureAction::CaptureArea,
                    ));
                } else if menu_event.id == window_item.id() {
                    coordinator.handle_event(CoordinatorEvent::CaptureTriggered(
                        CaptureAction::CaptureWindow,
                    ));
                } else if menu_event.id == ui.new_op_item.id() {
                    coordinator.handle_event(CoordinatorEvent::NewOperationRequested);
                } else if menu_event.id == ui.message_item.id() {
                    coordinator.handle_event(CoordinatorEvent::TrayMessageClicked);
                } else if menu_event.id == open_evidence_item.id() {
                    let dir = AppConfig::load(&default_config_path())
                        .map(|config| config.evidence_dir)
                        .unwrap_or_else(|_| evidence_tray::paths::default_evidence_dir());
                    let _ = std::fs::create_dir_all(&dir);
                    if let Err(err) = open(&dir) {
                        eprintln!("failed to open {}: {err}", dir.display());
                    }
                } else if menu_event.id == settings_item.id() {
                    let path = default_config_path();
                    let _ = ensure_sample_config(&path);
                    if let Err(err) = open(&path) {
                        eprintln!("failed to open {}: {err}", path.display());
                    }
                    // hotkeys may have been edited; rebuild the binding set
                    if let Ok(config) = AppConfig::load(&path)
                        && let Some(registry) = registry.as_mut()
                    {
                        registry.update_bindings(&config);
                    }
                } else if menu_event.id == quit_item.id() {
                    *control_flow = ControlFlow::Exit;
                } else if let Some((slug, name)) = ui.op_index.get(&menu_event.id).cloned() {
                    coordinator
                        .handle_event(CoordinatorEvent::MenuOperationSelected { slug, name });
                }
                apply_effects(&mut ui, &mut effects_rx);
            }
            _ => {}
        }
    });
}

fn apply_effects(ui: &mut TrayUi, effects_rx: &mut mpsc::UnboundedReceiver<UiEffect>) {
    while let Ok(effect) = effects_rx.try_recv() {
        match effect {
            UiEffect::MenuUpdated(model) => ui.render_menu(&model),
            UiEffect::ActiveOperationChanged { name, .. } => {
                ui.current_op_item.set_text(operation_label(&name));
            }
            UiEffect::ShowTrayMessage {
                title,
                body,
                severity,
                ..
            } => ui.show_message(&title, &body, severity),
            UiEffect::OpenAnnotationSurface { file_path, .. } => {
                // Annotation UI is an external collaborator; reveal the
                // captured file so it can be described and tagged.
                if let Err(err) = open(&file_path) {
                    eprintln!("failed to open {}: {err}", file_path.display());
                }
            }
            UiEffect::ShowCreateOperation => {
                eprintln!("create operations with: evidence-tray create <name>");
            }
            UiEffect::CreateOperationResolved { error } => {
                if let Some(error) = error {
                    eprintln!("create operation failed: {error}");
                }
            }
            UiEffect::OpenUrl(url) => {
                if let Err(err) = open(&url) {
                    eprintln!("failed to open {url}: {err}");
                }
            }
            UiEffect::OpenPath(path) => {
                if let Err(err) = open(&path) {
                    eprintln!("failed to open {}: {err}", path.display());
                }
            }
        }
    }
}

fn build_tray_icon() -> Icon {
    let (width, height) = (18usize, 18usize);
    let mut rgba = Vec::with_capacity(width * height * 4);
    let border = [40u8, 40, 40, 255];
    let fill = [90u8, 140, 255, 255];
    let background = [0u8, 0, 0, 0];

    for y in 0..height {
        for x in 0..width {
            let is_border = x == 0 || y == 0 || x == width - 1 || y == height - 1;
            let is_center = (x > 4 && x < 13) && (y > 4 && y < 13);
            let pixel = if is_border {
                border
            } else if is_center {
                fill
            } else {
                background
            };
            rgba.extend_from_slice(&pixel);
        }
    }

    Icon::from_rgba(rgba, width as u32, height as u32).expect("valid tray icon")
}
