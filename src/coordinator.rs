use crate::capture::{ClipboardReader, ScreenCapture};
use crate::evidence::{EvidenceStore, save_codeblock};
use crate::hotkeys::CaptureAction;
use crate::menu::OperationMenuModel;
use crate::models::{EvidenceKind, Operation, Release, Tag};
use crate::net::{SessionClient, SessionError};
use crate::releases::{REFERENCE_TAG, RELEASE_OWNER, RELEASE_PAGE_URL, RELEASE_REPO, upgrade_available};
use crate::settings::AppSettings;
use crate::slug::make_slug_from_name;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

pub const NO_OPERATION_TITLE: &str = "Unable to Record Evidence";
pub const NO_OPERATION_BODY: &str =
    "No Operation has been selected. Please select an operation first.";
pub const DEFAULT_MESSAGE_TIMEOUT_MS: u32 = 10_000;

/// Governs what a click on the most recent notification does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayMessageKind {
    NoAction,
    OpenPath,
    Upgrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Import,
    Export,
}

/// Everything that can wake the coordinator. Trigger sources (hotkeys, menu
/// clicks, tray activation) and asynchronous completions all arrive through
/// this one type, on one logical thread.
#[derive(Debug)]
pub enum CoordinatorEvent {
    CaptureTriggered(CaptureAction),
    CaptureFinished {
        outcome: anyhow::Result<Option<PathBuf>>,
    },
    EvidenceSubmitted {
        tags: Vec<Tag>,
    },
    TrayActivated,
    RefreshOperations,
    MenuOperationSelected {
        slug: String,
        name: String,
    },
    NewOperationRequested,
    CreateOperationSubmitted {
        name: String,
    },
    OperationsListed {
        generation: u64,
        result: Result<Vec<Operation>, SessionError>,
    },
    OperationCreated {
        result: Result<Operation, SessionError>,
    },
    CheckForUpdate,
    ReleasesChecked {
        result: Result<Vec<Release>, SessionError>,
    },
    PortCompleted {
        direction: PortDirection,
        path: PathBuf,
    },
    TrayMessageClicked,
}

/// Rendering instructions emitted by the coordinator. The UI shell consumes
/// these; the coordinator never touches widgets directly.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEffect {
    MenuUpdated(OperationMenuModel),
    ActiveOperationChanged {
        slug: String,
        name: String,
    },
    ShowTrayMessage {
        kind: TrayMessageKind,
        title: String,
        body: String,
        severity: MessageSeverity,
        timeout_ms: u32,
    },
    OpenAnnotationSurface {
        evidence_id: i64,
        file_path: PathBuf,
    },
    /// Reveal the create-operation surface with any previous response text
    /// cleared.
    ShowCreateOperation,
    /// `error: None` means the create succeeded and the surface should close
    /// and clear its input.
    CreateOperationResolved {
        error: Option<String>,
    },
    OpenUrl(String),
    OpenPath(PathBuf),
}

/// External collaborators, constructed by the process entry point and handed
/// to the coordinator.
pub struct Collaborators {
    pub client: Arc<dyn SessionClient>,
    pub screen_capture: Arc<dyn ScreenCapture>,
    pub clipboard: Arc<dyn ClipboardReader>,
    pub evidence_store: Arc<dyn EvidenceStore>,
    pub evidence_dir: PathBuf,
}

/// The capture and operation session coordinator.
///
/// Owns the single source of truth for the active operation, arbitrates
/// concurrent trigger sources, and keeps at most one outstanding request per
/// remote purpose: operation-list fetches are generation-stamped so only the
/// latest response applies, release checks and operation creates are
/// suppressed while one is in flight. Captures are per-item and run
/// concurrently without shared state.
pub struct Coordinator {
    settings: AppSettings,
    collaborators: Collaborators,
    menu: OperationMenuModel,
    events_tx: UnboundedSender<CoordinatorEvent>,
    effects_tx: UnboundedSender<UiEffect>,
    runtime: tokio::runtime::Handle,

    ops_generation: u64,
    ops_request: Option<u64>,
    release_check_in_flight: bool,
    create_in_flight: bool,

    current_tray_message: TrayMessageKind,
    open_services_path: Option<PathBuf>,
    update_timer: Option<JoinHandle<()>>,
    capture_seq: u64,
}

impl Coordinator {
    pub fn new(
        mut settings: AppSettings,
        collaborators: Collaborators,
        events_tx: UnboundedSender<CoordinatorEvent>,
        effects_tx: UnboundedSender<UiEffect>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        // Operation changes notify synchronously; the UI label update rides
        // along as an ordered effect.
        let label_tx = effects_tx.clone();
        settings.subscribe_operation_changes(Box::new(move |op| {
            let _ = label_tx.send(UiEffect::ActiveOperationChanged {
                slug: op.slug.clone(),
                name: op.name.clone(),
            });
        }));

        Self {
            settings,
            collaborators,
            menu: OperationMenuModel::default(),
            events_tx,
            effects_tx,
            runtime,
            ops_generation: 0,
            ops_request: None,
            release_check_in_flight: false,
            create_in_flight: false,
            current_tray_message: TrayMessageKind::NoAction,
            open_services_path: None,
            update_timer: None,
            capture_seq: 0,
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn menu_model(&self) -> &OperationMenuModel {
        &self.menu
    }

    /// Kick off the startup sequence: an operations refresh and the first
    /// update check, each after a short delay so listeners attach first,
    /// then daily update checks.
    pub fn schedule_startup(&mut self, refresh_delay: Duration, update_delay: Duration) {
        let refresh_tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(refresh_delay).await;
            let _ = refresh_tx.send(CoordinatorEvent::RefreshOperations);
        });

        self.start_update_timer(update_delay, Duration::from_secs(60 * 60 * 24));
    }

    /// (Re)start the periodic release-check timer. Any previous timer is
    /// torn down first so periods never stack.
    pub fn start_update_timer(&mut self, initial_delay: Duration, period: Duration) {
        if let Some(handle) = self.update_timer.take() {
            handle.abort();
        }
        eprintln!(
            "release checks scheduled every {}",
            humantime::format_duration(period)
        );

        let tx = self.events_tx.clone();
        self.update_timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(initial_delay).await;
            loop {
                let _ = tx.send(CoordinatorEvent::CheckForUpdate);
                tokio::time::sleep(period).await;
            }
        }));
    }

    pub fn handle_event(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::CaptureTriggered(action) => self.on_capture_triggered(action),
            CoordinatorEvent::CaptureFinished { outcome } => self.on_capture_finished(outcome),
            CoordinatorEvent::EvidenceSubmitted { tags } => {
                self.settings.set_last_used_tags(tags);
            }
            CoordinatorEvent::TrayActivated => {
                self.menu.mark_loading();
                self.emit_menu();
                self.refresh_operations();
            }
            CoordinatorEvent::RefreshOperations => self.refresh_operations(),
            CoordinatorEvent::MenuOperationSelected { slug, name } => {
                self.on_operation_selected(slug, name)
            }
            CoordinatorEvent::NewOperationRequested => {
                let _ = self.effects_tx.send(UiEffect::ShowCreateOperation);
            }
            CoordinatorEvent::CreateOperationSubmitted { name } => self.on_create_submitted(name),
            CoordinatorEvent::OperationsListed { generation, result } => {
                self.on_operations_listed(generation, result)
            }
            CoordinatorEvent::OperationCreated { result } => self.on_operation_created(result),
            CoordinatorEvent::CheckForUpdate => self.check_for_update(),
            CoordinatorEvent::ReleasesChecked { result } => self.on_releases_checked(result),
            CoordinatorEvent::PortCompleted { direction, path } => {
                self.on_port_completed(direction, path)
            }
            CoordinatorEvent::TrayMessageClicked => self.on_tray_message_clicked(),
        }
    }

    // ---- capture flow ----

    fn on_capture_triggered(&mut self, action: CaptureAction) {
        if !self.settings.has_operation() {
            self.set_tray_message(
                TrayMessageKind::NoAction,
                NO_OPERATION_TITLE,
                NO_OPERATION_BODY,
                MessageSeverity::Warning,
            );
            return;
        }

        match action {
            CaptureAction::CaptureCodeblock => self.capture_codeblock(),
            CaptureAction::CaptureArea | CaptureAction::CaptureWindow => {
                self.capture_screenshot(action)
            }
        }
    }

    fn capture_screenshot(&mut self, action: CaptureAction) {
        if let Err(err) = std::fs::create_dir_all(&self.collaborators.evidence_dir) {
            eprintln!(
                "could not create evidence directory {}: {err}",
                self.collaborators.evidence_dir.display()
            );
            return;
        }

        self.capture_seq += 1;
        let filename = format!(
            "capture-{}-{:04}.png",
            Utc::now().format("%Y%m%dT%H%M%S%.3fZ"),
            self.capture_seq
        );
        let path = self.collaborators.evidence_dir.join(filename);

        let screen_capture = self.collaborators.screen_capture.clone();
        let events_tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let result = match action {
                CaptureAction::CaptureWindow => screen_capture.capture_window(&path).await,
                _ => screen_capture.capture_area(&path).await,
            };
            let outcome = result.map(|captured| captured.then_some(path));
            let _ = events_tx.send(CoordinatorEvent::CaptureFinished { outcome });
        });
    }

    fn capture_codeblock(&mut self) {
        let content = self.collaborators.clipboard.read_plaintext();
        if content.is_empty() {
            return;
        }

        match save_codeblock(&content, &self.collaborators.evidence_dir) {
            Ok(path) => self.create_new_evidence(path, EvidenceKind::Codeblock),
            Err(err) => eprintln!("could not save codeblock: {err:#}"),
        }
    }

    fn on_capture_finished(&mut self, outcome: anyhow::Result<Option<PathBuf>>) {
        match outcome {
            Ok(Some(path)) => self.create_new_evidence(path, EvidenceKind::Image),
            Ok(None) => {} // user cancelled
            Err(err) => eprintln!("capture failed: {err:#}"),
        }
    }

    /// Record a captured file as evidence for the active operation, attach
    /// the last-used tags best-effort, and open the annotation surface.
    /// A storage failure aborts this one capture only.
    fn create_new_evidence(&mut self, path: PathBuf, kind: EvidenceKind) {
        let slug = self.settings.operation_slug().to_string();
        let evidence_id = match self
            .collaborators
            .evidence_store
            .create_evidence(&path, &slug, kind)
        {
            Ok(id) => id,
            Err(err) => {
                eprintln!("could not write to the evidence store: {err:#}");
                return;
            }
        };

        let tags = self.settings.last_used_tags();
        if !tags.is_empty()
            && let Err(err) = self
                .collaborators
                .evidence_store
                .set_evidence_tags(tags, evidence_id)
        {
            eprintln!("could not attach last-used tags: {err:#}");
        }

        let _ = self.effects_tx.send(UiEffect::OpenAnnotationSurface {
            evidence_id,
            file_path: path,
        });
    }

    // ---- operation list flow ----

    /// Issue an operation-list fetch. A fetch already in flight is replaced:
    /// its completion will arrive with a stale generation and be dropped.
    fn refresh_operations(&mut self) {
        self.ops_generation += 1;
        let generation = self.ops_generation;
        self.ops_request = Some(generation);

        let client = self.collaborators.client.clone();
        let events_tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let result = client.list_operations().await;
            let _ = events_tx.send(CoordinatorEvent::OperationsListed { generation, result });
        });
    }

    fn on_operations_listed(
        &mut self,
        generation: u64,
        result: Result<Vec<Operation>, SessionError>,
    ) {
        if self.ops_request != Some(generation) {
            return; // superseded by a newer fetch
        }
        self.ops_request = None;

        match result {
            Ok(operations) => {
                let active_slug = self.settings.operation_slug().to_string();
                let model = OperationMenuModel::rebuild(&operations, &active_slug);

                // No resolvable selection selects nothing: a previously
                // active operation that vanished from the list is cleared
                // rather than left dangling.
                if !active_slug.is_empty() && model.checked_slug().is_none() {
                    self.settings.clear_operation();
                }

                self.menu = model;
                self.emit_menu();
            }
            Err(err) => {
                eprintln!("operation list refresh failed: {err}");
                self.menu.mark_failed();
                self.emit_menu();
            }
        }
    }

    fn on_operation_selected(&mut self, slug: String, name: String) {
        // Causal order: tags cleared, operation set (observers fire), then
        // the check mark moves.
        self.settings.set_last_used_tags(Vec::new());
        self.settings.set_operation_details(slug.clone(), name);
        self.menu.set_checked(&slug);
        self.emit_menu();
    }

    // ---- create operation flow ----

    fn on_create_submitted(&mut self, name: String) {
        if self.create_in_flight {
            return;
        }

        let name = name.trim().to_string();
        let slug = make_slug_from_name(&name);
        if slug.is_empty() {
            let error = if name.is_empty() {
                "The Operation Name must not be empty"
            } else {
                "The Operation Name must include letters or numbers"
            };
            let _ = self.effects_tx.send(UiEffect::CreateOperationResolved {
                error: Some(error.to_string()),
            });
            return;
        }

        self.create_in_flight = true;
        let client = self.collaborators.client.clone();
        let events_tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let result = client.create_operation(&name, &slug).await;
            let _ = events_tx.send(CoordinatorEvent::OperationCreated { result });
        });
    }

    fn on_operation_created(&mut self, result: Result<Operation, SessionError>) {
        self.create_in_flight = false;

        match result {
            Ok(op) => {
                self.settings.set_last_used_tags(Vec::new());
                self.settings.set_operation_details(op.slug.clone(), op.name);
                self.menu.set_checked(&op.slug);
                self.emit_menu();
                let _ = self
                    .effects_tx
                    .send(UiEffect::CreateOperationResolved { error: None });
            }
            Err(err) => {
                let error = if err.message().contains("slug already exists") {
                    "A similar operation name already exists. Please try a new name.".to_string()
                } else {
                    format!("Got an unexpected error: {}", err.message())
                };
                let _ = self
                    .effects_tx
                    .send(UiEffect::CreateOperationResolved { error: Some(error) });
            }
        }
    }

    // ---- release check flow ----

    /// At most one release check in flight; extra triggers are suppressed
    /// rather than queued.
    fn check_for_update(&mut self) {
        if self.release_check_in_flight {
            return;
        }
        self.release_check_in_flight = true;

        let client = self.collaborators.client.clone();
        let events_tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let result = client.check_releases(RELEASE_OWNER, RELEASE_REPO).await;
            let _ = events_tx.send(CoordinatorEvent::ReleasesChecked { result });
        });
    }

    fn on_releases_checked(&mut self, result: Result<Vec<Release>, SessionError>) {
        self.release_check_in_flight = false;

        // Failures are dropped silently; the periodic timer will try again.
        let Ok(releases) = result else {
            return;
        };

        if upgrade_available(REFERENCE_TAG, &releases).is_some() {
            self.set_tray_message(
                TrayMessageKind::Upgrade,
                "A new version is available!",
                "Click for more info",
                MessageSeverity::Info,
            );
        }
    }

    // ---- notifications ----

    fn on_port_completed(&mut self, direction: PortDirection, path: PathBuf) {
        match direction {
            PortDirection::Export => {
                self.open_services_path = Some(path.clone());
                self.set_tray_message(
                    TrayMessageKind::OpenPath,
                    "Export Complete",
                    &format!("Export saved to: {}\nClick to view", path.display()),
                    MessageSeverity::Info,
                );
            }
            PortDirection::Import => {
                self.set_tray_message(
                    TrayMessageKind::NoAction,
                    "Import Complete",
                    &format!("Import retrieved from: {}", path.display()),
                    MessageSeverity::Info,
                );
            }
        }
    }

    /// Remember only the most recent message's kind. If the platform still
    /// shows an older bubble, a click is dispatched by the newest kind; that
    /// race is accepted behavior.
    fn set_tray_message(
        &mut self,
        kind: TrayMessageKind,
        title: &str,
        body: &str,
        severity: MessageSeverity,
    ) {
        self.current_tray_message = kind;
        let _ = self.effects_tx.send(UiEffect::ShowTrayMessage {
            kind,
            title: title.to_string(),
            body: body.to_string(),
            severity,
            timeout_ms: DEFAULT_MESSAGE_TIMEOUT_MS,
        });
    }

    fn on_tray_message_clicked(&mut self) {
        match self.current_tray_message {
            TrayMessageKind::Upgrade => {
                let _ = self
                    .effects_tx
                    .send(UiEffect::OpenUrl(RELEASE_PAGE_URL.to_string()));
            }
            TrayMessageKind::OpenPath => {
                if let Some(path) = self.open_services_path.clone() {
                    let _ = self.effects_tx.send(UiEffect::OpenPath(path));
                }
            }
            TrayMessageKind::NoAction => {}
        }
    }

    fn emit_menu(&self) {
        let _ = self.effects_tx.send(UiEffect::MenuUpdated(self.menu.clone()));
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if let Some(handle) = self.update_timer.take() {
            handle.abort();
        }
    }
}
