use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use evidence_tray::capture::{ClipboardReader, MacOsScreenCapture, ScreenCapture, SystemClipboard};
use evidence_tray::config::{AppConfig, ensure_sample_config};
use evidence_tray::evidence::{EvidenceStore, JsonlEvidenceStore, save_codeblock};
use evidence_tray::models::EvidenceKind;
use evidence_tray::net::{HttpSessionClient, SessionClient};
use evidence_tray::paths::{default_config_path, default_data_dir, default_settings_path};
use evidence_tray::settings::AppSettings;
use chrono::Utc;

#[derive(Debug, Parser)]
#[command(name = "evidence-tray")]
#[command(about = "Capture evidence and associate it with a remote operation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a starter config file if none exists.
    Init,
    /// Show the active operation and storage locations.
    Status,
    /// List operations available on the server.
    Operations,
    /// Make an operation active by slug.
    Use { slug: String },
    /// Create a new operation on the server and make it active.
    Create { name: String },
    /// Capture one piece of evidence for the active operation.
    Capture {
        #[command(subcommand)]
        kind: CaptureCommands,
    },
    /// List locally recorded evidence.
    Evidence,
}

#[derive(Debug, Subcommand)]
enum CaptureCommands {
    /// Interactively capture a screen area.
    Area,
    /// Interactively capture a window.
    Window,
    /// Save the clipboard's text as a codeblock.
    Codeblock,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&default_config_path())?;

    match cli.command {
        Commands::Init => {
            let path = default_config_path();
            ensure_sample_config(&path)?;
            println!("config at {}", path.display());
            Ok(())
        }
        Commands::Status => {
            let settings = AppSettings::load(default_settings_path())?;
            if settings.has_operation() {
                println!(
                    "operation: {} ({})",
                    settings.operation_name(),
                    settings.operation_slug()
                );
            } else {
                println!("operation: <none>");
            }
            println!("data dir: {}", default_data_dir().display());
            println!("evidence dir: {}", config.evidence_dir.display());
            Ok(())
        }
        Commands::Operations => {
            let client = build_client(&config)?;
            let operations = client
                .list_operations()
                .await
                .context("failed to fetch operations")?;
            if operations.is_empty() {
                println!("no operations available");
            }
            for op in operations {
                println!("{}\t{}", op.slug, op.name);
            }
            Ok(())
        }
        Commands::Use { slug } => {
            let client = build_client(&config)?;
            let operations = client
                .list_operations()
                .await
                .context("failed to fetch operations")?;
            let Some(op) = operations.into_iter().find(|op| op.slug == slug) else {
                bail!("no operation with slug {slug:?} on the server");
            };

            let mut settings = AppSettings::load(default_settings_path())?;
            settings.set_last_used_tags(Vec::new());
            settings.set_operation_details(op.slug, op.name.clone());
            println!("now using operation {}", op.name);
            Ok(())
        }
        Commands::Create { name } => {
            let name = name.trim().to_string();
            let slug = evidence_tray::slug::make_slug_from_name(&name);
            if slug.is_empty() {
                bail!("the operation name must include letters or numbers");
            }

            let client = build_client(&config)?;
            let op = client
                .create_operation(&name, &slug)
                .await
                .context("failed to create operation")?;

            let mut settings = AppSettings::load(default_settings_path())?;
            settings.set_last_used_tags(Vec::new());
            settings.set_operation_details(op.slug.clone(), op.name.clone());
            println!("created and now using operation {} ({})", op.name, op.slug);
            Ok(())
        }
        Commands::Capture { kind } => run_capture(&config, kind).await,
        Commands::Evidence => {
            let store = JsonlEvidenceStore::open(config.evidence_dir.join("evidence.jsonl"))?;
            let records = store.read_all()?;
            if records.is_empty() {
                println!("no evidence recorded yet");
            }
            for record in records {
                let tags = record
                    .tags
                    .iter()
                    .map(|tag| tag.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                println!(
                    "#{}\t{}\t{}\t{}\t[{tags}]",
                    record.id,
                    record.kind.as_str(),
                    record.operation_slug,
                    record.file_path.display(),
                );
            }
            Ok(())
        }
    }
}

async fn run_capture(config: &AppConfig, kind: CaptureCommands) -> Result<()> {
    let settings = AppSettings::load(default_settings_path())?;
    if !settings.has_operation() {
        bail!("no operation selected; run `evidence-tray use <slug>` first");
    }

    std::fs::create_dir_all(&config.evidence_dir).with_context(|| {
        format!(
            "failed to create evidence directory {}",
            config.evidence_dir.display()
        )
    })?;
    let store = JsonlEvidenceStore::open(config.evidence_dir.join("evidence.jsonl"))?;

    let (path, evidence_kind) = match kind {
        CaptureCommands::Codeblock => {
            let content = SystemClipboard.read_plaintext();
            if content.is_empty() {
                bail!("clipboard holds no text");
            }
            let path = save_codeblock(&content, &config.evidence_dir)?;
            (path, EvidenceKind::Codeblock)
        }
        CaptureCommands::Area | CaptureCommands::Window => {
            let filename = format!("capture-{}.png", Utc::now().format("%Y%m%dT%H%M%S%.3fZ"));
            let path = config.evidence_dir.join(filename);
            let capture = MacOsScreenCapture;
            let captured = match kind {
                CaptureCommands::Window => capture.capture_window(&path).await?,
                _ => capture.capture_area(&path).await?,
            };
            if !captured {
                println!("capture cancelled");
                return Ok(());
            }
            (path, EvidenceKind::Image)
        }
    };

    let evidence_id =
        store.create_evidence(&path, settings.operation_slug(), evidence_kind)?;
    let tags = settings.last_used_tags();
    if !tags.is_empty() {
        store.set_evidence_tags(tags, evidence_id)?;
    }

    println!("evidence #{evidence_id} recorded: {}", path.display());
    Ok(())
}

fn build_client(config: &AppConfig) -> Result<HttpSessionClient> {
    if config.api_base_url.is_empty() {
        bail!(
            "api_base_url is not configured; edit {}",
            default_config_path().display()
        );
    }
    Ok(HttpSessionClient::new(
        config.api_base_url.clone(),
        config.access_key.clone(),
    ))
}
