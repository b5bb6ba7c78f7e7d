use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Interactive screen capture. Both calls eventually complete with `true`
/// once an image has been written to `output_path`, or `false` when the user
/// cancelled the capture.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    async fn capture_area(&self, output_path: &Path) -> Result<bool>;
    async fn capture_window(&self, output_path: &Path) -> Result<bool>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MacOsScreenCapture;

// Interactive selection can sit open for a while; only guard against a hung
// helper process.
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(300);

impl MacOsScreenCapture {
    async fn run(&self, extra_arg: &str, output_path: &Path) -> Result<bool> {
        let mut command = Command::new("screencapture");
        command.arg(extra_arg).arg("-t").arg("png").arg(output_path);

        let status = timeout(CAPTURE_TIMEOUT, command.status())
            .await
            .map_err(|_| {
                anyhow!(
                    "screencapture timed out after {:.0}s",
                    CAPTURE_TIMEOUT.as_secs_f32()
                )
            })?
            .context("failed to execute screencapture")?;

        if !status.success() {
            // Escape during interactive selection exits non-zero without
            // writing a file; treat it as cancellation, not an error.
            return Ok(false);
        }

        Ok(output_path.exists())
    }
}

#[async_trait]
impl ScreenCapture for MacOsScreenCapture {
    async fn capture_area(&self, output_path: &Path) -> Result<bool> {
        self.run("-i", output_path).await
    }

    async fn capture_window(&self, output_path: &Path) -> Result<bool> {
        self.run("-w", output_path).await
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MockScreenCapture;

#[async_trait]
impl ScreenCapture for MockScreenCapture {
    async fn capture_area(&self, output_path: &Path) -> Result<bool> {
        std::fs::write(output_path, b"mock-area-image")
            .with_context(|| format!("failed to write mock capture {}", output_path.display()))?;
        Ok(true)
    }

    async fn capture_window(&self, output_path: &Path) -> Result<bool> {
        std::fs::write(output_path, b"mock-window-image")
            .with_context(|| format!("failed to write mock capture {}", output_path.display()))?;
        Ok(true)
    }
}

/// Clipboard access. Returns an empty string when the clipboard holds no
/// plain text.
pub trait ClipboardReader: Send + Sync {
    fn read_plaintext(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl ClipboardReader for SystemClipboard {
    fn read_plaintext(&self) -> String {
        arboard::Clipboard::new()
            .and_then(|mut clipboard| clipboard.get_text())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Clone)]
pub struct FixedClipboard {
    pub text: String,
}

impl ClipboardReader for FixedClipboard {
    fn read_plaintext(&self) -> String {
        self.text.clone()
    }
}
