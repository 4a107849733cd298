//! Clipboard delivery
//!
//! The final normalized transcript goes to the system clipboard via
//! wl-copy. One call, one side effect; failure is logged by the daemon and
//! never aborts the pipeline. An empty transcript never reaches this module.

use crate::error::OutputError;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Destination for finished transcripts
#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<(), OutputError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Clipboard sink backed by wl-copy
pub struct ClipboardSink;

#[async_trait]
impl OutputSink for ClipboardSink {
    async fn deliver(&self, text: &str) -> Result<(), OutputError> {
        if text.is_empty() {
            return Ok(());
        }

        let mut child = Command::new("wl-copy")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    OutputError::WlCopyNotFound
                } else {
                    OutputError::WriteFailed(e.to_string())
                }
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| OutputError::WriteFailed(e.to_string()))?;

            // Close stdin to signal EOF
            drop(stdin);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| OutputError::WriteFailed(e.to_string()))?;

        if !status.success() {
            return Err(OutputError::WriteFailed(
                "wl-copy exited with error".to_string(),
            ));
        }

        tracing::info!("Text copied to clipboard ({} chars)", text.chars().count());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "clipboard (wl-copy)"
    }
}
