use std::process::Stdio;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{ActiveWindowData, WindowSampler};

/// Runs a helper program that prints the focused window as a single JSON object. Empty output
/// means no window is focused. The child is killed when the future is dropped, so a timeout
/// around [WindowSampler::sample] also stops a hanging helper.
pub struct CommandWindowSampler {
    program: String,
    args: Vec<String>,
}

impl CommandWindowSampler {
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("monitor.sampler_command is empty"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl WindowSampler for CommandWindowSampler {
    #[instrument(skip(self), fields(program = %self.program))]
    async fn sample(&mut self) -> Result<Option<ActiveWindowData>> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to start {}", self.program))?;

        if !output.status.success() {
            bail!(
                "Sampler exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            debug!("Sampler reported no focused window");
            return Ok(None);
        }

        let data = serde_json::from_str::<ActiveWindowData>(stdout)
            .with_context(|| format!("Sampler printed malformed JSON {stdout:?}"))?;
        Ok(Some(data))
    }
}
