use anyhow::{Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::loop_worker::{sampling_loop, SamplingContext};

/// Owns the sampling task. At most one runs at a time.
#[derive(Default)]
pub struct SamplerController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SamplerController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Starts sampling. Returns `false` if a sampler is already running.
    pub fn start(&mut self, ctx: SamplingContext) -> bool {
        if self.is_running() {
            return false;
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(sampling_loop(ctx, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        true
    }

    /// Stops sampling and waits for the task, so no tick lands after this
    /// returns. Returns `false` if nothing was running.
    pub async fn stop(&mut self) -> Result<bool> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        let Some(handle) = self.handle.take() else {
            return Ok(false);
        };
        handle
            .await
            .context("sampling loop task failed to join")?;
        info!("Frame sampler stopped");
        Ok(true)
    }
}

impl Drop for SamplerController {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}
