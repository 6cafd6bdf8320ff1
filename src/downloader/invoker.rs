use std::sync::Arc;

use crate::downloader::{DownloadOutcome, DownloadRequest, DownloadState, MediaEngine};
use crate::errors::{AppError, Result};
use crate::runner::{CommandLine, ExitState, ProcessRunner, SearchPath};
use crate::utils::ensure_dir_exists;

/// Runs one download engine to completion in the foreground.
pub struct EngineInvoker {
    runner: Arc<dyn ProcessRunner>,
    search_path: SearchPath,
}

impl EngineInvoker {
    pub fn new(runner: Arc<dyn ProcessRunner>, search_path: SearchPath) -> Self {
        Self { runner, search_path }
    }

    /// Spawns `command` with the terminal attached and classifies how it ended.
    ///
    /// The engine's own progress output goes straight to the user. There is no
    /// timeout: downloads run until they finish or the user presses Ctrl+C.
    pub async fn execute(&self, command: &CommandLine) -> Result<DownloadOutcome> {
        log::info!("🚀 [ENGINE] Running: {}", command);
        let start_time = std::time::Instant::now();

        let state = self.runner.run_inherited(command, &self.search_path).await?;
        let outcome = match state {
            ExitState::Exited(0) => DownloadOutcome::Success,
            ExitState::Exited(code) => DownloadOutcome::ToolFailure(code),
            ExitState::Interrupted => DownloadOutcome::Cancelled,
            ExitState::Killed | ExitState::TimedOut => DownloadOutcome::ToolFailure(-1),
        };

        log::info!(
            "📊 [ENGINE] {} finished with {:?} (took {:.2} seconds)",
            command.program,
            outcome,
            start_time.elapsed().as_secs_f64()
        );
        Ok(outcome)
    }

    /// Creates the output directory, builds the engine arguments and runs them.
    pub async fn download(&self, engine: &dyn MediaEngine, request: &DownloadRequest) -> Result<DownloadOutcome> {
        if engine.platform() != request.platform() {
            return Err(AppError::Validation(format!(
                "{} cannot download {} links",
                engine.name(),
                request.platform().display_name()
            )));
        }

        ensure_dir_exists(request.output_directory()).await?;
        let command = engine.build_arguments(request);

        let running = DownloadState::NotStarted.start();
        log::debug!("📁 [ENGINE] {} -> {:?}", request.url(), running);
        let outcome = self.execute(&command).await?;
        log::debug!("📁 [ENGINE] {} -> {:?}", request.url(), running.finish(outcome));

        Ok(outcome)
    }
}
