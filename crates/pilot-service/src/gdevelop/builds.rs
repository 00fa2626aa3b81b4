//! Preview and export builds.
//!
//! A build writes the session's game document under the sessions directory
//! and invokes the export CLI against it. Preview produces an HTML5 bundle
//! served from the builds directory; export produces a downloadable archive.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, instrument};

use pilot_core::GameSession;

use super::cli::{CliError, GDevelopCli};
use crate::config::GDevelopConfig;

/// Runs preview and export builds for sessions.
#[derive(Debug, Clone)]
pub struct BuildService {
    config: GDevelopConfig,
    cli: GDevelopCli,
}

impl BuildService {
    /// Create a build service from the engine configuration.
    #[must_use]
    pub fn new(config: GDevelopConfig) -> Self {
        let cli = GDevelopCli::new(&config);
        Self { config, cli }
    }

    /// Build an HTML5 preview bundle and return its serving URL.
    ///
    /// # Errors
    ///
    /// Returns a `CliError` when the document cannot be written or the CLI
    /// fails or times out.
    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    pub async fn preview(&self, session: &GameSession) -> Result<String, CliError> {
        let project_file = self.write_project(session).await?;
        let out_dir = self.build_dir(session).join("preview");
        let out = path_str(&out_dir);
        let project = path_str(&project_file);

        self.cli
            .run(
                &["export", "--project", &project, "--output", &out, "--target", "html5"],
                Duration::from_secs(self.config.preview_timeout_seconds),
            )
            .await?;

        info!(session_id = %session.session_id, "Preview build completed");
        Ok(format!("/builds/{}/preview/index.html", session.session_id))
    }

    /// Build a downloadable archive and return its serving URL.
    ///
    /// # Errors
    ///
    /// Returns a `CliError` when the document cannot be written or the CLI
    /// fails or times out.
    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    pub async fn export(&self, session: &GameSession) -> Result<String, CliError> {
        let project_file = self.write_project(session).await?;
        let out_dir = self.build_dir(session).join("export");
        let out = path_str(&out_dir);
        let project = path_str(&project_file);

        self.cli
            .run(
                &[
                    "export",
                    "--project",
                    &project,
                    "--output",
                    &out,
                    "--target",
                    "html5",
                    "--archive",
                ],
                Duration::from_secs(self.config.export_timeout_seconds),
            )
            .await?;

        info!(session_id = %session.session_id, "Export build completed");
        Ok(format!("/builds/{}/export/game.zip", session.session_id))
    }

    /// Write the session's game document where the CLI expects it.
    async fn write_project(&self, session: &GameSession) -> Result<PathBuf, CliError> {
        let session_dir =
            PathBuf::from(&self.config.sessions_dir).join(session.session_id.to_string());
        tokio::fs::create_dir_all(&session_dir)
            .await
            .map_err(|e| CliError::Io(e.to_string()))?;

        let project_file = session_dir.join("game.json");
        let body = serde_json::to_vec_pretty(&session.game_json)
            .map_err(|e| CliError::Io(e.to_string()))?;
        tokio::fs::write(&project_file, body)
            .await
            .map_err(|e| CliError::Io(e.to_string()))?;

        Ok(project_file)
    }

    fn build_dir(&self, session: &GameSession) -> PathBuf {
        PathBuf::from(&self.config.builds_dir).join(session.session_id.to_string())
    }
}

fn path_str(path: &PathBuf) -> String {
    path.to_string_lossy().into_owned()
}
