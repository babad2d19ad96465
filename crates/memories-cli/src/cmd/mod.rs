pub mod badge;
pub mod comment;
pub mod completions;
pub mod config;
pub mod group;
pub mod init;
pub mod post;
pub mod sweep;

use crate::output::{CliError, OutputMode, render_error};
use anyhow::Result;
use memories_core::board::{BoardError, PageRequest};
use memories_core::config::EffectiveConfig;
use memories_core::db::try_open_store;
use memories_core::error::ErrorCode;
use rusqlite::Connection;
use std::path::PathBuf;

/// What every command needs: where the board lives, how it is tuned, and how
/// to print.
#[derive(Debug)]
pub struct Ctx {
    pub project_root: PathBuf,
    pub config: EffectiveConfig,
    pub output: OutputMode,
}

impl Ctx {
    /// Open the board database, or report that `mg init` has not run.
    pub fn open(&self) -> Result<Connection> {
        let busy = self.config.project.store.busy_timeout();
        match try_open_store(&self.config.db_path, busy)? {
            Some(conn) => Ok(conn),
            None => Err(self.fail(&CliError::coded(
                format!(
                    "no board database at {}",
                    self.config.db_path.display()
                ),
                ErrorCode::NotInitialized,
            ))),
        }
    }

    /// Render `err` to stderr and turn it into the command's failure.
    pub fn fail(&self, err: &CliError) -> anyhow::Error {
        if let Err(render) = render_error(self.output, err) {
            return render;
        }
        Reported(err.message.clone()).into()
    }

    pub fn board_failure(&self, err: &BoardError) -> anyhow::Error {
        tracing::debug!(code = err.code().code(), error = %err, "board operation failed");
        self.fail(&CliError::from(err))
    }
}

/// A failure already shown to the user; `main` only sets the exit code.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Reported(pub String);

/// Paging flags shared by every listing command.
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct PageArgs {
    /// Page number, starting at 1.
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Items per page (1..=100).
    #[arg(long, default_value_t = 10)]
    pub page_size: u32,
}

impl From<PageArgs> for PageRequest {
    fn from(args: PageArgs) -> Self {
        Self::new(args.page, args.page_size)
    }
}

/// Human rendering for optional text fields.
pub fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}
