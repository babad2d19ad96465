use super::Ctx;
use crate::output::{pretty_kv, render};
use anyhow::{Context as _, Result};
use clap::Args;
use memories_core::config::BOARD_DIR;
use memories_core::db::open_store;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite `.memories/config.toml` even if the board already exists.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "# Badge thresholds. Counts are inclusive.\n\
    [badges]\n\
    streak_days = 7\n\
    post_count = 20\n\
    group_age_months = 12\n\
    group_likes = 10000\n\
    post_likes = 10000\n\
    inline_timeout_ms = 2000\n\
    # Calendar dates for the streak are taken at this offset from UTC.\n\
    streak_utc_offset_minutes = 0\n\
    \n\
    [sweep]\n\
    run_at = \"00:00:00\"\n\
    per_group_timeout_secs = 30\n\
    \n\
    [store]\n\
    busy_timeout_ms = 5000\n";

const GITIGNORE: &str = "memories.db\nmemories.db-wal\nmemories.db-shm\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    board_dir: PathBuf,
    config_path: PathBuf,
    db_path: PathBuf,
}

/// Execute `mg init`. Creates the board skeleton and the database:
///
/// ```text
/// .memories/
///   config.toml   (defaults, ready to edit)
///   .gitignore    (the database and its WAL files)
///   memories.db   (unless `--db`, `MEMORIES_DB`, or `[store].path` say otherwise)
/// ```
///
/// # Errors
///
/// Returns an error if `.memories/` exists and `--force` is not set, or if a
/// filesystem or database step fails.
pub fn run_init(args: &InitArgs, ctx: &Ctx) -> Result<()> {
    let board_dir = ctx.project_root.join(BOARD_DIR);
    if board_dir.exists() && !args.force {
        anyhow::bail!("{BOARD_DIR}/ already exists. Use `mg init --force` to reinitialize.");
    }

    std::fs::create_dir_all(&board_dir)
        .with_context(|| format!("Failed to create {}", board_dir.display()))?;

    let config_path = board_dir.join("config.toml");
    std::fs::write(&config_path, CONFIG_TOML)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let gitignore_path = board_dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write {}", gitignore_path.display()))?;

    let db_path = ctx.config.db_path.clone();
    open_store(&db_path, ctx.config.project.store.busy_timeout())?;
    tracing::info!(db = %db_path.display(), "board initialized");

    let out = InitOutput {
        board_dir,
        config_path,
        db_path,
    };
    render(ctx.output, &out, |o, w| {
        writeln!(w, "✓ Initialized {BOARD_DIR}/")?;
        pretty_kv(w, "Config", o.config_path.display().to_string())?;
        pretty_kv(w, "Database", o.db_path.display().to_string())?;
        writeln!(w)?;
        writeln!(w, "Next: mg group create --name <name> --password <password>")
    })
}

#[cfg(test)]
mod tests {
    use super::CONFIG_TOML;

    #[test]
    fn template_parses_to_defaults() {
        let parsed: memories_core::config::ProjectConfig =
            toml::from_str(CONFIG_TOML).expect("template parses");
        let defaults = memories_core::config::ProjectConfig::default();
        assert_eq!(parsed.badges, defaults.badges);
        assert_eq!(parsed.sweep, defaults.sweep);
        assert_eq!(parsed.store, defaults.store);
        parsed.validate().expect("template is valid");
    }
}
