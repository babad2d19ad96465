use crate::badge::BadgeThresholds;
use anyhow::{Context, Result, bail};
use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Board directory under the project root.
pub const BOARD_DIR: &str = ".memories";

/// Environment variable overriding the database path.
pub const DB_ENV: &str = "MEMORIES_DB";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub badges: BadgeSettings,
    #[serde(default)]
    pub sweep: SweepSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub output: Option<String>,
}

/// `[badges]`: rule thresholds plus evaluation knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeSettings {
    #[serde(flatten)]
    pub thresholds: BadgeThresholds,
    /// Budget for the checks a single mutation triggers.
    #[serde(default = "default_inline_timeout_ms")]
    pub inline_timeout_ms: u64,
    /// Offset from UTC, in minutes, that defines calendar dates for the
    /// posting streak.
    #[serde(default)]
    pub streak_utc_offset_minutes: i32,
}

impl Default for BadgeSettings {
    fn default() -> Self {
        Self {
            thresholds: BadgeThresholds::default(),
            inline_timeout_ms: default_inline_timeout_ms(),
            streak_utc_offset_minutes: 0,
        }
    }
}

impl BadgeSettings {
    #[must_use]
    pub const fn inline_timeout(&self) -> Duration {
        Duration::from_millis(self.inline_timeout_ms)
    }

    /// The streak offset as a chrono offset. Out-of-range values fall back to
    /// UTC; [`ProjectConfig::validate`] rejects them at load time.
    #[must_use]
    pub fn streak_offset(&self) -> FixedOffset {
        self.streak_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }
}

/// `[sweep]`: the daily age re-check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Daily fire time, UTC.
    #[serde(default = "default_run_at")]
    pub run_at: NaiveTime,
    #[serde(default = "default_per_group_timeout_secs")]
    pub per_group_timeout_secs: u64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            run_at: default_run_at(),
            per_group_timeout_secs: default_per_group_timeout_secs(),
        }
    }
}

impl SweepSettings {
    #[must_use]
    pub const fn per_group_timeout(&self) -> Duration {
        Duration::from_secs(self.per_group_timeout_secs)
    }
}

/// `[store]`: where the database lives and how long writers wait on locks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Database path, relative to the project root when not absolute.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StoreSettings {
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl ProjectConfig {
    /// Reject values that parse but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.badges.thresholds.streak_days == 0 {
            bail!("badges.streak_days must be at least 1");
        }
        if self.badges.streak_utc_offset_minutes.abs() >= 24 * 60 {
            bail!(
                "badges.streak_utc_offset_minutes must be within ±1439, got {}",
                self.badges.streak_utc_offset_minutes
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub db_path: PathBuf,
    pub resolved_output: String,
}

/// Load `.memories/config.toml` under `project_root`, or defaults when the
/// file is absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read, parsed, or
/// validated.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(BOARD_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid settings in {}", path.display()))?;
    Ok(config)
}

/// Resolve the database path: `--db` flag, then `MEMORIES_DB`, then
/// `[store].path`, then `.memories/memories.db`.
#[must_use]
pub fn resolve_db_path(
    project_root: &Path,
    cli_db: Option<&Path>,
    env_db: Option<PathBuf>,
    config: &StoreSettings,
) -> PathBuf {
    let chosen = cli_db
        .map(Path::to_path_buf)
        .or(env_db)
        .or_else(|| config.path.clone())
        .unwrap_or_else(|| PathBuf::from(BOARD_DIR).join("memories.db"));

    if chosen.is_absolute() {
        chosen
    } else {
        project_root.join(chosen)
    }
}

/// Load project config and resolve every derived setting.
///
/// # Errors
///
/// Returns an error if the project config is unreadable or invalid.
pub fn resolve_config(
    project_root: &Path,
    cli_json: bool,
    cli_db: Option<&Path>,
) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;

    let env_db = env::var_os(DB_ENV)
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from);
    let db_path = resolve_db_path(project_root, cli_db, env_db, &project.store);

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, project.output.clone(), env_format)?;

    Ok(EffectiveConfig {
        project,
        db_path,
        resolved_output,
    })
}

fn resolve_output(
    cli_json: bool,
    config_output: Option<String>,
    env_format: Option<String>,
) -> Result<String> {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return Ok("json".to_string());
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return Ok(mode.to_string());
    }

    if let Some(mode) = config_output.as_deref().and_then(normalize_output_mode) {
        return Ok(mode.to_string());
    }

    if std::io::stdout().is_terminal() {
        Ok("pretty".to_string())
    } else {
        Ok("text".to_string())
    }
}

const fn default_inline_timeout_ms() -> u64 {
    2_000
}

const fn default_run_at() -> NaiveTime {
    NaiveTime::MIN
}

const fn default_per_group_timeout_secs() -> u64 {
    30
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(root: &Path, body: &str) {
        let dir = root.join(BOARD_DIR);
        std::fs::create_dir_all(&dir).expect("create board dir");
        std::fs::write(dir.join("config.toml"), body).expect("write config");
    }

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("temp dir");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.badges, BadgeSettings::default());
        assert_eq!(cfg.badges.thresholds.post_count, 20);
        assert_eq!(cfg.badges.inline_timeout_ms, 2_000);
        assert_eq!(cfg.sweep.run_at, NaiveTime::MIN);
        assert_eq!(cfg.sweep.per_group_timeout_secs, 30);
        assert_eq!(cfg.store.busy_timeout_ms, 5_000);
    }

    #[test]
    fn badges_table_flattens_thresholds() {
        let root = tempfile::tempdir().expect("temp dir");
        write_config(
            root.path(),
            r#"
[badges]
post_count = 3
post_likes = 50
streak_utc_offset_minutes = 540

[sweep]
run_at = "03:30:00"
"#,
        );

        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.badges.thresholds.post_count, 3);
        assert_eq!(cfg.badges.thresholds.post_likes, 50);
        assert_eq!(cfg.badges.thresholds.streak_days, 7);
        assert_eq!(cfg.badges.streak_offset().local_minus_utc(), 9 * 3600);
        assert_eq!(
            cfg.sweep.run_at,
            NaiveTime::from_hms_opt(3, 30, 0).expect("valid time")
        );
    }

    #[test]
    fn malformed_config_reports_path() {
        let root = tempfile::tempdir().expect("temp dir");
        write_config(root.path(), "[badges\npost_count = ");

        let err = load_project_config(root.path()).expect_err("parse must fail");
        assert!(format!("{err:#}").contains("config.toml"));
    }

    #[test]
    fn zero_streak_days_is_rejected() {
        let root = tempfile::tempdir().expect("temp dir");
        write_config(root.path(), "[badges]\nstreak_days = 0\n");

        let err = load_project_config(root.path()).expect_err("validation must fail");
        assert!(format!("{err:#}").contains("streak_days"));
    }

    #[test]
    fn out_of_range_offset_is_rejected() {
        let cfg = ProjectConfig {
            badges: BadgeSettings {
                streak_utc_offset_minutes: 24 * 60,
                ..BadgeSettings::default()
            },
            ..ProjectConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert_eq!(cfg.badges.streak_offset().local_minus_utc(), 0);
    }

    #[test]
    fn db_path_precedence() {
        let root = Path::new("/srv/board");
        let store = StoreSettings {
            path: Some(PathBuf::from("data/board.db")),
            ..StoreSettings::default()
        };

        assert_eq!(
            resolve_db_path(root, None, None, &StoreSettings::default()),
            PathBuf::from("/srv/board/.memories/memories.db")
        );
        assert_eq!(
            resolve_db_path(root, None, None, &store),
            PathBuf::from("/srv/board/data/board.db")
        );
        assert_eq!(
            resolve_db_path(root, None, Some(PathBuf::from("/tmp/env.db")), &store),
            PathBuf::from("/tmp/env.db")
        );
        assert_eq!(
            resolve_db_path(
                root,
                Some(Path::new("cli.db")),
                Some(PathBuf::from("/tmp/env.db")),
                &store
            ),
            PathBuf::from("/srv/board/cli.db")
        );
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        let output = resolve_output(true, Some("pretty".to_string()), Some("text".to_string()))
            .expect("resolve should succeed");
        assert_eq!(output, "json");
    }

    #[test]
    fn legacy_aliases_are_normalized() {
        let pretty = resolve_output(false, Some("table".to_string()), Some("human".to_string()))
            .expect("resolve should succeed");
        assert_eq!(pretty, "pretty");

        let text = resolve_output(false, Some("human".to_string()), Some("table".to_string()))
            .expect("resolve should succeed");
        assert_eq!(text, "text");
    }
}
