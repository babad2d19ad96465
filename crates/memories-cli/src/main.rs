#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use cmd::Ctx;
use memories_core::config::resolve_config;
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "mg: memory-group board with badges",
    long_about = None
)]
struct Cli {
    /// Enable debug logging (ignored when MEMORIES_LOG is set).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Board database path (overrides MEMORIES_DB and `[store].path`).
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a board",
        long_about = "Create .memories/ with a default config and an empty board database.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    mg init\n\n    # Keep the database elsewhere\n    mg --db /var/lib/memories.db init"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Board",
        about = "Manage groups",
        after_help = "EXAMPLES:\n    # Create a private group\n    mg group create --name Scouts --password pw --public false\n\n    # Groups with the most badges\n    mg group list --sort mostBadge\n\n    # Like a group\n    mg group like 3 --json"
    )]
    Group(cmd::group::GroupArgs),

    #[command(
        next_help_heading = "Board",
        about = "Manage posts",
        after_help = "EXAMPLES:\n    # Post a memory with tags\n    mg post create 3 --nickname kim --title Camp --content 'Rain all day' --tag camp --tag rain\n\n    # Search a group's posts\n    mg post list 3 --keyword rain --sort mostLiked"
    )]
    Post(cmd::post::PostArgs),

    #[command(
        next_help_heading = "Board",
        about = "Manage comments",
        after_help = "EXAMPLES:\n    # Comment on a post\n    mg comment add 12 --nickname lee --content 'Great day' --password pw\n\n    # Newest comments first\n    mg comment list 12"
    )]
    Comment(cmd::comment::CommentArgs),

    #[command(
        next_help_heading = "Badges",
        about = "Show badges",
        after_help = "EXAMPLES:\n    # Every badge and its rule\n    mg badge catalog\n\n    # Badges earned by group 3\n    mg badge list 3"
    )]
    Badge(cmd::badge::BadgeArgs),

    #[command(
        next_help_heading = "Badges",
        about = "Run the group-age sweep once",
        long_about = "Re-check the anniversary badge for every group. Safe to run from cron and alongside other writers.",
        after_help = "EXAMPLES:\n    # Daily at midnight UTC from cron\n    0 0 * * * cd /srv/board && mg sweep --json"
    )]
    Sweep,

    #[command(
        next_help_heading = "Badges",
        about = "Run the group-age sweep daily",
        long_about = "Sleep until `sweep.run_at` (UTC) and sweep every day until stopped.",
        after_help = "EXAMPLES:\n    # Foreground daily timer\n    mg schedule\n\n    # One sweep right now\n    mg schedule --once"
    )]
    Schedule(cmd::sweep::ScheduleArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Show the effective configuration",
        after_help = "EXAMPLES:\n    mg config --json"
    )]
    Config,

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    mg completions bash\n\n    # Generate zsh completions\n    mg completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("MEMORIES_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "memories=debug,info"
        } else {
            "memories=info,warn"
        })
    });

    let format = env::var("MEMORIES_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output; logs always go to stderr.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let project_root = env::current_dir()?;
    let config = resolve_config(&project_root, cli.json, cli.db.as_deref())?;
    debug!(
        db = %config.db_path.display(),
        output = %config.resolved_output,
        "configuration resolved"
    );

    let ctx = Ctx {
        output: OutputMode::from_resolved(&config.resolved_output),
        project_root,
        config,
    };

    match cli.command {
        Commands::Init(args) => cmd::init::run_init(&args, &ctx),
        Commands::Group(args) => cmd::group::run_group(&args, &ctx),
        Commands::Post(args) => cmd::post::run_post(&args, &ctx),
        Commands::Comment(args) => cmd::comment::run_comment(&args, &ctx),
        Commands::Badge(args) => cmd::badge::run_badge(&args, &ctx),
        Commands::Sweep => cmd::sweep::run_sweep(&ctx),
        Commands::Schedule(args) => cmd::sweep::run_schedule(&args, &ctx),
        Commands::Config => cmd::config::run_config(&ctx),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let fallback_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Pretty
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if err.downcast_ref::<cmd::Reported>().is_none() {
                // Nothing has been shown yet: config, filesystem, or database
                // setup failed before a command could report it.
                let shown = render_error(fallback_mode, &CliError::new(format!("{err:#}")));
                if shown.is_err() {
                    eprintln!("error: {err:#}");
                }
            }
            ExitCode::FAILURE
        }
    }
}
