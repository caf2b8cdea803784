use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "questlog-cli", version, about = "Questlog CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Quest management
    Quest {
        #[command(subcommand)]
        action: commands::quest::QuestAction,
    },
    /// Planner task management
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Profile, progression and daily wins
    User {
        #[command(subcommand)]
        action: commands::user::UserAction,
    },
    /// Run any pending daily/weekly resets and deadline checks
    Tick,
    /// Sweep deadlines now and print the penalty status
    Curse,
    /// Keep ticking until interrupted
    Watch {
        /// Seconds between ticks
        #[arg(long, default_value = "60")]
        interval_secs: u64,
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Rules configuration
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Recent events, newest first
    History {
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Only events of this type (e.g. "quest_completed")
        #[arg(long)]
        kind: Option<String>,
    },
    /// Print shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    // stdout carries JSON; logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("QUESTLOG_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Quest { action } => commands::quest::run(action),
        Commands::Task { action } => commands::task::run(action),
        Commands::User { action } => commands::user::run(action),
        Commands::Tick => commands::tick::run_tick(),
        Commands::Curse => commands::tick::run_curse(),
        Commands::Watch {
            interval_secs,
            ticks,
        } => commands::watch::run(interval_secs, ticks),
        Commands::Config { action } => commands::config::run(action),
        Commands::History { limit, kind } => commands::history::run(limit, kind),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "questlog-cli", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
