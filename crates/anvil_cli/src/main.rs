mod commands;
mod console;
mod output;

use std::path::PathBuf;

use anvil_core::config;
use clap::{Parser, Subcommand};
use miette::Result;
use tracing::info;

#[derive(Parser)]
#[command(name = "anvil")]
#[command(about = "Run and inspect Anvil chat bots")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file path
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Also write logs to daily files in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and serve commands
    Run,
    /// Load all fragments and report what would be registered
    Check,
    /// Dispatch a single message through an offline bot
    Try {
        /// Message content, including the prefix
        content: String,
        /// Author id (defaults to the configured owner)
        #[arg(long)]
        author: Option<u64>,
    },
    /// Settings management
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective settings
    Show,
    /// Write a default settings file
    Init {
        /// Path to write
        #[arg(default_value = "anvil.toml")]
        path: PathBuf,
    },
}

fn init_logging(debug: bool, log_dir: Option<&PathBuf>) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if debug {
                EnvFilter::new("anvil_core=debug,anvil_discord=debug,anvil_cli=debug,warn")
            } else {
                EnvFilter::new("anvil_core=info,anvil_discord=info,anvil_cli=info,warn")
            }
        })
    };

    let console = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_timer(fmt::time::LocalTime::rfc_3339())
        .compact();

    let file = log_dir.map(|dir| {
        std::fs::create_dir_all(dir).ok();
        let appender = tracing_appender::rolling::daily(dir, "anvil.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        // Keep the writer alive for the whole process
        Box::leak(Box::new(guard));
        fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_line_number(true)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter())
        .with(console)
        .with(file)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .rgb_colors(miette::RgbColors::Preferred)
                .with_cause_chain()
                .with_syntax_highlighting(miette::highlighters::SyntectHighlighter::default())
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))?;
    miette::set_panic_hook();
    let cli = Cli::parse();

    init_logging(cli.debug, cli.log_dir.as_ref());

    if let Commands::Config {
        cmd: ConfigCommands::Init { path },
    } = &cli.command
    {
        return commands::config::init(path).await;
    }

    let settings = if let Some(config_path) = &cli.config {
        info!("Loading settings from: {:?}", config_path);
        config::load_settings(config_path).await?
    } else {
        info!("Loading settings from standard locations");
        config::load_settings_from_standard_locations().await?
    };

    match cli.command {
        Commands::Run => commands::bot::run(settings).await?,
        Commands::Check => commands::bot::check(settings).await?,
        Commands::Try { content, author } => {
            commands::bot::try_message(settings, &content, author).await?
        }
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Show => commands::config::show(&settings).await?,
            ConfigCommands::Init { .. } => unreachable!("handled before settings load"),
        },
    }

    Ok(())
}
