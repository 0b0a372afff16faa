#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unused_self
)]

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use pitchsmith::config::Config;
use pitchsmith::dispatch::Dispatcher;
use pitchsmith::generation::{FallbackPipeline, OpenAiCompatibleGenerator};
use pitchsmith::identity::DefaultIdGenerator;
use pitchsmith::persistence::JsonlEvaluationLog;
use pitchsmith::scoring;
use pitchsmith::sessions::{create_session_store, SystemClock};
use pitchsmith::telegram::{TelegramClient, UpdatePoller};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    #[value(name = "bash")]
    Bash,
    #[value(name = "fish")]
    Fish,
    #[value(name = "zsh")]
    Zsh,
    #[value(name = "powershell")]
    PowerShell,
    #[value(name = "elvish")]
    Elvish,
}

/// `PitchSmith` - a persuasion coach that never drops a chat.
#[derive(Parser, Debug)]
#[command(name = "pitchsmith")]
#[command(version)]
#[command(about = "Telegram persuasion-coaching bot.", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Telegram long-poll gateway
    #[command(long_about = "\
Start the Telegram long-poll gateway.

Connects to the Telegram Bot API, polls for updates, and coaches \
users through persuasion pitches. The bot token comes from the \
config file or the PITCHSMITH_BOT_TOKEN / TELEGRAM_BOT_TOKEN \
environment variables. Runs until interrupted with Ctrl-C.

Examples:
  pitchsmith run
  PITCHSMITH_BOT_TOKEN=123:abc pitchsmith run
  RUST_LOG=debug pitchsmith run")]
    Run,

    /// Score a pitch offline and print the evaluation as JSON
    #[command(long_about = "\
Score a pitch offline and print the evaluation as JSON.

Runs the deterministic persuasion scorer on the given text without \
touching Telegram or any generation backend. Useful for inspecting \
how the five sub-scores respond to a draft.

Examples:
  pitchsmith score \"We can cut costs by 40% this quarter\"
  pitchsmith score \"$(cat pitch.txt)\"")]
    Score {
        /// The pitch text to evaluate
        text: String,
    },

    /// Show configuration and runtime status
    Status,

    /// Generate shell completion script to stdout
    #[command(long_about = "\
Generate shell completion scripts for `pitchsmith`.

The script is printed to stdout so it can be sourced directly:

Examples:
  source <(pitchsmith completions bash)
  pitchsmith completions zsh > ~/.zfunc/_pitchsmith
  pitchsmith completions fish > ~/.config/fish/completions/pitchsmith.fish")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var("PITCHSMITH_CONFIG_DIR", config_dir);
    }

    // Completions must remain stdout-only and should not load config or
    // initialize logging, or stray log lines would corrupt sourced scripts.
    if let Commands::Completions { shell } = &cli.command {
        let mut stdout = std::io::stdout().lock();
        write_shell_completion(*shell, &mut stdout)?;
        return Ok(());
    }

    // Respects RUST_LOG, defaults to INFO.
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Scoring needs no config; keep it usable on a fresh machine.
    if let Commands::Score { text } = &cli.command {
        let evaluation = scoring::score(text);
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
        return Ok(());
    }

    let mut config = Config::load_or_init().await?;
    config.apply_env_overrides();

    match cli.command {
        Commands::Completions { .. } | Commands::Score { .. } => unreachable!(),

        Commands::Run => run_gateway(config).await,

        Commands::Status => {
            println!("PitchSmith Status");
            println!();
            println!("Version:      {}", env!("CARGO_PKG_VERSION"));
            println!("Config:       {}", config.config_path.display());
            println!(
                "Bot token:    {}",
                if config.telegram.bot_token.is_empty() {
                    "(not set)"
                } else {
                    "(set)"
                }
            );
            println!("API base:     {}", config.telegram.api_base);
            println!(
                "Backup IP:    {}",
                config.telegram.api_ip.as_deref().unwrap_or("(none)")
            );
            println!(
                "Poll timeout: {}s, interval {}ms",
                config.telegram.poll_timeout_secs, config.telegram.poll_interval_ms
            );
            println!();
            println!("Generation:   {}", config.generation.model);
            println!("  Endpoint:   {}", config.generation.base_url);
            println!(
                "  API key:    {}",
                if config.generation.api_key.is_some() {
                    "(set)"
                } else {
                    "(not set)"
                }
            );
            println!();
            println!("Sessions:     in-memory, {}min idle TTL", config.sessions.ttl_minutes);
            println!("Evaluations:  {}", config.evaluation_log_path().display());
            Ok(())
        }
    }
}

async fn run_gateway(config: Config) -> Result<()> {
    if config.telegram.bot_token.trim().is_empty() {
        bail!(
            "no bot token configured; set telegram.bot_token in {} or the \
             PITCHSMITH_BOT_TOKEN environment variable",
            config.config_path.display()
        );
    }

    let ids = Arc::new(DefaultIdGenerator::new());
    let client = Arc::new(TelegramClient::from_config(&config.telegram, ids.clone()));
    let sessions = create_session_store();
    let session_ttl = Duration::from_secs(config.sessions.ttl_minutes * 60);

    let generator = Arc::new(OpenAiCompatibleGenerator::from_config(&config.generation));
    let fallback = FallbackPipeline::new(
        Arc::new(OpenAiCompatibleGenerator::from_config(&config.generation)),
        session_ttl,
    );
    let evaluations = Arc::new(JsonlEvaluationLog::new(config.evaluation_log_path()));

    let dispatcher = Dispatcher::new(
        sessions,
        client.clone(),
        generator,
        fallback,
        evaluations,
        ids,
        Arc::new(SystemClock),
        session_ttl,
    );

    let stop = Arc::new(AtomicBool::new(false));
    let mut poller = UpdatePoller::new(&config.telegram, client, dispatcher, stop.clone());

    let signal_stop = stop.clone();
    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to listen for shutdown signal");
            return;
        }
        info!("shutdown requested");
        signal_stop.store(true, Ordering::Relaxed);
    });

    info!("starting PitchSmith gateway");
    poller.run().await;
    info!("goodbye");
    Ok(())
}

fn write_shell_completion<W: Write>(shell: CompletionShell, writer: &mut W) -> Result<()> {
    use clap_complete::generate;
    use clap_complete::shells;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin_name.clone(), writer),
        CompletionShell::PowerShell => {
            generate(shells::PowerShell, &mut cmd, bin_name.clone(), writer);
        }
        CompletionShell::Elvish => generate(shells::Elvish, &mut cmd, bin_name, writer),
    }

    writer.flush()?;
    Ok(())
}
