//! parley CLI: the main entry point.
//!
//! Commands:
//! - `ask`: One-shot request to a profile
//! - `joke`: Ask a profile for a joke
//! - `chat`: Interactive multi-turn chat with tools
//! - `battle`: Let several profiles talk to each other
//! - `profiles`: List configured profiles

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "parley: talk to language-model backends, give them tools, make them argue",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of ~/.parley/config.toml
    #[arg(long, global = true, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single request and stream the answer
    Ask {
        /// The request text; the profile's default request when omitted
        request: Option<String>,

        /// Profile to use (`-` for the default)
        #[arg(short, long, default_value = "-")]
        profile: String,

        /// System message replacing the profile's persona
        #[arg(short, long)]
        system: Option<String>,

        /// Ask for a JSON object answer
        #[arg(long)]
        json: bool,

        /// Wait for the whole answer instead of streaming
        #[arg(long)]
        no_stream: bool,

        /// Offer the host tools to the model
        #[arg(long)]
        tools: bool,
    },

    /// Ask a profile for a joke
    Joke {
        #[arg(short, long, default_value = "-")]
        profile: String,

        #[arg(long, default_value = "sad")]
        joke_type: String,

        #[arg(long, default_value = "death")]
        audience: String,

        /// Extra tone appended to the joke persona
        #[arg(long)]
        tone: Option<String>,
    },

    /// Interactive chat; an empty line or `exit` quits
    Chat {
        #[arg(short, long, default_value = "-")]
        profile: String,

        /// Do not offer the host tools
        #[arg(long)]
        no_tools: bool,

        #[arg(long)]
        no_stream: bool,
    },

    /// Run a battle between profiles
    Battle {
        /// Comma-separated profile names (default: `[battle].profiles`)
        #[arg(long, value_delimiter = ',')]
        profiles: Vec<String>,

        /// Number of rounds (default: `[battle].rounds`)
        #[arg(short, long)]
        rounds: Option<usize>,

        /// First message, standing in for the first participant's first turn
        #[arg(long, conflicts_with = "no_seed")]
        seed: Option<String>,

        /// Let the first participant open with a model turn
        #[arg(long)]
        no_seed: bool,
    },

    /// List configured profiles
    Profiles,
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ask {
            request,
            profile,
            system,
            json,
            no_stream,
            tools,
        } => {
            let args = commands::ask::AskArgs {
                request: request.unwrap_or_default(),
                profile,
                system: system.unwrap_or_default(),
                json,
                stream: !no_stream,
                tools,
            };
            commands::ask::run(config, args).await?
        }
        Commands::Joke {
            profile,
            joke_type,
            audience,
            tone,
        } => commands::joke::run(config, &profile, &joke_type, &audience, tone.as_deref()).await?,
        Commands::Chat {
            profile,
            no_tools,
            no_stream,
        } => commands::chat::run(config, &profile, !no_tools, !no_stream).await?,
        Commands::Battle {
            profiles,
            rounds,
            seed,
            no_seed,
        } => {
            let rounds = rounds.unwrap_or(config.battle.rounds as usize);
            let seed = match (no_seed, seed) {
                (true, _) => None,
                (false, Some(seed)) => Some(seed),
                (false, None) => config.battle.seed.clone(),
            };
            commands::battle::run(config, profiles, rounds, seed).await?
        }
        Commands::Profiles => commands::profiles::run(&config),
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so streamed answers on stdout stay clean
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("parley: {e}");
        std::process::exit(1);
    }
}
