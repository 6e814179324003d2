mod cli;

use clap::{Parser, Subcommand};
use simplelog::*;
use std::path::PathBuf;

use spotify_launcher::artwork::ArtworkCache;
use spotify_launcher::auth::TokenCache;
use spotify_launcher::config::PreferenceStore;
use spotify_launcher::launcher::Launcher;
use spotify_launcher::remote::SpotifyClient;

#[derive(Parser)]
#[command(name = "spotify-launcher")]
#[command(about = "Spotify Launcher - Control Spotify playback with launcher-style commands", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Preferences file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a query into menu entries, as typed after the keyword
    Query {
        /// Query text, e.g. track no quarter
        #[arg(value_name = "TEXT", num_args = 0..)]
        text: Vec<String>,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the action payload of a selected entry
    Select {
        /// Payload JSON, e.g. '{"command":"next","keep_displayed":true}'
        #[arg(value_name = "PAYLOAD_JSON")]
        payload: String,

        /// Print any refreshed entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive mode - a launcher session on stdin
    Interactive,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Every mode is a CLI mode: silent unless verbose
    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Off
    };

    if log_level != LevelFilter::Off {
        CombinedLogger::init(vec![TermLogger::new(
            log_level,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        )])?;
    }

    let config_path = cli.config.unwrap_or_else(PreferenceStore::default_path);
    log::info!("Loading preferences from {}", config_path.display());
    let store = PreferenceStore::load(config_path)?;

    let token_cache = TokenCache::new(TokenCache::default_path());
    log::debug!("Using token cache {}", token_cache.path().display());
    let launcher = Launcher::new(SpotifyClient::new(token_cache)?, store);
    let artwork = ArtworkCache::new(ArtworkCache::default_dir());

    match cli.command {
        Commands::Query { text, json } => {
            cli::handle_query(&launcher, &artwork, &text.join(" "), json).await?;
        }
        Commands::Select { payload, json } => {
            cli::handle_select(&launcher, &artwork, &payload, json).await?;
        }
        Commands::Interactive => {
            cli::handle_interactive(&launcher, &artwork).await?;
        }
    }

    Ok(())
}
