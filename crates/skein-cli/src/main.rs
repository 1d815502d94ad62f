use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod util;

use commands::{run_conversation, run_import, run_timeline, ConversationArgs, TimelineArgs};

#[derive(Parser)]
#[command(name = "skein")]
#[command(about = "Browse threaded conversations and timelines from a local note store")]
struct Cli {
    /// Data directory (item store, view state, config)
    #[arg(long, short = 'd')]
    data_dir: Option<PathBuf>,

    /// Path to JSON config file (defaults to <data dir>/config.json)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import kind:1 notes from a JSON-lines file of Nostr events
    Import {
        /// File with one event JSON per line
        file: PathBuf,
        /// Origin (relay or account) id recorded on every imported row
        #[arg(long, default_value_t = 0)]
        origin: i64,
    },

    /// Print the conversation containing an item
    Conversation {
        /// Local item id or hex note id
        id: String,
        /// Never request missing items
        #[arg(long)]
        offline: bool,
        /// Request the whole conversation again
        #[arg(long)]
        resync: bool,
        #[arg(long)]
        json: bool,
    },

    /// Print the timeline, youngest first
    Timeline {
        /// Only rows from this origin
        #[arg(long, conflicts_with = "author")]
        origin: Option<i64>,
        /// Only rows by this author (hex pubkey)
        #[arg(long)]
        author: Option<String>,
        /// Number of older pages to load after the youngest one
        #[arg(long, default_value_t = 0)]
        older: usize,
        /// Show every duplicate
        #[arg(long, conflicts_with = "collapse")]
        expand: bool,
        /// Hide duplicates under their representative
        #[arg(long)]
        collapse: bool,
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    skein_core::tracing_setup::init_tracing();
    let cli = Cli::parse();

    let config = match util::load_config(cli.data_dir, cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Import { file, origin } => run_import(&config, &file, origin),
        Commands::Conversation {
            id,
            offline,
            resync,
            json,
        } => run_conversation(
            &config,
            ConversationArgs {
                id,
                offline,
                resync,
                json,
            },
        ),
        Commands::Timeline {
            origin,
            author,
            older,
            expand,
            collapse,
            json,
        } => run_timeline(
            &config,
            TimelineArgs {
                origin,
                author,
                older,
                expand,
                collapse,
                json,
            },
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
