mod cli;

use clap::{Parser, Subcommand};
use wristfeed::constants::WATCH_INTERVAL_SECS;
use wristfeed::tracing_init;

#[derive(Parser)]
#[command(name = "wristfeed", version, about = "Wristfeed: shared activity feed for the wrist overlay")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, event database and default config
    Init,
    /// Append rows to an event table
    Ingest {
        /// game_log | feed | notifications | friend_log | moderation_against | player_moderations
        source: String,
        /// JSON row or array of rows; `@file` reads a file, `-` reads stdin
        json: String,
    },
    /// Run one forced pass and print the wrist payload
    Snapshot {
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// View or modify wrist filters
    Filters {
        #[command(subcommand)]
        action: FiltersAction,
    },
    /// Keep the wrist feed file current until interrupted
    Watch {
        /// Database poll interval
        #[arg(long, default_value_t = WATCH_INTERVAL_SECS)]
        interval_secs: u64,
    },
}

#[derive(Subcommand)]
enum FiltersAction {
    /// Display the filter table
    Show,
    /// Set the policy of one category (Off, On, Friends, VIP, Everyone)
    Set {
        category: String,
        policy: String,
    },
    /// Restore the default table
    Reset,
}

fn main() {
    let app = App::parse();

    // Long-running watch logs to file; one-shot commands keep stdout clean
    match app.command {
        Commands::Watch { .. } => tracing_init::init_file_tracing(),
        _ => tracing_init::init_stderr_tracing(),
    }

    let result = match app.command {
        Commands::Init => cli::init::run(),
        Commands::Ingest { source, json } => cli::ingest::run(&source, &json),
        Commands::Snapshot { pretty } => cli::snapshot::run(pretty),
        Commands::Filters { action } => match action {
            FiltersAction::Show => cli::filters::run_show(),
            FiltersAction::Set { category, policy } => cli::filters::run_set(&category, &policy),
            FiltersAction::Reset => cli::filters::run_reset(),
        },
        Commands::Watch { interval_secs } => cli::watch::run(interval_secs),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
