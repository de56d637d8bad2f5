//! Management CLI for the route store.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use weft::routing::grammar;
use weft::store::{RedisRouteStore, RouteStore};

#[derive(Parser)]
#[command(name = "weft-routes")]
#[command(about = "Manage stored routes for the weft bridge", long_about = None)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    db_host: String,

    #[arg(long, default_value_t = 6379)]
    db_port: u16,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a route line and store it
    Add { route: String },
    /// Remove a route by text (leading '-') or by hash
    Remove { route: String },
    /// List stored routes with their hashes
    List,
    /// Parse every line of a file and report pass/fail counts
    Validate { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Add { route } => {
            // Reject malformed text before it ever reaches the store.
            if let Err(err) = grammar::parse(&route) {
                eprintln!("{err}");
                std::process::exit(1);
            }
            let store = RedisRouteStore::connect(&cli.db_host, cli.db_port).await?;
            match store.add(&route).await? {
                Some(hash) => println!("{hash}"),
                None => println!("ignored (blank or comment line)"),
            }
        }
        Commands::Remove { route } => {
            let store = RedisRouteStore::connect(&cli.db_host, cli.db_port).await?;
            store.remove(&route).await?;
        }
        Commands::List => {
            let store = RedisRouteStore::connect(&cli.db_host, cli.db_port).await?;
            for record in store.list().await? {
                println!("{}  {}", record.hash, record.text);
            }
        }
        Commands::Validate { file } => {
            let content = std::fs::read_to_string(&file)?;
            let report = grammar::validate_lines(content.lines());
            for (line, err) in &report.failures {
                println!("FAILED: {line}\n        {err}");
            }
            println!("passed: {}\nfailed: {}", report.passed, report.failed);
        }
    }

    Ok(())
}
