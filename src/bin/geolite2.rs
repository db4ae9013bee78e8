mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{cmd_build, cmd_inspect, cmd_query, cmd_update};

#[derive(Parser)]
#[command(name = "geolite2")]
#[command(
    about = "IP metadata lookups over GeoLite2 databases",
    long_about = "geolite2 - IP metadata lookups with a native MaxMind DB reader\n\n\
    Query ASN, city, and country databases by IP address, inspect database\n\
    metadata, refresh the data directory from the upstream mirror, and build\n\
    custom databases from JSON.\n\n\
    Examples:\n\
      geolite2 query 8.8.8.8 --db country\n\
      geolite2 update --method git\n\
      geolite2 update --method local --path /srv/geolite2\n\
      geolite2 inspect --db asn\n\
      geolite2 build entries.json -o custom.mmdb"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory holding the database files
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up an IP address in one of the databases
    Query {
        /// IP address (IPv4 or IPv6)
        #[arg(value_name = "IP")]
        ip: String,

        /// Database to query: asn, city, or country
        #[arg(long, default_value = "city")]
        db: String,

        /// Suppress output; exit code signals whether a match was found
        #[arg(short, long)]
        quiet: bool,
    },

    /// Refresh the data directory
    Update {
        /// Update strategy: git, api, or local
        #[arg(long, default_value = "git")]
        method: String,

        /// Source directory for the local strategy
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Show database metadata
    Inspect {
        /// Database to inspect: asn, city, country, or a file path
        #[arg(long, default_value = "country")]
        db: String,
    },

    /// Build a database from a JSON object of CIDR -> record
    Build {
        /// Input JSON file: {"1.2.3.0/24": {"country": "US"}, ...}
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output database file
        #[arg(short, long, default_value = "custom.mmdb")]
        output: PathBuf,

        /// Database type name written into the metadata
        #[arg(long, default_value = "GeoLite2-Custom")]
        database_type: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Query { ip, db, quiet } => cmd_query(cli.data_dir, db, ip, quiet),
        Commands::Update { method, path } => cmd_update(cli.data_dir, method, path),
        Commands::Inspect { db } => cmd_inspect(cli.data_dir, db),
        Commands::Build {
            input,
            output,
            database_type,
        } => cmd_build(input, output, database_type),
    }
}
