//! tracelens: run one query against trace run files and print the response.
//!
//! # Subcommands
//! - `files`        list the files of a trace folder
//! - `runs`         one row per run in the named files
//! - `calls`        call rows of the runs matching a name and start key
//! - `calls-by-id`  call rows of the runs with the given identifiers
//! - `metadata`     metadata of the call with the given identifier
//! - `method-calls` calls of one method across a folder, inside a time window
//! - `raw`          a query given as a JSON request

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracelens_core::ipc::TraceQuery;
use tracelens_core::TraceLensConfig;
use tracing_subscriber::{fmt, EnvFilter};

use tracelens_cli::router;

const DEFAULT_CONFIG: &str = "tracelens.toml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file; defaults to tracelens.toml, which may be absent
    #[arg(short, long, env = "TRACELENS_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the files of a trace folder
    Files {
        #[arg(long)]
        folder: Option<String>,
    },

    /// One row per run in the named files
    Runs {
        /// Comma-separated file names inside the folder
        files: String,

        #[arg(long)]
        folder: Option<String>,
    },

    /// Call rows of the runs matching a name and start-time key
    Calls {
        files: String,

        #[arg(long)]
        name: String,

        /// OLE Automation date or RFC 3339 timestamp of the run start
        #[arg(long)]
        start_time: String,

        #[arg(long)]
        folder: Option<String>,
    },

    /// Call rows of the runs with the given identifiers
    CallsById {
        files: String,

        /// Comma-separated run identifiers
        #[arg(long)]
        ids: String,

        #[arg(long)]
        folder: Option<String>,
    },

    /// Metadata of the call with the given identifier
    Metadata {
        files: String,

        #[arg(long)]
        id: String,

        #[arg(long)]
        folder: Option<String>,
    },

    /// Calls of one method across a folder, inside a time window
    MethodCalls {
        #[arg(long)]
        class_name: String,

        #[arg(long)]
        method_name: String,

        /// Window start, inclusive (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,

        /// Window end, inclusive (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,

        #[arg(long)]
        folder: Option<String>,

        /// File-name pattern such as *.json
        #[arg(long)]
        pattern: Option<String>,

        #[arg(long)]
        recursive: bool,

        /// Cumulative size ceiling in bytes
        #[arg(long)]
        byte_budget: Option<u64>,
    },

    /// A query given as a JSON request, e.g. '{"query":"list_files"}'
    Raw { json: String },
}

impl Commands {
    fn into_query(self) -> anyhow::Result<TraceQuery> {
        let query = match self {
            Commands::Files { folder } => TraceQuery::ListFiles { folder },
            Commands::Runs { files, folder } => TraceQuery::Runs { folder, files },
            Commands::Calls {
                files,
                name,
                start_time,
                folder,
            } => TraceQuery::Calls {
                folder,
                files,
                name,
                start_time,
            },
            Commands::CallsById { files, ids, folder } => TraceQuery::CallsById { folder, files, ids },
            Commands::Metadata { files, id, folder } => TraceQuery::Metadata { folder, files, id },
            Commands::MethodCalls {
                class_name,
                method_name,
                start,
                end,
                folder,
                pattern,
                recursive,
                byte_budget,
            } => TraceQuery::MethodCalls {
                folder,
                pattern,
                recursive: recursive.then_some(true),
                byte_budget,
                class_name,
                method_name,
                start,
                end,
            },
            Commands::Raw { json } => serde_json::from_str(&json)?,
        };
        Ok(query)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // A missing default config means defaults; an explicit one must load
    let loaded = match &args.config {
        Some(path) => TraceLensConfig::load(path).map_err(|e| (path.clone(), e)),
        None => TraceLensConfig::load_or_default(DEFAULT_CONFIG)
            .map_err(|e| (DEFAULT_CONFIG.to_string(), e)),
    };
    let config = match loaded {
        Ok(c) => c,
        Err((path, e)) => {
            eprintln!("Failed to load config from {}: {}", path, e);
            std::process::exit(1);
        }
    };

    // Init logging, RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let query = match args.command.into_query() {
        Ok(q) => q,
        Err(e) => {
            eprintln!("Invalid query: {}", e);
            std::process::exit(2);
        }
    };

    let response = router::handle_query(query, &config).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}
