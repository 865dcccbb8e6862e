use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

use vast_chain::async_api;
use vast_chain::config::{DEFAULT_USER_AGENT, ResolverConfig};
use vast_chain::{CancelToken, CreativeType, companions, format, markup, parser};

/// Ad markup parser and VAST wrapper-chain resolver
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the creative from an ad-response envelope
    Parse {
        /// Path, file:// URI, URL, or - for stdin
        #[arg(short, long)]
        input: String,

        /// Parse the input as a VAST document instead of an envelope
        #[arg(long)]
        vast: bool,

        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Follow a VAST wrapper chain to its media file
    Resolve {
        /// Path, file:// URI, URL, or - for stdin
        #[arg(short, long)]
        input: String,

        /// Treat the input as the VAST URI to start from
        #[arg(long, conflicts_with = "envelope")]
        uri: bool,

        /// The input is an ad-response envelope wrapping the VAST
        #[arg(long)]
        envelope: bool,

        /// Maximum number of VAST documents to fetch
        #[arg(long, default_value_t = vast_chain::config::DEFAULT_MAX_WRAPPER_HOPS)]
        max_hops: usize,

        /// Per-request timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,

        /// Budget for the whole resolution in seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// List the companion ads of a VAST document
    Companions {
        /// Path, file:// URI, URL, or - for stdin
        #[arg(short, long)]
        input: String,

        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Re-indent markup for reading
    Format {
        /// Path, file:// URI, URL, or - for stdin
        #[arg(short, long)]
        input: String,

        /// Output file path (if not specified, prints to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Parse { input, vast, pretty } => {
            let content = load_input(&input).await?;

            if vast {
                let document = parser::parse_vast(&content)?;
                print_json(&document, pretty)?;
            } else {
                let creative = markup::parse_ad_markup(&content)?;
                print_json(&creative, pretty)?;
            }
        }
        Commands::Resolve {
            input,
            uri,
            envelope,
            max_hops,
            timeout_secs,
            deadline_secs,
            pretty,
        } => {
            let mut config = ResolverConfig::default()
                .with_max_wrapper_hops(max_hops)
                .with_request_timeout(Duration::from_secs(timeout_secs));
            if let Some(secs) = deadline_secs {
                config = config.with_overall_deadline(Duration::from_secs(secs));
            }

            let value = if uri {
                input
            } else {
                let content = load_input(&input).await?;
                if envelope {
                    let creative = markup::parse_ad_markup(&content)?;
                    if creative.creative_type != CreativeType::Vast {
                        return Err(format!(
                            "creative is {} (AdType {}), not VAST",
                            creative.creative_type,
                            creative.ad_type_code.as_deref().unwrap_or("missing")
                        )
                        .into());
                    }
                    creative.payload
                } else {
                    content
                }
            };

            let result = async_api::resolve(value, uri, config, CancelToken::new()).await?;
            print_json(&result, pretty)?;
        }
        Commands::Companions { input, pretty } => {
            let content = load_input(&input).await?;
            print_json(&companions::extract_companions(&content), pretty)?;
        }
        Commands::Format { input, output } => {
            let content = load_input(&input).await?;
            let formatted = format::format_xml(&content);

            if let Some(output_path) = output {
                tokio::fs::write(&output_path, &formatted).await?;
                eprintln!("Formatted markup written to {}", output_path.display());
            } else {
                println!("{}", formatted);
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "vast_chain=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> serde_json::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}

/// Read input from stdin, a local file, or over HTTP.
async fn load_input(input: &str) -> Result<String, Box<dyn std::error::Error>> {
    if input == "-" {
        let mut content = String::new();
        tokio::io::stdin().read_to_string(&mut content).await?;
        return Ok(content);
    }

    if let Some(path) = input.strip_prefix("file://") {
        #[cfg(target_os = "windows")]
        let path = path.trim_start_matches('/');

        log::debug!("Reading from file: {}", path);
        return Ok(tokio::fs::read_to_string(path).await?);
    }

    if Path::new(input).exists() {
        log::debug!("Reading from local file: {}", input);
        return Ok(tokio::fs::read_to_string(input).await?);
    }

    let body = async_api::fetch_document(
        input.to_string(),
        DEFAULT_USER_AGENT.to_string(),
        Duration::from_secs(10),
    )
    .await?;
    Ok(body)
}
