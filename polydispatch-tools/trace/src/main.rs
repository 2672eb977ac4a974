//! Polydispatch trace binary
//!
//! Run with: `polydispatch-trace [COMMAND]`

mod demo;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use polydispatch::{Call, EngineConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "polydispatch-trace")]
#[command(about = "Inspect how polydispatch resolves calls")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List operations and their signatures
    List,

    /// Show the resolution chain for a call without running it
    Explain {
        /// Operation name
        operation: String,

        /// Arguments as JSON literals; `name=value` passes a keyword
        args: Vec<String>,

        /// Print the trace as JSON
        #[arg(long)]
        json: bool,
    },

    /// Dispatch a call and print its result
    Run {
        /// Operation name
        operation: String,

        /// Arguments as JSON literals; `name=value` passes a keyword
        args: Vec<String>,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    debug!(?config, "loaded configuration");

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
        }
        Commands::List => {
            let engine = demo::engine(config)?;
            for name in engine.names() {
                let Some(op) = engine.get(&name) else { continue };
                println!("{name}");
                for signature in op.snapshot().signatures() {
                    println!("  {signature}");
                }
            }
        }
        Commands::Explain {
            operation,
            args,
            json,
        } => {
            let engine = demo::engine(config)?;
            let call = parse_call(&args)?;
            let trace = engine
                .explain(&operation, call)
                .with_context(|| format!("cannot explain call to `{operation}`"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&trace)?);
            } else {
                println!("{trace}");
            }
        }
        Commands::Run { operation, args } => {
            let engine = demo::engine(config)?;
            let call = parse_call(&args)?;
            let value = engine
                .dispatch(&operation, call)
                .with_context(|| format!("call to `{operation}` failed"))?;
            println!("{value}");
        }
    }

    Ok(())
}

fn parse_call(args: &[String]) -> Result<Call> {
    let mut positional = Vec::new();
    let mut keywords = Vec::new();
    for arg in args {
        match arg.split_once('=') {
            Some((name, raw)) if is_identifier(name) => {
                keywords.push((name.to_string(), demo::parse_value(raw)));
            }
            _ => {
                if !keywords.is_empty() {
                    bail!("positional argument `{arg}` follows a keyword argument");
                }
                positional.push(demo::parse_value(arg));
            }
        }
    }
    Ok(keywords
        .into_iter()
        .fold(Call::new(positional), |call, (name, value)| call.kw(name, value)))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
