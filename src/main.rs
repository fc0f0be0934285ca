//! Catgraph CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use config::AppConfig;

#[derive(Parser)]
#[command(name = "catgraph")]
#[command(about = "Render category membership graphs as diagrams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the render server
    Serve {
        /// Port to listen on (overrides the configuration)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides the configuration)
        #[arg(long)]
        host: Option<String>,
    },
    /// Render one graph to a file and exit
    Render {
        /// Start page or category; repeat for several
        #[arg(short, long = "root", required = true)]
        roots: Vec<String>,

        /// Site to render from (defaults to the first configured site)
        #[arg(long)]
        site: Option<String>,

        #[arg(short, long)]
        depth: Option<u32>,

        /// Maximum number of nodes
        #[arg(short, long)]
        limit: Option<usize>,

        /// Expand hidden categories too
        #[arg(long)]
        hidden: bool,

        /// Link mode: none or target
        #[arg(long)]
        links: Option<String>,

        /// Output format: dot, svg, pdf, png, gif or jpeg
        #[arg(short, long)]
        format: Option<String>,

        /// Layout algorithm: dot, neato, fdp, sfdp, twopi or circo
        #[arg(short, long)]
        algorithm: Option<String>,

        /// Where to write the result
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Drop expired cache entries
    Purge,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("catgraph={}", log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Commands::Version = cli.command {
        println!("Catgraph v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    tracing::info!("Catgraph v{}", env!("CARGO_PKG_VERSION"));
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port, host } => commands::serve(config, host, port).await,
        Commands::Render {
            roots,
            site,
            depth,
            limit,
            hidden,
            links,
            format,
            algorithm,
            output,
        } => {
            let params = catgraph_core::RenderParams {
                site,
                root: roots,
                depth,
                limit,
                hidden: Some(hidden),
                links,
                format,
                algorithm,
            };
            commands::render(config, params, output).await
        }
        Commands::Purge => commands::purge(config),
        Commands::Version => Ok(()),
    }
}
