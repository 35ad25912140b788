//! Texforge CLI - LaTeX compilation service.

mod colors;
mod compile;
mod engines;
mod serve;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use texforge_core::{CacheDirs, EngineRegistry, Orchestrator, OrchestratorConfig};

#[derive(Parser)]
#[command(name = "texforge")]
#[command(about = "LaTeX compilation service with precompiled preamble caching")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Cache root for formats and workspaces
    #[arg(long, global = true, env = "TEXFORGE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Time budget per engine run, in seconds
    #[arg(long, global = true, env = "TEXFORGE_TIMEOUT", default_value = "30")]
    timeout: u64,

    /// Largest accepted source, in bytes
    #[arg(long, global = true, env = "TEXFORGE_MAX_SOURCE_BYTES", default_value = "512000")]
    max_source_bytes: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP compilation server
    Serve {
        /// Host address to bind to
        #[arg(long, env = "TEXFORGE_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, env = "TEXFORGE_PORT", default_value = "8000")]
        port: u16,
    },

    /// Compile a single document
    Compile {
        /// Path to the .tex file
        file: PathBuf,

        /// Engine to use (tectonic, pdflatex, pdflatex-fast, xelatex, lualatex)
        #[arg(short, long)]
        engine: Option<String>,

        /// Compile in the durable workspace of this document
        #[arg(long)]
        document_id: Option<String>,

        /// Output path (default: input with .pdf extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report installed engines and cached formats
    Engines,
}

impl Cli {
    fn orchestrator(&self) -> anyhow::Result<Orchestrator> {
        let root = self.cache_dir.clone().unwrap_or_else(CacheDirs::default_root);
        let dirs = CacheDirs::from_root(&root)?;
        let config = OrchestratorConfig {
            compile_timeout: Duration::from_secs(self.timeout),
            max_source_bytes: self.max_source_bytes,
            ..OrchestratorConfig::default()
        };
        tracing::debug!(root = %dirs.root.display(), "using cache");
        Ok(Orchestrator::new(&dirs, EngineRegistry::system(), config))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let orchestrator = cli.orchestrator()?;

    match cli.command {
        Commands::Serve { host, port } => {
            serve::execute(orchestrator, host, port).await?;
        }

        Commands::Compile {
            file,
            engine,
            document_id,
            output,
        } => {
            compile::execute(
                &orchestrator,
                &file,
                engine.as_deref(),
                document_id.as_deref(),
                output.as_deref(),
            )
            .await?;
        }

        Commands::Engines => engines::execute(&orchestrator).await,
    }

    Ok(())
}
