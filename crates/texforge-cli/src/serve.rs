//! Serve command implementation for texforge CLI.
//!
//! Starts the HTTP compilation server.

use texforge_core::Orchestrator;
use texforge_server::ServerConfig;

use crate::colors;

/// Start the compilation server.
pub async fn execute(orchestrator: Orchestrator, host: String, port: u16) -> anyhow::Result<()> {
    let config = ServerConfig { host, port };

    println!(
        "\n{}Texforge Server{} - LaTeX Compilation",
        colors::BOLD,
        colors::RESET
    );
    println!("{}", "─".repeat(50));

    println!(
        "{}  ◆ Cache:{} {}",
        colors::CYAN,
        colors::RESET,
        orchestrator.workspaces().root().display()
    );
    println!(
        "{}  ◆ Timeout:{} {}s",
        colors::CYAN,
        colors::RESET,
        orchestrator.config().compile_timeout.as_secs()
    );
    println!(
        "{}  ◆ Compile:{} POST http://{}:{}/compile",
        colors::CYAN,
        colors::RESET,
        config.host,
        config.port
    );
    println!(
        "{}  ◆ Health:{} GET http://{}:{}/health",
        colors::CYAN,
        colors::RESET,
        config.host,
        config.port
    );
    println!("{}", "─".repeat(50));
    println!("{}Press Ctrl+C to stop{}", colors::GREEN, colors::RESET);
    println!();

    texforge_server::serve(orchestrator, config).await?;

    Ok(())
}
