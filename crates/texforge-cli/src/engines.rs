//! Engines command: live probe of every supported engine.

use texforge_core::{EngineProbe, Orchestrator};

use crate::colors;

/// Print engine availability and the cached environment count.
pub async fn execute(orchestrator: &Orchestrator) {
    let report = orchestrator.health().await;

    println!("{}Engines{}", colors::BOLD, colors::RESET);
    for (kind, probe) in &report.engines {
        let color = match probe {
            EngineProbe::Available(_) => colors::GREEN,
            EngineProbe::Unavailable => colors::RED,
        };
        println!(
            "  {:<14} {}{}{}",
            kind.name(),
            color,
            probe.describe(),
            colors::RESET
        );
    }
    println!(
        "Cached environments: {}",
        report.cached_environments
    );
}
