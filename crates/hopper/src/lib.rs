//! 🚀 hopper — a funnel for feeding NDJSON into Elasticsearch at shoveling speed.
//!
//! 🎬 *[a million documents stand in line. the line moves fast. nobody complains.]*
//!
//! The deal: you bring newline-delimited JSON (a file, a pipe, a .gz — we
//! don't judge), hopper brackets the load with throughput-friendly index
//! settings, fans the records out across a pool of concurrent writers, ships
//! them through the `_bulk` API, and puts the settings back the way it found
//! them on the way out. At-least-once, best-effort, fail-fast — an offline
//! batch tool, not a delivery guarantee with a legal department.
//!
//! The module map, in one breath: [`source`] reads lines, [`bulk`] renders
//! the wire format, `client` talks to the cluster, `session` runs the whole
//! checklist with `session::writer` doing the shoveling, `progress` keeps
//! score, and [`app_config`] tells everyone what to do.
//!
//! 🦆 (the duck oversees the whole operation from a safe distance)

pub mod app_config;
pub mod bulk;
mod client;
mod progress;
mod session;
pub mod source;

use anyhow::{Context, Result};

pub use app_config::{AppConfig, load_config};
pub use session::{LoadSummary, Session};
pub use source::LineSource;

/// 🚀 Run one full indexing session from the given config.
///
/// Opens the configured input (file or stdin), builds the session, runs the
/// checklist, returns the scorecard. The CLI calls this and formats; library
/// consumers call this and decide for themselves what failure means to them —
/// nothing in here ever calls `process::exit`.
pub async fn run(config: AppConfig) -> Result<LoadSummary> {
    let source = source::open_input(&config.input)
        .context("💀 Could not open the input. A bulk load with no input is just a settings toggle with extra steps.")?;
    let session = Session::new(config)?;
    session.run(source).await
}
