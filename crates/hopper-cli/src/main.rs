//! 🚀 hopper-cli — the front door, the bouncer, the maitre d' of hopper.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary crate is the thin CLI wrapper that loads config,
//! sets up logging, overlays a handful of flags, and then lets the real
//! code do the heavy lifting. Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 🚀 Bulk-load newline-delimited JSON into an Elasticsearch index.
///
/// Configuration comes from a TOML file and/or HOPPER_* environment
/// variables; the flags below overlay the handful of knobs you actually
/// want to flip per-invocation without editing a file.
#[derive(Debug, Parser)]
#[command(name = "hopper", version)]
struct Cli {
    /// 📂 NDJSON input file. Omit it to read from stdin, the people's pipe.
    file: Option<PathBuf>,

    /// 🔧 Path to a TOML config file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// 🫁 Unzip the input on the fly (for inputs wearing a .gz).
    #[arg(short = 'z', long)]
    gzip: bool,

    /// 🗑️ Delete the target index before loading. Destructive. On purpose.
    #[arg(long)]
    purge: bool,

    /// 📣 Progress spinner, per-batch logging, and the final report table.
    #[arg(short, long)]
    verbose: bool,
}

/// 🚀 main() — where it all begins. The genesis. The big bang.
/// The "I pressed Enter and held my breath" moment.
///
/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Parse args (clap does the yelling about typos for us)
/// 3. Load config, overlay flags (the moment of truth)
/// 4. Run the thing (send it and pray 🙏)
/// 5. Handle errors (cry)
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 Set up tracing — because println! debugging is a lifestyle choice
    // we're trying to move past, like flip phones and cargo shorts
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // 🔒 Validate the config file exists before we get too emotionally attached
    let config_path = match &cli.config {
        Some(path) => {
            let exists = path.try_exists().context(format!(
                "💀 Couldn't even check whether the configuration file exists. The filesystem is being cagey about '{}'.",
                path.display()
            ))?;
            if !exists {
                // 💀 an explicit -c pointing at nothing is a typo, not a choice.
                // Maybe it's an issue with pwd/cwd and relative paths — in that
                // case, use an absolute path, to be absolutely certain.
                anyhow::bail!(
                    "💀 Configuration file not found. Double check that it exists. Was checking here: '{}'",
                    path.display()
                );
            }
            Some(path.as_path())
        }
        None => None,
    };

    // 🔧 Load the config — this is the moment where we find out if the TOML is
    // valid or if someone put a tab where a space should be (looking at you, Kevin)
    let mut app_config = hopper::load_config(config_path)
        .context("💀 Couldn't load the config. Take a look at the file, make sure it's correct. Make sure you didn't forget something obvious, dumas")?;

    // 🎯 Overlay the per-invocation flags — flags only ever turn things ON or
    // point at a file; absent flags leave the config's word as final
    if let Some(file) = cli.file {
        app_config.input.path = Some(file);
    }
    if cli.gzip {
        app_config.input.gzip = true;
    }
    if cli.purge {
        app_config.load.purge = true;
    }
    if cli.verbose {
        app_config.load.verbose = true;
    }
    let verbose = app_config.load.verbose;

    // 🚀 SEND IT. No take-backs. This is not a drill.
    let result = hopper::run(app_config).await;

    // 💀 Error handling: the part where we find out what went wrong
    // and print it in a way that's helpful at 3am
    match result {
        Ok(summary) => {
            if verbose {
                // 🍽️ the report card, for the humans who asked for it
                println!("{}", summary.render());
            }
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // 🧅 peel the onion of sadness, one tear-jerking layer at a time
            let mut the_vibes_are_giving_connection_issues = false;
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
                // 🕵️ sniff the cause like a truffle pig hunting for connection problems
                let cause_str = cause.to_string();
                if cause_str.contains("error sending request")
                    || cause_str.contains("connection refused")
                    || cause_str.contains("Connection refused")
                    || cause_str.contains("tcp connect error")
                    || cause_str.contains("dns error")
                {
                    the_vibes_are_giving_connection_issues = true;
                }
            }

            // 📡 if it smells like a connection problem, it's probably a connection
            // problem — like when your wifi icon has full bars but nothing loads
            if the_vibes_are_giving_connection_issues {
                error!(
                    "🔧 hint: looks like the cluster isn't reachable. \
                    Double-check that Elasticsearch is actually running at the configured URL. \
                    If you're using Docker, try: `docker ps` to see what's up, or \
                    `docker compose up -d` to resurrect it. \
                    Even clusters need a nudge sometimes. ☕"
                );
            }

            // 🗑️ Exit with prejudice. Process exitus maximus.
            std::process::exit(1);
        }
    }

    // ✅ If we got here, everything worked. Pop the champagne. 🍾
    // (or at least close the terminal tab with a sense of accomplishment)
    Ok(())
}
