//! 🔧 App Configuration — the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! Everything a session needs to know lives here, is read once at startup,
//! and never mutates again — the writers all share one immutable copy.

use anyhow::Context;
use serde::Deserialize;
// 🔧 To load the configuration, so I don't have to manually parse
// environment variables or files. Bleh. Like doing taxes but for bytes.
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use std::path::{Path, PathBuf};
// 🚀 tracing::info — because println! in production is a cry for help.
use tracing::info;

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
///
/// 🎯 Contains everything the session needs to know about itself,
/// which is more self-awareness than most sessions achieve in their lifetime.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 📡 Where the cluster lives and which index takes the documents.
    /// Defaults exist so a bare run fails at validation ("index name
    /// required") instead of at parsing — a better error for a worse config.
    #[serde(default)]
    pub elasticsearch: ElasticsearchConfig,
    /// 📂 Where the records come from. Defaults to stdin, the people's pipe.
    #[serde(default)]
    pub input: InputConfig,
    /// 🔧 How hard to push: batch size, worker count, purge behavior, and friends.
    #[serde(default)]
    pub load: LoadConfig,
}

/// 📡 The cluster half of the config — url, index, type, and the auth dance.
#[derive(Debug, Deserialize, Clone)]
pub struct ElasticsearchConfig {
    /// 📡 The cluster URL. Include scheme + port. Yes, all of it.
    /// No, `localhost` alone is not enough. Yes, I know it worked in dev.
    #[serde(default = "default_url")]
    pub url: String,
    /// 📦 The target index. The one piece of config with no sane default —
    /// validation will chase you down if you leave it empty.
    #[serde(default)]
    pub index: String,
    /// 🏷️ The document type stamped on every action line.
    #[serde(default = "default_doc_type")]
    pub doc_type: String,
    /// 🔒 Username for basic auth. Optional, like flossing. You know you should have one.
    #[serde(default)]
    pub username: Option<String>,
    /// 🔒 Password. If this is in plaintext in your config file, I've already
    /// filed a complaint with the Department of Security Choices.
    #[serde(default)]
    pub password: Option<String>,
    /// 📋 A mapping to apply before loading: either a path to a file that
    /// exists, or the literal mapping JSON itself. The resolver checks the
    /// filesystem first and takes the string at its word otherwise.
    #[serde(default)]
    pub mapping: Option<String>,
}

fn default_url() -> String {
    // 📡 the address every cluster has answered at since time immemorial
    "http://localhost:9200".to_string()
}

fn default_doc_type() -> String {
    "default".to_string()
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            index: String::new(),
            doc_type: default_doc_type(),
            username: None,
            password: None,
            mapping: None,
        }
    }
}

/// 📂 Where the records come from.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct InputConfig {
    /// 📂 Path to an NDJSON file. None = stdin, the classic pipe-it-in workflow.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// 🫁 Unzip the input on the fly. For when the file arrived wearing a .gz.
    #[serde(default)]
    pub gzip: bool,
}

/// 🔧 The throughput knobs — how many workers, how big the batches,
/// whether to demolish the index first, and how chatty to be about it all.
#[derive(Debug, Deserialize, Clone)]
pub struct LoadConfig {
    /// 📦 Documents per bulk request. Bigger batches amortize HTTP overhead;
    /// comically big batches earn you a 413 and a story for standup.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// 🧵 Number of concurrent writers. Defaults to however many cores the
    /// machine admits to having.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// 🗑️ Delete the target index before loading. Destructive. On purpose.
    #[serde(default)]
    pub purge: bool,
    /// ⏱️ How long to wait after a purge before recreating the index, in ms.
    /// A fixed settling pause, not a readiness poll — the deletion needs a
    /// moment to propagate through the cluster and we give it one, flat.
    #[serde(default = "default_purge_settle_ms")]
    pub purge_settle_ms: u64,
    /// 🔧 Set the replica count to 0 for the duration of the load, so the
    /// cluster isn't copying every document sideways while we shovel.
    #[serde(default)]
    pub zero_replicas: bool,
    /// 📎 Name of the document field to use as the `_id`. None = the cluster
    /// auto-generates ids and re-runs will happily double-index everything.
    #[serde(default)]
    pub id_field: Option<String>,
    /// 📣 Progress spinner, per-batch logging, and the final report table.
    #[serde(default)]
    pub verbose: bool,
}

fn default_batch_size() -> usize {
    1000
}

fn default_workers() -> usize {
    // 🧵 one writer per core the OS will own up to; 4 if it pleads the fifth
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_purge_settle_ms() -> u64 {
    5_000
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            workers: default_workers(),
            purge: false,
            purge_settle_ms: default_purge_settle_ms(),
            zero_replicas: false,
            id_field: None,
            verbose: false,
        }
    }
}

impl AppConfig {
    /// 🔒 Sanity-check the config before a single packet leaves the building.
    ///
    /// Everything caught here fails with zero side effects — no settings
    /// touched, no index purged, no documents harmed in the making of this
    /// error message.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.elasticsearch.index.trim().is_empty() {
            // 💀 no index name, no load. This is the one non-negotiable field.
            anyhow::bail!(
                "💀 An index name is required and none was supplied. We checked the config file. We checked the environment. We even checked the defaults, which was optimistic of us. Set elasticsearch.index and try again."
            );
        }
        if self.load.batch_size == 0 {
            anyhow::bail!(
                "💀 batch_size is 0, which would mean bulk requests containing nothing, forever. Bold. Also: no."
            );
        }
        if self.load.workers == 0 {
            anyhow::bail!(
                "💀 workers is 0. Zero workers means the records are dispatched to nobody and the session waits for the heat death of the universe. Set workers to at least 1."
            );
        }
        // 🔒 credentials come in pairs — a username without a password (or the
        // reverse) is a typo wearing a trench coat, not an auth strategy
        if self.elasticsearch.username.is_some() != self.elasticsearch.password.is_some() {
            anyhow::bail!(
                "💀 Basic auth needs BOTH a username and a password, and exactly one of them showed up. Half a credential is not a credential. It is a confession of a typo."
            );
        }
        Ok(())
    }
}

/// 🚀 Load the config — from a file, from env vars, or from the sheer power of hoping.
///
/// 🔧 Merges environment variables (HOPPER_*) with an optional TOML file.
/// No `.only(...)` restriction — ALL HOPPER_ vars are fair game.
/// We don't gatekeep env vars here. This is a safe space. 🦆
///
/// 📐 DESIGN NOTE (no cap, this is tribal knowledge):
///   - If `config_file_name` is None  → env vars only. No file. No assumptions.
///   - If `config_file_name` is Some  → env vars + TOML file, merged. TOML wins on conflicts.
///
/// 💀 Returns an error if config is unparseable. Which it will be. Check the error
/// message though — it's contextual, informative, and written with love. Or despair.
/// Hard to tell at 3am.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    // 🚀 Log what we're loading — because silent failures are the villain origin
    // story of every 3am incident. "The config loaded fine." — famous last words.
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    // 🏗️ Start with env vars as the base layer — like a good sourdough starter.
    // ALL HOPPER_* vars accepted. No ID required. No velvet rope. Everyone's invited.
    let config = Figment::new().merge(Env::prefixed("HOPPER_"));

    // 🎯 Conditionally layer in TOML only if a file was actually provided.
    // No file? No problem. We trust the env. Like a golden retriever trusts everyone.
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    // 💬 Build a context message that will actually TELL you what went wrong.
    // None of that "error: error" energy. This isn't a Kafka novel. (The author, not the queue.)
    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (HOPPER_*). \
             The file exists in our hearts, but apparently its contents disagree with the schema.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (HOPPER_*). \
                 No file was provided — this one's all on the environment. Classic."
            .to_string(),
    };

    // ✅ or 💀, there is no try — actually there is, it's called `?`
    config.extract().context(context_msg)
}
