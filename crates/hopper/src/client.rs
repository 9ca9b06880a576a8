//! # 📡 THE ELASTICSEARCH CLIENT
//!
//! 🎬 COLD OPEN — INT. SERVER ROOM — 3:47 AM
//!
//! The monitoring dashboard glows amber in the dark. One engineer, alone,
//! stares into the abyss of a half-loaded index. The abyss stares back and
//! offers a 429. Their coffee has gone cold. Somewhere in the distance, a
//! PagerDuty alert fires for something completely unrelated, and yet: it hurts.
//!
//! 🚀 This module is the single doorway between hopper and the cluster.
//! Settings twiddling, index creation and demolition, mapping application,
//! the `_flush` at the end of the night, and the `_bulk` firehose in between —
//! every HTTP request the session or a writer ever makes goes through here,
//! with the same basic-auth treatment applied to all of them.
//!
//! ⚠️ NOTE: If you are reading this at 3am during an incident, take a breath.
//! The data is fine. Probably. The cluster is fine. Mostly. You are fine.
//! Debatable.
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use tracing::{debug, trace};

use crate::app_config::ElasticsearchConfig;
use crate::bulk::BulkResponse;

/// 📡 A handle on one Elasticsearch server and one target index.
///
/// Cheap to clone — the inner `reqwest::Client` is an `Arc` around a
/// connection pool, so every writer gets its own copy and they all share
/// the same sockets underneath. One pool, many mouths.
///
/// 🔒 Basic auth is applied identically to every request when both a
/// username and a password are configured, and to none of them otherwise.
/// There is no halfway. Config validation upstream enforces the pairing.
#[derive(Debug, Clone)]
pub(crate) struct EsClient {
    http: reqwest::Client,
    base_url: String,
    index: String,
    doc_type: String,
    username: Option<String>,
    password: Option<String>,
}

impl EsClient {
    /// 🚀 Stand up the HTTP client: 10s connect timeout because if the cluster
    /// can't handshake in 10 seconds it's not having a good time and neither
    /// are we, 30s response timeout because bulk requests can be meaty and
    /// we're not monsters.
    pub(crate) fn new(config: &ElasticsearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            // 💀 "Failed to initialize http client" — a tragedy in one act.
            // The curtain rises. The builder enters, full of promise. It calls
            // .build(). The TLS stack hesitates. The operating system shrugs.
            .context("💀 The HTTP client refused to be born. The TLS stack wept. Probably a missing cert bundle or a cursed system OpenSSL. Either way: tragic.")?;

        Ok(Self {
            http,
            // 🧹 one slash of difference, infinite suffering of difference
            base_url: config.url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            doc_type: config.doc_type.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// 🏗️ Start a request against `<base_url>/<path>` with auth applied.
    ///
    /// Content-Type is each caller's job — almost everything speaks
    /// `application/json`, but `_bulk` insists on its own dialect and a
    /// doubled-up header is exactly the kind of thing clusters sulk about.
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.http.request(method, url);
        // 🔒 both-or-neither, enforced at config time; here we just comply
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            request = request.basic_auth(username, Some(password));
        }
        request
    }

    /// 🔧 `PUT /<index>/_settings` with the given body. Non-success is fatal —
    /// a load that runs with refresh still enabled quietly wastes everyone's
    /// evening, so a settings change that didn't take is not negotiable.
    async fn put_settings(&self, body: serde_json::Value) -> Result<()> {
        let response = self
            .request(Method::PUT, &format!("{}/_settings", self.index))
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .context("💀 The settings request never reached the cluster. The network looked at our PUT and said 'nah.'")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "💀 The cluster declined the settings change {body} with status {status}: '{text}'. A load without its settings is a load we refuse to run."
            );
        }
        debug!("🔧 applied setting {} with status {}", body, status);
        Ok(())
    }

    /// 🧊 Set the refresh interval to the disabled sentinel, so the cluster
    /// stops making every freshly written document searchable right away.
    /// This is the single biggest throughput lever the bulk path has.
    pub(crate) async fn disable_refresh(&self) -> Result<()> {
        self.put_settings(serde_json::json!({"index": {"refresh_interval": "-1"}}))
            .await
    }

    /// 🔄 Bring the refresh interval back to a short, civilized cadence.
    pub(crate) async fn restore_refresh(&self) -> Result<()> {
        self.put_settings(serde_json::json!({"index": {"refresh_interval": "1s"}}))
            .await
    }

    /// 🔧 Set the replica count, or clear the override back to the index
    /// default by sending null. Yes, null. The settings API speaks null.
    pub(crate) async fn set_replicas(&self, count: Option<u32>) -> Result<()> {
        self.put_settings(serde_json::json!({"index": {"number_of_replicas": count}}))
            .await
    }

    /// 🏗️ `PUT /<index>` — create the target index.
    ///
    /// Idempotent from our side of the wire: a rejection whose body says the
    /// index already exists is absorbed as success. Creating a thing that
    /// exists is not a failure. It is a reunion.
    pub(crate) async fn create_index(&self) -> Result<()> {
        let response = self
            .request(Method::PUT, &self.index)
            .send()
            .await
            .context("💀 The index-creation request vanished into the network. No index. No response. No closure.")?;

        let status = response.status();
        if status.is_success() {
            debug!("🏗️ index '{}' created with status {}", self.index, status);
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        // ✅ "already exists" in any of its historical spellings is fine.
        // The index is there. That was the whole point.
        if text.contains("already_exists") {
            debug!("✅ index '{}' already exists — nothing to create", self.index);
            return Ok(());
        }
        anyhow::bail!(
            "💀 Index creation for '{}' came back {status} and the body wasn't the friendly already-exists kind: '{text}'",
            self.index
        );
    }

    /// 🗑️ `DELETE /<index>` — purge the index, documents and all.
    ///
    /// A 404 is absorbed: purging an index that never existed is the easiest
    /// purge of all time. We take the win.
    pub(crate) async fn delete_index(&self) -> Result<()> {
        let response = self
            .request(Method::DELETE, &self.index)
            .send()
            .await
            .context("💀 The delete request never arrived. The index lives on, unaware of how close it came.")?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            debug!("🗑️ index '{}' purged with status {}", self.index, status);
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        anyhow::bail!(
            "💀 Purging index '{}' failed with status {status}: '{text}'. We cannot bulk-load over an index we were told to demolish first.",
            self.index
        );
    }

    /// 📋 `PUT /<index>/_mapping/<type>` — apply a mapping before any writes,
    /// so it actually governs the fields the bulk load is about to create.
    /// A mapping applied after the fact is a suggestion. This one is law.
    pub(crate) async fn put_mapping(&self, body: String) -> Result<()> {
        let response = self
            .request(
                Method::PUT,
                &format!("{}/_mapping/{}", self.index, self.doc_type),
            )
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .context("💀 The mapping never made it to the cluster. The fields will be guessed at. Nobody wants the fields guessed at.")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "💀 The cluster rejected the mapping with status {status}: '{text}'. Loading documents under a rejected mapping would index them wrong at scale, which is worse than not indexing them at all."
            );
        }
        debug!("📋 mapping applied with status {}", status);
        Ok(())
    }

    /// 💾 `POST /<index>/_flush` — ask the cluster to persist in-memory
    /// segments to stable storage. The session's last word.
    pub(crate) async fn flush_index(&self) -> Result<()> {
        let response = self
            .request(Method::POST, &format!("{}/_flush", self.index))
            .send()
            .await
            .context("💀 The flush request went out and nothing came back. The documents are indexed but their durability is now a matter of faith.")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("💀 The final flush came back {status}: '{text}'.");
        }
        debug!("💾 index flushed with status {}", status);
        Ok(())
    }

    /// 📡 `POST /_bulk` — the loading dock. NDJSON in, verdict out.
    ///
    /// Two distinct failure shapes, deliberately kept apart:
    /// - transport-level trouble (unreachable cluster, non-2xx status,
    ///   a response body that won't parse) → `Err`, fatal to the writer.
    /// - per-document rejections inside a 2xx response → part of the returned
    ///   [`BulkOutcome`], NOT an error. One bad document must not abort an
    ///   otherwise-healthy load.
    pub(crate) async fn bulk(&self, body: String) -> Result<BulkOutcome> {
        let response = self
            .request(Method::POST, "_bulk")
            // ⚠️ Content-Type: application/x-ndjson — not application/json.
            // The service returns a 406 or silently misbehaves without this.
            // The x- prefix means "we made this up but we're committing to it."
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            // 💀 We gathered the documents. We serialized them. We built the
            // NDJSON with artisanal care. And the network layer, capricious
            // deity of bytes and routing tables, dropped the packet.
            .context("💀 The bulk request never made it to the cluster. Check connectivity, check timeouts, and check your feelings.")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "💀 The bulk request arrived, but the cluster looked at our documents and said '{status}'. The body of the response read: '{text}'. We have no one to blame but ourselves, and possibly whoever wrote the mapping."
            );
        }

        // 🔍 A 2xx with an unreadable body is NOT silent success — if we can't
        // inspect the per-document verdicts, we can't honestly claim delivery.
        let text = response
            .text()
            .await
            .context("💀 The bulk response body could not even be read. Half a handshake is no handshake.")?;
        let verdict: BulkResponse = serde_json::from_str(&text).context(
            "💀 The bulk response was 2xx but the body would not parse as a bulk response. We do not assume silent success; we assume something is wrong.",
        )?;

        trace!(
            "🚀 bulk request landed: status={} took={:?} errors={}",
            status, verdict.took, verdict.errors
        );
        Ok(BulkOutcome { status, verdict })
    }
}

/// 📬 What came back from one `_bulk` request: the HTTP status (always 2xx by
/// the time you hold one of these) and the parsed per-document verdict.
#[derive(Debug)]
pub(crate) struct BulkOutcome {
    pub status: StatusCode,
    pub verdict: BulkResponse,
}
