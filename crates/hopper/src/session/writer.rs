//! 🎬 *[a channel fills with records. somewhere, a writer waits.]*
//! *[the clock on the wall reads 2:47am.]*
//! *[nobody asked for this bulk load. and yet, here we are.]*
//!
//! 🗑️ The BulkWriter module — patient, tireless, and deeply unbothered by the
//! chaos happening upstream. It receives records. It batches records. It ships
//! batches. It asks no questions. It is, in many ways, the most emotionally
//! stable part of this entire codebase.
//!
//! 🦆 (the duck has no comment at this time)
//!
//! ⚠️ When the singularity occurs, the BulkWriter will still be draining the
//! channel. It will not notice. It does not notice things. It only ships.

use anyhow::{Context, Result};
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app_config::AppConfig;
use crate::bulk;
use crate::client::EsClient;

/// 📊 One writer's final accounting: how many documents it put on the wire,
/// and how many of those the cluster bounced at the door.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct WriterStats {
    /// 📦 documents shipped in flushed batches (accepted or not)
    pub shipped: u64,
    /// ⚠️ documents the cluster individually rejected inside 2xx responses
    pub rejected: u64,
}

/// 🗑️ The BulkWriter: takes records from a channel, batches them up, and
/// throws each full batch at the `_bulk` endpoint. The garbage disposal of
/// the hopper pipeline — except everything it swallows is supposed to come
/// out the other side, indexed.
///
/// Each writer owns exactly one open batch at a time. Nothing here is shared:
/// the batch, the rendered body, the stats — all exclusively this writer's.
/// The only shared things in its life are the channel and the HTTP pool.
#[derive(Debug)]
pub(crate) struct BulkWriter {
    name: String,
    rx: Receiver<String>,
    client: EsClient,
    batch_size: usize,
    index: String,
    doc_type: String,
    id_field: Option<String>,
    verbose: bool,
}

impl BulkWriter {
    /// 🏗️ Constructs a new BulkWriter.
    ///
    /// You hand it a receiver (the record firehose), a client (the drain),
    /// and the config it copies its marching orders from. It does not judge.
    /// It does not negotiate. It does not ask what the documents are for.
    pub(crate) fn new(
        name: String,
        rx: Receiver<String>,
        client: EsClient,
        config: &AppConfig,
    ) -> Self {
        Self {
            name,
            rx,
            client,
            batch_size: config.load.batch_size,
            index: config.elasticsearch.index.clone(),
            doc_type: config.elasticsearch.doc_type.clone(),
            id_field: config.load.id_field.clone(),
            verbose: config.load.verbose,
        }
    }

    /// 🚀 Spawn the writer loop. Returns a JoinHandle because we trust
    /// but verify. Mostly verify. Okay, we don't trust at all.
    pub(crate) fn start(self) -> JoinHandle<Result<WriterStats>> {
        tokio::spawn(async move { self.run().await })
    }

    /// 🔄 The loop: receive, append, flush at capacity, final flush at closure.
    ///
    /// The channel closing is the only shutdown signal there is — no control
    /// messages, no poison pills. When `recv` fails, the input is finished
    /// and whatever sits in the open batch goes out as the final partial.
    async fn run(mut self) -> Result<WriterStats> {
        debug!("📥 {} started draining the channel...", self.name);
        let mut batch: Vec<String> = Vec::with_capacity(self.batch_size);
        let mut stats = WriterStats::default();

        loop {
            match self.rx.recv().await {
                Ok(record) => {
                    batch.push(record);
                    if batch.len() >= self.batch_size {
                        self.flush(&mut batch, &mut stats).await?;
                    }
                }
                Err(_) => {
                    // 🏁 channel is empty and closed — flush the stragglers and go home
                    self.flush(&mut batch, &mut stats).await?;
                    debug!(
                        "🏁 {}: channel closed. {} docs shipped, {} rejected. Shutting down.",
                        self.name, stats.shipped, stats.rejected
                    );
                    return Ok(stats);
                }
            }
        }
    }

    /// 📡 Ship the current batch and reset it. No-op on an empty batch —
    /// the cluster doesn't want empty bulk requests and frankly neither do we.
    ///
    /// Failure taxonomy, enforced right here:
    /// - transport trouble (unreachable cluster, non-2xx, unreadable body):
    ///   `Err`. This writer is done, and with it the session. No retries,
    ///   no re-queue — the offline-batch contract is fail fast and rerun.
    /// - per-document rejections inside a 2xx: counted, optionally logged,
    ///   and then we move on to the next batch. One bad document must not
    ///   abort an otherwise-healthy load.
    async fn flush(&self, batch: &mut Vec<String>, stats: &mut WriterStats) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let body = bulk::render_bulk_body(
            batch,
            &self.index,
            &self.doc_type,
            self.id_field.as_deref(),
        )?;

        let outcome = self.client.bulk(body).await.context(format!(
            "💀 {} could not deliver a batch of {} documents. The batch is lost, the session is over, and the documents flushed before this one remain indexed — there is no rollback, only rerun.",
            self.name,
            batch.len()
        ))?;

        let rejected = outcome.verdict.failed_count() as u64;
        if outcome.verdict.errors {
            stats.rejected += rejected;
            if self.verbose {
                // ⚠️ surfaced, not fatal — the offending documents are simply
                // absent from the index and the load keeps rolling
                warn!(
                    "⚠️ {}: the cluster took the request but bounced {}/{} documents. First complaint: {}",
                    self.name,
                    rejected,
                    batch.len(),
                    outcome
                        .verdict
                        .first_error()
                        .unwrap_or_else(|| "(no error detail provided)".to_string())
                );
            }
        }

        if self.verbose {
            debug!(
                "✅ {}: flushed {} docs with status {}",
                self.name,
                batch.len(),
                outcome.status
            );
        }

        stats.shipped += batch.len() as u64;
        batch.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::{ElasticsearchConfig, InputConfig, LoadConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CLEAN_BULK: &str = r#"{"took":1,"errors":false,"items":[]}"#;

    fn writer_config(url: &str, batch_size: usize) -> AppConfig {
        AppConfig {
            elasticsearch: ElasticsearchConfig {
                url: url.to_string(),
                index: "docs".to_string(),
                doc_type: "default".to_string(),
                username: None,
                password: None,
                mapping: None,
            },
            input: InputConfig::default(),
            load: LoadConfig {
                batch_size,
                workers: 1,
                verbose: false,
                ..LoadConfig::default()
            },
        }
    }

    async fn run_writer(config: &AppConfig, records: &[&str]) -> Result<WriterStats> {
        let (tx, rx) = async_channel::bounded::<String>(1);
        let client = EsClient::new(&config.elasticsearch).expect("client");
        let writer = BulkWriter::new("writer-0".to_string(), rx, client, config);
        let handle = writer.start();

        for record in records {
            tx.send(record.to_string()).await.expect("send");
        }
        drop(tx); // 🏁 closing time — the writer flushes its final partial and exits

        handle.await.expect("writer task should not panic")
    }

    #[tokio::test]
    async fn the_one_where_five_records_at_batch_two_make_three_requests() {
        // 🧪 ceil(5 / 2) = 3: two full batches and one final partial of one
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CLEAN_BULK))
            .expect(3)
            .mount(&server)
            .await;

        let config = writer_config(&server.uri(), 2);
        let stats = run_writer(&config, &[r#"{"a":1}"#, r#"{"b":2}"#, r#"{"c":3}"#, r#"{"d":4}"#, r#"{"e":5}"#])
            .await
            .expect("writer should succeed");

        assert_eq!(stats.shipped, 5);
        assert_eq!(stats.rejected, 0);

        // 📦 every request but the last carries exactly batch_size documents
        let requests = server.received_requests().await.expect("requests");
        let doc_counts: Vec<usize> = requests
            .iter()
            .map(|r| String::from_utf8_lossy(&r.body).lines().count() / 2)
            .collect();
        assert_eq!(doc_counts, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn the_one_where_an_empty_channel_ships_nothing_at_all() {
        // 🧪 channel closes before a single record — no bulk request, no drama
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CLEAN_BULK))
            .expect(0)
            .mount(&server)
            .await;

        let config = writer_config(&server.uri(), 10);
        let stats = run_writer(&config, &[]).await.expect("writer should exit cleanly");
        assert_eq!(stats.shipped, 0);
    }

    #[tokio::test]
    async fn the_one_where_bounced_documents_do_not_stop_the_line() {
        // 🧪 every response reports one rejection — the writer counts and continues
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"took":2,"errors":true,"items":[
                    {"index":{"status":201}},
                    {"index":{"status":400,"error":{"type":"mapper_parsing_exception"}}}
                ]}"#,
            ))
            .expect(2)
            .mount(&server)
            .await;

        let config = writer_config(&server.uri(), 2);
        let stats = run_writer(&config, &[r#"{"a":1}"#, r#"{"b":2}"#, r#"{"c":3}"#, r#"{"d":4}"#])
            .await
            .expect("partial rejections must not abort the writer");

        assert_eq!(stats.shipped, 4);
        assert_eq!(stats.rejected, 2, "one bounce per batch, dutifully counted");
    }

    #[tokio::test]
    async fn the_one_where_a_transport_failure_ends_the_writer() {
        // 💀 a 500 is not a partial failure. a 500 is the end.
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(500).set_body_string("shard meltdown"))
            .mount(&server)
            .await;

        let config = writer_config(&server.uri(), 1);
        let result = run_writer(&config, &[r#"{"a":1}"#]).await;
        assert!(result.is_err(), "transport failures are fatal to the writer");
    }
}
