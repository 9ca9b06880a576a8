//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 *[dramatic orchestral music swells]*
//! 🎬 "In a world where documents arrive faster than they can be indexed..."
//! 🎬 "One session dared to orchestrate them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Session module — part conductor, part air-traffic controller, part
//! that one project manager who actually does walk the release checklist in
//! order, every time, even the boring steps. ESPECIALLY the boring steps.
//!
//! The checklist, in full, and strictly in this order:
//!
//! 1. validate config (free of side effects, cheap to fail)
//! 2. purge the index, if asked, then let the deletion settle
//! 3. ensure the index exists
//! 4. apply the mapping, if one was configured, BEFORE any writes
//! 5. disable refresh — the big throughput lever
//! 6. zero the replicas, if asked — the other throughput lever
//! 7. start the writer pool
//! 8. pump records from the source into the handoff channel
//! 9. close the channel, wait for every writer to drain and report in
//! 10. restore settings and flush — ALWAYS, even when 5–9 went sideways
//! 11. brag about throughput, if verbose
//!
//! ⚠️ There is no cancellation and no signal handling. Kill the process
//! mid-load and the index is left with refresh disabled and replicas at
//! zero — a known, accepted, documented risk of the offline-batch contract.
//!
//! 🔒 Steps 2–4 run before any settings are touched, so their failures need
//! no cleanup. From step 5 on, the teardown in step 10 is unconditional.

mod writer;

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_channel::Sender;
use tracing::{debug, info, warn};

use crate::app_config::AppConfig;
use crate::client::EsClient;
use crate::progress::{self, ProgressMetrics};
use crate::source::LineSource;
use writer::BulkWriter;

/// 📊 What one completed session has to show for itself.
///
/// Returned to the caller instead of printed-and-forgotten, so a library
/// consumer can make decisions with it while the CLI just formats it.
#[derive(Debug, Clone)]
pub struct LoadSummary {
    /// 📄 records read from the input and dispatched to writers
    pub records: u64,
    /// ✅ documents the cluster actually accepted
    pub indexed: u64,
    /// ⚠️ documents individually rejected inside otherwise-successful batches
    pub failed: u64,
    /// ⏱️ wall-clock time for the whole session, settings to flush
    pub elapsed: Duration,
    /// 🧵 how many writers were doing the shoveling
    pub workers: usize,
}

impl LoadSummary {
    /// 🚀 The derived vanity metric: records over wall-clock seconds.
    pub fn docs_per_sec(&self) -> f64 {
        // 🐛 epsilon guard: a sub-microsecond test run should not report
        // infinite throughput, flattering as that would be
        self.records as f64 / self.elapsed.as_secs_f64().max(f64::EPSILON)
    }

    /// 🍽️ The end-of-session report card, rendered as a table for humans.
    pub fn render(&self) -> String {
        progress::summary_table(self).to_string()
    }
}

/// 📦 The Session: one bulk load, cradle to grave.
///
/// Owns the config (immutable from here on) and the client (cloned into every
/// writer — one connection pool, many mouths). Consumed by [`Session::run`];
/// a session is not a reusable object, it is an event.
pub struct Session {
    config: AppConfig,
    client: EsClient,
}

impl Session {
    /// 🚀 Validate the config and build the HTTP client.
    ///
    /// Everything that can fail here fails before a single packet leaves the
    /// building — the config taxonomy's "no side effects yet" guarantee.
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let client = EsClient::new(&config.elasticsearch)?;
        Ok(Self { config, client })
    }

    /// 🎬 Run the whole checklist against the given record source.
    ///
    /// The source is consumed exactly once, front to back. On success you get
    /// a [`LoadSummary`]; on failure you get the root cause with its full
    /// context chain — and the settings restoration + flush will have been
    /// attempted regardless, because step 10 does not care how step 8 felt.
    pub async fn run(self, source: LineSource) -> Result<LoadSummary> {
        let started = Instant::now();

        // 🗑️ Step 2: purge, then settle. The pause is a flat delay, not a
        // readiness poll — deliberately dumb, deliberately robust. The
        // deletion propagates through the cluster at its own pace and we
        // simply give it a moment of silence.
        if self.config.load.purge {
            self.client.delete_index().await?;
            let settle = Duration::from_millis(self.config.load.purge_settle_ms);
            debug!("🕰️ index purged — settling for {:?} before recreating", settle);
            tokio::time::sleep(settle).await;
        }

        // 🏗️ Step 3: ensure the index exists (idempotent — see the client).
        self.client.create_index().await?;

        // 📋 Step 4: mapping before writes, or the mapping is just a wish.
        if let Some(location) = &self.config.elasticsearch.mapping {
            let body = resolve_mapping(location).await?;
            self.client.put_mapping(body).await?;
        }

        // 🔒 Steps 5–9 run inside the guarded region: whatever they do to the
        // index settings, step 10 undoes. Both results are collected before
        // either is allowed to escape.
        let outcome = self.load(source).await;
        let teardown = self.restore_and_flush().await;

        let (records, shipped, failed) = match (outcome, teardown) {
            (Err(load_err), Err(teardown_err)) => {
                // ⚠️ the load failed AND the best-effort cleanup failed. The
                // load error is the story; the teardown error is a footnote
                // the operator still deserves to see.
                warn!(
                    "⚠️ best-effort teardown failed while handling a load error — the index may be left with refresh disabled: {teardown_err:#}"
                );
                return Err(load_err);
            }
            (Err(load_err), Ok(())) => return Err(load_err),
            (Ok(_), Err(teardown_err)) => return Err(teardown_err),
            (Ok(counts), Ok(())) => counts,
        };

        let summary = LoadSummary {
            records,
            indexed: shipped - failed,
            failed,
            elapsed: started.elapsed(),
            workers: self.config.load.workers,
        };

        // 📊 Step 11: the brag line, verbose runs only.
        if self.config.load.verbose {
            info!(
                "📊 {} docs in {:?} at {:.3} docs/s with {} workers",
                summary.records,
                summary.elapsed,
                summary.docs_per_sec(),
                summary.workers
            );
        }

        Ok(summary)
    }

    /// 🔄 Steps 5–9: settings down, writers up, records through, writers down.
    ///
    /// Returns (records read, documents shipped, documents rejected).
    async fn load(&self, source: LineSource) -> Result<(u64, u64, u64)> {
        // 🧊 Step 5: stop the cluster making every document searchable the
        // instant it lands. Non-success is fatal — a load that silently ran
        // with refresh enabled did not do the job it was asked to do.
        self.client.disable_refresh().await?;

        // 🔧 Step 6: optionally stop the cluster copying every document
        // sideways to replicas while we shovel.
        if self.config.load.zero_replicas {
            self.client.set_replicas(Some(0)).await?;
        }

        // 🤝 The handoff channel: capacity 1, so at most one record is ever
        // in flight between the pump and the pool. The send blocking until a
        // writer is free IS the backpressure mechanism — there is no queue
        // depth to tune because there is no queue.
        let (tx, rx) = async_channel::bounded::<String>(1);

        // 🧵 Step 7: the writer pool. Every writer gets a clone of the
        // receiver and a clone of the client; the JoinHandles are the
        // completion barrier we block on in step 9.
        let workers = self.config.load.workers;
        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let writer = BulkWriter::new(
                format!("writer-{i}"),
                rx.clone(),
                self.client.clone(),
                &self.config,
            );
            handles.push(writer.start());
        }
        // 🔒 the writers now hold the only receivers — when the pump drops
        // the sender, the channel closes and every writer sees it
        drop(rx);

        // 📂 Step 8: the pump. Blocking I/O on a blocking thread, shoveling
        // records into the channel one rendezvous at a time.
        let source_name = self
            .config
            .input
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdin".to_string());
        let metrics = ProgressMetrics::new(source_name, self.config.load.verbose);
        let pump = tokio::task::spawn_blocking(move || pump_records(source, tx, metrics));

        let pump_outcome = pump.await.context(
            "💀 The dispatch pump panicked — the input thread is gone and nobody saw what happened. This is not a data problem. This is a bug.",
        )?;

        // 🏁 Step 9: the completion barrier. Every writer flushes its final
        // partial batch and reports its stats; we wait for all of them.
        let writer_results = futures::future::try_join_all(handles).await.context(
            "💀 A writer task panicked mid-batch. The session cannot account for its documents and will not pretend otherwise.",
        )?;

        // ⚠️ Writer failures outrank pump failures on purpose: when every
        // writer dies, the channel collapses and the pump ALSO errors — but
        // the writers know why, and the pump only knows that nobody answered.
        let mut shipped = 0u64;
        let mut failed = 0u64;
        for result in writer_results {
            let stats = result?;
            shipped += stats.shipped;
            failed += stats.rejected;
        }

        let records = pump_outcome?;
        Ok((records, shipped, failed))
    }

    /// 🔄 Step 10: put the index back the way we found it, then make it durable.
    ///
    /// Refresh back to a civilized cadence, the replica override cleared back
    /// to the index default (null — yes, null, the settings API speaks null),
    /// and a synchronous `_flush` so everything indexed tonight survives a
    /// node restart tomorrow.
    async fn restore_and_flush(&self) -> Result<()> {
        self.client.restore_refresh().await?;
        self.client.set_replicas(None).await?;
        self.client.flush_index().await?;
        Ok(())
    }
}

/// 📂 The dispatch pump: runs on a blocking thread, walks the source once,
/// and hands each record to whichever writer is free to take it.
///
/// The sender is moved in and dropped on exit — success, error, either way —
/// which closes the channel exactly once and tells every writer "no more
/// records, flush and go home." There is no other close path.
fn pump_records(
    source: LineSource,
    tx: Sender<String>,
    mut metrics: ProgressMetrics,
) -> Result<u64> {
    let mut records = 0u64;
    for line in source {
        // 💀 a non-EOF read failure aborts the dispatch loop on the spot
        let record = line?;
        let bytes = record.len() as u64;
        if tx.send_blocking(record).is_err() {
            // 💀 send fails only when every receiver is gone — i.e. every
            // writer has already died. Their errors carry the real story;
            // this one just stops the shoveling.
            anyhow::bail!(
                "💀 Every writer hung up before the input ran out. The handoff channel closed under us mid-dispatch."
            );
        }
        records += 1;
        metrics.update(bytes, 1);
    }
    metrics.finish();
    Ok(records)
}

/// 📋 Resolve a configured mapping: if the string names a file that exists,
/// the file's contents are the mapping; otherwise the string itself is.
///
/// The filesystem check comes first and wins. A literal mapping that happens
/// to collide with an existing path would be an impressive coincidence, and
/// the file is what you'd want in that scenario anyway.
async fn resolve_mapping(location: &str) -> Result<String> {
    let path = Path::new(location);
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        tokio::fs::read_to_string(path).await.context(format!(
            "💀 The mapping file '{location}' exists but would not read. Close enough to touch, too far to use."
        ))
    } else {
        Ok(location.to_string())
    }
}
