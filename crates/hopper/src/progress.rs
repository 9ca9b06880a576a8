//! 📊 progress.rs — "Are we there yet?" — every bulk load, every time, forever.
//!
//! 🚀 This module answers the age-old question: "how fast are the documents
//! moving?" With cold hard numbers, a spinner, and a table so comfy it has
//! lumbar support.
//!
//! ⚠️  Warning: watching the spinner will not make it go faster.
//! Neither will refreshing it. We've tried. Science says no.
//!
//! Unlike a file copy, a bulk load has no trustworthy total — the input may
//! be a pipe, and gzip lies about its size anyway — so there is no percent,
//! no ETA, no bar. Just rates, counts, and elapsed time. Honest metrics.
//!
//! 🦆 The duck has nothing to do with this module. It's just vibing.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

use crate::session::LoadSummary;

// 📏 one mebibyte — not a megabyte, pedants. there's a difference and I will die on this hill.
const MIB: u64 = 1024 * 1024;

// 🎨 re-render at most this often; the counters always update, the terminal
// only hears about it a few times a second. Terminals have feelings too.
const RENDER_INTERVAL: Duration = Duration::from_millis(200);

/// 📦 Converts raw bytes into a human-readable string.
/// Because "1073741824 bytes" is a war crime in a UI.
fn format_bytes(bytes: u64) -> String {
    if bytes >= 512 * MIB {
        // 🚀 MiB territory — congratulations on your large load
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= MIB {
        // 📦 KiB zone — still respectable
        format!("{:.2} KiB", bytes as f64 / 1024.0)
    } else {
        // 🐛 raw bytes mode. small loads need love too.
        format!("{} bytes", bytes)
    }
}

/// 🔢 Formats a number with commas for the 3 people in the audience who like readability.
/// "1000000 docs" → "1,000,000 docs" — you're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    // 🧵 pre-allocate like we know what we're doing (we do, we read the book)
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ Formats a Duration into MM:SS or HH:MM:SS.
/// If it shows HH:MM:SS, you should probably call your mom. It's been a while.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        // 🔄 long haul load. order pizza. plural.
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        // ✅ quick run. you have time for coffee. maybe.
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 📡 A snapshot of throughput rates at any given moment.
/// Like a speedometer, but for documents. And less likely to get you a ticket.
struct Rates {
    /// 🚀 documents per second (the vanity metric)
    docs_per_sec: f64,
    /// 📦 MiB per second flowing toward the cluster (the real metric)
    mib_per_sec: f64,
}

/// 📊 The brains behind the live display. Tracks bytes, docs, rates, and your sanity.
///
/// Uses a sliding 5-second window for rate calculations so spikes don't scare you.
/// (Your heart rate is not our responsibility.)
///
/// Hidden entirely unless the session is verbose — quiet runs stay quiet.
///
/// # Ancient Proverb
/// "He who runs a bulk load without a progress line, loads alone and in darkness."
pub(crate) struct ProgressMetrics {
    /// 🏷️ what are we even loading? a name to display in the UI
    source_name: String,
    /// 📦 bytes dispatched so far, relentlessly accumulating like technical debt
    total_bytes: u64,
    /// 📄 records dispatched so far — each one a tiny victory
    total_docs: u64,
    /// 🎨 the actual terminal spinner (indicatif does the heavy lifting here)
    progress_bar: ProgressBar,
    /// 🔄 sliding window of (timestamp, bytes, docs) for rate calculation
    rate_samples: VecDeque<(Instant, u64, u64)>,
    /// ⏱️ when did this whole adventure start? hopefully not too long ago.
    start_time: Instant,
    /// 🎨 last time we actually redrew — counters are cheap, terminals are not
    last_render: Instant,
}

impl std::fmt::Debug for ProgressMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 🎭 custom Debug impl because ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("ProgressMetrics")
            .field("source_name", &self.source_name)
            .field("total_bytes", &self.total_bytes)
            .field("total_docs", &self.total_docs)
            .finish()
    }
}

impl ProgressMetrics {
    /// 🚀 Spin up a new ProgressMetrics. Pass `visible = false` for quiet runs —
    /// the counters still count, the terminal just never hears about it.
    pub(crate) fn new(source_name: String, visible: bool) -> Self {
        let progress_bar = if visible {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.cyan} {msg}")
                    // 🐛 safe unwrap: template string is hardcoded and valid, I checked, twice
                    .unwrap(),
            );
            bar
        } else {
            // 💤 hidden bar — same API, zero terminal output
            ProgressBar::hidden()
        };

        let start_time = Instant::now();

        // 🔄 seed the rate window with t=0 so we don't divide by zero like animals
        let mut rate_samples = VecDeque::new();
        rate_samples.push_back((start_time, 0u64, 0u64));

        Self {
            source_name,
            total_bytes: 0,
            total_docs: 0,
            progress_bar,
            rate_samples,
            start_time,
            last_render: start_time,
        }
    }

    /// 🔄 Feed the metrics engine with fresh dispatch data.
    ///
    /// Called once per record from the dispatch pump, so the render is
    /// throttled: totals accumulate every call, the table re-renders at most
    /// every [`RENDER_INTERVAL`]. A million records should cost a million
    /// additions, not a million terminal redraws.
    pub(crate) fn update(&mut self, bytes_read: u64, docs_read: u64) {
        // 📦 accumulate the stats — they compound like a 401k, except real
        self.total_bytes += bytes_read;
        self.total_docs += docs_read;

        if self.last_render.elapsed() >= RENDER_INTERVAL {
            self.last_render = Instant::now();
            let rates = self.calculate_rates();
            self.render(rates);
        }
    }

    /// ✅ Mark the display done. Ring the bell. We made it.
    /// (Or we hit EOF. Same energy.)
    pub(crate) fn finish(&mut self) {
        let rates = self.calculate_rates();
        self.render(rates);
        self.progress_bar.finish();
    }

    /// 📈 Calculate current throughput rates using a 5-second sliding window.
    ///
    /// Sliding window keeps the displayed rate from looking like a seismograph
    /// during normal operations. Short bursts won't spike you into existential terror.
    fn calculate_rates(&mut self) -> Rates {
        let now = Instant::now();
        // 🔄 evict samples older than 5 seconds from the front of the queue —
        // like a bouncer at a club, but for data points
        let window = Duration::from_secs(5);
        while let Some(&(timestamp, _, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > window {
                self.rate_samples.pop_front();
            } else {
                // ✅ this sample is fresh enough, and so are all the ones behind it
                break;
            }
        }

        // 📦 push the current moment into the window — the present is always relevant
        self.rate_samples
            .push_back((now, self.total_bytes, self.total_docs));

        // 📊 compare now vs oldest sample in window to get deltas
        if let Some(&(oldest_time, oldest_bytes, oldest_docs)) = self.rate_samples.front() {
            let elapsed = now.duration_since(oldest_time).as_secs_f64();
            if elapsed > 0.0 {
                // 🚀 we have a meaningful window — do the math
                let bytes_delta = self.total_bytes.saturating_sub(oldest_bytes);
                let docs_delta = self.total_docs.saturating_sub(oldest_docs);
                return Rates {
                    docs_per_sec: docs_delta as f64 / elapsed,
                    mib_per_sec: (bytes_delta as f64 / elapsed) / MIB as f64,
                };
            }
        }

        // 💤 not enough elapsed time yet — return zeros and maintain composure
        Rates {
            docs_per_sec: 0.0,
            mib_per_sec: 0.0,
        }
    }

    /// 🎨 Render the live display as a comfy-table message on the spinner.
    ///
    /// Layout (3 rows x 2 cols):
    /// ```text
    /// source: <name>
    ///   <docs/s>     <total docs>
    ///   <MiB/s>      <total bytes>
    ///   <elapsed>
    /// ```
    ///
    /// If you're reading this comment at 3am during an incident, I'm so sorry.
    /// At least the table looks nice.
    fn render(&self, rates: Rates) {
        let docs_rate = format_number(rates.docs_per_sec as u64);
        let docs_total = format_number(self.total_docs);
        let elapsed_fmt = format_duration(self.start_time.elapsed());

        // 🍽️ two columns, right-aligned, no borders (preset: NOTHING) —
        // NOTHING preset because we're minimalists. and also the borders looked bad.
        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);

        // 🚀 row 1: document throughput
        table.add_row(vec![
            Cell::new(format!("{} Docs/s", docs_rate)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{} Docs", docs_total)).set_alignment(CellAlignment::Right),
        ]);
        // 📦 row 2: byte throughput and cumulative volume
        table.add_row(vec![
            Cell::new(format!("{:.2} MiB/s", rates.mib_per_sec))
                .set_alignment(CellAlignment::Right),
            Cell::new(format_bytes(self.total_bytes)).set_alignment(CellAlignment::Right),
        ]);
        // ⏱️ row 3: time elapsed — no ETA, the total is unknowable and we've made peace
        table.add_row(vec![
            Cell::new(format!("{} elapsed", elapsed_fmt)).set_alignment(CellAlignment::Right),
            Cell::new(""),
        ]);

        // 🎨 slam it all into the spinner message — indicatif handles the
        // terminal magic (cursor positioning, redraw, etc.)
        self.progress_bar
            .set_message(format!("source: {}\n{}", self.source_name, table));
    }
}

/// 🍽️ The end-of-session report card, as a comfy table.
///
/// Records read, documents accepted, documents bounced, wall-clock time,
/// derived throughput, worker count. The numbers the operator actually
/// wanted all along.
pub(crate) fn summary_table(summary: &LoadSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let rows = [
        ("records read", format_number(summary.records)),
        ("docs indexed", format_number(summary.indexed)),
        ("docs rejected", format_number(summary.failed)),
        ("elapsed", format_duration(summary.elapsed)),
        ("docs/s", format!("{:.3}", summary.docs_per_sec())),
        ("workers", format_number(summary.workers as u64)),
    ];
    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label).set_alignment(CellAlignment::Left),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
