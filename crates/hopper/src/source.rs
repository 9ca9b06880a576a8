//! 📂 The line source — where every document's journey begins.
//!
//! 🎬 *[a file descriptor opens. somewhere, a newline waits to be found.]*
//!
//! One raw byte stream in (file, stdin, or something gzipped beyond
//! recognition), one lazy parade of trimmed NDJSON lines out. Blank lines
//! are shown the door. Whitespace is shaved off both ends. Nothing is
//! parsed — the documents ride through as opaque strings, dignity intact.
//!
//! 🧠 Knowledge graph:
//! - **Consumed by**: the session's dispatch pump, exactly once, front to back
//! - **Blocking on purpose**: this iterator does synchronous I/O and is driven
//!   from `spawn_blocking`. No async trait gymnastics for a sequential read.
//! - **Gzip**: `MultiGzDecoder`, so multi-member files from `gzip`/`pigz`
//!   decode fully instead of stopping after the first member.
//!
//! 🦆 (the duck reads stdin and judges nobody)

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use tracing::debug;

use crate::app_config::InputConfig;

/// 📂 A lazy, finite, consumed-once stream of trimmed, non-empty lines.
///
/// Each `next()` hauls one record out of the underlying reader:
/// - EOF ends the parade cleanly (`None`). No error. Just closure.
/// - Lines that are empty after trimming are skipped without comment.
/// - Any other read failure surfaces as `Err` and the caller should treat
///   it as fatal. A half-read input is not an input. It is a trap.
///
/// ⚠️ Gzip corruption also surfaces here: `MultiGzDecoder` parses the header
/// lazily, so a file that is secretly not gzip fails on the first read,
/// before a single record escapes downstream.
pub struct LineSource {
    reader: Box<dyn BufRead + Send>,
    // 🔄 reused line buffer — one allocation amortized over the whole file
    line: String,
}

impl std::fmt::Debug for LineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 🎭 the boxed reader is a mystery guest and does not derive Debug
        f.debug_struct("LineSource").finish_non_exhaustive()
    }
}

impl LineSource {
    /// 🚀 Wrap any `Read` in a line source, optionally unzipping on the fly.
    pub fn from_reader(reader: impl Read + Send + 'static, gzip: bool) -> Self {
        let reader: Box<dyn BufRead + Send> = if gzip {
            // 🫁 decompress first, buffer second — buffering the compressed
            // side would just make the decoder's day slightly worse
            Box::new(BufReader::new(MultiGzDecoder::new(reader)))
        } else {
            Box::new(BufReader::new(reader))
        };
        Self {
            reader,
            line: String::new(),
        }
    }

    /// 📂 Open a file on disk as a line source.
    ///
    /// 💀 A file that will not open is fatal right here, before any index
    /// settings get touched. Fail at the door, not in the living room.
    pub fn from_path(path: &Path, gzip: bool) -> Result<Self> {
        let file = File::open(path).context(format!(
            "💀 The door to '{}' would not budge. We knocked. We checked it exists \
             (it might not). We checked permissions (they might be wrong). \
             The input remains unread. We remain outside.",
            path.display()
        ))?;
        Ok(Self::from_reader(file, gzip))
    }

    /// 📥 Read from stdin — the classic pipe-it-in workflow.
    pub fn stdin(gzip: bool) -> Self {
        Self::from_reader(io::stdin(), gzip)
    }
}

/// 🚪 Open the configured input: a file path if one was given, stdin otherwise.
pub fn open_input(config: &InputConfig) -> Result<LineSource> {
    match &config.path {
        Some(path) => {
            debug!("📂 reading records from '{}'", path.display());
            LineSource::from_path(path, config.gzip)
        }
        None => {
            debug!("📥 no input path configured — reading records from stdin");
            Ok(LineSource::stdin(config.gzip))
        }
    }
}

impl Iterator for LineSource {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                // 🏁 zero bytes read = EOF. The well is dry. The parade ends.
                Ok(0) => return None,
                Ok(_) => {
                    // 🧹 trim both ends — \n, \r\n, stray tabs, the works
                    let trimmed = self.line.trim();
                    if trimmed.is_empty() {
                        // 💤 a blank line. Not a record. Not an error. Skip.
                        continue;
                    }
                    return Some(Ok(trimmed.to_owned()));
                }
                Err(err) => {
                    // 💀 a non-EOF read failure mid-stream. Could be a yanked
                    // disk, could be gzip rot, could be invalid UTF-8 cosplaying
                    // as JSON. Whatever it is, the load cannot be trusted past
                    // this point.
                    return Some(Err(anyhow::Error::new(err).context(
                        "💀 The input stream failed mid-read. Not EOF — EOF is fine, \
                         EOF is the plan — an actual failure. The records after this \
                         point are unreachable and the load stops here.",
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::{Cursor, Write};

    fn collect(source: LineSource) -> Vec<String> {
        source
            .map(|record| record.expect("💀 test input should read cleanly"))
            .collect()
    }

    #[test]
    fn the_one_where_blank_lines_are_politely_ignored() {
        // 🧪 two real records with a blank line crashing the party between them
        let input = "{\"a\":1}\n\n{\"b\":2}\n";
        let records = collect(LineSource::from_reader(Cursor::new(input), false));
        assert_eq!(records, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn the_one_where_whitespace_only_lines_count_for_nothing() {
        // 🧪 spaces, tabs, and \r\n — all of it evaporates
        let input = "  {\"a\":1}\t\r\n   \t \n\n{\"b\":2}";
        let records = collect(LineSource::from_reader(Cursor::new(input), false));
        assert_eq!(records, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn the_one_where_the_last_line_needs_no_trailing_newline() {
        // 🧪 files that end without a final \n are files too
        let input = "{\"a\":1}\n{\"b\":2}";
        let records = collect(LineSource::from_reader(Cursor::new(input), false));
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], "{\"b\":2}");
    }

    #[test]
    fn the_one_where_an_empty_stream_yields_exactly_nothing() {
        // 🧪 no bytes, no records, no drama
        let records = collect(LineSource::from_reader(Cursor::new(""), false));
        assert!(records.is_empty());
    }

    #[test]
    fn the_one_where_gzip_input_unzips_on_the_fly() {
        // 🧪 compress a tiny NDJSON payload, then read it back through the source
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(b"{\"a\":1}\n\n{\"b\":2}\n")
            .expect("💀 gzip fixture write failed");
        let compressed = encoder.finish().expect("💀 gzip fixture finish failed");

        let records = collect(LineSource::from_reader(Cursor::new(compressed), true));
        assert_eq!(records, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn the_one_where_fake_gzip_fails_on_the_first_read() {
        // 🧪 plain text wearing a .gz badge — the decoder sees through it
        let mut source = LineSource::from_reader(Cursor::new("definitely not gzip"), true);
        let first = source.next().expect("💀 should yield a terminal error, not EOF");
        assert!(first.is_err(), "corrupt gzip must surface as an error");
    }

    #[test]
    fn the_one_where_a_missing_file_fails_at_the_door() {
        let result = LineSource::from_path(Path::new("/definitely/not/here.ndjson"), false);
        assert!(result.is_err());
    }

    #[test]
    fn the_one_where_a_real_file_reads_like_any_other_stream() {
        // 🧪 tempfile round trip, because from_path deserves one honest test
        let dir = tempfile::tempdir().expect("💀 tempdir refused to exist");
        let path = dir.path().join("docs.ndjson");
        std::fs::write(&path, "{\"a\":1}\n  \n{\"b\":2}\n").expect("💀 fixture write failed");

        let source = LineSource::from_path(&path, false).expect("💀 file should open");
        assert_eq!(collect(source).len(), 2);
    }
}
