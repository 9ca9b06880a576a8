//! 📡 Bulk wire format — dressing documents for the `_bulk` API's peculiar tastes.
//!
//! 🎬 COLD OPEN — INT. ELASTICSEARCH CLUSTER — BULK ENDPOINT — HIGH NOON
//!
//! The bulk API has rules. Written rules, technically, but scattered across
//! a documentation page with three contradictory examples in one paragraph.
//!
//! Rule 1: Two lines per document. Action metadata, then document source. Always.
//! Rule 2: Newline-delimited. Not comma-separated. Not XML. NEWLINES.
//! Rule 3: The trailing newline on the whole body matters. It MATTERS.
//!          Three engineers lost weekends to this. One still flinches at `\n`.
//!
//! This module renders a batch of raw records into that exact wire format,
//! and reads the service's verdict back out of the bulk response body —
//! the top-level `errors` flag plus the per-item `error` objects that say
//! which documents got bounced at the door.
//!
//! 🧠 Knowledge graph:
//! - **Used by**: each writer at flush time, and the HTTP client on the way back
//! - **Wire format**: `{"index":{"_index":…,"_type":…[,"_id":…]}}\n{…doc…}\n` per record
//! - **Id extraction**: the ONLY time a record is ever parsed, and only when an
//!   id field is configured. Otherwise documents pass through as opaque bytes.
//! - **Partial failures**: data, not errors. The caller decides how loudly to sigh.
//!
//! 🦆 (the duck demands exactly two lines per document. the duck is the bulk API.)

use anyhow::{Context, Result};
use serde::Deserialize;

/// 📡 Render one batch of raw records into a `_bulk` request body.
///
/// For every record: one action line, one source line, each `\n`-terminated —
/// so the whole body carries the trailing newline the bulk API insists on.
///
/// The action line always names the target index and document type. The `_id`
/// field appears only when `id_field` is configured AND the record actually
/// carries that field with a usable value; otherwise it is absent (not null!)
/// and the service auto-generates an id. Absent, not null. This distinction
/// has ruined evenings.
///
/// 💀 With an id field configured, a record that refuses to parse as JSON is
/// an error — we cannot extract an id from soup, and quietly indexing the
/// soup without one would make re-runs silently double-index it.
pub fn render_bulk_body(
    records: &[String],
    index: &str,
    doc_type: &str,
    id_field: Option<&str>,
) -> Result<String> {
    // 🔧 Pre-allocate with a vibes-based estimate: payload + ~64 bytes of
    // action-line overhead per record. The allocator has seen worse.
    let estimated: usize = records.iter().map(|r| r.len() + 64).sum();
    let mut body = String::with_capacity(estimated);

    for record in records {
        body.push_str(&action_line(index, doc_type, id_field, record)?);
        body.push('\n');
        body.push_str(record);
        body.push('\n');
    }

    Ok(body)
}

/// 🏗️ Build the action metadata line for one record — the cover letter each
/// document mails in ahead of itself.
fn action_line(
    index: &str,
    doc_type: &str,
    id_field: Option<&str>,
    record: &str,
) -> Result<String> {
    let mut meta = serde_json::Map::new();
    meta.insert(
        "_index".to_string(),
        serde_json::Value::String(index.to_string()),
    );
    meta.insert(
        "_type".to_string(),
        serde_json::Value::String(doc_type.to_string()),
    );

    // 📎 _id — the document's social security number. Only hunted for when an
    // id field was configured; this is the single place a record gets parsed.
    if let Some(field) = id_field {
        if let Some(id) = extract_id(record, field)? {
            meta.insert("_id".to_string(), serde_json::Value::String(id));
        }
        // 💤 field absent from the document: no _id, the service invents one.
    }

    let action = serde_json::json!({ "index": meta });
    serde_json::to_string(&action).context(
        "💀 Failed to serialize bulk action metadata. The JSON that describes \
         JSON has failed to become JSON. This is the kind of irony that would \
         make Alanis Morissette write another verse.",
    )
}

/// 🔍 Pull the configured id field out of one record.
///
/// Returns `Ok(None)` when the field simply isn't there — that's the
/// auto-generate-an-id path, not a problem. Strings are used verbatim,
/// numbers are rendered in their JSON form (`7` → `"7"`), and anything
/// else (objects, arrays, booleans, null) is rejected: an id that is
/// secretly a nested object is a config mistake, not a document.
fn extract_id(record: &str, field: &str) -> Result<Option<String>> {
    let doc: serde_json::Value = serde_json::from_str(record).context(format!(
        "💀 An id field ('{field}') is configured, but this record would not parse \
         as JSON, so there is nothing to extract an id from. The record starts \
         with: '{}'",
        record.chars().take(80).collect::<String>()
    ))?;

    match doc.get(field) {
        None => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => anyhow::bail!(
            "💀 The id field '{field}' exists but holds {other} — not a string, \
             not a number, not usable as a document id. We looked at it from \
             several angles. It did not improve.",
        ),
    }
}

/// 📬 The service's verdict on one bulk request, straight from the response body.
///
/// The contract: a 2xx bulk response means the REQUEST was accepted, not that
/// every DOCUMENT was. The `errors` flag flips true when any item inside
/// failed, and each failed item carries an `error` object under its action
/// key. One bad document must not abort an otherwise-healthy load, so this
/// struct reports failures as numbers, never as `Err`.
#[derive(Debug, Deserialize)]
pub struct BulkResponse {
    /// ⏱️ server-side milliseconds spent on the request, when reported
    #[serde(default)]
    pub took: Option<u64>,
    /// ⚠️ true when at least one item inside the batch was rejected
    #[serde(default)]
    pub errors: bool,
    /// 📦 one entry per document, keyed by action ("index", here, always)
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
}

impl BulkResponse {
    /// 🔢 Count the items whose action result carries an `error` object.
    pub fn failed_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| {
                item.as_object()
                    .map(|actions| actions.values().any(|v| v.get("error").is_some()))
                    .unwrap_or(false)
            })
            .count()
    }

    /// 🔍 The first per-item error, flattened for a log line. The rest of the
    /// failures look mostly like this one anyway. They always do.
    pub fn first_error(&self) -> Option<String> {
        self.items.iter().find_map(|item| {
            item.as_object()?
                .values()
                .find_map(|v| v.get("error"))
                .map(|e| e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_a_record_with_an_id_gets_its_id_stamped_on() -> Result<()> {
        // 🧪 id field configured, id field present — the happy path
        let records = vec![r#"{"id":"x7","v":1}"#.to_string()];
        let body = render_bulk_body(&records, "docs", "default", Some("id"))?;
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(lines.len(), 2, "one record = exactly two lines");
        let action: serde_json::Value = serde_json::from_str(lines[0])?;
        assert_eq!(action["index"]["_id"], "x7");
        assert_eq!(action["index"]["_index"], "docs");
        assert_eq!(action["index"]["_type"], "default");
        // 📦 source line passes through byte-for-byte
        assert_eq!(lines[1], r#"{"id":"x7","v":1}"#);
        Ok(())
    }

    #[test]
    fn the_one_where_a_missing_id_field_means_no_id_at_all() -> Result<()> {
        // 🧪 id field configured but absent from the doc — absent, not null
        let records = vec![r#"{"v":1}"#.to_string()];
        let body = render_bulk_body(&records, "docs", "default", Some("id"))?;
        let action: serde_json::Value =
            serde_json::from_str(body.lines().next().expect("action line"))?;

        assert!(
            action["index"].get("_id").is_none(),
            "no id in the doc means no _id in the action. Absent. Not null."
        );
        Ok(())
    }

    #[test]
    fn the_one_where_no_id_field_means_no_parsing_happens() -> Result<()> {
        // 🧪 without an id field, records are opaque — even records that would
        // never survive a JSON parser sail straight through
        let records = vec!["this is not json and nobody checks".to_string()];
        let body = render_bulk_body(&records, "docs", "default", None)?;
        assert!(body.ends_with("this is not json and nobody checks\n"));
        Ok(())
    }

    #[test]
    fn the_one_where_a_numeric_id_becomes_a_string() -> Result<()> {
        let records = vec![r#"{"id":42,"v":1}"#.to_string()];
        let body = render_bulk_body(&records, "docs", "default", Some("id"))?;
        let action: serde_json::Value =
            serde_json::from_str(body.lines().next().expect("action line"))?;
        assert_eq!(action["index"]["_id"], "42");
        Ok(())
    }

    #[test]
    fn the_one_where_an_unparseable_record_with_id_config_is_an_error() {
        // 💀 id extraction from soup: refused
        let records = vec!["{broken".to_string()];
        let result = render_bulk_body(&records, "docs", "default", Some("id"));
        assert!(result.is_err());
    }

    #[test]
    fn the_one_where_an_object_shaped_id_is_shown_the_door() {
        let records = vec![r#"{"id":{"nested":"nope"}}"#.to_string()];
        let result = render_bulk_body(&records, "docs", "default", Some("id"));
        assert!(result.is_err(), "an id that is an object is a config mistake");
    }

    #[test]
    fn the_one_where_the_body_ends_with_the_sacred_trailing_newline() -> Result<()> {
        // 🧪 three records → six lines → one trailing \n on the whole body
        let records = vec![
            r#"{"a":1}"#.to_string(),
            r#"{"b":2}"#.to_string(),
            r#"{"c":3}"#.to_string(),
        ];
        let body = render_bulk_body(&records, "docs", "default", None)?;
        assert!(body.ends_with('\n'), "the trailing newline MATTERS");
        assert_eq!(body.lines().count(), 6, "two lines per record, no freeloaders");
        Ok(())
    }

    #[test]
    fn the_one_where_the_bulk_response_counts_its_casualties() -> Result<()> {
        // 🧪 two items, one of them rejected by a disappointed mapper
        let raw = r#"{
            "took": 7,
            "errors": true,
            "items": [
                {"index": {"_id": "ok-1", "status": 201}},
                {"index": {"_id": "bad-1", "status": 400,
                           "error": {"type": "mapper_parsing_exception"}}}
            ]
        }"#;
        let response: BulkResponse = serde_json::from_str(raw)?;

        assert!(response.errors);
        assert_eq!(response.failed_count(), 1);
        assert!(
            response
                .first_error()
                .expect("one failure should be reported")
                .contains("mapper_parsing_exception")
        );
        Ok(())
    }

    #[test]
    fn the_one_where_a_clean_bulk_response_has_zero_casualties() -> Result<()> {
        let raw = r#"{"took": 3, "errors": false,
                      "items": [{"index": {"_id": "a", "status": 201}}]}"#;
        let response: BulkResponse = serde_json::from_str(raw)?;
        assert!(!response.errors);
        assert_eq!(response.failed_count(), 0);
        assert!(response.first_error().is_none());
        Ok(())
    }
}
