//! JSON-lines batch reader.
//!
//! Input files live under a hierarchical directory tree (song metadata
//! three levels deep, log events two); the reader simply takes every
//! `.json` object under the prefix, which subsumes both layouts. Each file
//! holds one JSON record per line.
//!
//! Error policy follows schema-on-read: a line that is not valid UTF-8, not
//! valid JSON, or not a JSON object is dropped with a warning and counted;
//! an unreachable input prefix is fatal.

use tracing::{info, warn};

use lyra_core::{CoreError, StorageBackend};

use crate::error::Result;
use crate::schema::RecordSchema;
use crate::table::Table;

/// Counters from one batch read.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadStats {
    /// Number of `.json` files read.
    pub files: usize,
    /// Rows successfully coerced.
    pub rows: usize,
    /// Lines dropped as malformed.
    pub malformed: usize,
}

/// Reads every JSON-lines file under a prefix into a typed table.
pub struct JsonBatchReader;

impl JsonBatchReader {
    /// Reads and coerces all records under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if listing fails, if no `.json` objects exist
    /// under the prefix (an unreachable or empty input is a fatal read
    /// failure, not an empty run), or if any file read fails.
    pub async fn read(
        backend: &dyn StorageBackend,
        prefix: &str,
        name: &str,
        schema: RecordSchema,
    ) -> Result<(Table, ReadStats)> {
        let mut objects = backend.list(prefix).await?;
        objects.retain(|o| o.path.ends_with(".json"));
        if objects.is_empty() {
            return Err(CoreError::NotFound(format!("no .json input under {prefix}")).into());
        }
        // Listing order is backend-defined; sort so reruns see the same
        // input order (the dedup representative depends on it).
        objects.sort_by(|a, b| a.path.cmp(&b.path));

        let mut stats = ReadStats {
            files: objects.len(),
            ..ReadStats::default()
        };
        let mut rows = Vec::new();

        for object in &objects {
            let data = backend.get(&object.path).await?;
            // Decoding per line keeps one corrupt line from poisoning the
            // rest of the file; invalid UTF-8 is malformed, not coerced.
            for (line_no, raw_line) in data.split(|b| *b == b'\n').enumerate() {
                let line = match std::str::from_utf8(raw_line) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(
                            path = %object.path,
                            line = line_no + 1,
                            error = %e,
                            "dropping record with invalid UTF-8"
                        );
                        stats.malformed += 1;
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<serde_json::Value>(line) {
                    Ok(serde_json::Value::Object(object_fields)) => {
                        rows.push(schema.coerce_record(&object_fields));
                        stats.rows += 1;
                    }
                    Ok(_) => {
                        warn!(
                            path = %object.path,
                            line = line_no + 1,
                            "dropping non-object JSON record"
                        );
                        stats.malformed += 1;
                    }
                    Err(e) => {
                        warn!(
                            path = %object.path,
                            line = line_no + 1,
                            error = %e,
                            "dropping malformed JSON record"
                        );
                        stats.malformed += 1;
                    }
                }
            }
        }

        info!(
            source = name,
            files = stats.files,
            rows = stats.rows,
            malformed = stats.malformed,
            "read input batch"
        );

        Ok((Table::new(name, schema, rows), stats))
    }
}
