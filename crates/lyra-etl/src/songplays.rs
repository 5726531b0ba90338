//! Song-play fact table builder.
//!
//! Joins the filtered log batch against the raw song metadata batch on
//! exact title/artist equality. The metadata side is deliberately *not*
//! deduplicated: exact-match inner-join semantics make that a performance
//! choice, not a correctness one. Log events with no matching metadata row
//! produce no fact row.

use tracing::{debug, warn};

use crate::dimensions::{epoch_millis_to_start_time, time_parts};
use crate::error::Result;
use crate::schema::{Field, FieldType, RecordSchema};
use crate::table::{Table, Value};

/// Partition spec for the `songplays` table.
pub const SONGPLAYS_PARTITION_SPEC: &[&str] = &["year", "month"];

/// Surrogate key allocator for fact rows.
///
/// Contract: keys are unique within a run. This single-threaded engine
/// hands them out contiguously from zero, but callers must not rely on
/// contiguity or on any ordering relative to event time; a parallel engine
/// assigning keys per partition satisfies the same contract.
#[derive(Debug, Default)]
pub struct SurrogateKeyAllocator {
    next: i64,
}

impl SurrogateKeyAllocator {
    /// Creates an allocator starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next key.
    pub fn allocate(&mut self) -> i64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Builds the `songplays` fact table.
///
/// `next_song_events` must already be filtered to `page == "NextSong"`;
/// `song_data` is the raw typed metadata batch.
///
/// # Errors
///
/// Returns an error if either batch lacks an expected column.
pub fn build_songplays(next_song_events: &Table, song_data: &Table) -> Result<Table> {
    let joined = next_song_events.equi_join(song_data, &[("song", "title"), ("artist", "artist_name")])?;
    debug!(
        events = next_song_events.num_rows(),
        matched = joined.num_rows(),
        "joined log events against song metadata"
    );

    let ts_idx = joined.column_index("ts")?;
    let user_idx = joined.column_index("userId")?;
    let level_idx = joined.column_index("level")?;
    let song_id_idx = joined.column_index("song_id")?;
    let artist_id_idx = joined.column_index("artist_id")?;
    let session_idx = joined.column_index("sessionId")?;
    let location_idx = joined.column_index("location")?;
    let agent_idx = joined.column_index("userAgent")?;

    let schema = RecordSchema::new(vec![
        Field::required("songplay_id", FieldType::Long),
        Field::new("start_time", FieldType::Long),
        Field::new("year", FieldType::Int),
        Field::new("month", FieldType::Int),
        Field::new("userId", FieldType::Int),
        Field::new("level", FieldType::Utf8),
        Field::new("song_id", FieldType::Utf8),
        Field::new("artist_id", FieldType::Utf8),
        Field::new("sessionId", FieldType::Int),
        Field::new("location", FieldType::Utf8),
        Field::new("userAgent", FieldType::Utf8),
    ]);

    let mut keys = SurrogateKeyAllocator::new();
    let mut rows = Vec::with_capacity(joined.num_rows());
    for row in joined.rows() {
        let Some(ts) = row[ts_idx].as_i64() else {
            // ts is required by the log schema; a null here survived
            // coercion and cannot be placed in a time partition.
            warn!("dropping matched event with null ts");
            continue;
        };
        let start_time = epoch_millis_to_start_time(ts);
        let Some(parts) = time_parts(start_time) else {
            warn!(ts, "dropping matched event with out-of-range timestamp");
            continue;
        };
        rows.push(vec![
            Value::Long(keys.allocate()),
            Value::Long(start_time),
            Value::Int(parts.year),
            Value::Int(parts.month),
            row[user_idx].clone(),
            row[level_idx].clone(),
            row[song_id_idx].clone(),
            row[artist_id_idx].clone(),
            row[session_idx].clone(),
            row[location_idx].clone(),
            row[agent_idx].clone(),
        ]);
    }

    Ok(Table::new("songplays", schema, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::filter_next_song;
    use crate::schema::{log_schema, song_schema};
    use serde_json::json;

    fn tables() -> (Table, Table) {
        let log = log_schema();
        let song = song_schema();
        let log_rows = vec![
            json!({"song":"Midnight","artist":"Echo","page":"NextSong","ts":1_000_000_000_000_i64,
                   "userId":7,"level":"free","sessionId":3,"location":"NY","userAgent":"X"}),
            json!({"song":"Unknown Song","artist":"Echo","page":"NextSong","ts":1_000_000_000_000_i64,
                   "userId":8,"level":"paid","sessionId":4,"location":"LA","userAgent":"Y"}),
            json!({"song":"Midnight","artist":"Echo","page":"PageView","ts":1_000_000_000_000_i64,
                   "userId":9,"level":"free","sessionId":5,"location":"SF","userAgent":"Z"}),
        ];
        let song_rows = vec![json!({
            "song_id":"S1","title":"Midnight","artist_id":"A1","artist_name":"Echo",
            "year":2001,"duration":210.5
        })];

        let log_table = Table::new(
            "log_data",
            log.clone(),
            log_rows
                .iter()
                .map(|r| log.coerce_record(r.as_object().unwrap()))
                .collect(),
        );
        let song_table = Table::new(
            "song_data",
            song.clone(),
            song_rows
                .iter()
                .map(|r| song.coerce_record(r.as_object().unwrap()))
                .collect(),
        );
        (log_table, song_table)
    }

    #[test]
    fn matched_event_produces_one_fact_row() {
        let (log_table, song_table) = tables();
        let filtered = filter_next_song(&log_table).unwrap();
        let facts = build_songplays(&filtered, &song_table).expect("build");

        assert_eq!(facts.num_rows(), 1);
        let row = &facts.rows()[0];
        let col = |name: &str| facts.column_index(name).unwrap();
        assert_eq!(row[col("song_id")].as_str(), Some("S1"));
        assert_eq!(row[col("artist_id")].as_str(), Some("A1"));
        assert_eq!(row[col("userId")].as_i64(), Some(7));
        // ts = 1000000000000 ms truncates to 1000000000 s.
        assert_eq!(row[col("start_time")].as_i64(), Some(1_000_000_000));
        assert_eq!(row[col("year")].as_i64(), Some(2001));
        assert_eq!(row[col("month")].as_i64(), Some(9));
    }

    #[test]
    fn join_miss_is_silently_excluded() {
        let (log_table, song_table) = tables();
        let filtered = filter_next_song(&log_table).unwrap();
        let facts = build_songplays(&filtered, &song_table).expect("build");

        // The "Unknown Song" event produced no row and no error.
        let col = facts.column_index("userId").unwrap();
        assert!(facts.rows().iter().all(|r| r[col].as_i64() != Some(8)));
    }

    #[test]
    fn duplicate_metadata_rows_multiply_matches() {
        // The metadata side is raw, not deduplicated; two identical
        // title/artist rows yield two fact rows for one event.
        let (log_table, song_table) = tables();
        let mut rows = song_table.rows().to_vec();
        rows.push(rows[0].clone());
        let doubled = Table::new("song_data", song_table.schema().clone(), rows);

        let filtered = filter_next_song(&log_table).unwrap();
        let facts = build_songplays(&filtered, &doubled).expect("build");
        assert_eq!(facts.num_rows(), 2);
    }

    #[test]
    fn surrogate_keys_are_unique_within_a_run() {
        let mut allocator = SurrogateKeyAllocator::new();
        let keys: Vec<i64> = (0..100).map(|_| allocator.allocate()).collect();
        let mut deduped = keys.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), keys.len());
    }
}
