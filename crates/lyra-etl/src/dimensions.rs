//! Dimension table builders.
//!
//! Song metadata yields the `songs` and `artists` dimensions; the filtered
//! log batch yields `users` and `time`. Each dimension keeps exactly one
//! row per key value, representative chosen as the first row in input
//! order (deterministic for a given input).

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use tracing::warn;

use crate::error::Result;
use crate::schema::{Field, FieldType, RecordSchema};
use crate::table::{Table, Value};

/// The sole `page` value that marks a song-play event.
pub const NEXT_SONG_PAGE: &str = "NextSong";

/// Partition spec for the `songs` table.
pub const SONGS_PARTITION_SPEC: &[&str] = &["year", "artist_id"];

/// Partition spec for the `time` table.
pub const TIME_PARTITION_SPEC: &[&str] = &["year", "month"];

/// Builds the `songs` dimension from typed song metadata.
///
/// Projects {`song_id`, title, `artist_id`, year, duration} and keeps one
/// row per distinct `song_id`. Records without a `song_id` are dropped here
/// by the not-null key contract.
///
/// # Errors
///
/// Returns an error if the input batch lacks a projected column.
pub fn build_songs(song_data: &Table) -> Result<Table> {
    song_data
        .project_as(
            "songs",
            &[
                ("song_id", "song_id"),
                ("title", "title"),
                ("artist_id", "artist_id"),
                ("year", "year"),
                ("duration", "duration"),
            ],
        )?
        .dedup_by("song_id")
}

/// Builds the `artists` dimension from typed song metadata.
///
/// # Errors
///
/// Returns an error if the input batch lacks a projected column.
pub fn build_artists(song_data: &Table) -> Result<Table> {
    song_data
        .project_as(
            "artists",
            &[
                ("artist_id", "artist_id"),
                ("artist_name", "name"),
                ("artist_location", "location"),
                ("artist_latitude", "latitude"),
                ("artist_longitude", "longitude"),
            ],
        )?
        .dedup_by("artist_id")
}

/// Filters the typed log batch down to song-play events.
///
/// Everything downstream of the log source (`users`, `time`, and the fact
/// table) consumes only this subset.
///
/// # Errors
///
/// Returns an error if the batch has no `page` column.
pub fn filter_next_song(log_data: &Table) -> Result<Table> {
    let page = log_data.column_index("page")?;
    Ok(log_data.filter(|row| row[page].as_str() == Some(NEXT_SONG_PAGE)))
}

/// Builds the `users` dimension from the filtered log batch.
///
/// # Errors
///
/// Returns an error if the input batch lacks a projected column.
pub fn build_users(next_song_events: &Table) -> Result<Table> {
    next_song_events
        .project_as(
            "users",
            &[
                ("userId", "userId"),
                ("firstName", "firstName"),
                ("lastName", "lastName"),
                ("gender", "gender"),
                ("level", "level"),
            ],
        )?
        .dedup_by("userId")
}

/// Converts an epoch-millisecond event timestamp to the table key.
///
/// Truncating division by 1000: the sub-second remainder is deliberately
/// discarded, so `start_time` has second granularity. Two events inside
/// the same second collapse to one `time` row.
#[must_use]
pub fn epoch_millis_to_start_time(ts_millis: i64) -> i64 {
    ts_millis / 1000
}

/// Calendar fields derived from a `start_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeParts {
    /// Hour of day, 0-23.
    pub hour: i32,
    /// Day of month, 1-31.
    pub day: i32,
    /// ISO week of year, 1-53.
    pub week: i32,
    /// Month, 1-12.
    pub month: i32,
    /// Calendar year.
    pub year: i32,
    /// Day of week, **1=Sunday .. 7=Saturday**.
    pub weekday: i32,
}

/// Derives calendar fields from epoch seconds, UTC.
///
/// Returns `None` if the value is outside the representable datetime
/// range.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn time_parts(start_time: i64) -> Option<TimeParts> {
    let dt: DateTime<Utc> = Utc.timestamp_opt(start_time, 0).single()?;
    Some(TimeParts {
        hour: dt.hour() as i32,
        day: dt.day() as i32,
        week: dt.iso_week().week() as i32,
        month: dt.month() as i32,
        year: dt.year(),
        weekday: dt.weekday().num_days_from_sunday() as i32 + 1,
    })
}

/// Builds the `time` dimension from the filtered log batch.
///
/// One row per distinct derived `start_time`; events with a null or
/// out-of-range `ts` are dropped with a warning.
///
/// # Errors
///
/// Returns an error if the batch has no `ts` column.
pub fn build_time(next_song_events: &Table) -> Result<Table> {
    let ts_idx = next_song_events.column_index("ts")?;

    let schema = RecordSchema::new(vec![
        Field::required("start_time", FieldType::Long),
        Field::new("hour", FieldType::Int),
        Field::new("day", FieldType::Int),
        Field::new("week", FieldType::Int),
        Field::new("month", FieldType::Int),
        Field::new("year", FieldType::Int),
        Field::new("weekday", FieldType::Int),
    ]);

    let mut rows = Vec::new();
    for row in next_song_events.rows() {
        let Some(ts) = row[ts_idx].as_i64() else {
            continue;
        };
        let start_time = epoch_millis_to_start_time(ts);
        let Some(parts) = time_parts(start_time) else {
            warn!(ts, "dropping event with out-of-range timestamp");
            continue;
        };
        rows.push(vec![
            Value::Long(start_time),
            Value::Int(parts.hour),
            Value::Int(parts.day),
            Value::Int(parts.week),
            Value::Int(parts.month),
            Value::Int(parts.year),
            Value::Int(parts.weekday),
        ]);
    }

    Table::new("time", schema, rows).dedup_by("start_time")
}
