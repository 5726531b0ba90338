//! Input record schemas and schema-on-read coercion.
//!
//! The two raw sources are declared here as strict field lists. Parsing is
//! deliberately lenient: a field that is absent or does not match its
//! declared type becomes null rather than failing the run. Records missing
//! a key column survive this stage and are dropped later by the builders'
//! not-null key contracts.

use serde_json::Value as JsonValue;

use crate::table::Value;

/// Semantic type of an input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer (epoch-millisecond timestamps).
    Long,
    /// 64-bit float.
    Double,
    /// High-precision decimal (geolocation, registration).
    ///
    /// Backed by `f64`: the workspace carries no arbitrary-precision
    /// decimal dependency, and these columns are carried through, never
    /// computed on.
    Decimal,
    /// UTF-8 string.
    Utf8,
}

/// A declared input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name as it appears in the raw JSON.
    pub name: String,
    /// Declared semantic type.
    pub data_type: FieldType,
    /// Whether nulls are allowed in output encodings.
    pub nullable: bool,
}

impl Field {
    /// Creates a nullable field.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: FieldType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    /// Creates a non-nullable field (table key columns).
    #[must_use]
    pub fn required(name: impl Into<String>, data_type: FieldType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
        }
    }
}

/// An ordered field list describing one record shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    /// Fields in declaration order.
    pub fields: Vec<Field>,
}

impl RecordSchema {
    /// Creates a schema from a field list.
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Returns the index of the named field.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns the named field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.index_of(name).map(|i| &self.fields[i])
    }

    /// Coerces one parsed JSON object into a typed row.
    ///
    /// Every declared field yields exactly one value; absent or mismatched
    /// fields become [`Value::Null`]. Extra JSON keys are ignored.
    #[must_use]
    pub fn coerce_record(&self, object: &serde_json::Map<String, JsonValue>) -> Vec<Value> {
        self.fields
            .iter()
            .map(|field| {
                object
                    .get(&field.name)
                    .map_or(Value::Null, |raw| coerce(field.data_type, raw))
            })
            .collect()
    }
}

/// Coerces a single JSON value to the declared type, or null.
///
/// Numeric strings are accepted for numeric fields (the raw log data
/// carries `userId` as a quoted number); anything else that does not fit
/// the declared type becomes null.
fn coerce(data_type: FieldType, raw: &JsonValue) -> Value {
    match data_type {
        FieldType::Int => coerce_i64(raw)
            .and_then(|n| i32::try_from(n).ok())
            .map_or(Value::Null, Value::Int),
        FieldType::Long => coerce_i64(raw).map_or(Value::Null, Value::Long),
        FieldType::Double | FieldType::Decimal => coerce_f64(raw).map_or(Value::Null, Value::Double),
        FieldType::Utf8 => match raw {
            JsonValue::String(s) => Value::Utf8(s.clone()),
            JsonValue::Number(n) => Value::Utf8(n.to_string()),
            JsonValue::Bool(b) => Value::Utf8(b.to_string()),
            _ => Value::Null,
        },
    }
}

#[allow(clippy::cast_possible_truncation)]
fn coerce_i64(raw: &JsonValue) -> Option<i64> {
    match raw {
        JsonValue::Number(n) => n.as_i64().or_else(|| {
            // A float is accepted only when it is exactly integral.
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_f64(raw: &JsonValue) -> Option<f64> {
    match raw {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Schema for raw song metadata records.
#[must_use]
pub fn song_schema() -> RecordSchema {
    RecordSchema::new(vec![
        Field::new("num_songs", FieldType::Int),
        Field::required("artist_id", FieldType::Utf8),
        Field::new("artist_latitude", FieldType::Decimal),
        Field::new("artist_longitude", FieldType::Decimal),
        Field::new("artist_location", FieldType::Utf8),
        Field::new("artist_name", FieldType::Utf8),
        Field::required("song_id", FieldType::Utf8),
        Field::new("title", FieldType::Utf8),
        Field::new("duration", FieldType::Double),
        Field::new("year", FieldType::Int),
    ])
}

/// Schema for raw usage-log events.
#[must_use]
pub fn log_schema() -> RecordSchema {
    RecordSchema::new(vec![
        Field::new("artist", FieldType::Utf8),
        Field::new("auth", FieldType::Utf8),
        Field::new("firstName", FieldType::Utf8),
        Field::new("gender", FieldType::Utf8),
        Field::new("itemInSession", FieldType::Int),
        Field::new("lastName", FieldType::Utf8),
        Field::new("length", FieldType::Double),
        Field::new("level", FieldType::Utf8),
        Field::new("location", FieldType::Utf8),
        Field::new("method", FieldType::Utf8),
        Field::new("page", FieldType::Utf8),
        Field::new("registration", FieldType::Decimal),
        Field::new("sessionId", FieldType::Int),
        Field::new("song", FieldType::Utf8),
        Field::new("status", FieldType::Int),
        Field::required("ts", FieldType::Long),
        Field::new("userAgent", FieldType::Utf8),
        Field::new("userId", FieldType::Int),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_object(value: JsonValue) -> serde_json::Map<String, JsonValue> {
        value.as_object().expect("object").clone()
    }

    #[test]
    fn coerces_declared_fields_in_order() {
        let schema = song_schema();
        let record = as_object(json!({
            "num_songs": 1,
            "artist_id": "A1",
            "artist_name": "Echo",
            "song_id": "S1",
            "title": "Midnight",
            "duration": 210.5,
            "year": 2001
        }));

        let row = schema.coerce_record(&record);
        assert_eq!(row.len(), schema.fields.len());
        assert_eq!(row[schema.index_of("song_id").unwrap()], Value::Utf8("S1".into()));
        assert_eq!(row[schema.index_of("year").unwrap()], Value::Int(2001));
        assert_eq!(row[schema.index_of("duration").unwrap()], Value::Double(210.5));
        // Absent nullable fields become null, not an error.
        assert_eq!(row[schema.index_of("artist_latitude").unwrap()], Value::Null);
    }

    #[test]
    fn mismatched_types_become_null() {
        let schema = song_schema();
        let record = as_object(json!({
            "song_id": "S1",
            "year": "not a year",
            "duration": {"nested": true}
        }));

        let row = schema.coerce_record(&record);
        assert_eq!(row[schema.index_of("year").unwrap()], Value::Null);
        assert_eq!(row[schema.index_of("duration").unwrap()], Value::Null);
    }

    #[test]
    fn numeric_strings_coerce_to_numbers() {
        let schema = log_schema();
        let record = as_object(json!({"userId": "7", "ts": "1000000000000"}));

        let row = schema.coerce_record(&record);
        assert_eq!(row[schema.index_of("userId").unwrap()], Value::Int(7));
        assert_eq!(row[schema.index_of("ts").unwrap()], Value::Long(1_000_000_000_000));
    }

    #[test]
    fn integral_floats_coerce_to_ints() {
        let schema = log_schema();
        let record = as_object(json!({"sessionId": 3.0, "itemInSession": 2.5}));

        let row = schema.coerce_record(&record);
        assert_eq!(row[schema.index_of("sessionId").unwrap()], Value::Int(3));
        // Non-integral floats do not silently truncate.
        assert_eq!(row[schema.index_of("itemInSession").unwrap()], Value::Null);
    }

    #[test]
    fn missing_required_field_is_tolerated_at_this_stage() {
        let schema = song_schema();
        let record = as_object(json!({"title": "Orphan"}));

        let row = schema.coerce_record(&record);
        assert_eq!(row[schema.index_of("song_id").unwrap()], Value::Null);
        assert_eq!(row[schema.index_of("artist_id").unwrap()], Value::Null);
    }
}
