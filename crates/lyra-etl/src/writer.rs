//! Partitioned table writer with full-overwrite semantics.
//!
//! A write first clears the table's storage prefix, then places one Parquet
//! object per partition directory (`root/year=2001/artist_id=A1/
//! part-00000.parquet`). Partition columns are carried in the path and
//! dropped from the data file, Hive-style. Unpartitioned tables write a
//! single object directly under the root.
//!
//! There is no staging or atomic rename: a failure partway through leaves
//! the prefix partially overwritten, and the whole run must be re-executed.

use std::collections::BTreeMap;

use tracing::info;

use lyra_core::{PartitionKey, PartitionValue, StorageBackend};

use crate::error::{EtlError, Result};
use crate::parquet_util::encode_table;
use crate::table::{Table, Value};

/// Name of the single data object within each partition directory.
const PART_FILE: &str = "part-00000.parquet";

/// Counters from one table write.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteStats {
    /// Partition directories written (1 for unpartitioned tables).
    pub partitions: usize,
    /// Total rows written.
    pub rows: usize,
}

/// Writes derived tables to partitioned columnar storage.
pub struct PartitionedTableWriter;

impl PartitionedTableWriter {
    /// Writes `table` beneath `root`, partitioned by `partition_spec`
    /// (possibly empty), replacing all prior contents of `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if a partition column is missing or float-typed,
    /// or if encoding or any storage operation fails. On error the target
    /// prefix may be left in a partially overwritten state.
    pub async fn write(
        backend: &dyn StorageBackend,
        root: &str,
        table: &Table,
        partition_spec: &[&str],
    ) -> Result<WriteStats> {
        let root = root.trim_end_matches('/');
        backend.delete_prefix(root).await?;

        let stats = if partition_spec.is_empty() {
            let bytes = encode_table(table)?;
            backend.put(&format!("{root}/{PART_FILE}"), bytes).await?;
            WriteStats {
                partitions: 1,
                rows: table.num_rows(),
            }
        } else {
            Self::write_partitioned(backend, root, table, partition_spec).await?
        };

        info!(
            table = table.name(),
            root,
            partitions = stats.partitions,
            rows = stats.rows,
            "wrote table"
        );
        Ok(stats)
    }

    async fn write_partitioned(
        backend: &dyn StorageBackend,
        root: &str,
        table: &Table,
        partition_spec: &[&str],
    ) -> Result<WriteStats> {
        let key_indices: Vec<usize> = partition_spec
            .iter()
            .map(|c| table.column_index(c))
            .collect::<Result<_>>()?;

        // Data files carry only the non-partition columns.
        let data_columns: Vec<(&str, &str)> = table
            .schema()
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .filter(|name| !partition_spec.contains(name))
            .map(|name| (name, name))
            .collect();
        let data_table = table.project_as(table.name(), &data_columns)?;

        // BTreeMap keyed by rendered path so write order is deterministic.
        let mut groups: BTreeMap<String, Vec<Vec<Value>>> = BTreeMap::new();
        for (row, data_row) in table.rows().iter().zip(data_table.rows()) {
            let mut key = PartitionKey::new();
            for (&idx, column) in key_indices.iter().zip(partition_spec) {
                key.push(*column, partition_value(table, *column, &row[idx])?);
            }
            groups.entry(key.to_string()).or_default().push(data_row.clone());
        }

        let mut stats = WriteStats::default();
        for (path, rows) in groups {
            stats.rows += rows.len();
            stats.partitions += 1;
            let partition =
                Table::new(table.name(), data_table.schema().clone(), rows);
            let bytes = encode_table(&partition)?;
            backend
                .put(&format!("{root}/{path}/{PART_FILE}"), bytes)
                .await?;
        }
        Ok(stats)
    }
}

fn partition_value(table: &Table, column: &str, value: &Value) -> Result<PartitionValue> {
    match value {
        Value::Null => Ok(PartitionValue::Null),
        Value::Int(n) => Ok(PartitionValue::Int64(i64::from(*n))),
        Value::Long(n) => Ok(PartitionValue::Int64(*n)),
        Value::Utf8(s) => Ok(PartitionValue::String(s.clone())),
        Value::Double(_) => Err(EtlError::Schema {
            message: format!(
                "partition column '{column}' in table '{}' is float-typed",
                table.name()
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parquet_util::decode_table;
    use crate::schema::{Field, FieldType, RecordSchema};
    use lyra_core::MemoryBackend;

    fn songs_table() -> Table {
        Table::new(
            "songs",
            RecordSchema::new(vec![
                Field::required("song_id", FieldType::Utf8),
                Field::new("title", FieldType::Utf8),
                Field::new("artist_id", FieldType::Utf8),
                Field::new("year", FieldType::Int),
                Field::new("duration", FieldType::Double),
            ]),
            vec![
                vec![
                    Value::Utf8("S1".into()),
                    Value::Utf8("Midnight".into()),
                    Value::Utf8("A1".into()),
                    Value::Int(2001),
                    Value::Double(210.5),
                ],
                vec![
                    Value::Utf8("S2".into()),
                    Value::Utf8("Dawn".into()),
                    Value::Utf8("A1".into()),
                    Value::Int(2003),
                    Value::Double(180.0),
                ],
                vec![
                    Value::Utf8("S3".into()),
                    Value::Utf8("Dusk".into()),
                    Value::Utf8("A2".into()),
                    Value::Int(2003),
                    Value::Double(95.0),
                ],
            ],
        )
    }

    #[tokio::test]
    async fn partitioned_write_lays_out_hive_directories() {
        let backend = MemoryBackend::new();
        let stats = PartitionedTableWriter::write(
            &backend,
            "out/songs",
            &songs_table(),
            &["year", "artist_id"],
        )
        .await
        .expect("write");

        assert_eq!(stats.partitions, 3);
        assert_eq!(stats.rows, 3);

        let mut paths: Vec<String> = backend
            .list("out/songs/")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.path)
            .collect();
        paths.sort();
        assert_eq!(
            paths,
            vec![
                "out/songs/year=2001/artist_id=A1/part-00000.parquet",
                "out/songs/year=2003/artist_id=A1/part-00000.parquet",
                "out/songs/year=2003/artist_id=A2/part-00000.parquet",
            ]
        );
    }

    #[tokio::test]
    async fn partition_columns_are_dropped_from_data_files() {
        let backend = MemoryBackend::new();
        PartitionedTableWriter::write(&backend, "out/songs", &songs_table(), &["year", "artist_id"])
            .await
            .expect("write");

        let bytes = backend
            .get("out/songs/year=2001/artist_id=A1/part-00000.parquet")
            .await
            .unwrap();
        let schema = RecordSchema::new(vec![
            Field::required("song_id", FieldType::Utf8),
            Field::new("title", FieldType::Utf8),
            Field::new("duration", FieldType::Double),
        ]);
        let restored = decode_table(&bytes, "songs", &schema).expect("decode");
        assert_eq!(restored.num_rows(), 1);
        assert_eq!(restored.rows()[0][0], Value::Utf8("S1".into()));
    }

    #[tokio::test]
    async fn unpartitioned_write_places_single_object() {
        let backend = MemoryBackend::new();
        let stats = PartitionedTableWriter::write(&backend, "out/artists", &songs_table(), &[])
            .await
            .expect("write");

        assert_eq!(stats.partitions, 1);
        let listed = backend.list("out/artists/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "out/artists/part-00000.parquet");
    }

    #[tokio::test]
    async fn write_overwrites_prior_contents() {
        let backend = MemoryBackend::new();
        backend
            .put(
                "out/songs/year=1999/artist_id=OLD/part-00000.parquet",
                bytes::Bytes::from("stale"),
            )
            .await
            .unwrap();

        PartitionedTableWriter::write(&backend, "out/songs", &songs_table(), &["year", "artist_id"])
            .await
            .expect("write");

        let paths: Vec<String> = backend
            .list("out/songs/")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.path)
            .collect();
        assert!(paths.iter().all(|p| !p.contains("OLD")));
    }

    #[tokio::test]
    async fn null_partition_values_use_hive_sentinel() {
        let backend = MemoryBackend::new();
        let table = Table::new(
            "songs",
            RecordSchema::new(vec![
                Field::required("song_id", FieldType::Utf8),
                Field::new("year", FieldType::Int),
            ]),
            vec![vec![Value::Utf8("S1".into()), Value::Null]],
        );

        PartitionedTableWriter::write(&backend, "out/songs", &table, &["year"])
            .await
            .expect("write");

        let listed = backend.list("out/songs/").await.unwrap();
        assert_eq!(
            listed[0].path,
            "out/songs/year=__HIVE_DEFAULT_PARTITION__/part-00000.parquet"
        );
    }
}
