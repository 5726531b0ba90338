//! In-memory relational batch engine.
//!
//! A [`Table`] is a schema plus row-major typed values, with the four
//! operations the pipeline needs: projection, filter, dedup-by-key, and
//! equi-join. Dedup and join are keyed operations whose result sets do not
//! depend on row order; only the dedup *representative* is order-defined
//! (first row encountered wins), which keeps reruns deterministic for the
//! same input.

use std::collections::{HashMap, HashSet};

use crate::error::{EtlError, Result};
use crate::schema::{Field, RecordSchema};

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null (absent or uncoercible input).
    Null,
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// 64-bit float (also backs decimal fields).
    Double(f64),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// Returns true for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the string contents, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Utf8(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value widened to `i64`, if integral.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(i64::from(*n)),
            Self::Long(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the float contents, if this is a float.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the hashable key form of this value, or `None` for null.
    ///
    /// Null keys never participate in dedup or join matching. Floats key by
    /// bit pattern so the mapping is total, though no pipeline key column
    /// is float-typed.
    #[must_use]
    pub fn group_key(&self) -> Option<Key> {
        match self {
            Self::Null => None,
            Self::Int(n) => Some(Key::Int(i64::from(*n))),
            Self::Long(n) => Some(Key::Int(*n)),
            Self::Double(f) => Some(Key::Bits(f.to_bits())),
            Self::Utf8(s) => Some(Key::Utf8(s.clone())),
        }
    }
}

/// Hashable, order-insensitive key form of a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Integral key (Int and Long widen to the same key space).
    Int(i64),
    /// String key, exact bytes.
    Utf8(String),
    /// Float key by bit pattern.
    Bits(u64),
}

/// A named batch of typed rows.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    schema: RecordSchema,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Creates a table from a schema and rows.
    ///
    /// Every row must have exactly one value per schema field.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: RecordSchema, rows: Vec<Vec<Value>>) -> Self {
        let table = Self {
            name: name.into(),
            schema,
            rows,
        };
        debug_assert!(
            table
                .rows
                .iter()
                .all(|r| r.len() == table.schema.fields.len()),
            "row width must match schema"
        );
        table
    }

    /// Table name (used in error messages and logs).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The table's schema.
    #[must_use]
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Row-major values.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Resolves a column name to its index.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::MissingColumn`] if the column does not exist.
    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.schema
            .index_of(column)
            .ok_or_else(|| EtlError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// Projects the named columns, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::MissingColumn`] if any column does not exist.
    pub fn project(&self, columns: &[&str]) -> Result<Self> {
        let pairs: Vec<(&str, &str)> = columns.iter().map(|c| (*c, *c)).collect();
        self.project_as(&self.name, &pairs)
    }

    /// Projects columns with renames: `(source, output_name)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::MissingColumn`] if any source column is missing.
    pub fn project_as(&self, name: &str, columns: &[(&str, &str)]) -> Result<Self> {
        let mut indices = Vec::with_capacity(columns.len());
        let mut fields = Vec::with_capacity(columns.len());
        for (source, output) in columns {
            let idx = self.column_index(source)?;
            let source_field = &self.schema.fields[idx];
            fields.push(Field {
                name: (*output).to_string(),
                data_type: source_field.data_type,
                nullable: source_field.nullable,
            });
            indices.push(idx);
        }

        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Ok(Self::new(name, RecordSchema::new(fields), rows))
    }

    /// Keeps rows for which the predicate returns true.
    #[must_use]
    pub fn filter(&self, predicate: impl Fn(&[Value]) -> bool) -> Self {
        let rows = self
            .rows
            .iter()
            .filter(|row| predicate(row))
            .cloned()
            .collect();
        Self::new(self.name.clone(), self.schema.clone(), rows)
    }

    /// Keeps one row per distinct value of the key column.
    ///
    /// The representative is the first row encountered in input order.
    /// Rows whose key is null are dropped: a dimension key cannot be null.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::MissingColumn`] if the key column is missing.
    pub fn dedup_by(&self, key_column: &str) -> Result<Self> {
        let key_idx = self.column_index(key_column)?;
        let mut seen = HashSet::new();
        let mut rows = Vec::new();

        for row in &self.rows {
            let Some(key) = row[key_idx].group_key() else {
                continue;
            };
            if seen.insert(key) {
                rows.push(row.clone());
            }
        }

        Ok(Self::new(self.name.clone(), self.schema.clone(), rows))
    }

    /// Inner equi-join against `right` on `(left_column, right_column)`
    /// pairs.
    ///
    /// Matching is exact equality on the key form: no case folding, no
    /// fuzzy matching. Rows with a null join key on either side never
    /// match. Unmatched left rows are dropped, not null-extended.
    ///
    /// The output schema is the left columns followed by the right
    /// columns; names must not collide.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::MissingColumn`] if a join column is missing, or
    /// [`EtlError::Internal`] on an output name collision.
    pub fn equi_join(&self, right: &Self, on: &[(&str, &str)]) -> Result<Self> {
        let left_keys: Vec<usize> = on
            .iter()
            .map(|(l, _)| self.column_index(l))
            .collect::<Result<_>>()?;
        let right_keys: Vec<usize> = on
            .iter()
            .map(|(_, r)| right.column_index(r))
            .collect::<Result<_>>()?;

        let mut fields = self.schema.fields.clone();
        for field in &right.schema.fields {
            if fields.iter().any(|f| f.name == field.name) {
                return Err(EtlError::Internal {
                    message: format!(
                        "join of '{}' and '{}' would duplicate column '{}'",
                        self.name, right.name, field.name
                    ),
                });
            }
            fields.push(field.clone());
        }

        // Hash the right side; probe with the left so left input order is
        // preserved in the output.
        let mut index: HashMap<Vec<Key>, Vec<usize>> = HashMap::new();
        'right_rows: for (i, row) in right.rows.iter().enumerate() {
            let mut key = Vec::with_capacity(right_keys.len());
            for &k in &right_keys {
                match row[k].group_key() {
                    Some(part) => key.push(part),
                    None => continue 'right_rows,
                }
            }
            index.entry(key).or_default().push(i);
        }

        let mut rows = Vec::new();
        'left_rows: for row in &self.rows {
            let mut key = Vec::with_capacity(left_keys.len());
            for &k in &left_keys {
                match row[k].group_key() {
                    Some(part) => key.push(part),
                    None => continue 'left_rows,
                }
            }
            if let Some(matches) = index.get(&key) {
                for &right_idx in matches {
                    let mut joined = row.clone();
                    joined.extend(right.rows[right_idx].iter().cloned());
                    rows.push(joined);
                }
            }
        }

        Ok(Self::new(
            format!("{}_x_{}", self.name, right.name),
            RecordSchema::new(fields),
            rows,
        ))
    }
}
