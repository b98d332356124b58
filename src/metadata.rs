//! Metastore-shaped table and partition metadata
//!
//! These types mirror what a metastore client hands the loader: a table
//! with partition columns and a storage descriptor, and per-partition
//! metadata that may carry its own descriptor. An absent partition
//! descriptor means the table is unpartitioned and its own descriptor
//! applies.

use crate::error::{LoaderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema property key naming the input format
pub const INPUT_FORMAT_PROPERTY: &str = "file.inputformat";

/// Partition-key types the scan layer knows how to materialize
const SUPPORTED_KEY_TYPES: &[&str] = &[
    "boolean", "tinyint", "smallint", "int", "bigint", "float", "double", "string", "varchar",
    "char", "date", "timestamp", "decimal",
];

/// Ordered string properties describing a storage layout (serde class,
/// input format, field delimiters and the like)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaProperties {
    properties: BTreeMap<String, String>,
}

impl SchemaProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn input_format(&self) -> Option<&str> {
        self.get(INPUT_FORMAT_PROPERTY)
    }
}

/// Map from column index to the type the reader must coerce that column to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCoercions {
    coercions: BTreeMap<usize, String>,
}

impl ColumnCoercions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: usize, type_name: &str) -> Self {
        self.coercions.insert(column, type_name.to_string());
        self
    }

    pub fn get(&self, column: usize) -> Option<&str> {
        self.coercions.get(&column).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.coercions.is_empty()
    }
}

/// One column of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub type_name: String,
}

impl Column {
    pub fn new(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
        }
    }

    fn is_supported_key_type(&self) -> bool {
        let base = self
            .type_name
            .split_once('(')
            .map_or(self.type_name.as_str(), |(base, _)| base);
        SUPPORTED_KEY_TYPES.contains(&base)
    }
}

/// Physical layout of a table or partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDescriptor {
    pub location: String,
    pub schema: SchemaProperties,
}

impl StorageDescriptor {
    pub fn new(location: &str, schema: SchemaProperties) -> Self {
        Self {
            location: location.to_string(),
            schema,
        }
    }
}

/// A logical table under scan
#[derive(Debug, Clone)]
pub struct Table {
    pub schema_name: String,
    pub table_name: String,
    pub storage: StorageDescriptor,
    pub partition_columns: Vec<Column>,
}

impl Table {
    pub fn new(
        schema_name: &str,
        table_name: &str,
        storage: StorageDescriptor,
        partition_columns: Vec<Column>,
    ) -> Self {
        Self {
            schema_name: schema_name.to_string(),
            table_name: table_name.to_string(),
            storage,
            partition_columns,
        }
    }
}

/// One partition's physical metadata as stored in the metastore
#[derive(Debug, Clone)]
pub struct Partition {
    /// Values of the partition columns, in column order. A `None` value is
    /// corrupt metadata and fails the scan.
    pub values: Vec<Option<String>>,
    pub storage: StorageDescriptor,
}

/// Input element of the loader: one partition to scan
#[derive(Debug, Clone)]
pub struct PartitionMetadata {
    /// Partition name, e.g. `ds=2020-01-01/country=US`; the table name for
    /// unpartitioned tables
    pub name: String,
    /// Absent for unpartitioned tables
    pub partition: Option<Partition>,
    pub column_coercions: ColumnCoercions,
}

impl PartitionMetadata {
    pub fn new(name: &str, partition: Option<Partition>) -> Self {
        Self {
            name: name.to_string(),
            partition,
            column_coercions: ColumnCoercions::new(),
        }
    }

    pub fn with_coercions(mut self, coercions: ColumnCoercions) -> Self {
        self.column_coercions = coercions;
        self
    }
}

/// Declared bucketing of the scanned table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketHandle {
    pub bucket_count: usize,
}

impl BucketHandle {
    pub fn new(bucket_count: usize) -> Self {
        Self { bucket_count }
    }
}

/// One bucket the planner selected for an explicit-bucket scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    pub bucket_number: usize,
    pub bucket_count: usize,
}

impl Bucket {
    pub fn new(bucket_number: usize, bucket_count: usize) -> Self {
        Self {
            bucket_number,
            bucket_count,
        }
    }
}

/// A resolved partition key: column name plus its value for this partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionKey {
    pub name: String,
    pub value: String,
}

/// Resolve the partition keys for a partition, validating against the
/// table's partition columns
pub fn partition_keys(table: &Table, partition: Option<&Partition>) -> Result<Vec<PartitionKey>> {
    let Some(partition) = partition else {
        return Ok(Vec::new());
    };

    let columns = &table.partition_columns;
    let values = &partition.values;
    if columns.len() != values.len() {
        return Err(LoaderError::InvalidMetadata {
            expected: columns.len(),
            actual: values.len(),
        });
    }

    let mut keys = Vec::with_capacity(columns.len());
    for (column, value) in columns.iter().zip(values) {
        if !column.is_supported_key_type() {
            return Err(LoaderError::Unsupported(format!(
                "partition key type {} in table {}.{}",
                column.type_name, table.schema_name, table.table_name
            )));
        }
        let value = value
            .as_ref()
            .ok_or_else(|| LoaderError::NullPartitionValue {
                column: column.name.clone(),
            })?;
        keys.push(PartitionKey {
            name: column.name.clone(),
            value: value.clone(),
        });
    }
    Ok(keys)
}

/// Schema of a partition, falling back to the table's own
pub fn partition_schema<'a>(table: &'a Table, partition: Option<&'a Partition>) -> &'a SchemaProperties {
    match partition {
        Some(partition) => &partition.storage.schema,
        None => &table.storage.schema,
    }
}

/// Location of a partition, falling back to the table's own
pub fn partition_location<'a>(table: &'a Table, partition: Option<&'a Partition>) -> &'a str {
    match partition {
        Some(partition) => &partition.storage.location,
        None => &table.storage.location,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_table(partition_columns: Vec<Column>) -> Table {
        Table::new(
            "default",
            "events",
            StorageDescriptor::new("/warehouse/events", SchemaProperties::new()),
            partition_columns,
        )
    }

    fn partition_at(location: &str, values: Vec<Option<String>>) -> Partition {
        Partition {
            values,
            storage: StorageDescriptor::new(location, SchemaProperties::new()),
        }
    }

    #[test]
    fn unpartitioned_table_has_no_keys() {
        let table = test_table(vec![]);
        assert!(partition_keys(&table, None).unwrap().is_empty());
    }

    #[test]
    fn keys_resolve_in_column_order() {
        let table = test_table(vec![Column::new("ds", "string"), Column::new("hr", "int")]);
        let partition = partition_at(
            "/warehouse/events/ds=2020-01-01/hr=7",
            vec![Some("2020-01-01".into()), Some("7".into())],
        );

        let keys = partition_keys(&table, Some(&partition)).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].name, "ds");
        assert_eq!(keys[0].value, "2020-01-01");
        assert_eq!(keys[1].name, "hr");
        assert_eq!(keys[1].value, "7");
    }

    #[test]
    fn arity_mismatch_is_invalid_metadata() {
        let table = test_table(vec![Column::new("ds", "string"), Column::new("hr", "int")]);
        let partition = partition_at("/warehouse/events/ds=x", vec![Some("x".into())]);

        let err = partition_keys(&table, Some(&partition)).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::InvalidMetadata {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn null_value_is_rejected() {
        let table = test_table(vec![Column::new("ds", "string")]);
        let partition = partition_at("/warehouse/events/ds=x", vec![None]);

        let err = partition_keys(&table, Some(&partition)).unwrap_err();
        match err {
            LoaderError::NullPartitionValue { column } => assert_eq!(column, "ds"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unsupported_key_type_is_rejected() {
        let table = test_table(vec![Column::new("payload", "map<string,string>")]);
        let partition = partition_at("/warehouse/events/p", vec![Some("x".into())]);

        let err = partition_keys(&table, Some(&partition)).unwrap_err();
        assert!(matches!(err, LoaderError::Unsupported(_)));
        assert!(err.to_string().contains("map<string,string>"));
    }

    #[test]
    fn parameterized_types_are_supported() {
        let table = test_table(vec![
            Column::new("d", "decimal(10,2)"),
            Column::new("v", "varchar(64)"),
        ]);
        let partition = partition_at(
            "/warehouse/events/p",
            vec![Some("1.00".into()), Some("a".into())],
        );
        assert!(partition_keys(&table, Some(&partition)).is_ok());
    }

    #[test]
    fn schema_and_location_fall_back_to_table() {
        let table = test_table(vec![]);
        assert_eq!(partition_location(&table, None), "/warehouse/events");
        assert_eq!(partition_schema(&table, None), &table.storage.schema);

        let partition = partition_at("/elsewhere/p", vec![]);
        assert_eq!(partition_location(&table, Some(&partition)), "/elsewhere/p");
    }
}
