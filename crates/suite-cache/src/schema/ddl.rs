//! DDL emission for a synthesized [`CacheTableSchema`].

use super::synth::CacheTableSchema;

/// `CREATE TABLE` statement for this schema, including the implicit `id`,
/// `cached_at`, `expires_at` columns every cache table carries (spec
/// invariant 2, §6 "Persisted store layout").
#[must_use]
pub fn create_table_sql(schema: &CacheTableSchema) -> String {
    let mut cols = vec![
        "id TEXT PRIMARY KEY".to_string(),
        "cached_at INTEGER NOT NULL".to_string(),
        "expires_at INTEGER NOT NULL".to_string(),
    ];
    for column in &schema.columns {
        cols.push(format!("{} {}", column.name, column.kind.sql_keyword()));
    }
    format!("CREATE TABLE {} ({})", schema.sql_table_name, cols.join(", "))
}

/// `DROP TABLE IF EXISTS` for this schema's table.
#[must_use]
pub fn drop_table_sql(schema: &CacheTableSchema) -> String {
    format!("DROP TABLE IF EXISTS {}", schema.sql_table_name)
}

/// `CREATE INDEX` statements for every column the Schema Synthesizer flagged
/// as indexable. At most one index per column.
#[must_use]
pub fn create_index_sql(schema: &CacheTableSchema) -> Vec<String> {
    schema
        .columns
        .iter()
        .filter(|c| c.indexed)
        .map(|c| format!("CREATE INDEX idx_{}_{} ON {} ({})", schema.sql_table_name, c.name, schema.sql_table_name, c.name))
        .collect()
}
