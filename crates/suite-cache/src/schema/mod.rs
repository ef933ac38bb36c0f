//! Schema Synthesizer: turns an upstream Table Structure into
//! storage columns, indexes, and a fingerprint used to detect structure
//! change.

mod ddl;
mod field_type;
mod synth;

pub use ddl::{create_index_sql, create_table_sql, drop_table_sql};
pub use field_type::{is_datetime_type, ColumnKind, ColumnRole};
pub use synth::{fingerprint_structure, synthesize, CacheTableSchema, ColumnSpec, FieldDescriptor, Structure};
