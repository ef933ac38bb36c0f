//! Shared domain entities.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A top-level upstream container, owning zero or more Tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub logo_icon: Option<String>,
    #[serde(default)]
    pub logo_color: Option<String>,
}

/// An upstream Table's metadata (not its records).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamTable {
    pub id: String,
    pub name: String,
    pub solution_id: Option<String>,
    #[serde(default)]
    pub structure: crate::schema::Structure,
}

/// A record: a mapping from field slug to raw upstream value. Every record
/// carries at least `id`.
pub type Record = serde_json::Map<String, JsonValue>;

/// An upstream Member.
///
/// `email` and `status` arrive from upstream in more than one shape: email
/// as a bare string or a list (first entry canonical), status as a bare
/// string or a `{value, updated_on}` envelope (the `value` half canonical).
/// Both are canonicalized to a plain `String` on deserialize so the rest of
/// the cache never re-derives this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    #[serde(deserialize_with = "deserialize_canonical_email")]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, deserialize_with = "deserialize_canonical_status")]
    pub status: String,
    #[serde(default)]
    pub deleted_date: Option<String>,
}

/// Either a bare string or a list of strings, the first of which is
/// canonical.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

fn deserialize_canonical_email<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => s,
        StringOrList::Many(items) => items.into_iter().next().unwrap_or_default(),
    })
}

/// Either a bare string or a `{value, updated_on}` envelope, the `value`
/// half canonical.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrStatusEnvelope {
    Bare(String),
    Envelope { value: String },
}

fn deserialize_canonical_status<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match StringOrStatusEnvelope::deserialize(deserializer)? {
        StringOrStatusEnvelope::Bare(s) => s,
        StringOrStatusEnvelope::Envelope { value } => value,
    })
}

/// An upstream Team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

/// A scope addressable by the TTL & Invalidation Controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Solutions,
    TableList,
    Records,
    Members,
    Teams,
}

impl Scope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Solutions => "solutions",
            Self::TableList => "table_list",
            Self::Records => "records",
            Self::Members => "members",
            Self::Teams => "teams",
        }
    }
}

/// The status report shape from spec §6.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub timestamp: String,
    pub solutions: ScopeStatus,
    pub tables: ScopeStatus,
    pub records: Vec<RecordsScopeStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScopeStatus {
    pub count: i64,
    pub is_valid: bool,
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordsScopeStatus {
    pub table_id: String,
    pub count: i64,
    pub is_valid: bool,
    pub expires_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_email_canonicalizes_bare_string() {
        let m: Member = serde_json::from_value(serde_json::json!({"id": "mem_1", "email": "a@x.com"})).unwrap();
        assert_eq!(m.email, "a@x.com");
    }

    #[test]
    fn member_email_canonicalizes_first_of_list() {
        let m: Member = serde_json::from_value(serde_json::json!({"id": "mem_1", "email": ["a@x.com", "b@x.com"]})).unwrap();
        assert_eq!(m.email, "a@x.com");
    }

    #[test]
    fn member_status_canonicalizes_bare_string() {
        let m: Member = serde_json::from_value(serde_json::json!({"id": "mem_1", "email": "a@x.com", "status": "active"})).unwrap();
        assert_eq!(m.status, "active");
    }

    #[test]
    fn member_status_canonicalizes_envelope() {
        let m: Member = serde_json::from_value(
            serde_json::json!({"id": "mem_1", "email": "a@x.com", "status": {"value": "active", "updated_on": "2026-01-01T00:00:00Z"}}),
        )
        .unwrap();
        assert_eq!(m.status, "active");
    }
}
