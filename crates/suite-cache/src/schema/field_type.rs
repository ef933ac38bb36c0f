//! Field-type taxonomy → storage column type mapping.

/// Storage column type. Case is normalized before lookup; an unknown or
/// `nil` field type defaults to [`ColumnKind::Text`] (spec §8 invariant 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
}

impl ColumnKind {
    /// SQL type keyword used in generated DDL.
    #[must_use]
    pub const fn sql_keyword(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
        }
    }
}

/// What a storage column actually holds, decided once at synthesis time so
/// the Storage Engine never has to re-derive it from the field-type tag at
/// extraction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ColumnRole {
    /// A plain scalar (or JSON-serialized collection) value.
    Scalar,
    /// `yesno`: stored as 0/1 integer.
    YesNo,
    /// The `on` half of a `firstcreated`/`lastupdated` actor stamp.
    ActorOn,
    /// The `by` half of a `firstcreated`/`lastupdated` actor stamp.
    ActorBy,
    /// The `value` half of a `status` envelope.
    StatusValue,
    /// The `updated_on` half of a `status` envelope.
    StatusUpdatedOn,
    /// A composite rich-document; the full structure is retained in storage,
    /// the formatter extracts `html` only on read.
    Composite,
}

/// Classify a lowercased, trimmed field-type tag into its storage column
/// kind. Unknown tags fall back to [`ColumnKind::Text`].
#[must_use]
pub fn column_kind_for(normalized_type: &str) -> ColumnKind {
    match normalized_type {
        "autonumber" | "comments_count" | "yesno" => ColumnKind::Integer,
        "number" | "currency" | "percent" | "rating" | "duration" => ColumnKind::Real,
        _ => ColumnKind::Text,
    }
}

/// `true` if this field type should never be indexed regardless of other
/// rules.
#[must_use]
pub fn is_never_indexable(normalized_type: &str) -> bool {
    matches!(normalized_type, "richtextarea" | "textarea" | "formula" | "firstcreated")
        || normalized_type.starts_with("files")
        || normalized_type.starts_with("images")
}

/// `true` if this field type carries a date or date-time value the Response
/// Formatter should stringify per `SMARTSUITE_TIMEZONE`.
#[must_use]
pub fn is_datetime_type(normalized_type: &str) -> bool {
    normalized_type.starts_with("date")
        || normalized_type.starts_with("time")
        || matches!(normalized_type, "duedate" | "daterange" | "lastupdated" | "firstcreated")
}

/// `true` if this field type is unconditionally indexable per the allow-list
/// in spec §4.1.
#[must_use]
pub fn is_type_indexable(normalized_type: &str) -> bool {
    matches!(
        normalized_type,
        "status"
            | "duedate"
            | "daterange"
            | "lastupdated"
            | "singleselect"
            | "yesno"
            | "assignedto"
            | "currency"
            | "number"
            | "percent"
            | "rating"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_defaults_to_text() {
        assert_eq!(column_kind_for("some_future_tag"), ColumnKind::Text);
    }

    #[test]
    fn numeric_groups_are_classified() {
        assert_eq!(column_kind_for("yesno"), ColumnKind::Integer);
        assert_eq!(column_kind_for("autonumber"), ColumnKind::Integer);
        assert_eq!(column_kind_for("rating"), ColumnKind::Real);
        assert_eq!(column_kind_for("currency"), ColumnKind::Real);
        assert_eq!(column_kind_for("textfield"), ColumnKind::Text);
    }

    #[test]
    fn never_indexable_wins_over_allow_list() {
        assert!(is_never_indexable("firstcreated"));
        assert!(is_never_indexable("files_attachment"));
        assert!(!is_never_indexable("status"));
    }
}
