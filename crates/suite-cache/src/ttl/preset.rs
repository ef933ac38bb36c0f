//! Named TTL presets.

/// A named TTL duration, applied to classes of tables by expected mutation
/// frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlPreset {
    /// 30 days — tables that essentially never change.
    Static,
    /// 7 days.
    LowMutation,
    /// 12 hours — the implicit default for every scope.
    Default,
    /// 2 hours.
    HighMutation,
    /// 15 minutes — tables that mutate constantly.
    VeryHighMutation,
}

impl TtlPreset {
    /// The preset's duration, in seconds.
    #[must_use]
    pub const fn seconds(self) -> i64 {
        match self {
            Self::Static => 30 * 24 * 3600,
            Self::LowMutation => 7 * 24 * 3600,
            Self::Default => 12 * 3600,
            Self::HighMutation => 2 * 3600,
            Self::VeryHighMutation => 15 * 60,
        }
    }

    /// Parse a preset by its label (`static`, `low_mutation`, `default`,
    /// `high_mutation`, `very_high_mutation`).
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Some(match label {
            "static" => Self::Static,
            "low_mutation" => Self::LowMutation,
            "default" => Self::Default,
            "high_mutation" => Self::HighMutation,
            "very_high_mutation" => Self::VeryHighMutation,
            _ => return None,
        })
    }
}
