//! Integer view over the float engine.
//!
//! Rounding is a pure read-side transform: integer wrappers hold no state of
//! their own beyond the mode.

/// How a float effective value is turned into an integer.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RoundingMode {
    /// Toward negative infinity.
    Floor,
    /// Toward positive infinity.
    Ceil,
    /// Nearest integer, halves away from zero.
    #[default]
    Round,
    /// Toward zero.
    Truncate,
}

impl RoundingMode {
    /// Rounds `value` to an integer. Out-of-range values saturate and NaN maps to 0.
    pub fn apply(self, value: f32) -> i32 {
        let rounded = match self {
            Self::Floor => value.floor(),
            Self::Ceil => value.ceil(),
            Self::Round => value.round(),
            Self::Truncate => value.trunc(),
        };
        // `as` saturates at the i32 bounds and maps NaN to zero.
        rounded as i32
    }
}
