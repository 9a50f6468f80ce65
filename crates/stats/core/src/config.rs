use crate::rounding::RoundingMode;

/// Engine constants and tunable parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StatsConfig {
    /// Rounding applied by integer evaluation helpers when the caller has no
    /// preference of its own.
    pub default_rounding: RoundingMode,
}

impl StatsConfig {
    // ===== compile-time constants =====
    /// Relative tolerance used when deciding whether a recomputed value differs
    /// from the cached one. Changes below this never notify listeners.
    pub const VALUE_EPSILON: f32 = 1e-6;
    /// A divisor whose magnitude is at or below this is treated as zero.
    pub const DIVISOR_EPSILON: f32 = 1e-6;
    /// Lower clamp bound of a freshly constructed value.
    pub const DEFAULT_MIN: f32 = f32::MIN;
    /// Upper clamp bound of a freshly constructed value.
    pub const DEFAULT_MAX: f32 = f32::MAX;

    // ===== runtime-tunable defaults =====
    pub const DEFAULT_ROUNDING: RoundingMode = RoundingMode::Round;

    pub fn new() -> Self {
        Self {
            default_rounding: Self::DEFAULT_ROUNDING,
        }
    }

    pub fn with_rounding(default_rounding: RoundingMode) -> Self {
        Self { default_rounding }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Approximate float equality scaled by the magnitude of the operands.
///
/// Uses an absolute floor so values near zero still compare sensibly.
pub fn approx_eq(a: f32, b: f32) -> bool {
    if a == b {
        return true;
    }
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= StatsConfig::VALUE_EPSILON * scale
}

/// Returns true when `divisor` is too close to zero to divide by.
pub fn is_degenerate_divisor(divisor: f32) -> bool {
    divisor.abs() <= StatsConfig::DIVISOR_EPSILON
}
