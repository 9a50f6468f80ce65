//! Integer adapter over [`ModifiableValue`].

use super::ModifiableValue;
use crate::rounding::RoundingMode;

/// A [`ModifiableValue`] read through a rounding mode.
///
/// Holds no state beyond the mode; every integer getter rounds the float
/// engine's result on read and every setter widens to `f32`.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModifiableInt {
    inner: ModifiableValue,
    rounding: RoundingMode,
}

impl ModifiableInt {
    pub fn new(base: i32, rounding: RoundingMode) -> Self {
        Self {
            inner: ModifiableValue::new(base as f32),
            rounding,
        }
    }

    pub fn with_bounds(base: i32, min: i32, max: i32, rounding: RoundingMode) -> Self {
        Self {
            inner: ModifiableValue::with_bounds(base as f32, min as f32, max as f32),
            rounding,
        }
    }

    pub fn value(&self) -> i32 {
        self.rounding.apply(self.inner.value())
    }

    pub fn base(&self) -> i32 {
        self.rounding.apply(self.inner.base())
    }

    pub fn set_base(&mut self, base: i32) {
        self.inner.set_base(base as f32);
    }

    pub fn min(&self) -> i32 {
        self.rounding.apply(self.inner.min())
    }

    pub fn set_min(&mut self, min: i32) {
        self.inner.set_min(min as f32);
    }

    pub fn max(&self) -> i32 {
        self.rounding.apply(self.inner.max())
    }

    pub fn set_max(&mut self, max: i32) {
        self.inner.set_max(max as f32);
    }

    pub fn rounding(&self) -> RoundingMode {
        self.rounding
    }

    pub fn set_rounding(&mut self, rounding: RoundingMode) {
        self.rounding = rounding;
    }

    /// The float engine, for modifier operations.
    pub fn inner(&self) -> &ModifiableValue {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut ModifiableValue {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_on_read() {
        let mut hp = ModifiableInt::new(10, RoundingMode::Floor);
        hp.inner_mut().add_multiplier(1.25, 0, None).unwrap();
        assert_eq!(hp.inner().value(), 12.5);
        assert_eq!(hp.value(), 12);

        hp.set_rounding(RoundingMode::Ceil);
        assert_eq!(hp.value(), 13);
    }

    #[test]
    fn integer_bounds_clamp() {
        let mut armour = ModifiableInt::with_bounds(5, 0, 8, RoundingMode::Round);
        armour.inner_mut().add_additive(10.0, 0, None).unwrap();
        assert_eq!(armour.value(), 8);
        armour.set_max(4);
        assert_eq!(armour.value(), 4);
        armour.set_min(6);
        assert_eq!((armour.min(), armour.max(), armour.value()), (6, 6, 6));
    }
}
