use rand::Rng;

use super::context::RollContext;
use crate::error::{Result, RollError};
use crate::parse::DieSize;

/// Source of die faces. Every `rand::Rng` is one, tests can script the
/// faces they need.
pub trait DieRoller {
    /// Returns a face in `1..=sides`, `sides` is never zero.
    fn roll_die(&mut self, sides: u32) -> u32;
}

impl<R: Rng> DieRoller for R {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.gen_range(1..=sides)
    }
}

/// A single rolled die.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Die {
    pub(crate) value: i64,
    pub(crate) size: DieSize,
    pub(crate) exploded: bool,
    pub(crate) original: Option<i64>,
}

impl Die {
    pub fn new(value: i64, size: DieSize) -> Self {
        Self {
            value,
            size,
            exploded: false,
            original: None,
        }
    }

    pub(crate) fn roll<R: DieRoller + ?Sized>(
        size: DieSize,
        context: &mut RollContext,
        rng: &mut R,
    ) -> Result<Self> {
        let sides = size.max_value();
        if sides == 0 {
            return Err(RollError::value("Cannot roll a 0-sided die."));
        }
        context.count_roll()?;

        Ok(Self::new(i64::from(rng.roll_die(sides)), size))
    }

    /// The value counted towards totals, after any clamping.
    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn size(&self) -> DieSize {
        self.size
    }

    /// Whether this die triggered another roll by exploding.
    pub fn exploded(&self) -> bool {
        self.exploded
    }

    /// The rolled value if `mi`/`ma` replaced it.
    pub fn original(&self) -> Option<i64> {
        self.original
    }

    pub(crate) fn clamp_to(&mut self, value: i64) {
        if self.original.is_none() {
            self.original = Some(self.value);
        }
        self.value = value;
    }
}
