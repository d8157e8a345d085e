//! Fixed-point resource quantities
//!
//! Quantities are stored as whole micro-units so that allocation and release
//! are exact: any sequence of subtractions and the matching additions returns
//! to the starting value.

use std::fmt;

/// Micro-units per whole unit.
pub const QUANTITY_SCALE: u64 = 1_000_000;

/// Largest accepted quantity, in micro-units. Every value up to this
/// converts to `f64` and back without loss.
const MAX_MICROS: u64 = 1 << 53;

/// Largest accepted quantity, in whole units.
pub const MAX_QUANTITY: f64 = MAX_MICROS as f64 / QUANTITY_SCALE as f64;

/// A non-negative quantity with six decimal places of precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(u64);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);

    /// Convert from floating point, rounding to the nearest micro-unit.
    /// Returns `None` for non-finite, negative or out-of-range values.
    /// Negative zero becomes zero.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 || value > MAX_QUANTITY {
            return None;
        }
        Some(Quantity((value * QUANTITY_SCALE as f64).round() as u64))
    }

    pub fn from_micros(micros: u64) -> Self {
        Quantity(micros)
    }

    pub fn micros(self) -> u64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / QUANTITY_SCALE as f64
    }

    pub fn checked_sub(self, other: Quantity) -> Option<Quantity> {
        self.0.checked_sub(other.0).map(Quantity)
    }

    pub fn saturating_sub(self, other: Quantity) -> Quantity {
        Quantity(self.0.saturating_sub(other.0))
    }

    pub fn saturating_add(self, other: Quantity) -> Quantity {
        Quantity(self.0.saturating_add(other.0))
    }
}

/// Exact decimal rendering without trailing zeros: `4`, `0.5`, `2.000001`.
impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / QUANTITY_SCALE;
        let frac = self.0 % QUANTITY_SCALE;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:06}", frac);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}
