//! Currency price type with fixed-point precision.
//!
//! Prices carry two decimal places and are stored as integer cents so that
//! bid comparisons never go through floating point.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::CoreError;

/// Number of decimal places carried by a [`Price`].
pub const DECIMALS: u32 = 2;

/// One whole currency unit in cents.
pub const CENTS_PER_UNIT: u64 = 100;

/// A non-negative price with two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(u64);

impl Price {
    /// Zero price constant.
    pub const ZERO: Self = Self(0);

    /// Maximum representable price.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates a price from cents.
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a price from whole currency units.
    ///
    /// Saturates at [`Price::MAX`].
    #[must_use]
    pub const fn from_units(units: u64) -> Self {
        Self(units.saturating_mul(CENTS_PER_UNIT))
    }

    /// Returns the price in cents.
    #[must_use]
    pub const fn as_cents(self) -> u64 {
        self.0
    }

    /// Returns the whole-unit part (truncates cents).
    #[must_use]
    pub const fn as_units(self) -> u64 {
        self.0 / CENTS_PER_UNIT
    }

    /// Returns true if this price is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns true if this price is strictly positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / CENTS_PER_UNIT;
        let frac = self.0 % CENTS_PER_UNIT;
        write!(f, "{whole}.{frac:02}")
    }
}

impl FromStr for Price {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('$');
        if s.starts_with('-') {
            return Err(CoreError::InvalidPrice("negative values not allowed".into()));
        }

        let (whole_str, frac_str) = match s.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (s, ""),
        };

        if whole_str.is_empty() && frac_str.is_empty() {
            return Err(CoreError::InvalidPrice(format!("invalid number: {s}")));
        }
        if frac_str.len() > DECIMALS as usize {
            return Err(CoreError::InvalidPrice("too many decimal places".into()));
        }
        if !frac_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::InvalidPrice(format!("invalid fractional part: {s}")));
        }

        let whole: u64 = if whole_str.is_empty() {
            0
        } else {
            whole_str
                .parse()
                .map_err(|_| CoreError::InvalidPrice(format!("invalid number: {s}")))?
        };

        let frac: u64 = if frac_str.is_empty() {
            0
        } else {
            format!("{frac_str:0<2}")
                .parse()
                .map_err(|_| CoreError::InvalidPrice(format!("invalid fractional part: {s}")))?
        };

        whole
            .checked_mul(CENTS_PER_UNIT)
            .and_then(|cents| cents.checked_add(frac))
            .map(Price)
            .ok_or_else(|| CoreError::InvalidPrice("overflow".into()))
    }
}

impl Serialize for Price {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let whole = self.0 / CENTS_PER_UNIT;
        let frac = self.0 % CENTS_PER_UNIT;

        let s = if frac == 0 {
            format!("{whole}")
        } else {
            let frac_str = format!("{frac:02}");
            format!("{whole}.{}", frac_str.trim_end_matches('0'))
        };

        serializer.serialize_str(&s)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
