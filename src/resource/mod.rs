//! Named resource vectors
//!
//! A resource vector maps caller-defined resource names (`cpu_cores`,
//! `memory_gb`, `gpu_units`, anything else) to non-negative quantities.
//! Vectors are either open (setting an absent key extends them) or
//! fixed-schema (the key set is frozen, as for a scheduler ledger).
//!
//! Quantities are held as fixed-point [`Quantity`] values with six decimal
//! places; the `f64` accessors convert at the boundary.

mod quantity;

pub use quantity::{Quantity, MAX_QUANTITY, QUANTITY_SCALE};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Characters that delimit the canonical vector and job leaf forms
const RESERVED_NAME_CHARS: &[char] = &[':', ',', '|'];

/// Errors for resource vector operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResourceError {
    #[error("Invalid quantity for resource {name}: {value}")]
    InvalidResource { name: String, value: f64 },

    #[error("Invalid resource name: {0:?}")]
    InvalidName(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Malformed resource entry: {0}")]
    Malformed(String),
}

fn validate_name(name: &str) -> Result<(), ResourceError> {
    if name.is_empty() || name.trim() != name || name.contains(RESERVED_NAME_CHARS) {
        return Err(ResourceError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn quantity(name: &str, value: f64) -> Result<Quantity, ResourceError> {
    Quantity::from_f64(value).ok_or_else(|| ResourceError::InvalidResource {
        name: name.to_string(),
        value,
    })
}

/// A named, arbitrary-dimension quantity map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct ResourceVector {
    quantities: BTreeMap<String, Quantity>,
    fixed: bool,
}

impl ResourceVector {
    /// Build an open vector from name/quantity pairs.
    ///
    /// Names must be non-empty, carry no surrounding whitespace and avoid
    /// `:`, `,` and `|`.
    pub fn new<I, K, V>(pairs: I) -> Result<Self, ResourceError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<f64>,
    {
        let mut quantities = BTreeMap::new();
        for (name, value) in pairs {
            let name = name.into();
            validate_name(&name)?;
            let value = quantity(&name, value.into())?;
            quantities.insert(name, value);
        }
        Ok(Self {
            quantities,
            fixed: false,
        })
    }

    /// An empty open vector.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A copy of this vector whose key set can no longer grow.
    pub fn into_fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Quantity for `name`.
    pub fn get(&self, name: &str) -> Result<f64, ResourceError> {
        self.quantity(name).map(Quantity::as_f64)
    }

    /// Exact quantity for `name`.
    pub fn quantity(&self, name: &str) -> Result<Quantity, ResourceError> {
        self.quantities
            .get(name)
            .copied()
            .ok_or_else(|| ResourceError::UnknownResource(name.to_string()))
    }

    /// Set the quantity for `name`, extending an open vector if needed.
    pub fn set(&mut self, name: &str, value: f64) -> Result<(), ResourceError> {
        let value = quantity(name, value)?;
        match self.quantities.get_mut(name) {
            Some(slot) => *slot = value,
            None if self.fixed => return Err(ResourceError::UnknownResource(name.to_string())),
            None => {
                validate_name(name)?;
                self.quantities.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.quantities.contains_key(name)
    }

    /// Resource names in lexicographic order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.quantities.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.quantities.iter().map(|(k, v)| (k.as_str(), v.as_f64()))
    }

    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }

    /// Same names, every quantity zero.
    pub fn zeroed(&self) -> ResourceVector {
        Self {
            quantities: self
                .quantities
                .keys()
                .map(|name| (name.clone(), Quantity::ZERO))
                .collect(),
            fixed: self.fixed,
        }
    }

    /// True when every resource named by `capacity` that this vector also
    /// names is within the capacity. Names absent from `capacity` do not
    /// constrain the comparison.
    pub fn fits_within(&self, capacity: &ResourceVector) -> bool {
        capacity
            .quantities
            .iter()
            .all(|(name, available)| match self.quantities.get(name) {
                Some(requested) => requested <= available,
                None => true,
            })
    }

    /// Subtract `demand` over this vector's own names. Names the demand
    /// carries that this vector lacks are ignored. Returns `None` if any
    /// quantity would go negative.
    pub fn checked_sub(&self, demand: &ResourceVector) -> Option<ResourceVector> {
        let mut quantities = self.quantities.clone();
        for (name, value) in quantities.iter_mut() {
            if let Some(requested) = demand.quantities.get(name) {
                *value = value.checked_sub(*requested)?;
            }
        }
        Some(Self {
            quantities,
            fixed: self.fixed,
        })
    }

    /// Add `amount` over this vector's own names.
    pub fn saturating_add(&self, amount: &ResourceVector) -> ResourceVector {
        let quantities = self
            .quantities
            .iter()
            .map(|(name, value)| {
                let plus = amount.quantities.get(name).copied().unwrap_or_default();
                (name.clone(), value.saturating_add(plus))
            })
            .collect();
        Self {
            quantities,
            fixed: self.fixed,
        }
    }

    /// Add `amount` over this vector's own names, capping each quantity at
    /// the matching quantity in `limit`.
    pub fn add_capped(&self, amount: &ResourceVector, limit: &ResourceVector) -> ResourceVector {
        let mut sum = self.saturating_add(amount);
        for (name, value) in sum.quantities.iter_mut() {
            if let Some(cap) = limit.quantities.get(name) {
                *value = (*value).min(*cap);
            }
        }
        sum
    }

    /// Element-wise `self - other` over this vector's names, floored at zero.
    pub fn saturating_sub(&self, other: &ResourceVector) -> ResourceVector {
        let quantities = self
            .quantities
            .iter()
            .map(|(name, value)| {
                let minus = other.quantities.get(name).copied().unwrap_or_default();
                (name.clone(), value.saturating_sub(minus))
            })
            .collect();
        Self {
            quantities,
            fixed: self.fixed,
        }
    }

    /// Canonical `name:value,...` form with names in lexicographic order.
    pub fn serialize(&self) -> String {
        self.quantities
            .iter()
            .map(|(name, value)| format!("{}:{}", name, value))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Vectors compare by contents; the fixed flag is not part of equality.
impl PartialEq for ResourceVector {
    fn eq(&self, other: &Self) -> bool {
        self.quantities == other.quantities
    }
}

impl fmt::Display for ResourceVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.serialize())
    }
}

/// Parses the canonical `name:value,...` form. Whitespace around entries is
/// ignored; a repeated name is malformed.
impl FromStr for ResourceVector {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut pairs = Vec::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, value) = entry
                .split_once(':')
                .ok_or_else(|| ResourceError::Malformed(entry.to_string()))?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| ResourceError::Malformed(entry.to_string()))?;
            let name = name.trim();
            if pairs.iter().any(|(seen, _): &(String, f64)| seen == name) {
                return Err(ResourceError::Malformed(entry.to_string()));
            }
            pairs.push((name.to_string(), value));
        }
        Self::new(pairs)
    }
}

impl TryFrom<BTreeMap<String, f64>> for ResourceVector {
    type Error = ResourceError;

    fn try_from(map: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        Self::new(map)
    }
}

impl From<ResourceVector> for BTreeMap<String, f64> {
    fn from(vector: ResourceVector) -> Self {
        vector
            .quantities
            .into_iter()
            .map(|(name, value)| (name, value.as_f64()))
            .collect()
    }
}
