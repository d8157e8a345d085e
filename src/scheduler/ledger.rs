//! Resource ledger
//!
//! Tracks total and available capacity over a key set fixed at
//! construction. Arithmetic only ever touches ledger keys; demand names the
//! ledger does not know are ignored.

use serde::{Deserialize, Serialize};

use crate::resource::ResourceVector;

/// Snapshot of ledger usage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceStatus {
    pub total: ResourceVector,
    pub available: ResourceVector,
    pub used: ResourceVector,
}

#[derive(Debug, Clone)]
pub struct ResourceLedger {
    total: ResourceVector,
    available: ResourceVector,
}

impl ResourceLedger {
    pub fn new(total: ResourceVector) -> Self {
        let total = total.into_fixed();
        Self {
            available: total.clone(),
            total,
        }
    }

    pub fn total(&self) -> &ResourceVector {
        &self.total
    }

    pub fn available(&self) -> &ResourceVector {
        &self.available
    }

    /// Resource names tracked by the ledger
    pub fn resource_types(&self) -> Vec<&str> {
        self.total.keys().collect()
    }

    /// Whether `demand` fits in the currently available capacity
    pub fn admits(&self, demand: &ResourceVector) -> bool {
        demand.fits_within(&self.available)
    }

    /// Whether `demand` could ever fit, even with nothing allocated
    pub fn could_ever_admit(&self, demand: &ResourceVector) -> bool {
        demand.fits_within(&self.total)
    }

    /// Subtract `demand` from available capacity if it fits.
    pub fn try_allocate(&mut self, demand: &ResourceVector) -> bool {
        match self.available.checked_sub(demand) {
            Some(next) => {
                self.available = next;
                true
            }
            None => false,
        }
    }

    /// Return `demand` to available capacity, never exceeding the total.
    pub fn release(&mut self, demand: &ResourceVector) {
        self.available = self.available.add_capped(demand, &self.total);
    }

    pub fn used(&self) -> ResourceVector {
        self.total.saturating_sub(&self.available)
    }

    pub fn status(&self) -> ResourceStatus {
        ResourceStatus {
            total: self.total.clone(),
            available: self.available.clone(),
            used: self.used(),
        }
    }
}
