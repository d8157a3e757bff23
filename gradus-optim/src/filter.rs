//! Filter line-search globalization.
//!
//! A trial iterate is acceptable when no stored `(cost, violation)` pair
//! dominates it by a margin. Accepted entries evict every entry they dominate.

use crate::linalg::sparse::{norm1, sub};

const GAMMA_COST: f64 = 1e-8;
const GAMMA_CONSTRAINT: f64 = 1e-5;
const INITIAL_MAX_VIOLATION: f64 = 1e4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterEntry {
    /// Objective, barrier-shifted for the interior-point method.
    pub cost: f64,
    /// 1-norm constraint violation.
    pub violation: f64,
}

impl FilterEntry {
    pub fn new(cost: f64, violation: f64) -> Self {
        FilterEntry { cost, violation }
    }

    /// Entry for an equality-constrained iterate: `(f, ‖cₑ‖₁)`.
    pub fn sqp(f: f64, c_e: &[f64]) -> Self {
        FilterEntry::new(f, norm1(c_e))
    }

    /// Entry for an interior-point iterate:
    /// `(f − μ Σ ln sᵢ, ‖cₑ‖₁ + ‖cᵢ − s‖₁)`.
    pub fn interior_point(f: f64, s: &[f64], c_e: &[f64], c_i: &[f64], mu: f64) -> Self {
        let barrier: f64 = s.iter().map(|si| si.ln()).sum();
        FilterEntry::new(f - mu * barrier, norm1(c_e) + norm1(&sub(c_i, s)))
    }

    fn is_finite(&self) -> bool {
        self.cost.is_finite() && self.violation.is_finite()
    }
}

#[derive(Debug, Clone)]
pub struct Filter {
    max_violation: f64,
    entries: Vec<FilterEntry>,
}

impl Default for Filter {
    fn default() -> Self {
        Filter::new()
    }
}

impl Filter {
    pub const GAMMA_COST: f64 = GAMMA_COST;
    pub const GAMMA_CONSTRAINT: f64 = GAMMA_CONSTRAINT;

    pub fn new() -> Self {
        let mut filter = Filter {
            max_violation: INITIAL_MAX_VIOLATION,
            entries: Vec::new(),
        };
        filter.reset();
        filter
    }

    /// Back to the single sentinel `(∞, ceiling)`.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.entries
            .push(FilterEntry::new(f64::INFINITY, self.max_violation));
    }

    pub fn max_violation(&self) -> f64 {
        self.max_violation
    }

    /// Shrink the violation ceiling tenfold and reset.
    pub fn shrink_max_violation(&mut self) {
        self.max_violation *= 0.1;
        tracing::debug!(ceiling = self.max_violation, "filter ceiling shrunk");
        self.reset();
    }

    pub fn entries(&self) -> &[FilterEntry] {
        &self.entries
    }

    pub fn is_acceptable(&self, entry: &FilterEntry) -> bool {
        if !entry.is_finite() || entry.violation > self.max_violation {
            return false;
        }
        self.entries.iter().all(|elem| {
            entry.cost <= elem.cost - GAMMA_COST * elem.violation
                || entry.violation <= (1.0 - GAMMA_CONSTRAINT) * elem.violation
        })
    }

    /// Unconditionally insert `entry`, evicting what it dominates.
    pub fn add(&mut self, entry: FilterEntry) {
        self.entries
            .retain(|elem| !(entry.cost <= elem.cost && entry.violation <= elem.violation));
        self.entries.push(entry);
    }

    /// Insert `entry` if acceptable; returns whether it was.
    pub fn try_add(&mut self, entry: FilterEntry) -> bool {
        if self.is_acceptable(&entry) {
            self.add(entry);
            true
        } else {
            false
        }
    }
}
