use serde::{Deserialize, Serialize};
use std::fmt;

pub mod status;
pub mod target;

// Re-exports for convenience
pub use status::*;
pub use target::*;

/// Purchasability of a target as classified from its page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
    Unknown,
}

impl Availability {
    /// `InStock` and `OutOfStock` are the only statuses that drive alerts.
    pub fn is_determinable(&self) -> bool {
        !matches!(self, Availability::Unknown)
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Availability::InStock => "✅",
            Availability::OutOfStock => "❌",
            Availability::Unknown => "❓",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Availability::InStock => "IN STOCK",
            Availability::OutOfStock => "OUT OF STOCK",
            Availability::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// Last status recorded for a target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    InStock,
    OutOfStock,
    Unknown,
    #[default]
    NeverObserved,
}

impl TargetState {
    /// True when `availability` is a real status that differs from this one.
    pub fn is_transition_to(&self, availability: Availability) -> bool {
        availability.is_determinable() && *self != TargetState::from(availability)
    }
}

impl From<Availability> for TargetState {
    fn from(availability: Availability) -> Self {
        match availability {
            Availability::InStock => TargetState::InStock,
            Availability::OutOfStock => TargetState::OutOfStock,
            Availability::Unknown => TargetState::Unknown,
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetState::InStock => Availability::InStock.fmt(f),
            TargetState::OutOfStock => Availability::OutOfStock.fmt(f),
            TargetState::Unknown => Availability::Unknown.fmt(f),
            TargetState::NeverObserved => f.write_str("NOT CHECKED YET"),
        }
    }
}
