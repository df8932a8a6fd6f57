//! # Selector Implementations
//!
//! [`base`] holds the configuration and helpers shared by all selectors; [`feature_selection`]
//! contains the selectors themselves.

pub mod base;
pub mod feature_selection;
