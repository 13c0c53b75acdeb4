//! Tolerant geometric predicates used by every other module.
//!
//! Everything above this layer works exclusively through [`kernel`]; no
//! other module reaches into raw coordinates.

pub mod kernel;
