//! Variation consolidation: grouping legacy records by parent key and
//! writing them as variants of one canonical relational product.

pub mod canonical_colors;
pub mod grouper;
#[cfg(test)]
pub(crate) mod memory;
pub mod materializer;
pub mod model;
pub mod runner;
