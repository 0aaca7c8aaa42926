//! Analysis modules.
//!
//! Attribute normalization lives in `aggregator`; the cross-listing
//! coverage audit built on top of it lives in `audit`.

pub mod aggregator;
pub mod audit;

pub use aggregator::*;
pub use audit::*;
