//! Role-based client aggregation.

pub mod aggregator;
pub mod strategy;

#[cfg(test)]
pub(crate) mod fake;

pub use aggregator::ClientAggregator;
pub use strategy::ClientSource;
