pub mod config;
pub mod error;
pub mod model;

// Probing and the aggregation pass
pub mod aggregate;
pub mod probe;

// Rollup and persistence
pub mod report;
