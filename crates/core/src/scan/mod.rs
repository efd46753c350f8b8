pub mod aggregator;
pub mod config;
pub mod evaluator;
pub mod trade;
