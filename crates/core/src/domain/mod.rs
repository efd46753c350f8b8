pub mod chain;
pub mod opportunity;
