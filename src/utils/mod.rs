pub mod backoff;
pub mod decimals;
