pub mod configure;
pub mod portfolio;
pub mod rebalance;
