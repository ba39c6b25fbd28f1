pub mod order;
pub mod strategy;
