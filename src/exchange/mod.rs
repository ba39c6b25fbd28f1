//! 거래소 게이트웨이

pub mod binance_futures;
pub mod mocks;
pub mod traits;
