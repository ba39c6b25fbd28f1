use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::TradingError;
use crate::models::order::{OrderAck, OrderId, OrderRequest, OrderStatus};

/// The `Exchange` trait is the gateway the execution engine drives.
/// Real connectors and the simulated exchange both implement it.
///
/// Failures are reported as `ConnectivityError` (network/API trouble),
/// `OrderRejected` (the exchange refused the request) or `OrderNotFound`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Get the last traded price for a symbol
    async fn get_price(&self, symbol: &str) -> Result<Decimal, TradingError>;

    /// Submit a new order to the exchange
    async fn place_order(&mut self, request: OrderRequest) -> Result<OrderAck, TradingError>;

    /// Cancel an existing order
    async fn cancel_order(&mut self, symbol: &str, order_id: &OrderId) -> Result<OrderStatus, TradingError>;
}
