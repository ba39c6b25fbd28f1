use std::collections::HashMap;

use async_trait::async_trait;
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::TradingError;
use crate::exchange::traits::Exchange;
use crate::models::order::{OrderAck, OrderId, OrderRequest, OrderStatus, OrderType};

/// An in-process exchange simulation for development and tests.
///
/// Market orders fill immediately at the current price, limit orders rest as `New`.
/// Prices are set explicitly or drift randomly via [`SimulatedExchange::drift_prices`].
pub struct SimulatedExchange {
    prices: HashMap<String, Decimal>,
    orders: HashMap<OrderId, (OrderRequest, OrderStatus)>,
    placed: Vec<OrderRequest>,
    order_id_counter: u64,
    price_feed_down: bool,
    reject_after: Option<usize>,
}

impl SimulatedExchange {
    pub fn new() -> Self {
        let mut exchange = Self::empty();

        // Initialize with some test data
        exchange.prices.insert("BTCUSDT".to_string(), dec!(50000));
        exchange.prices.insert("ETHUSDT".to_string(), dec!(3000));
        exchange
    }

    /// Exchange with no listed symbols
    pub fn empty() -> Self {
        SimulatedExchange {
            prices: HashMap::new(),
            orders: HashMap::new(),
            placed: Vec::new(),
            order_id_counter: 0,
            price_feed_down: false,
            reject_after: None,
        }
    }

    pub fn with_price(mut self, symbol: impl Into<String>, price: Decimal) -> Self {
        self.prices.insert(symbol.into(), price);
        self
    }

    pub fn set_price(&mut self, symbol: impl Into<String>, price: Decimal) {
        self.prices.insert(symbol.into(), price);
    }

    /// While down, every price request fails with a connectivity error
    pub fn set_price_feed_down(&mut self, down: bool) {
        self.price_feed_down = down;
    }

    /// Accept `accepted` more orders, then reject everything
    pub fn reject_orders_after(&mut self, accepted: usize) {
        self.reject_after = Some(self.placed.len() + accepted);
    }

    pub fn accept_orders(&mut self) {
        self.reject_after = None;
    }

    /// Every order request that was accepted, in submission order
    pub fn placed_orders(&self) -> &[OrderRequest] {
        &self.placed
    }

    pub fn order_status(&self, order_id: &OrderId) -> Option<OrderStatus> {
        self.orders.get(order_id).map(|(_, status)| *status)
    }

    /// Random walk of every listed price by up to ±0.2%
    pub fn drift_prices(&mut self) {
        let mut rng = rand::thread_rng();
        for price in self.prices.values_mut() {
            let change = Decimal::from_f64(rng.gen_range(-0.002..0.002)).unwrap_or_default();
            *price = (*price * (Decimal::ONE + change)).round_dp(2);
        }
    }

    fn generate_order_id(&mut self) -> OrderId {
        self.order_id_counter += 1;
        OrderId(format!("sim-{}", self.order_id_counter))
    }

    fn current_price(&self, symbol: &str) -> Result<Decimal, TradingError> {
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| TradingError::OrderRejected(format!("Unknown symbol: {}", symbol)))
    }
}

impl Default for SimulatedExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Exchange for SimulatedExchange {
    async fn get_price(&self, symbol: &str) -> Result<Decimal, TradingError> {
        if self.price_feed_down {
            return Err(TradingError::ConnectivityError("simulated price feed is down".to_string()));
        }
        self.current_price(symbol)
    }

    async fn place_order(&mut self, request: OrderRequest) -> Result<OrderAck, TradingError> {
        request.validate()?;

        if let Some(limit) = self.reject_after {
            if self.placed.len() >= limit {
                return Err(TradingError::OrderRejected("simulated rejection".to_string()));
            }
        }

        let price = self.current_price(&request.symbol)?;
        let order_id = self.generate_order_id();

        let ack = match request.order_type {
            OrderType::Market => OrderAck {
                order_id: order_id.clone(),
                status: OrderStatus::Filled,
                executed_quantity: request.quantity,
                avg_price: Some(price),
            },
            OrderType::Limit => OrderAck {
                order_id: order_id.clone(),
                status: OrderStatus::New,
                executed_quantity: Decimal::ZERO,
                avg_price: None,
            },
        };

        self.orders.insert(order_id, (request.clone(), ack.status));
        self.placed.push(request);

        Ok(ack)
    }

    async fn cancel_order(&mut self, _symbol: &str, order_id: &OrderId) -> Result<OrderStatus, TradingError> {
        match self.orders.get_mut(order_id) {
            Some((_, status)) if *status == OrderStatus::New || *status == OrderStatus::PartiallyFilled => {
                *status = OrderStatus::Cancelled;
                Ok(*status)
            }
            Some((_, status)) => Err(TradingError::OrderRejected(format!(
                "Order {} cannot be cancelled in status {:?}",
                order_id, status
            ))),
            None => Err(TradingError::OrderNotFound(order_id.clone())),
        }
    }
}
