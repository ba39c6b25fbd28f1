use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TradingError;

#[derive(Debug, Clone, Serialize, Deserialize, Eq, Hash, PartialEq)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            _ => Err(TradingError::InvalidParameter(format!(
                "Invalid side: {}. Must be 'BUY' or 'SELL'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// Good Till Cancelled
    Gtc,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
        }
    }
}

/// 선물 포지션 방향 (헤지 모드에서는 LONG/SHORT, 단방향 모드에서는 BOTH)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
    #[default]
    Both,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
            PositionSide::Both => "BOTH",
        }
    }
}

impl FromStr for PositionSide {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LONG" => Ok(PositionSide::Long),
            "SHORT" => Ok(PositionSide::Short),
            "BOTH" => Ok(PositionSide::Both),
            _ => Err(TradingError::InvalidParameter(format!(
                "Invalid position side: {}. Must be 'LONG', 'SHORT' or 'BOTH'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl FromStr for OrderStatus {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "PARTIALLY_FILLED" => Ok(OrderStatus::PartiallyFilled),
            "FILLED" => Ok(OrderStatus::Filled),
            // 바이낸스는 미국식 철자를 사용
            "CANCELED" | "CANCELLED" => Ok(OrderStatus::Cancelled),
            "REJECTED" => Ok(OrderStatus::Rejected),
            "EXPIRED" | "EXPIRED_IN_MATCH" => Ok(OrderStatus::Expired),
            other => Err(TradingError::SerializationError(serde::de::Error::custom(
                format!("unknown order status: {}", other),
            ))),
        }
    }
}

/// 거래소에 제출할 주문 요청
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub time_in_force: Option<TimeInForce>,
    pub position_side: PositionSide,
    pub client_order_id: Option<String>,
}

impl OrderRequest {
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        OrderRequest {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            time_in_force: None,
            position_side: PositionSide::Both,
            client_order_id: None,
        }
    }

    /// GTC 지정가 주문
    pub fn limit(symbol: impl Into<String>, side: OrderSide, quantity: Decimal, price: Decimal) -> Self {
        OrderRequest {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
            time_in_force: Some(TimeInForce::Gtc),
            position_side: PositionSide::Both,
            client_order_id: None,
        }
    }

    pub fn with_position_side(mut self, position_side: PositionSide) -> Self {
        self.position_side = position_side;
        self
    }

    pub fn with_client_order_id(mut self, client_order_id: impl Into<String>) -> Self {
        self.client_order_id = Some(client_order_id.into());
        self
    }

    /// 거래소로 보내기 전 최소한의 형식 검증
    pub fn validate(&self) -> Result<(), TradingError> {
        if self.symbol.is_empty() {
            return Err(TradingError::OrderRejected("Symbol must not be empty".to_string()));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(TradingError::OrderRejected(format!(
                "Order quantity must be positive: {}",
                self.quantity
            )));
        }
        if self.order_type == OrderType::Limit {
            match self.price {
                Some(p) if p > Decimal::ZERO => {}
                _ => {
                    return Err(TradingError::OrderRejected(
                        "Limit order requires a positive price".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }
}

/// 주문 제출에 대한 거래소 응답
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderAck {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub executed_quantity: Decimal,
    pub avg_price: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_parsing() {
        assert_eq!("BUY".parse::<OrderSide>().unwrap(), OrderSide::Buy);
        assert_eq!("sell".parse::<OrderSide>().unwrap(), OrderSide::Sell);
        assert!(matches!(
            "HOLD".parse::<OrderSide>(),
            Err(TradingError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_limit_order_defaults() {
        let order = OrderRequest::limit("BTCUSDT", OrderSide::Sell, dec!(0.01), dec!(52500))
            .with_position_side(PositionSide::Short);

        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.time_in_force, Some(TimeInForce::Gtc));
        assert_eq!(order.price, Some(dec!(52500)));
        assert_eq!(order.position_side, PositionSide::Short);
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_order_validation() {
        let zero = OrderRequest::market("BTCUSDT", OrderSide::Buy, Decimal::ZERO);
        assert!(matches!(zero.validate(), Err(TradingError::OrderRejected(_))));

        let mut no_price = OrderRequest::limit("BTCUSDT", OrderSide::Buy, dec!(1), dec!(100));
        no_price.price = None;
        assert!(no_price.validate().is_err());
    }

    #[test]
    fn test_exchange_status_spelling() {
        assert_eq!("CANCELED".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert_eq!("PARTIALLY_FILLED".parse::<OrderStatus>().unwrap(), OrderStatus::PartiallyFilled);
        assert!("WHATEVER".parse::<OrderStatus>().is_err());
    }
}
