/**
* filename : error
* author : HAMA
* date: 2025. 5. 8.
* description:
**/

use thiserror::Error;

use crate::models::order::OrderId;

#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Strategy not found: {0}")]
    StrategyNotFound(String),

    #[error("Connectivity error: {0}")]
    ConnectivityError(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl TradingError {
    /// 거래소 호출에서 발생한 오류인지 여부
    ///
    /// 드라이버는 이 오류들을 호출자에게 던지지 않고 레코드에 기록한다.
    pub fn is_gateway_error(&self) -> bool {
        matches!(
            self,
            TradingError::ConnectivityError(_)
                | TradingError::OrderRejected(_)
                | TradingError::OrderNotFound(_)
        )
    }
}

impl From<::config::ConfigError> for TradingError {
    fn from(e: ::config::ConfigError) -> Self {
        TradingError::ConfigError(e.to_string())
    }
}
