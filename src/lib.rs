//! 주문 실행 엔진 라이브러리
//!
//! TWAP 분할 주문과 가격 그리드 전략을 독립 태스크로 실행하고,
//! 전략 레지스트리를 통해 진행 상황을 조회할 수 있게 한다.

pub mod api;
pub mod config;
pub mod core;
pub mod error;
pub mod exchange;
pub mod models;
pub mod utils;

// 핵심 타입 재노출
pub use crate::core::engine::{ExecutionEngine, GridParams, TwapParams};
pub use crate::error::TradingError;
pub use crate::exchange::traits::Exchange;
pub use crate::models::order::{OrderId, OrderSide, OrderStatus, OrderType, PositionSide};
pub use crate::models::strategy::{GridType, StrategyKind, StrategyRecord, StrategyStatus};

/// 버전 정보
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 결과 타입 별칭
pub type Result<T> = std::result::Result<T, TradingError>;
