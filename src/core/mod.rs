//! 전략 실행 엔진과 드라이버

pub mod engine;
pub mod grid_monitor;
pub mod registry;
pub mod stop_signal;
pub mod twap_scheduler;

pub use engine::{ExecutionEngine, GridParams, TwapParams};
pub use registry::StrategyRegistry;
