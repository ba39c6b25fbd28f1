//! 로깅 유틸리티
//!
//! 로그 초기화 및 전략 이벤트 로그 함수 제공

use env_logger::{Builder, Target};
use log::LevelFilter;
use rust_decimal::Decimal;
use std::env;
use std::fs::OpenOptions;

use crate::config::LoggingConfig;
use crate::error::TradingError;

/// 로그 레벨 문자열 파싱 (알 수 없는 값은 info)
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// 로깅 시스템 초기화
///
/// RUST_LOG 가 설정되어 있으면 설정 파일의 레벨보다 우선한다.
pub fn init(config: &LoggingConfig) -> Result<(), TradingError> {
    let mut builder = Builder::new();

    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.level.clone());
    builder.filter_level(parse_level(&log_level)).format_timestamp_millis();

    if let Some(path) = &config.file_path {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder
        .try_init()
        .map_err(|e| TradingError::ConfigError(format!("logger already initialised: {}", e)))?;

    log::info!("로깅 시스템 초기화 완료: 레벨 = {}", log_level);

    Ok(())
}

/// 전략 시작 로그
pub fn log_strategy_start(strategy_id: &str, symbol: &str, detail: &str) {
    log::info!("전략 시작: {} - 심볼: {} - {}", strategy_id, symbol, detail);
}

/// 전략 종료 로그
pub fn log_strategy_end(strategy_id: &str, status: &str) {
    log::info!("전략 종료: {} - 결과: {}", strategy_id, status);
}

/// 하위 주문 제출 로그
pub fn log_order_placed(strategy_id: &str, order_id: &str, side: &str, quantity: Decimal, price: Decimal) {
    log::info!("주문 제출: {} - 주문: {} - 방향: {} - 수량: {} - 가격: {}",
               strategy_id, order_id, side, quantity, price);
}

/// 주문 취소 로그
pub fn log_order_cancelled(strategy_id: &str, order_id: &str) {
    log::info!("주문 취소: {} - 주문: {}", strategy_id, order_id);
}

/// 오류 로그
pub fn log_error(context: &str, error: &TradingError) {
    log::error!("오류 발생 - {}: {}", context, error);
}
