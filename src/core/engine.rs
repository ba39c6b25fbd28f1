/**
* filename : engine
* author : HAMA
* date: 2025. 5. 11.
* description: 전략 실행 엔진 (시작/중지/조회)
**/

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};

use crate::config::EngineConfig;
use crate::core::grid_monitor::GridMonitor;
use crate::core::registry::StrategyRegistry;
use crate::core::stop_signal::{stop_pair, StopHandle};
use crate::core::twap_scheduler::TwapScheduler;
use crate::error::TradingError;
use crate::exchange::traits::Exchange;
use crate::models::order::{OrderSide, PositionSide};
use crate::models::strategy::{GridState, GridType, StrategyKind, StrategyRecord, TwapState};
use crate::utils::logging;

/// TWAP 시작 파라미터
#[derive(Debug, Clone)]
pub struct TwapParams {
  pub symbol: String,
  pub side: OrderSide,
  pub total_quantity: Decimal,
  pub duration_minutes: u64,
  pub slice_count: u32,
  /// 없으면 엔진 설정의 기본값
  pub position_side: Option<PositionSide>,
}

impl TwapParams {
  pub fn new(
    symbol: impl Into<String>,
    side: OrderSide,
    total_quantity: Decimal,
    duration_minutes: u64,
    slice_count: u32,
  ) -> Self {
    TwapParams {
      symbol: symbol.into(),
      side,
      total_quantity,
      duration_minutes,
      slice_count,
      position_side: None,
    }
  }

  pub fn with_position_side(mut self, position_side: PositionSide) -> Self {
    self.position_side = Some(position_side);
    self
  }

  fn validate(&self) -> Result<(), TradingError> {
    validate_symbol(&self.symbol)?;
    if self.total_quantity <= Decimal::ZERO {
      return Err(TradingError::InvalidParameter("totalQuantity must be positive".to_string()));
    }
    if self.duration_minutes == 0 {
      return Err(TradingError::InvalidParameter("durationMinutes must be positive".to_string()));
    }
    if self.slice_count == 0 {
      return Err(TradingError::InvalidParameter("sliceCount must be positive".to_string()));
    }
    Ok(())
  }
}

/// 그리드 시작 파라미터
#[derive(Debug, Clone)]
pub struct GridParams {
  pub symbol: String,
  pub grid_type: GridType,
  pub upper_price: Decimal,
  pub lower_price: Decimal,
  pub level_count: u32,
  pub per_level_quantity: Decimal,
  pub position_side: Option<PositionSide>,
}

impl GridParams {
  pub fn new(
    symbol: impl Into<String>,
    grid_type: GridType,
    upper_price: Decimal,
    lower_price: Decimal,
    level_count: u32,
    per_level_quantity: Decimal,
  ) -> Self {
    GridParams {
      symbol: symbol.into(),
      grid_type,
      upper_price,
      lower_price,
      level_count,
      per_level_quantity,
      position_side: None,
    }
  }

  pub fn with_position_side(mut self, position_side: PositionSide) -> Self {
    self.position_side = Some(position_side);
    self
  }

  fn validate(&self) -> Result<(), TradingError> {
    validate_symbol(&self.symbol)?;
    if self.lower_price <= Decimal::ZERO {
      return Err(TradingError::InvalidParameter("lowerPrice must be positive".to_string()));
    }
    if self.upper_price <= self.lower_price {
      return Err(TradingError::InvalidParameter("upperPrice must be greater than lowerPrice".to_string()));
    }
    // 간격 계산이 levelCount - 1 로 나눈다
    if self.level_count < 2 {
      return Err(TradingError::InvalidParameter("levelCount must be at least 2".to_string()));
    }
    if self.per_level_quantity <= Decimal::ZERO {
      return Err(TradingError::InvalidParameter("perLevelQuantity must be positive".to_string()));
    }
    Ok(())
  }
}

fn validate_symbol(symbol: &str) -> Result<(), TradingError> {
  if symbol.trim().is_empty() {
    return Err(TradingError::InvalidParameter("symbol must not be empty".to_string()));
  }
  Ok(())
}

/// 실행 엔진
///
/// 전략을 검증해 레지스트리에 등록하고, 전략마다 독립 태스크로 드라이버를 띄운다.
/// 엔진은 드라이버의 진행을 기다리지 않는다.
#[derive(Clone)]
pub struct ExecutionEngine {
  exchange: Arc<RwLock<dyn Exchange>>,
  registry: Arc<StrategyRegistry>,
  config: EngineConfig,
  /// 실행 중인 드라이버의 중지 신호
  stop_handles: Arc<Mutex<HashMap<String, StopHandle>>>,
}

impl ExecutionEngine {
  pub fn new(exchange: Arc<RwLock<dyn Exchange>>, config: EngineConfig) -> Self {
    ExecutionEngine {
      exchange,
      registry: Arc::new(StrategyRegistry::new()),
      config,
      stop_handles: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  pub fn registry(&self) -> Arc<StrategyRegistry> {
    self.registry.clone()
  }

  /// TWAP 전략 시작, 부여된 식별자 반환
  pub async fn start_twap(&self, params: TwapParams) -> Result<String, TradingError> {
    params.validate()?;

    let position_side = params.position_side.unwrap_or(self.config.position_side);
    let state = TwapState::new(params.side, params.total_quantity, params.duration_minutes, params.slice_count);
    let detail = format!(
      "TWAP {} {} / {}분 / {}회 분할 (회당 {})",
      params.side, params.total_quantity, params.duration_minutes, params.slice_count, state.slice_quantity
    );
    let id = self.registry.create(StrategyRecord::twap(params.symbol.clone(), position_side, state)).await;
    logging::log_strategy_start(&id, &params.symbol, &detail);

    let (handle, signal) = stop_pair();
    self.stop_handles.lock().await.insert(id.clone(), handle);

    let scheduler = TwapScheduler::new(self.exchange.clone(), self.registry.clone(), id.clone(), signal);
    self.supervise(id.clone(), scheduler.run());

    Ok(id)
  }

  /// 그리드 전략 시작, 부여된 식별자 반환
  pub async fn start_grid(&self, params: GridParams) -> Result<String, TradingError> {
    params.validate()?;

    let position_side = params.position_side.unwrap_or(self.config.position_side);
    let state = GridState::new(
      params.grid_type,
      params.upper_price,
      params.lower_price,
      params.level_count,
      params.per_level_quantity,
      self.config.price_decimals,
    );
    let detail = format!(
      "GRID {} {}~{} / {}레벨 (간격 {}, 레벨당 {})",
      params.grid_type, params.lower_price, params.upper_price,
      params.level_count, state.price_step, params.per_level_quantity
    );
    let id = self.registry.create(StrategyRecord::grid(params.symbol.clone(), position_side, state)).await;
    logging::log_strategy_start(&id, &params.symbol, &detail);

    let (handle, signal) = stop_pair();
    self.stop_handles.lock().await.insert(id.clone(), handle);

    let monitor = GridMonitor::new(self.exchange.clone(), self.registry.clone(), id.clone(), signal, &self.config);
    self.supervise(id.clone(), monitor.run());

    Ok(id)
  }

  /// 드라이버를 감독 태스크 안에서 실행
  ///
  /// 드라이버가 내부 오류를 돌려주거나 패닉하면 레코드를 ERROR 로 만든다.
  fn supervise<F>(&self, id: String, driver: F)
  where
    F: Future<Output = Result<(), TradingError>> + Send + 'static,
  {
    let registry = self.registry.clone();
    let stop_handles = self.stop_handles.clone();

    tokio::spawn(async move {
      let fault = match tokio::spawn(driver).await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(join_error) => Some(format!("driver task failed: {}", join_error)),
      };

      if let Some(detail) = fault {
        log::error!("전략 {} 드라이버 오류: {}", id, detail);
        match registry.mutate(&id, |r| r.fail(detail)).await {
          Ok(true) => logging::log_strategy_end(&id, "ERROR"),
          Ok(false) => {},
          Err(e) => logging::log_error(&format!("전략 {} 오류 기록", id), &e),
        }
      }

      stop_handles.lock().await.remove(&id);
    });
  }

  /// 전략 중지 후 스냅샷 반환
  ///
  /// 이미 종료된 전략은 건드리지 않고 현재 스냅샷을 그대로 돌려준다.
  pub async fn stop(&self, id: &str) -> Result<StrategyRecord, TradingError> {
    let (stopped, cancellable) = self.registry.mutate(id, |r| {
      let stopped = r.stop();
      let cancellable = if stopped {
        r.grid_state().map(|g| g.cancellable_levels()).unwrap_or_default()
      } else {
        Vec::new()
      };
      (stopped, cancellable)
    }).await?;

    if !stopped {
      return self.registry.get(id).await;
    }

    if let Some(handle) = self.stop_handles.lock().await.get(id) {
      handle.trigger();
    }
    logging::log_strategy_end(id, "STOPPED");

    if !cancellable.is_empty() {
      let symbol = self.registry.get(id).await?.symbol;
      for (level_index, order_id) in cancellable {
        let result = {
          let mut exchange = self.exchange.write().await;
          exchange.cancel_order(&symbol, &order_id).await
        };

        match result {
          Ok(_) => {
            self.registry.mutate(id, |r| {
              r.grid_state_mut().map(|g| g.mark_cancelled(level_index))
            }).await?;
            logging::log_order_cancelled(id, &order_id.0);
          },
          Err(e) => {
            log::warn!("전략 {} 레벨 {} 주문 {} 취소 실패: {}", id, level_index, order_id, e);
          }
        }
      }
    }

    self.registry.get(id).await
  }

  pub async fn status(&self, id: &str) -> Result<StrategyRecord, TradingError> {
    self.registry.get(id).await
  }

  pub async fn list_all(&self) -> Vec<StrategyRecord> {
    self.registry.list_all().await
  }

  pub async fn list_by_kind(&self, kind: StrategyKind) -> Vec<StrategyRecord> {
    self.registry.list_by_kind(kind).await
  }

  /// 중지 신호를 보관 중인 (드라이버가 살아 있는) 전략 수
  pub async fn running_drivers(&self) -> usize {
    self.stop_handles.lock().await.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::exchange::traits::MockExchange;
  use crate::models::order::{OrderAck, OrderId, OrderStatus};
  use crate::models::strategy::{LevelStatus, StrategyStatus};
  use rstest::rstest;
  use rust_decimal_macros::dec;
  use std::time::Duration;

  fn engine_with(exchange: MockExchange) -> ExecutionEngine {
    let exchange: Arc<RwLock<dyn Exchange>> = Arc::new(RwLock::new(exchange));
    ExecutionEngine::new(exchange, EngineConfig::default())
  }

  #[rstest]
  #[case(TwapParams::new("BTCUSDT", OrderSide::Buy, dec!(0), 1, 2))]
  #[case(TwapParams::new("BTCUSDT", OrderSide::Buy, dec!(0.01), 1, 0))]
  #[case(TwapParams::new("BTCUSDT", OrderSide::Sell, dec!(-1), 1, 2))]
  #[case(TwapParams::new("BTCUSDT", OrderSide::Buy, dec!(0.01), 0, 2))]
  #[case(TwapParams::new("  ", OrderSide::Buy, dec!(0.01), 1, 2))]
  #[tokio::test]
  async fn test_invalid_twap_creates_nothing(#[case] params: TwapParams) {
    let engine = engine_with(MockExchange::new());

    let result = engine.start_twap(params).await;

    assert!(matches!(result, Err(TradingError::InvalidParameter(_))));
    assert!(engine.registry().is_empty().await);
  }

  #[rstest]
  #[case(GridParams::new("BTCUSDT", GridType::Buy, dec!(45000), dec!(55000), 5, dec!(0.001)))]
  #[case(GridParams::new("BTCUSDT", GridType::Buy, dec!(50000), dec!(50000), 5, dec!(0.001)))]
  #[case(GridParams::new("BTCUSDT", GridType::Sell, dec!(55000), dec!(45000), 1, dec!(0.001)))]
  #[case(GridParams::new("BTCUSDT", GridType::Both, dec!(55000), dec!(45000), 5, dec!(0)))]
  #[case(GridParams::new("", GridType::Both, dec!(55000), dec!(45000), 5, dec!(0.001)))]
  #[tokio::test]
  async fn test_invalid_grid_creates_nothing(#[case] params: GridParams) {
    let engine = engine_with(MockExchange::new());

    let result = engine.start_grid(params).await;

    assert!(matches!(result, Err(TradingError::InvalidParameter(_))));
    assert!(engine.registry().is_empty().await);
  }

  #[tokio::test]
  async fn test_stop_unknown_id() {
    let engine = engine_with(MockExchange::new());

    let result = engine.stop("TWAP_BTCUSDT_BUY_0_1").await;

    assert!(matches!(result, Err(TradingError::StrategyNotFound(_))));
    assert!(engine.list_all().await.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_stop_is_idempotent() {
    let mut exchange = MockExchange::new();
    exchange.expect_get_price().returning(|_| Ok(dec!(60000)));
    let engine = engine_with(exchange);

    let id = engine
      .start_grid(GridParams::new("BTCUSDT", GridType::Buy, dec!(55000), dec!(45000), 5, dec!(0.001)))
      .await
      .unwrap();

    let first = engine.stop(&id).await.unwrap();
    let second = engine.stop(&id).await.unwrap();

    assert_eq!(first.status, StrategyStatus::Stopped);
    assert_eq!(first, second);
  }

  #[tokio::test(start_paused = true)]
  async fn test_stop_cancels_levels_with_orders() {
    let mut exchange = MockExchange::new();
    exchange.expect_get_price().returning(|_| Ok(dec!(60000)));
    exchange
      .expect_cancel_order()
      .withf(|_, id| id.0 == "resting-2")
      .times(1)
      .returning(|_, _| Err(TradingError::OrderNotFound(OrderId("resting-2".to_string()))));
    exchange
      .expect_cancel_order()
      .withf(|_, id| id.0 == "resting-1")
      .times(1)
      .returning(|_, _| Ok(OrderStatus::Cancelled));
    let engine = engine_with(exchange);

    let id = engine
      .start_grid(GridParams::new("BTCUSDT", GridType::Buy, dec!(55000), dec!(45000), 5, dec!(0.001)))
      .await
      .unwrap();
    engine.registry().mutate(&id, |r| {
      let grid = r.grid_state_mut().unwrap();
      grid.levels[0].order_id = Some(OrderId("resting-1".to_string()));
      grid.levels[1].order_id = Some(OrderId("resting-2".to_string()));
    }).await.unwrap();

    let snapshot = engine.stop(&id).await.unwrap();
    let levels = &snapshot.grid_state().unwrap().levels;

    assert_eq!(snapshot.status, StrategyStatus::Stopped);
    assert_eq!(levels[0].status, LevelStatus::Cancelled);
    // 취소 실패는 중지를 막지 않는다
    assert_eq!(levels[1].status, LevelStatus::Pending);
  }

  #[tokio::test(start_paused = true)]
  async fn test_driver_panic_marks_error() {
    let mut exchange = MockExchange::new();
    exchange.expect_get_price().returning(|_| panic!("feed exploded"));
    let engine = engine_with(exchange);

    let id = engine
      .start_twap(TwapParams::new("BTCUSDT", OrderSide::Buy, dec!(1), 1, 2))
      .await
      .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let record = engine.status(&id).await.unwrap();
    assert_eq!(record.status, StrategyStatus::Error);
    assert!(record.error_detail.unwrap().contains("driver task failed"));
    assert_eq!(engine.running_drivers().await, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_twap_uses_configured_position_side() {
    let mut exchange = MockExchange::new();
    exchange.expect_get_price().returning(|_| Ok(dec!(50000)));
    exchange
      .expect_place_order()
      .withf(|req| req.position_side == PositionSide::Long)
      .returning(|req| Ok(OrderAck {
        order_id: OrderId("1".to_string()),
        status: OrderStatus::Filled,
        executed_quantity: req.quantity,
        avg_price: Some(dec!(50000)),
      }));
    let engine = engine_with(exchange);

    let id = engine
      .start_twap(TwapParams::new("BTCUSDT", OrderSide::Buy, dec!(1), 1, 1).with_position_side(PositionSide::Long))
      .await
      .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let record = engine.status(&id).await.unwrap();
    assert_eq!(record.position_side, PositionSide::Long);
    assert_eq!(record.status, StrategyStatus::Completed);
  }

  #[tokio::test(start_paused = true)]
  async fn test_huge_duration_keeps_running() {
    let mut exchange = MockExchange::new();
    exchange.expect_get_price().returning(|_| Ok(dec!(50000)));
    exchange.expect_place_order().times(1).returning(|req| Ok(OrderAck {
      order_id: OrderId("1".to_string()),
      status: OrderStatus::Filled,
      executed_quantity: req.quantity,
      avg_price: Some(dec!(50000)),
    }));
    let engine = engine_with(exchange);

    let id = engine
      .start_twap(TwapParams::new("BTCUSDT", OrderSide::Buy, dec!(1), 1_000_000_000_000_000_000, 2))
      .await
      .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    // 첫 분할은 즉시 실행되고 두 번째 분할을 기다리는 중
    let record = engine.status(&id).await.unwrap();
    assert_eq!(record.status, StrategyStatus::Running);
    assert!(record.error_detail.is_none());
    assert_eq!(record.twap_state().unwrap().executed_slices(), 1);

    let stopped = engine.stop(&id).await.unwrap();
    assert_eq!(stopped.status, StrategyStatus::Stopped);
  }
}
