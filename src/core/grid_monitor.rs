/**
* filename : grid_monitor
* author : HAMA
* date: 2025. 5. 11.
* description: 가격 그리드 드라이버
**/

use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::core::registry::StrategyRegistry;
use crate::core::stop_signal::StopSignal;
use crate::error::TradingError;
use crate::exchange::traits::Exchange;
use crate::models::order::{OrderRequest, PositionSide};
use crate::models::strategy::{GridLevel, GridState, LevelStatus, StrategyStatus};
use crate::utils::logging;

/// 그리드 레벨 감시자
pub struct GridMonitor {
  /// 거래소 인스턴스
  exchange: Arc<RwLock<dyn Exchange>>,
  /// 전략 저장소
  registry: Arc<StrategyRegistry>,
  /// 담당 전략 ID
  strategy_id: String,
  /// 대기 중단 신호
  stop: StopSignal,
  /// 정상 폴링 주기
  poll_interval: Duration,
  /// 폴링 실패 후 대기
  error_backoff: Duration,
  /// BOTH 근접 밴드
  trigger_band: Decimal,
}

impl GridMonitor {
  pub fn new(
    exchange: Arc<RwLock<dyn Exchange>>,
    registry: Arc<StrategyRegistry>,
    strategy_id: impl Into<String>,
    stop: StopSignal,
    config: &EngineConfig,
  ) -> Self {
    GridMonitor {
      exchange,
      registry,
      strategy_id: strategy_id.into(),
      stop,
      poll_interval: Duration::from_secs(config.grid_poll_interval_secs),
      error_backoff: Duration::from_secs(config.grid_error_backoff_secs),
      trigger_band: config.grid_trigger_band,
    }
  }

  /// 감시 루프
  ///
  /// 전략이 ACTIVE 인 동안 가격을 폴링하고 도달한 레벨마다 지정가 주문을 낸다.
  /// 거래소 오류는 재시도하고, 그 밖의 오류는 `Err` 로 돌려 전략을 ERROR 로 만든다.
  pub async fn run(mut self) -> Result<(), TradingError> {
    loop {
      let record = self.registry.get(&self.strategy_id).await?;
      if record.status != StrategyStatus::Active {
        log::info!("그리드 {} 감시 종료: {}", self.strategy_id, record.status);
        break;
      }
      let grid = record.grid_state().cloned().ok_or_else(|| {
        TradingError::ExecutionError(format!("strategy {} is not a grid strategy", record.id))
      })?;

      match self.poll_once(&record.symbol, record.position_side, &grid).await {
        Ok(triggered) => {
          if triggered > 0 {
            log::debug!("그리드 {} 레벨 {}개 발동", self.strategy_id, triggered);
          }
          self.stop.pause(self.poll_interval).await;
        },
        Err(e) if e.is_gateway_error() => {
          log::warn!("그리드 {} 폴링 실패, {:?} 후 재시도: {}", self.strategy_id, self.error_backoff, e);
          self.stop.pause(self.error_backoff).await;
        },
        Err(e) => return Err(e),
      }
    }

    Ok(())
  }

  /// 가격 한 번 조회 후 발동 레벨 처리, 발동 레벨 수 반환
  async fn poll_once(
    &self,
    symbol: &str,
    position_side: PositionSide,
    grid: &GridState,
  ) -> Result<usize, TradingError> {
    let current_price = {
      let exchange = self.exchange.read().await;
      exchange.get_price(symbol).await?
    };

    let triggered = self.triggered_levels(grid, current_price);
    for level in &triggered {
      self.execute_level(symbol, position_side, grid, level).await?;
    }

    Ok(triggered.len())
  }

  fn triggered_levels(&self, grid: &GridState, current_price: Decimal) -> Vec<GridLevel> {
    grid.levels
      .iter()
      .filter(|l| l.status == LevelStatus::Pending)
      .filter(|l| grid.grid_type.triggers(current_price, l.price, self.trigger_band))
      .cloned()
      .collect()
  }

  /// 레벨 하나에 지정가 주문
  ///
  /// 주문 실패는 해당 레벨만 ERROR 로 만들고 나머지 레벨은 계속 평가한다.
  async fn execute_level(
    &self,
    symbol: &str,
    position_side: PositionSide,
    grid: &GridState,
    level: &GridLevel,
  ) -> Result<(), TradingError> {
    let side = grid.grid_type.order_side();
    let request = OrderRequest::limit(symbol, side, level.quantity, level.price)
      .with_position_side(position_side)
      .with_client_order_id(Uuid::new_v4().simple().to_string());

    let result = {
      let mut exchange = self.exchange.write().await;
      exchange.place_order(request).await
    };

    let level_index = level.level_index;
    match result {
      Ok(ack) => {
        logging::log_order_placed(&self.strategy_id, &ack.order_id.0, side.as_str(), level.quantity, level.price);
        let order_id = ack.order_id;
        self.registry.mutate(&self.strategy_id, |r| {
          r.grid_state_mut().map(|g| g.mark_executed(level_index, order_id, Utc::now()))
        }).await?;
      },
      Err(e) => {
        log::warn!("그리드 {} 레벨 {} 주문 실패: {}", self.strategy_id, level_index, e);
        let detail = e.to_string();
        self.registry.mutate(&self.strategy_id, |r| {
          r.grid_state_mut().map(|g| g.mark_error(level_index, detail))
        }).await?;
      }
    }

    Ok(())
  }
}
