/**
* filename : twap_scheduler
* author : HAMA
* date: 2025. 5. 8.
* description: 시간 분할(TWAP) 드라이버
**/

use std::sync::Arc;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::registry::StrategyRegistry;
use crate::core::stop_signal::StopSignal;
use crate::error::TradingError;
use crate::exchange::traits::Exchange;
use crate::models::order::OrderRequest;
use crate::models::strategy::{StrategyRecord, StrategyStatus, TwapFill, TwapState};
use crate::utils::{logging, secs_to_duration};

/// TWAP 분할 실행기
///
/// 레지스트리의 전략 식별자 하나에 묶여 분할 주문을 순서대로 제출한다.
/// 레코드 사본을 들고 있지 않고 매 단계 레지스트리를 통해 읽고 쓴다.
pub struct TwapScheduler {
  /// 거래소 인스턴스
  exchange: Arc<RwLock<dyn Exchange>>,
  /// 전략 저장소
  registry: Arc<StrategyRegistry>,
  /// 담당 전략 ID
  strategy_id: String,
  /// 대기 중단 신호
  stop: StopSignal,
}

impl TwapScheduler {
  pub fn new(
    exchange: Arc<RwLock<dyn Exchange>>,
    registry: Arc<StrategyRegistry>,
    strategy_id: impl Into<String>,
    stop: StopSignal,
  ) -> Self {
    TwapScheduler {
      exchange,
      registry,
      strategy_id: strategy_id.into(),
      stop,
    }
  }

  /// 분할 실행 루프
  ///
  /// 거래소 오류는 레코드에 ERROR 로 남기고 정상 종료한다.
  /// `Err` 는 레지스트리 불일치 같은 내부 오류에서만 돌려준다.
  pub async fn run(mut self) -> Result<(), TradingError> {
    let snapshot = self.registry.get(&self.strategy_id).await?;
    let (slice_count, interval) = {
      let twap = Self::twap_of(&snapshot)?;
      (twap.slice_count, secs_to_duration(twap.slice_interval_seconds))
    };

    for slice_index in 1..=slice_count {
      if !self.is_running().await? {
        log::info!("전략 {} 중지됨, 분할 {} 건너뜀", self.strategy_id, slice_index);
        break;
      }

      if slice_index > 1 {
        self.stop.pause(interval).await;
        // 대기 중 들어온 중지 요청은 다음 주문 전에 반영
        if !self.is_running().await? {
          log::info!("전략 {} 중지됨, 분할 {} 건너뜀", self.strategy_id, slice_index);
          break;
        }
      }

      let record = self.registry.get(&self.strategy_id).await?;
      let quantity = Self::twap_of(&record)?.quantity_for_slice(slice_index);
      if quantity <= Decimal::ZERO {
        log::info!("전략 {} 잔량 없음, 분할 {} 건너뜀", self.strategy_id, slice_index);
        continue;
      }

      match self.execute_slice(&record, slice_index, quantity).await {
        Ok(fill) => {
          let remaining = self.registry.mutate(&self.strategy_id, |r| {
            r.twap_state_mut().map(|twap| {
              twap.record_fill(fill);
              (twap.remaining_quantity, twap.volume_weighted_average_price)
            })
          }).await?;

          if let Some((remaining, vwap)) = remaining {
            log::info!("전략 {} 분할 {}/{} 완료 - 잔량: {} - 평균가: {}",
                       self.strategy_id, slice_index, slice_count, remaining, vwap);
          }
        },
        Err(e) => {
          logging::log_error(&format!("TWAP {} 분할 {}", self.strategy_id, slice_index), &e);
          self.registry.mutate(&self.strategy_id, |r| r.fail(e.to_string())).await?;
          logging::log_strategy_end(&self.strategy_id, "ERROR");
          return Ok(());
        }
      }
    }

    let completed = self.registry.mutate(&self.strategy_id, |r| r.complete()).await?;
    if completed {
      logging::log_strategy_end(&self.strategy_id, "COMPLETED");
    }

    Ok(())
  }

  fn twap_of(record: &StrategyRecord) -> Result<&TwapState, TradingError> {
    record.twap_state().ok_or_else(|| {
      TradingError::ExecutionError(format!("strategy {} is not a TWAP strategy", record.id))
    })
  }

  async fn is_running(&self) -> Result<bool, TradingError> {
    let record = self.registry.get(&self.strategy_id).await?;
    Ok(record.status == StrategyStatus::Running)
  }

  /// 분할 하나 실행: 기준가 조회 후 시장가 주문
  async fn execute_slice(
    &self,
    record: &StrategyRecord,
    slice_index: u32,
    quantity: Decimal,
  ) -> Result<TwapFill, TradingError> {
    let twap = Self::twap_of(record)?;

    // 가격은 평균가 계산용일 뿐 실행 여부를 결정하지 않는다
    let price = {
      let exchange = self.exchange.read().await;
      exchange.get_price(&record.symbol).await?
    };

    let request = OrderRequest::market(record.symbol.clone(), twap.side, quantity)
      .with_position_side(record.position_side)
      .with_client_order_id(Uuid::new_v4().simple().to_string());

    let ack = {
      let mut exchange = self.exchange.write().await;
      exchange.place_order(request).await?
    };

    logging::log_order_placed(&self.strategy_id, &ack.order_id.0, twap.side.as_str(), quantity, price);

    Ok(TwapFill {
      slice_index,
      order_id: ack.order_id,
      quantity,
      price,
      timestamp: Utc::now(),
    })
  }
}
