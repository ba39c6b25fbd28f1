/**
* filename : registry
* author : HAMA
* date: 2025. 5. 11.
* description: 전략 레코드 저장소 (식별자 → 레코드)
**/

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::error::TradingError;
use crate::models::strategy::{StrategyKind, StrategyRecord};

#[derive(Default)]
struct Arena {
  /// 생성 순서대로 쌓이는 레코드 슬롯, 삭제하지 않는다
  slots: Vec<Arc<Mutex<StrategyRecord>>>,
  /// 식별자 → 슬롯 위치
  index: HashMap<String, usize>,
}

/// 전략 레지스트리
///
/// 모든 전략 레코드의 유일한 소유자. 조회는 복사본을 돌려주고,
/// 변경은 해당 레코드의 락 안에서만 일어난다.
#[derive(Default)]
pub struct StrategyRegistry {
  arena: RwLock<Arena>,
}

impl StrategyRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// 레코드 등록 후 부여된 식별자 반환
  ///
  /// 식별자는 `<접두사>_<생성 시각(초)>_<순번>` 형태이며 순번 덕분에 항상 유일하다.
  pub async fn create(&self, mut record: StrategyRecord) -> String {
    let mut arena = self.arena.write().await;

    let sequence = arena.slots.len() + 1;
    let id = format!("{}_{}_{}", record.id_prefix(), record.created_at.timestamp(), sequence);
    record.id = id.clone();

    arena.slots.push(Arc::new(Mutex::new(record)));
    let position = arena.slots.len() - 1;
    arena.index.insert(id.clone(), position);

    id
  }

  async fn slot(&self, id: &str) -> Result<Arc<Mutex<StrategyRecord>>, TradingError> {
    let arena = self.arena.read().await;
    arena.index
      .get(id)
      .map(|&position| arena.slots[position].clone())
      .ok_or_else(|| TradingError::StrategyNotFound(id.to_string()))
  }

  /// 레코드 스냅샷 조회
  pub async fn get(&self, id: &str) -> Result<StrategyRecord, TradingError> {
    let slot = self.slot(id).await?;
    let record = slot.lock().await;
    Ok(record.clone())
  }

  /// 레코드 락을 잡은 상태로 `f` 적용
  ///
  /// 여러 필드를 함께 바꾸는 변경도 다른 조회자에게는 한 번에 보인다.
  pub async fn mutate<F, R>(&self, id: &str, f: F) -> Result<R, TradingError>
  where
    F: FnOnce(&mut StrategyRecord) -> R,
  {
    let slot = self.slot(id).await?;
    let mut record = slot.lock().await;
    Ok(f(&mut record))
  }

  /// 전체 스냅샷 (생성 순서)
  pub async fn list_all(&self) -> Vec<StrategyRecord> {
    let slots: Vec<_> = {
      let arena = self.arena.read().await;
      arena.slots.clone()
    };

    let mut snapshots = Vec::with_capacity(slots.len());
    for slot in slots {
      snapshots.push(slot.lock().await.clone());
    }
    snapshots
  }

  pub async fn list_by_kind(&self, kind: StrategyKind) -> Vec<StrategyRecord> {
    self.list_all().await
      .into_iter()
      .filter(|r| r.kind() == kind)
      .collect()
  }

  pub async fn len(&self) -> usize {
    self.arena.read().await.slots.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.len().await == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::order::{OrderSide, PositionSide};
  use crate::models::strategy::{GridState, GridType, StrategyStatus, TwapState};
  use rust_decimal_macros::dec;

  fn twap_record() -> StrategyRecord {
    StrategyRecord::twap("BTCUSDT", PositionSide::Both, TwapState::new(OrderSide::Buy, dec!(1), 10, 5))
  }

  fn grid_record() -> StrategyRecord {
    StrategyRecord::grid(
      "ETHUSDT",
      PositionSide::Both,
      GridState::new(GridType::Sell, dec!(3100), dec!(2900), 3, dec!(0.1), 2),
    )
  }

  #[tokio::test]
  async fn test_create_assigns_unique_ids() {
    let registry = StrategyRegistry::new();

    let a = registry.create(twap_record()).await;
    let b = registry.create(twap_record()).await;

    assert_ne!(a, b);
    assert!(a.starts_with("TWAP_BTCUSDT_BUY_"));
    assert_eq!(registry.get(&a).await.unwrap().id, a);
    assert_eq!(registry.len().await, 2);
  }

  #[tokio::test]
  async fn test_get_returns_detached_snapshot() {
    let registry = StrategyRegistry::new();
    let id = registry.create(twap_record()).await;

    let mut snapshot = registry.get(&id).await.unwrap();
    snapshot.status = StrategyStatus::Error;

    assert_eq!(registry.get(&id).await.unwrap().status, StrategyStatus::Running);
  }

  #[tokio::test]
  async fn test_mutate_applies_under_lock() {
    let registry = StrategyRegistry::new();
    let id = registry.create(twap_record()).await;

    let changed = registry.mutate(&id, |r| r.stop()).await.unwrap();
    assert!(changed);
    assert_eq!(registry.get(&id).await.unwrap().status, StrategyStatus::Stopped);
  }

  #[tokio::test]
  async fn test_unknown_id() {
    let registry = StrategyRegistry::new();

    assert!(matches!(registry.get("nope").await, Err(TradingError::StrategyNotFound(_))));
    assert!(matches!(registry.mutate("nope", |r| r.stop()).await, Err(TradingError::StrategyNotFound(_))));
    assert!(registry.is_empty().await);
  }

  #[tokio::test]
  async fn test_list_preserves_creation_order() {
    let registry = StrategyRegistry::new();
    let first = registry.create(twap_record()).await;
    let second = registry.create(grid_record()).await;
    let third = registry.create(twap_record()).await;

    let ids: Vec<String> = registry.list_all().await.into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![first, second.clone(), third]);

    let grids = registry.list_by_kind(StrategyKind::Grid).await;
    assert_eq!(grids.len(), 1);
    assert_eq!(grids[0].id, second);
  }

  #[tokio::test]
  async fn test_concurrent_mutations_are_not_lost() {
    let registry = Arc::new(StrategyRegistry::new());
    let id = registry.create(grid_record()).await;

    let mut handles = Vec::new();
    for _ in 0..50 {
      let registry = registry.clone();
      let id = id.clone();
      handles.push(tokio::spawn(async move {
        registry.mutate(&id, |r| {
          if let Some(grid) = r.grid_state_mut() {
            grid.total_orders_placed += 1;
          }
        }).await
      }));
    }
    for handle in handles {
      handle.await.unwrap().unwrap();
    }

    let record = registry.get(&id).await.unwrap();
    assert_eq!(record.grid_state().unwrap().total_orders_placed, 50);
  }
}
