// 전략 실행 API 핸들러

use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use warp::http::StatusCode;
use warp::reply::{json, with_status, Reply};

use crate::core::engine::{ExecutionEngine, GridParams, TwapParams};
use crate::error::TradingError;
use crate::models::order::{OrderSide, PositionSide};
use crate::models::strategy::{GridType, StrategyKind, StrategyRecord};

/// TWAP 생성 요청 모델
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwapRequest {
  pub symbol: String,
  pub side: String,
  pub total_quantity: Decimal,
  pub duration_minutes: u64,
  pub slice_count: u32,
  pub position_side: Option<String>,
}

impl TwapRequest {
  fn into_params(self) -> Result<TwapParams, TradingError> {
    let side = OrderSide::from_str(&self.side)?;
    let params = TwapParams::new(self.symbol, side, self.total_quantity, self.duration_minutes, self.slice_count);
    Ok(match parse_position_side(self.position_side.as_deref())? {
      Some(position_side) => params.with_position_side(position_side),
      None => params,
    })
  }
}

/// 그리드 생성 요청 모델
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRequest {
  pub symbol: String,
  pub grid_type: String,
  pub upper_price: Decimal,
  pub lower_price: Decimal,
  pub level_count: u32,
  pub per_level_quantity: Decimal,
  pub position_side: Option<String>,
}

impl GridRequest {
  fn into_params(self) -> Result<GridParams, TradingError> {
    let grid_type = GridType::from_str(&self.grid_type)?;
    let params = GridParams::new(
      self.symbol,
      grid_type,
      self.upper_price,
      self.lower_price,
      self.level_count,
      self.per_level_quantity,
    );
    Ok(match parse_position_side(self.position_side.as_deref())? {
      Some(position_side) => params.with_position_side(position_side),
      None => params,
    })
  }
}

/// 전략 목록 쿼리 매개변수
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
  pub kind: Option<String>,
}

fn parse_position_side(value: Option<&str>) -> Result<Option<PositionSide>, TradingError> {
  value.map(PositionSide::from_str).transpose()
}

fn status_for(error: &TradingError) -> StatusCode {
  match error {
    TradingError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
    TradingError::StrategyNotFound(_) => StatusCode::NOT_FOUND,
    _ => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

fn error_reply(error: &TradingError) -> warp::reply::WithStatus<warp::reply::Json> {
  let error_response = serde_json::json!({ "error": error.to_string() });
  with_status(json(&error_response), status_for(error))
}

/// 레코드 직렬화 + 파생 필드 (executedSlices / levelCounts)
pub fn snapshot_json(record: &StrategyRecord) -> serde_json::Value {
  let mut value = serde_json::to_value(record).unwrap_or_else(|e| {
    serde_json::json!({ "id": record.id, "error": e.to_string() })
  });

  if let Some(object) = value.as_object_mut() {
    if let Some(twap) = record.twap_state() {
      object.insert("executedSlices".to_string(), serde_json::json!(twap.executed_slices()));
    }
    if let Some(grid) = record.grid_state() {
      object.insert("levelCounts".to_string(), serde_json::json!(grid.level_counts()));
    }
  }

  value
}

/// 헬스체크 핸들러
pub async fn health_handler() -> Result<impl Reply, warp::Rejection> {
  Ok(json(&serde_json::json!({
    "status": "ok",
    "version": crate::VERSION,
  })))
}

/// TWAP 생성 핸들러
pub async fn create_twap(
  req: TwapRequest,
  engine: ExecutionEngine,
) -> Result<impl Reply, warp::Rejection> {
  let result = match req.into_params() {
    Ok(params) => engine.start_twap(params).await,
    Err(e) => Err(e),
  };

  match result {
    Ok(strategy_id) => {
      let response = serde_json::json!({
        "status": "success",
        "strategyId": strategy_id,
      });
      Ok(with_status(json(&response), StatusCode::CREATED))
    },
    Err(e) => Ok(error_reply(&e)),
  }
}

/// 그리드 생성 핸들러
pub async fn create_grid(
  req: GridRequest,
  engine: ExecutionEngine,
) -> Result<impl Reply, warp::Rejection> {
  let result = match req.into_params() {
    Ok(params) => engine.start_grid(params).await,
    Err(e) => Err(e),
  };

  match result {
    Ok(strategy_id) => {
      let response = serde_json::json!({
        "status": "success",
        "strategyId": strategy_id,
      });
      Ok(with_status(json(&response), StatusCode::CREATED))
    },
    Err(e) => Ok(error_reply(&e)),
  }
}

/// 전략 목록 조회 핸들러
pub async fn list_strategies(
  query: ListQuery,
  engine: ExecutionEngine,
) -> Result<impl Reply, warp::Rejection> {
  let records = match query.kind.as_deref() {
    Some(kind) => match StrategyKind::from_str(kind) {
      Ok(kind) => engine.list_by_kind(kind).await,
      Err(e) => return Ok(error_reply(&e)),
    },
    None => engine.list_all().await,
  };

  let snapshots: Vec<serde_json::Value> = records.iter().map(snapshot_json).collect();
  Ok(with_status(json(&snapshots), StatusCode::OK))
}

/// 전략 상태 조회 핸들러
pub async fn get_strategy_status(
  strategy_id: String,
  engine: ExecutionEngine,
) -> Result<impl Reply, warp::Rejection> {
  match engine.status(&strategy_id).await {
    Ok(record) => Ok(with_status(json(&snapshot_json(&record)), StatusCode::OK)),
    Err(e) => Ok(error_reply(&e)),
  }
}

/// 전략 중지 핸들러
pub async fn stop_strategy(
  strategy_id: String,
  engine: ExecutionEngine,
) -> Result<impl Reply, warp::Rejection> {
  match engine.stop(&strategy_id).await {
    Ok(record) => Ok(with_status(json(&snapshot_json(&record)), StatusCode::OK)),
    Err(e) => {
      log::warn!("전략 {} 중지 요청 실패: {}", strategy_id, e);
      Ok(error_reply(&e))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_status_mapping() {
    assert_eq!(status_for(&TradingError::InvalidParameter("x".into())), StatusCode::BAD_REQUEST);
    assert_eq!(status_for(&TradingError::StrategyNotFound("x".into())), StatusCode::NOT_FOUND);
    assert_eq!(status_for(&TradingError::ConnectivityError("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn test_bad_side_is_invalid_parameter() {
    let req: TwapRequest = serde_json::from_value(serde_json::json!({
      "symbol": "BTCUSDT",
      "side": "HOLD",
      "totalQuantity": "1",
      "durationMinutes": 1,
      "sliceCount": 2
    })).unwrap();

    assert!(matches!(req.into_params(), Err(TradingError::InvalidParameter(_))));
  }

  #[test]
  fn test_position_side_is_optional() {
    let req: GridRequest = serde_json::from_value(serde_json::json!({
      "symbol": "BTCUSDT",
      "gridType": "both",
      "upperPrice": "55000",
      "lowerPrice": "45000",
      "levelCount": 5,
      "perLevelQuantity": "0.001",
      "positionSide": "SHORT"
    })).unwrap();

    let params = req.into_params().unwrap();
    assert_eq!(params.grid_type, GridType::Both);
    assert_eq!(params.position_side, Some(PositionSide::Short));
  }
}
