//! 전략 레코드 모델
//!
//! 레지스트리가 소유하는 전략 상태와 TWAP/그리드 하위 상태

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TradingError;
use crate::models::order::{OrderId, OrderSide, PositionSide};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrategyKind {
    Twap,
    Grid,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Twap => "TWAP",
            StrategyKind::Grid => "GRID",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TWAP" => Ok(StrategyKind::Twap),
            "GRID" => Ok(StrategyKind::Grid),
            _ => Err(TradingError::InvalidParameter(format!("Unknown strategy kind: {}", s))),
        }
    }
}

/// 전략 상태
///
/// TWAP: RUNNING → {COMPLETED, STOPPED, ERROR}
/// GRID: ACTIVE → {STOPPED, ERROR}
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrategyStatus {
    Running,
    Active,
    Completed,
    Stopped,
    Error,
}

impl StrategyStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StrategyStatus::Completed | StrategyStatus::Stopped | StrategyStatus::Error
        )
    }
}

impl fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyStatus::Running => "RUNNING",
            StrategyStatus::Active => "ACTIVE",
            StrategyStatus::Completed => "COMPLETED",
            StrategyStatus::Stopped => "STOPPED",
            StrategyStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// TWAP 분할 체결 기록
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TwapFill {
    pub slice_index: u32,
    pub order_id: OrderId,
    pub quantity: Decimal,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// TWAP 하위 상태
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TwapState {
    pub side: OrderSide,
    pub total_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub duration_minutes: u64,
    pub slice_quantity: Decimal,
    pub slice_count: u32,
    pub slice_interval_seconds: f64,
    pub fills: Vec<TwapFill>,
    pub total_executed: Decimal,
    pub volume_weighted_average_price: Decimal,
}

impl TwapState {
    pub fn new(side: OrderSide, total_quantity: Decimal, duration_minutes: u64, slice_count: u32) -> Self {
        let slice_quantity = total_quantity / Decimal::from(slice_count);
        let slice_interval_seconds = (duration_minutes as f64 * 60.0) / slice_count as f64;

        TwapState {
            side,
            total_quantity,
            remaining_quantity: total_quantity,
            duration_minutes,
            slice_quantity,
            slice_count,
            slice_interval_seconds,
            fills: Vec::new(),
            total_executed: Decimal::ZERO,
            volume_weighted_average_price: Decimal::ZERO,
        }
    }

    /// 주어진 분할 회차에 실제로 주문할 수량
    ///
    /// 마지막 분할은 남은 수량 전부를 흡수한다.
    pub fn quantity_for_slice(&self, slice_index: u32) -> Decimal {
        if self.remaining_quantity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        if slice_index >= self.slice_count {
            self.remaining_quantity
        } else {
            self.slice_quantity.min(self.remaining_quantity)
        }
    }

    /// 체결 추가 후 파생 값 재계산
    pub fn record_fill(&mut self, fill: TwapFill) {
        self.remaining_quantity -= fill.quantity;
        self.fills.push(fill);

        let (volume, notional) = self
            .fills
            .iter()
            .fold((Decimal::ZERO, Decimal::ZERO), |(v, n), f| (v + f.quantity, n + f.quantity * f.price));

        self.total_executed = volume;
        self.volume_weighted_average_price = if volume > Decimal::ZERO {
            notional / volume
        } else {
            Decimal::ZERO
        };
    }

    pub fn executed_slices(&self) -> usize {
        self.fills.len()
    }
}

/// 그리드 방향
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum GridType {
    Buy,
    Sell,
    Both,
}

impl GridType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GridType::Buy => "BUY",
            GridType::Sell => "SELL",
            GridType::Both => "BOTH",
        }
    }

    /// 현재가가 레벨 가격에 도달했는지 판단
    ///
    /// BOTH 는 방향을 구분하지 않는 근접 밴드 검사라서 레벨 근처에서
    /// 중복 발동하거나 한 번도 발동하지 않을 수 있다.
    pub fn triggers(&self, current_price: Decimal, level_price: Decimal, band: Decimal) -> bool {
        match self {
            GridType::Buy => current_price <= level_price,
            GridType::Sell => current_price >= level_price,
            GridType::Both => (current_price - level_price).abs() < level_price * band,
        }
    }

    /// 발동된 레벨의 주문 방향 (BOTH 는 포지션 추적이 없으므로 매수)
    pub fn order_side(&self) -> OrderSide {
        match self {
            GridType::Buy | GridType::Both => OrderSide::Buy,
            GridType::Sell => OrderSide::Sell,
        }
    }
}

impl fmt::Display for GridType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GridType {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(GridType::Buy),
            "SELL" => Ok(GridType::Sell),
            "BOTH" => Ok(GridType::Both),
            _ => Err(TradingError::InvalidParameter(format!(
                "Invalid grid type: {}. Must be 'BUY', 'SELL' or 'BOTH'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LevelStatus {
    Pending,
    Executed,
    Cancelled,
    Error,
}

/// 그리드 가격 레벨
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GridLevel {
    pub level_index: u32,
    pub price: Decimal,
    pub quantity: Decimal,
    pub status: LevelStatus,
    pub order_id: Option<OrderId>,
    pub executed_at: Option<DateTime<Utc>>,
    pub error_detail: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LevelCounts {
    pub pending: usize,
    pub executed: usize,
    pub cancelled: usize,
    pub error: usize,
}

/// 그리드 하위 상태
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GridState {
    pub grid_type: GridType,
    pub upper_price: Decimal,
    pub lower_price: Decimal,
    pub level_count: u32,
    pub price_step: Decimal,
    pub per_level_quantity: Decimal,
    pub levels: Vec<GridLevel>,
    pub executed_level_count: u32,
    pub total_orders_placed: u32,
}

impl GridState {
    /// 하한가부터 상한가까지 오름차순 레벨 생성
    ///
    /// 호출자가 `upper_price > lower_price`, `level_count >= 2` 를 보장해야 한다.
    pub fn new(
        grid_type: GridType,
        upper_price: Decimal,
        lower_price: Decimal,
        level_count: u32,
        per_level_quantity: Decimal,
        price_decimals: u32,
    ) -> Self {
        let price_step = (upper_price - lower_price) / Decimal::from(level_count - 1);

        // 간격이 반올림 단위보다 촘촘하면 원래 가격 유지
        let tick = Decimal::new(1, price_decimals);
        let round = price_step >= tick && lower_price.round_dp(price_decimals) > Decimal::ZERO;

        let levels = (0..level_count)
            .map(|i| GridLevel {
                level_index: i + 1,
                price: {
                    let price = lower_price + price_step * Decimal::from(i);
                    if round { price.round_dp(price_decimals) } else { price }
                },
                quantity: per_level_quantity,
                status: LevelStatus::Pending,
                order_id: None,
                executed_at: None,
                error_detail: None,
            })
            .collect();

        GridState {
            grid_type,
            upper_price,
            lower_price,
            level_count,
            price_step,
            per_level_quantity,
            levels,
            executed_level_count: 0,
            total_orders_placed: 0,
        }
    }

    fn pending_level_mut(&mut self, level_index: u32) -> Option<&mut GridLevel> {
        self.levels
            .iter_mut()
            .find(|l| l.level_index == level_index && l.status == LevelStatus::Pending)
    }

    /// PENDING 레벨을 EXECUTED 로 전이. 이미 전이된 레벨이면 false
    pub fn mark_executed(&mut self, level_index: u32, order_id: OrderId, at: DateTime<Utc>) -> bool {
        match self.pending_level_mut(level_index) {
            Some(level) => {
                level.status = LevelStatus::Executed;
                level.order_id = Some(order_id);
                level.executed_at = Some(at);
                self.executed_level_count += 1;
                self.total_orders_placed += 1;
                true
            }
            None => false,
        }
    }

    pub fn mark_error(&mut self, level_index: u32, detail: impl Into<String>) -> bool {
        match self.pending_level_mut(level_index) {
            Some(level) => {
                level.status = LevelStatus::Error;
                level.error_detail = Some(detail.into());
                true
            }
            None => false,
        }
    }

    pub fn mark_cancelled(&mut self, level_index: u32) -> bool {
        match self.pending_level_mut(level_index) {
            Some(level) => {
                level.status = LevelStatus::Cancelled;
                true
            }
            None => false,
        }
    }

    /// 주문 ID 가 이미 기록된 PENDING 레벨 (중지 시 취소 대상)
    pub fn cancellable_levels(&self) -> Vec<(u32, OrderId)> {
        self.levels
            .iter()
            .filter(|l| l.status == LevelStatus::Pending)
            .filter_map(|l| l.order_id.clone().map(|id| (l.level_index, id)))
            .collect()
    }

    pub fn level_counts(&self) -> LevelCounts {
        self.levels.iter().fold(LevelCounts::default(), |mut c, l| {
            match l.status {
                LevelStatus::Pending => c.pending += 1,
                LevelStatus::Executed => c.executed += 1,
                LevelStatus::Cancelled => c.cancelled += 1,
                LevelStatus::Error => c.error += 1,
            }
            c
        })
    }
}

/// 전략 종류별 하위 상태
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum StrategyDetails {
    Twap(TwapState),
    Grid(GridState),
}

/// 실행 중이거나 종료된 전략 하나의 레코드
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrategyRecord {
    pub id: String,
    pub symbol: String,
    pub status: StrategyStatus,
    pub position_side: PositionSide,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error_detail: Option<String>,
    #[serde(flatten)]
    pub details: StrategyDetails,
}

impl StrategyRecord {
    pub fn twap(symbol: impl Into<String>, position_side: PositionSide, state: TwapState) -> Self {
        Self::with_details(symbol, StrategyStatus::Running, position_side, StrategyDetails::Twap(state))
    }

    pub fn grid(symbol: impl Into<String>, position_side: PositionSide, state: GridState) -> Self {
        Self::with_details(symbol, StrategyStatus::Active, position_side, StrategyDetails::Grid(state))
    }

    fn with_details(
        symbol: impl Into<String>,
        status: StrategyStatus,
        position_side: PositionSide,
        details: StrategyDetails,
    ) -> Self {
        StrategyRecord {
            // 레지스트리 등록 시 부여
            id: String::new(),
            symbol: symbol.into(),
            status,
            position_side,
            created_at: Utc::now(),
            ended_at: None,
            error_detail: None,
            details,
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self.details {
            StrategyDetails::Twap(_) => StrategyKind::Twap,
            StrategyDetails::Grid(_) => StrategyKind::Grid,
        }
    }

    /// 식별자 접두사: `<KIND>_<SYMBOL>_<SIDE|GRIDTYPE>`
    pub fn id_prefix(&self) -> String {
        let direction = match &self.details {
            StrategyDetails::Twap(t) => t.side.as_str(),
            StrategyDetails::Grid(g) => g.grid_type.as_str(),
        };
        format!("{}_{}_{}", self.kind(), self.symbol, direction)
    }

    pub fn twap_state(&self) -> Option<&TwapState> {
        match &self.details {
            StrategyDetails::Twap(t) => Some(t),
            _ => None,
        }
    }

    pub fn twap_state_mut(&mut self) -> Option<&mut TwapState> {
        match &mut self.details {
            StrategyDetails::Twap(t) => Some(t),
            _ => None,
        }
    }

    pub fn grid_state(&self) -> Option<&GridState> {
        match &self.details {
            StrategyDetails::Grid(g) => Some(g),
            _ => None,
        }
    }

    pub fn grid_state_mut(&mut self) -> Option<&mut GridState> {
        match &mut self.details {
            StrategyDetails::Grid(g) => Some(g),
            _ => None,
        }
    }

    /// 드라이버가 아직 돌고 있어야 하는 상태인지
    pub fn is_live(&self) -> bool {
        !self.status.is_terminal()
    }

    fn finish(&mut self, status: StrategyStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }

    pub fn complete(&mut self) -> bool {
        if self.status != StrategyStatus::Running {
            return false;
        }
        self.finish(StrategyStatus::Completed);
        true
    }

    pub fn stop(&mut self) -> bool {
        if !self.is_live() {
            return false;
        }
        self.finish(StrategyStatus::Stopped);
        true
    }

    pub fn fail(&mut self, detail: impl Into<String>) -> bool {
        if !self.is_live() {
            return false;
        }
        self.error_detail = Some(detail.into());
        self.finish(StrategyStatus::Error);
        true
    }
}
