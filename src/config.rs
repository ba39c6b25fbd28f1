/**
* filename : config
* author : HAMA
* date: 2025. 5. 8.
* description:
**/

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::TradingError;
use crate::exchange::binance_futures::TESTNET_BASE_URL;
use crate::models::order::PositionSide;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub exchange: ExchangeConfig,
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub name: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub base_url: Option<String>,
    pub recv_window_ms: u64,
    pub use_mock: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
}

/// 전략 드라이버 동작 파라미터
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 그리드 가격 폴링 주기 (초)
    pub grid_poll_interval_secs: u64,
    /// 폴링 실패 후 재시도 대기 (초)
    pub grid_error_backoff_secs: u64,
    /// BOTH 그리드의 근접 밴드 (레벨 가격 대비 비율)
    pub grid_trigger_band: Decimal,
    /// 그리드 레벨 가격 반올림 자릿수
    pub price_decimals: u32,
    /// 하위 주문의 기본 포지션 방향
    pub position_side: PositionSide,
}

impl Config {
    /// Load configuration: defaults, then an optional `config.{json,toml}` file,
    /// then `XQUANT__SECTION__KEY` environment variables.
    pub fn load() -> Result<Self, TradingError> {
        Self::load_from("config")
    }

    pub fn load_from(file_stem: &str) -> Result<Self, TradingError> {
        let mut cfg: Config = ::config::Config::builder()
            .add_source(::config::File::with_name(file_stem).required(false))
            .add_source(
                ::config::Environment::with_prefix("XQUANT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply environment variable overrides for sensitive/runtime fields
    fn apply_env_overrides(&mut self) {
        use std::env;
        if let Ok(v) = env::var("EXCHANGE_API_KEY") { if !v.is_empty() { self.exchange.api_key = Some(v); } }
        if let Ok(v) = env::var("EXCHANGE_API_SECRET") { if !v.is_empty() { self.exchange.api_secret = Some(v); } }
        if let Ok(v) = env::var("EXCHANGE_BASE_URL") { if !v.is_empty() { self.exchange.base_url = Some(v); } }
        if let Ok(v) = env::var("USE_MOCK") {
            let lower = v.to_lowercase();
            if ["1","true","yes"].contains(&lower.as_str()) { self.exchange.use_mock = true; }
            if ["0","false","no"].contains(&lower.as_str()) { self.exchange.use_mock = false; }
        }
    }

    pub fn validate(&self) -> Result<(), TradingError> {
        if self.engine.grid_poll_interval_secs == 0 {
            return Err(TradingError::ConfigError("engine.grid_poll_interval_secs must be positive".to_string()));
        }
        if self.engine.grid_error_backoff_secs == 0 {
            return Err(TradingError::ConfigError("engine.grid_error_backoff_secs must be positive".to_string()));
        }
        if self.engine.grid_trigger_band <= Decimal::ZERO {
            return Err(TradingError::ConfigError("engine.grid_trigger_band must be positive".to_string()));
        }
        if !self.exchange.use_mock && (self.exchange.api_key.is_none() || self.exchange.api_secret.is_none()) {
            return Err(TradingError::ConfigError("api key and secret are required when use_mock is false".to_string()));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        ExchangeConfig {
            name: "Mock".to_string(),
            api_key: None,
            api_secret: None,
            base_url: Some(TESTNET_BASE_URL.to_string()),
            recv_window_ms: 5000,
            use_mock: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file_path: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            grid_poll_interval_secs: 5,
            grid_error_backoff_secs: 10,
            grid_trigger_band: dec!(0.001),
            price_decimals: 2,
            position_side: PositionSide::Both,
        }
    }
}
