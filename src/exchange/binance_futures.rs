use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;

use crate::config::ExchangeConfig;
use crate::error::TradingError;
use crate::exchange::traits::Exchange;
use crate::models::order::{OrderAck, OrderId, OrderRequest, OrderStatus};

type HmacSha256 = Hmac<Sha256>;

pub const TESTNET_BASE_URL: &str = "https://testnet.binancefuture.com";

/// Binance "unknown order sent" error code
const UNKNOWN_ORDER_CODE: i64 = -2011;

#[derive(Debug, Deserialize)]
struct TickerPrice {
  price: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
  order_id: i64,
  status: String,
  #[serde(default)]
  executed_qty: Decimal,
  #[serde(default)]
  avg_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
  code: i64,
  msg: String,
}

/// Binance USDT-M Futures REST connector (minimal subset)
pub struct BinanceFuturesExchange {
  pub base_url: String,
  pub api_key: String,
  pub api_secret: String,
  pub recv_window_ms: u64,
  pub http: reqwest::Client,
}

impl BinanceFuturesExchange {
  pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
    BinanceFuturesExchange {
      base_url: base_url.into(),
      api_key: api_key.into(),
      api_secret: api_secret.into(),
      recv_window_ms: 5000,
      http: reqwest::Client::new(),
    }
  }

  pub fn from_config(config: &ExchangeConfig) -> Result<Self, TradingError> {
    let api_key = config.api_key.clone()
      .ok_or_else(|| TradingError::ConfigError("exchange.api_key is required for a live exchange".to_string()))?;
    let api_secret = config.api_secret.clone()
      .ok_or_else(|| TradingError::ConfigError("exchange.api_secret is required for a live exchange".to_string()))?;
    let base_url = config.base_url.clone().unwrap_or_else(|| TESTNET_BASE_URL.to_string());

    let mut exchange = Self::new(base_url, api_key, api_secret);
    exchange.recv_window_ms = config.recv_window_ms;
    Ok(exchange)
  }

  fn timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
  }

  fn sign(&self, query: &str) -> Result<String, TradingError> {
    let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
      .map_err(|e| TradingError::ConfigError(format!("invalid api secret: {}", e)))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
  }

  fn order_params(&self, request: &OrderRequest, timestamp: i64) -> Vec<String> {
    let mut params = vec![
      format!("symbol={}", request.symbol),
      format!("side={}", request.side.as_str()),
      format!("positionSide={}", request.position_side.as_str()),
      format!("type={}", request.order_type.as_str()),
      format!("quantity={}", request.quantity.normalize()),
    ];
    if let Some(price) = request.price {
      params.push(format!("price={}", price.normalize()));
    }
    if let Some(tif) = request.time_in_force {
      params.push(format!("timeInForce={}", tif.as_str()));
    }
    if let Some(client_id) = &request.client_order_id {
      params.push(format!("newClientOrderId={}", client_id));
    }
    params.push(format!("recvWindow={}", self.recv_window_ms));
    params.push(format!("timestamp={}", timestamp));
    params
  }

  fn signed_url(&self, path: &str, params: Vec<String>) -> Result<String, TradingError> {
    let query = params.join("&");
    let signature = self.sign(&query)?;
    Ok(format!("{}{}?{}&signature={}", self.base_url, path, query, signature))
  }

  async fn send(&self, request: reqwest::RequestBuilder, context: &str) -> Result<(StatusCode, String), TradingError> {
    let res = request
      .header("X-MBX-APIKEY", &self.api_key)
      .send().await
      .map_err(|e| TradingError::ConnectivityError(format!("{} http error: {}", context, e)))?;
    let status = res.status();
    let body = res.text().await
      .map_err(|e| TradingError::ConnectivityError(format!("{} read error: {}", context, e)))?;
    Ok((status, body))
  }
}

/// Map a non-success HTTP reply to the gateway error taxonomy
fn classify_failure(status: StatusCode, body: &str, order_id: Option<&OrderId>) -> TradingError {
  if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
    return TradingError::ConnectivityError(format!("exchange unavailable ({}): {}", status, body));
  }
  match serde_json::from_str::<ApiError>(body) {
    Ok(err) if err.code == UNKNOWN_ORDER_CODE => match order_id {
      Some(id) => TradingError::OrderNotFound(id.clone()),
      None => TradingError::OrderRejected(err.msg),
    },
    Ok(err) => TradingError::OrderRejected(format!("{} (code {})", err.msg, err.code)),
    Err(_) => TradingError::OrderRejected(format!("request failed ({}): {}", status, body)),
  }
}

fn parse_ack(body: &str) -> Result<OrderAck, TradingError> {
  let res: OrderResponse = serde_json::from_str(body)?;
  let avg_price = res.avg_price.filter(|p| *p > Decimal::ZERO);
  Ok(OrderAck {
    order_id: OrderId(res.order_id.to_string()),
    status: res.status.parse::<OrderStatus>()?,
    executed_quantity: res.executed_qty,
    avg_price,
  })
}

#[async_trait]
impl Exchange for BinanceFuturesExchange {
  async fn get_price(&self, symbol: &str) -> Result<Decimal, TradingError> {
    let url = format!("{}/fapi/v1/ticker/price?symbol={}", self.base_url, symbol);
    let (status, body) = self.send(self.http.get(url), "get_price").await?;
    if !status.is_success() {
      return Err(match classify_failure(status, &body, None) {
        TradingError::OrderRejected(msg) => TradingError::ConnectivityError(format!("price request refused: {}", msg)),
        other => other,
      });
    }
    let ticker: TickerPrice = serde_json::from_str(&body)
      .map_err(|e| TradingError::ConnectivityError(format!("price parse error: {}", e)))?;
    Ok(ticker.price)
  }

  async fn place_order(&mut self, request: OrderRequest) -> Result<OrderAck, TradingError> {
    request.validate()?;
    let params = self.order_params(&request, Self::timestamp_ms());
    let url = self.signed_url("/fapi/v1/order", params)?;
    let (status, body) = self.send(self.http.post(url), "place_order").await?;
    if !status.is_success() {
      return Err(classify_failure(status, &body, None));
    }
    parse_ack(&body)
  }

  async fn cancel_order(&mut self, symbol: &str, order_id: &OrderId) -> Result<OrderStatus, TradingError> {
    let params = vec![
      format!("symbol={}", symbol),
      format!("orderId={}", order_id),
      format!("recvWindow={}", self.recv_window_ms),
      format!("timestamp={}", Self::timestamp_ms()),
    ];
    let url = self.signed_url("/fapi/v1/order", params)?;
    let (status, body) = self.send(self.http.delete(url), "cancel_order").await?;
    if !status.is_success() {
      return Err(classify_failure(status, &body, Some(order_id)));
    }
    Ok(parse_ack(&body)?.status)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::order::{OrderSide, PositionSide};
  use rust_decimal_macros::dec;

  #[test]
  fn test_signature_matches_documented_example() {
    let exchange = BinanceFuturesExchange::new(
      TESTNET_BASE_URL,
      "key",
      "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j",
    );
    let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
    assert_eq!(
      exchange.sign(query).unwrap(),
      "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
    );
  }

  #[test]
  fn test_limit_order_params() {
    let exchange = BinanceFuturesExchange::new(TESTNET_BASE_URL, "k", "s");
    let request = OrderRequest::limit("BTCUSDT", OrderSide::Buy, dec!(0.0010), dec!(47500.00))
      .with_position_side(PositionSide::Long)
      .with_client_order_id("abc");

    let params = exchange.order_params(&request, 1);
    assert!(params.contains(&"quantity=0.001".to_string()));
    assert!(params.contains(&"price=47500".to_string()));
    assert!(params.contains(&"timeInForce=GTC".to_string()));
    assert!(params.contains(&"positionSide=LONG".to_string()));
    assert!(params.contains(&"newClientOrderId=abc".to_string()));
    assert_eq!(params.last().unwrap(), "timestamp=1");
  }

  #[test]
  fn test_market_order_has_no_price() {
    let exchange = BinanceFuturesExchange::new(TESTNET_BASE_URL, "k", "s");
    let params = exchange.order_params(&OrderRequest::market("BTCUSDT", OrderSide::Sell, dec!(1)), 1);
    assert!(params.iter().all(|p| !p.starts_with("price=") && !p.starts_with("timeInForce=")));
  }

  #[test]
  fn test_parse_order_ack() {
    let body = r#"{"orderId":22542179,"symbol":"BTCUSDT","status":"FILLED","executedQty":"0.005","avgPrice":"50000.10"}"#;
    let ack = parse_ack(body).unwrap();
    assert_eq!(ack.order_id, OrderId("22542179".into()));
    assert_eq!(ack.status, OrderStatus::Filled);
    assert_eq!(ack.executed_quantity, dec!(0.005));
    assert_eq!(ack.avg_price, Some(dec!(50000.10)));

    let resting = r#"{"orderId":1,"status":"NEW","executedQty":"0","avgPrice":"0.00000"}"#;
    assert_eq!(parse_ack(resting).unwrap().avg_price, None);
  }

  #[test]
  fn test_failure_classification() {
    let unknown = r#"{"code":-2011,"msg":"Unknown order sent."}"#;
    let id = OrderId("7".into());
    assert!(matches!(
      classify_failure(StatusCode::BAD_REQUEST, unknown, Some(&id)),
      TradingError::OrderNotFound(_)
    ));

    let bad_qty = r#"{"code":-1111,"msg":"Precision is over the maximum defined for this asset."}"#;
    assert!(matches!(
      classify_failure(StatusCode::BAD_REQUEST, bad_qty, None),
      TradingError::OrderRejected(_)
    ));

    assert!(matches!(
      classify_failure(StatusCode::BAD_GATEWAY, "", None),
      TradingError::ConnectivityError(_)
    ));
  }
}
