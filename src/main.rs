/**
* filename : main
* author : HAMA
* date: 2025. 5. 8.
* description: 주문 실행 엔진 HTTP 서버
**/

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use xquant_exec::api::routes;
use xquant_exec::config::Config;
use xquant_exec::core::engine::ExecutionEngine;
use xquant_exec::exchange::binance_futures::BinanceFuturesExchange;
use xquant_exec::exchange::mocks::SimulatedExchange;
use xquant_exec::exchange::traits::Exchange;
use xquant_exec::utils::logging;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // 설정 로드
    let config = Config::load()?;

    // 로깅 초기화
    logging::init(&config.logging)?;
    log::info!("주문 실행 엔진 시작... (v{})", xquant_exec::VERSION);

    // 거래소 인스턴스 생성
    let exchange: Arc<RwLock<dyn Exchange>> = if config.exchange.use_mock {
        let simulated = Arc::new(RwLock::new(SimulatedExchange::new()));
        spawn_price_drift(simulated.clone());
        log::info!("모의 거래소 초기화 완료");
        simulated
    } else {
        let live = BinanceFuturesExchange::from_config(&config.exchange)?;
        log::info!("바이낸스 선물 거래소 연결: {}", live.base_url);
        Arc::new(RwLock::new(live))
    };

    // 실행 엔진 생성
    let engine = ExecutionEngine::new(exchange, config.engine.clone());

    // API 라우트 초기화
    let routes = routes::create_routes(engine);
    log::info!("API 라우트 초기화 완료");

    // Warp 서버 시작
    let host: IpAddr = config.server.host.parse()
        .map_err(|e| anyhow::anyhow!("invalid server.host {}: {}", config.server.host, e))?;
    let addr = SocketAddr::new(host, config.server.port);
    log::info!("서버 시작: http://{}/", addr);
    warp::serve(routes).run(addr).await;

    Ok(())
}

/// 모의 거래소 가격을 1초마다 조금씩 움직인다
fn spawn_price_drift(exchange: Arc<RwLock<SimulatedExchange>>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            exchange.write().await.drift_prices();
        }
    });
}
