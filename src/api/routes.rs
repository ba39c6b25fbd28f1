use warp::Filter;

use crate::api::handlers;
use crate::core::engine::ExecutionEngine;

/// 전략 실행 API 라우트 생성
pub fn create_routes(
    engine: ExecutionEngine,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    // 헬스체크 라우트
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(handlers::health_handler);

    // 상태 필터 생성
    let engine_filter = warp::any().map(move || engine.clone());

    // 전략 생성 라우트
    let twap_routes = warp::path("twap")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(engine_filter.clone())
        .and_then(handlers::create_twap);

    let grid_routes = warp::path("grid")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(engine_filter.clone())
        .and_then(handlers::create_grid);

    // 전략 조회/중지 라우트
    let strategies = warp::path("strategies");

    let strategy_routes = strategies
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<handlers::ListQuery>())
        .and(engine_filter.clone())
        .and_then(handlers::list_strategies)
        .or(strategies
            .and(warp::path::param::<String>())
            .and(warp::path::end())
            .and(warp::get())
            .and(engine_filter.clone())
            .and_then(handlers::get_strategy_status))
        .or(strategies
            .and(warp::path::param::<String>())
            .and(warp::path::end())
            .and(warp::delete())
            .and(engine_filter.clone())
            .and_then(handlers::stop_strategy));

    // 모든 라우트 결합
    health
        .or(twap_routes)
        .or(grid_routes)
        .or(strategy_routes)
        .with(warp::log("xquant_exec::api"))
}
