//! 매매일지 analytics endpoint.
//!
//! # 엔드포인트
//!
//! - `POST /api/v1/analytics/normalize` - 원시 기록 정규화
//! - `POST /api/v1/analytics/equity-curve` - 자산 곡선
//! - `POST /api/v1/analytics/drawdown` - 낙폭 구간과 일별 자산
//! - `POST /api/v1/analytics/monthly-pnl` - 월별 손익
//! - `POST /api/v1/analytics/rollup` - 기간 단위 손익 집계
//! - `POST /api/v1/analytics/kpi` - KPI 요약
//! - `POST /api/v1/analytics/trade-quality` - 거래 품질 리포트
//! - `POST /api/v1/analytics/breakdown/{key}` - 분류별 성과
//! - `POST /api/v1/analytics/breakdown/{key}/details` - 분류별 상세 통계
//! - `POST /api/v1/analytics/costs` - 수수료 분석
//! - `POST /api/v1/analytics/distribution/{attribute}` - 분포 구간
//! - `POST /api/v1/analytics/time-heatmap` - 요일 × 시각 히트맵
//! - `POST /api/v1/analytics/report` - 전체 리포트

mod handlers;
pub mod types;

pub use handlers::{EXCLUDED_MISSING, OUT_OF_RANGE, REJECTED_RECORDS};
pub use types::{AnalyticsOptions, AnalyticsRequest, FilterParams};

use axum::{routing::post, Router};
use std::sync::Arc;

use crate::state::AppState;

use handlers::{
    breakdown, breakdown_details, costs, distribution, drawdown, equity_curve, full_report, kpi,
    monthly_pnl, normalize_trades, rollup, time_heatmap, trade_quality,
};

/// 매매일지 분석 라우터 생성.
pub fn analytics_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/normalize", post(normalize_trades))
        .route("/equity-curve", post(equity_curve))
        .route("/drawdown", post(drawdown))
        .route("/monthly-pnl", post(monthly_pnl))
        .route("/rollup", post(rollup))
        .route("/kpi", post(kpi))
        .route("/trade-quality", post(trade_quality))
        .route("/breakdown/{key}", post(breakdown))
        .route("/breakdown/{key}/details", post(breakdown_details))
        .route("/costs", post(costs))
        .route("/distribution/{attribute}", post(distribution))
        .route("/time-heatmap", post(time_heatmap))
        .route("/report", post(full_report))
}
