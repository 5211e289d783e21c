//! 분석 엔드포인트 핸들러.
//!
//! 각 핸들러는 요청 본문의 원시 기록을 정규화하고, 필터를 만들어
//! [`JournalAnalytics`](journal_analytics::JournalAnalytics)의 해당 집계를 호출합니다.
//! 거부된 기록 수는 항상 `x-rejected-records` 헤더로 전달됩니다.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use journal_analytics::{
    BinSpec, BreakdownMetric, CategoryKey, DistributionAttribute, PeriodGranularity,
    RollupOptions,
};
use journal_core::{TradeFilter, TradeRecord};

use super::types::{AnalyticsOptions, AnalyticsRequest};
use crate::error::{bad_request, journal_error_response, ApiErrorResponse, ApiResult};
use crate::state::AppState;

/// 정규화에서 거부된 기록 수
pub const REJECTED_RECORDS: HeaderName = HeaderName::from_static("x-rejected-records");
/// 속성 값이 없어 분포에서 제외된 거래 수
pub const EXCLUDED_MISSING: HeaderName = HeaderName::from_static("x-excluded-missing");
/// 어느 구간에도 속하지 않은 거래 수
pub const OUT_OF_RANGE: HeaderName = HeaderName::from_static("x-out-of-range");

/// 정규화와 필터 변환을 마친 요청.
struct Prepared {
    trades: Vec<TradeRecord>,
    filter: TradeFilter,
    options: AnalyticsOptions,
    rejected: usize,
}

impl Prepared {
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REJECTED_RECORDS, HeaderValue::from(self.rejected));
        headers
    }

    fn respond<T: Serialize>(&self, body: T) -> Response {
        (self.headers(), Json(body)).into_response()
    }
}

fn prepare(state: &AppState, request: AnalyticsRequest) -> ApiResult<Prepared> {
    let AnalyticsRequest {
        filters,
        trades,
        options,
    } = request;

    let batch = state.analytics.normalize(&trades);
    if !batch.is_clean() {
        if options.strict {
            warn!(
                total = trades.len(),
                rejected = batch.rejected.len(),
                "Strict request contains invalid records"
            );
            let details = serde_json::to_value(&batch.rejected).unwrap_or_default();
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiErrorResponse::with_details(
                    "VALIDATION_ERROR",
                    format!("{}건의 거래 기록이 검증에 실패했습니다", batch.rejected.len()),
                    details,
                )),
            ));
        }
        debug!(
            total = trades.len(),
            rejected = batch.rejected.len(),
            "Invalid records skipped"
        );
    }

    let filter = filters.into_filter(state.config().timezone, Utc::now());
    Ok(Prepared {
        trades: batch.trades,
        filter,
        options,
        rejected: batch.rejected.len(),
    })
}

/// 원시 기록 정규화.
///
/// POST /api/v1/analytics/normalize
///
/// `strict`와 관계없이 정규화된 거래와 거부 목록을 모두 반환합니다.
pub async fn normalize_trades(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyticsRequest>,
) -> Response {
    let batch = state.analytics.normalize(&request.trades);
    info!(
        accepted = batch.trades.len(),
        rejected = batch.rejected.len(),
        "Trades normalized"
    );

    let mut headers = HeaderMap::new();
    headers.insert(REJECTED_RECORDS, HeaderValue::from(batch.rejected.len()));
    (headers, Json(batch)).into_response()
}

/// 자산 곡선.
///
/// POST /api/v1/analytics/equity-curve
pub async fn equity_curve(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyticsRequest>,
) -> ApiResult<Response> {
    let req = prepare(&state, request)?;
    let curve = state
        .analytics
        .equity_curve(&req.trades, &req.filter, req.options.initial_balance)
        .map_err(journal_error_response)?;
    Ok(req.respond(curve))
}

/// 낙폭 분석 (낙폭 구간 목록과 일별 자산 시계열).
///
/// POST /api/v1/analytics/drawdown
pub async fn drawdown(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyticsRequest>,
) -> ApiResult<Response> {
    let req = prepare(&state, request)?;
    let analysis = state
        .analytics
        .drawdown(&req.trades, &req.filter, req.options.initial_balance)
        .map_err(journal_error_response)?;
    Ok(req.respond(analysis))
}

/// 월별 손익.
///
/// POST /api/v1/analytics/monthly-pnl
pub async fn monthly_pnl(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyticsRequest>,
) -> ApiResult<Response> {
    let req = prepare(&state, request)?;
    let monthly = state
        .analytics
        .monthly_pnl(&req.trades, &req.filter, req.options.include_empty)
        .map_err(journal_error_response)?;
    Ok(req.respond(monthly))
}

/// 기간별 손익 집계.
///
/// POST /api/v1/analytics/rollup
pub async fn rollup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyticsRequest>,
) -> ApiResult<Response> {
    let req = prepare(&state, request)?;
    let options = RollupOptions::new(req.options.granularity.unwrap_or(PeriodGranularity::Month))
        .with_empty_periods(req.options.include_empty);
    let report = state
        .analytics
        .rollup(&req.trades, &req.filter, &options)
        .map_err(journal_error_response)?;
    Ok(req.respond(report))
}

/// KPI 요약.
///
/// POST /api/v1/analytics/kpi
pub async fn kpi(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyticsRequest>,
) -> ApiResult<Response> {
    let req = prepare(&state, request)?;
    let summary = state
        .analytics
        .kpi(&req.trades, &req.filter, req.options.initial_balance)
        .map_err(journal_error_response)?;
    Ok(req.respond(summary))
}

/// 거래 품질 리포트.
///
/// POST /api/v1/analytics/trade-quality
pub async fn trade_quality(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyticsRequest>,
) -> ApiResult<Response> {
    let req = prepare(&state, request)?;
    let report = state
        .analytics
        .trade_quality(&req.trades, &req.filter)
        .map_err(journal_error_response)?;
    Ok(req.respond(report))
}

fn parse_category_key(key: &str) -> ApiResult<CategoryKey> {
    key.parse::<CategoryKey>()
        .map_err(|e| bad_request("INVALID_CATEGORY_KEY", e))
}

/// 분류별 성과.
///
/// POST /api/v1/analytics/breakdown/{key}
pub async fn breakdown(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(request): Json<AnalyticsRequest>,
) -> ApiResult<Response> {
    let key = parse_category_key(&key)?;
    let req = prepare(&state, request)?;
    let metric = req.options.metric.unwrap_or(BreakdownMetric::NetPnl);
    let result = state
        .analytics
        .breakdown(&req.trades, &req.filter, key, metric)
        .map_err(journal_error_response)?;
    Ok(req.respond(result))
}

/// 분류별 상세 통계와 상위/하위 목록.
///
/// POST /api/v1/analytics/breakdown/{key}/details
pub async fn breakdown_details(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(request): Json<AnalyticsRequest>,
) -> ApiResult<Response> {
    let key = parse_category_key(&key)?;
    let req = prepare(&state, request)?;
    let metric = req.options.metric.unwrap_or(BreakdownMetric::NetPnl);
    let details = state
        .analytics
        .breakdown_details(&req.trades, &req.filter, key, metric)
        .map_err(journal_error_response)?;
    Ok(req.respond(details))
}

/// 수수료 분석.
///
/// POST /api/v1/analytics/costs
pub async fn costs(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyticsRequest>,
) -> ApiResult<Response> {
    let req = prepare(&state, request)?;
    let costs = state
        .analytics
        .costs(&req.trades, &req.filter)
        .map_err(journal_error_response)?;
    Ok(req.respond(costs))
}

/// 요청 옵션에서 구간 설정을 만듭니다. 둘 다 없으면 속성 기본 구간을 사용합니다.
fn bin_spec(options: &AnalyticsOptions) -> ApiResult<Option<BinSpec>> {
    let spec = match (&options.bins, &options.edges) {
        (Some(ranges), _) => Some(BinSpec::new(ranges.clone())),
        (None, Some(edges)) => Some(BinSpec::from_edges(edges)),
        (None, None) => None,
    };
    spec.transpose().map_err(journal_error_response)
}

/// 분포 구간.
///
/// POST /api/v1/analytics/distribution/{attribute}
///
/// 본문은 `{ range, count }[]` 배열이며 제외된 거래 수는 헤더로 전달됩니다.
pub async fn distribution(
    State(state): State<Arc<AppState>>,
    Path(attribute): Path<String>,
    Json(request): Json<AnalyticsRequest>,
) -> ApiResult<Response> {
    let attribute = attribute
        .parse::<DistributionAttribute>()
        .map_err(|e| bad_request("INVALID_ATTRIBUTE", e))?;
    // 구간 설정은 정규화 전에 검증
    let spec = bin_spec(&request.options)?;
    let req = prepare(&state, request)?;

    let result = state
        .analytics
        .distribution(&req.trades, &req.filter, attribute, spec.as_ref())
        .map_err(journal_error_response)?;

    let mut headers = req.headers();
    headers.insert(EXCLUDED_MISSING, HeaderValue::from(result.excluded_missing));
    headers.insert(OUT_OF_RANGE, HeaderValue::from(result.out_of_range));
    Ok((headers, Json(result.bins)).into_response())
}

/// 요일 × 시각 히트맵.
///
/// POST /api/v1/analytics/time-heatmap
pub async fn time_heatmap(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyticsRequest>,
) -> ApiResult<Response> {
    let req = prepare(&state, request)?;
    let heatmap = state
        .analytics
        .time_heatmap(&req.trades, &req.filter)
        .map_err(journal_error_response)?;
    Ok(req.respond(heatmap))
}

/// 전체 리포트.
///
/// POST /api/v1/analytics/report
pub async fn full_report(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyticsRequest>,
) -> ApiResult<Response> {
    let req = prepare(&state, request)?;
    let report = state
        .analytics
        .full_report(&req.trades, &req.filter, req.options.initial_balance)
        .map_err(journal_error_response)?;
    Ok(req.respond(report))
}
