//! 분석 요청 타입.
//!
//! 모든 분석 엔드포인트는 `{ filters, trades, options }` 형태의 JSON 본문을 받습니다.
//! `trades`는 정규화 전의 원시 기록이며, 핸들러가 요청마다 정규화합니다.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Deserialize;

use journal_analytics::{BinRange, BreakdownMetric, PeriodGranularity};
use journal_core::{AssetType, PeriodPreset, RawTradeRecord, TradeFilter};

/// 분석 요청 본문.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsRequest {
    /// 필터 조건
    pub filters: FilterParams,
    /// 원시 거래 기록
    pub trades: Vec<RawTradeRecord>,
    /// 엔드포인트별 옵션
    pub options: AnalyticsOptions,
}

/// 요청 필터 파라미터.
///
/// `timezone`이 없으면 서버 설정의 시간대를 사용합니다. `period` 프리셋이
/// 있으면 먼저 적용되고, 명시한 `start`/`end`가 그 경계를 덮어씁니다.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterParams {
    pub user_id: Option<String>,
    pub account_ids: Vec<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// 기간 프리셋 (ytd, mtd, 30d, 90d, 1y, all)
    pub period: Option<PeriodPreset>,
    pub asset_classes: Vec<AssetType>,
    pub strategies: Vec<String>,
    pub tickers: Vec<String>,
    pub timezone: Option<Tz>,
}

impl FilterParams {
    /// 분석 필터로 변환합니다.
    pub fn into_filter(self, default_timezone: Tz, now: DateTime<Utc>) -> TradeFilter {
        let mut filter = TradeFilter {
            user_id: self.user_id,
            account_ids: self.account_ids,
            start: None,
            end: None,
            asset_classes: self.asset_classes,
            strategies: self.strategies,
            tickers: self.tickers,
            timezone: self.timezone.unwrap_or(default_timezone),
        };
        if let Some(preset) = self.period {
            filter = filter.with_period(preset, now);
        }
        if self.start.is_some() {
            filter.start = self.start;
        }
        if self.end.is_some() {
            filter.end = self.end;
        }
        filter
    }
}

/// 엔드포인트별 옵션.
///
/// 사용하지 않는 옵션은 무시됩니다.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsOptions {
    /// 초기 잔고 (없으면 서버 설정값)
    pub initial_balance: Option<Decimal>,
    /// 거부된 기록이 하나라도 있으면 422로 응답
    pub strict: bool,
    /// 집계 기간 단위 (rollup)
    pub granularity: Option<PeriodGranularity>,
    /// 거래 없는 기간 포함 여부 (rollup, monthly-pnl)
    pub include_empty: bool,
    /// 행 값 지표 (breakdown)
    pub metric: Option<BreakdownMetric>,
    /// 사용자 정의 구간 (distribution)
    pub bins: Option<Vec<BinRange>>,
    /// 경계값 목록으로 만든 구간 (distribution, `bins`보다 우선순위 낮음)
    pub edges: Option<Vec<Decimal>>,
}
