//! 분석 엔진 진입점.
//!
//! 설정(초기 잔고, 비율 기준, 계약 승수)을 묶어 두고, 호출마다 전달된
//! [`TradeFilter`]를 적용한 뒤 각 집계를 실행합니다.
//!
//! # 설계 원칙
//!
//! - 모든 집계는 입력을 변경하지 않는 순수 함수입니다
//! - 필터는 호출마다 명시적으로 전달되며 엔진에 상태로 남지 않습니다
//! - 같은 입력은 항상 같은 결과를 만듭니다

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use journal_core::{
    within_trade_magnitude, AnalyticsConfig, JournalError, JournalResult, NormalizedBatch,
    RawTradeRecord, TradeFilter, TradeNormalizer, TradeRecord, MAX_TRADE_MAGNITUDE,
};

use crate::breakdown::{self, Breakdown, BreakdownMetric, CategoryKey, CategoryStats, CostBreakdown};
use crate::distribution::{self, BinSpec, Distribution, DistributionAttribute};
use crate::equity::{self, DailyEquityPoint, DrawdownReport, EquityCurveResult};
use crate::heatmap::{self, HeatmapCell, HourlyWinRate};
use crate::kpi::{self, KpiOptions, KpiSummary};
use crate::quality::{self, TradeQualityReport};
use crate::rollup::{self, MonthlyPnl, PeriodRollup, RollupOptions, RollupSummary};

/// 매매일지 분석 엔진.
#[derive(Debug, Clone, Default)]
pub struct JournalAnalytics {
    config: AnalyticsConfig,
    normalizer: TradeNormalizer,
}

impl JournalAnalytics {
    /// 새 분석 엔진 생성.
    ///
    /// # Arguments
    ///
    /// * `config` - 분석 설정
    pub fn new(config: AnalyticsConfig) -> Self {
        let normalizer = TradeNormalizer::new(config.multipliers.clone());
        Self { config, normalizer }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// 원시 기록을 정규화합니다.
    pub fn normalize(&self, raws: &[RawTradeRecord]) -> NormalizedBatch {
        self.normalizer.normalize_batch(raws)
    }

    /// 필터를 검증하고 적용합니다.
    pub fn select(&self, trades: &[TradeRecord], filter: &TradeFilter) -> JournalResult<Vec<TradeRecord>> {
        filter.validate()?;
        let selected = filter.apply(trades);
        debug!(
            total = trades.len(),
            selected = selected.len(),
            timezone = %filter.timezone,
            "Filter applied"
        );
        Ok(selected)
    }

    /// 요청 값이 없으면 설정값. 거래 한 건과 같은 크기 제한을 적용합니다.
    fn initial_balance(&self, initial_balance: Option<Decimal>) -> JournalResult<Decimal> {
        let balance = initial_balance.unwrap_or(self.config.initial_balance);
        if !within_trade_magnitude(balance) {
            return Err(JournalError::InvalidInput(format!(
                "초기 잔고가 허용 범위(±{})를 벗어났습니다: {}",
                MAX_TRADE_MAGNITUDE, balance
            )));
        }
        Ok(balance)
    }

    /// 자산 곡선.
    pub fn equity_curve(
        &self,
        trades: &[TradeRecord],
        filter: &TradeFilter,
        initial_balance: Option<Decimal>,
    ) -> JournalResult<EquityCurveResult> {
        let trades = self.select(trades, filter)?;
        Ok(equity::build_equity_curve(&trades, self.initial_balance(initial_balance)?))
    }

    /// 낙폭 분석과 일별 자산 시계열.
    pub fn drawdown(
        &self,
        trades: &[TradeRecord],
        filter: &TradeFilter,
        initial_balance: Option<Decimal>,
    ) -> JournalResult<DrawdownAnalysis> {
        let trades = self.select(trades, filter)?;
        let initial = self.initial_balance(initial_balance)?;
        let curve = equity::build_equity_curve(&trades, initial);

        Ok(DrawdownAnalysis {
            report: equity::analyze_drawdowns(&curve),
            daily: equity::daily_equity_series(&trades, initial, filter),
        })
    }

    /// 기간별 집계와 요약.
    pub fn rollup(
        &self,
        trades: &[TradeRecord],
        filter: &TradeFilter,
        options: &RollupOptions,
    ) -> JournalResult<RollupReport> {
        let trades = self.select(trades, filter)?;
        let rollup = rollup::rollup(&trades, filter, options);
        let summary = rollup.summary();
        Ok(RollupReport { rollup, summary })
    }

    /// 월별 손익.
    pub fn monthly_pnl(
        &self,
        trades: &[TradeRecord],
        filter: &TradeFilter,
        include_empty: bool,
    ) -> JournalResult<MonthlyPnl> {
        let trades = self.select(trades, filter)?;
        Ok(rollup::monthly_pnl(&trades, filter, include_empty))
    }

    /// KPI 요약.
    pub fn kpi(
        &self,
        trades: &[TradeRecord],
        filter: &TradeFilter,
        initial_balance: Option<Decimal>,
    ) -> JournalResult<KpiSummary> {
        let trades = self.select(trades, filter)?;
        let options = KpiOptions::new(self.initial_balance(initial_balance)?, self.config.ratios);
        Ok(kpi::summarize(&trades, filter, &options))
    }

    /// 거래 품질 리포트.
    pub fn trade_quality(&self, trades: &[TradeRecord], filter: &TradeFilter) -> JournalResult<TradeQualityReport> {
        let trades = self.select(trades, filter)?;
        Ok(quality::trade_quality(&trades, &self.config.multipliers))
    }

    /// 분류별 분석.
    pub fn breakdown(
        &self,
        trades: &[TradeRecord],
        filter: &TradeFilter,
        key: CategoryKey,
        metric: BreakdownMetric,
    ) -> JournalResult<Breakdown> {
        let trades = self.select(trades, filter)?;
        Ok(breakdown::breakdown(&trades, key, metric, filter))
    }

    /// 분류별 상세 통계와 상위/하위 N개.
    pub fn breakdown_details(
        &self,
        trades: &[TradeRecord],
        filter: &TradeFilter,
        key: CategoryKey,
        metric: BreakdownMetric,
    ) -> JournalResult<BreakdownDetails> {
        let trades = self.select(trades, filter)?;
        let rows = breakdown::breakdown(&trades, key, metric, filter).items;
        let top_bottom = breakdown::top_bottom(&rows, self.config.top_n);

        Ok(BreakdownDetails {
            stats: breakdown::breakdown_stats(&trades, key, filter),
            top: top_bottom.top,
            bottom: top_bottom.bottom,
        })
    }

    /// 수수료 분석.
    pub fn costs(&self, trades: &[TradeRecord], filter: &TradeFilter) -> JournalResult<CostBreakdown> {
        let trades = self.select(trades, filter)?;
        Ok(breakdown::cost_breakdown(&trades, filter))
    }

    /// 분포 구간.
    ///
    /// `spec`이 없으면 속성의 기본 구간을 사용합니다.
    pub fn distribution(
        &self,
        trades: &[TradeRecord],
        filter: &TradeFilter,
        attribute: DistributionAttribute,
        spec: Option<&BinSpec>,
    ) -> JournalResult<Distribution> {
        let trades = self.select(trades, filter)?;
        let default_spec;
        let spec = match spec {
            Some(spec) => spec,
            None => {
                default_spec = attribute.default_bins();
                &default_spec
            }
        };
        Ok(distribution::bin(&trades, attribute, spec))
    }

    /// 요일 × 시각 히트맵과 시각별 승률.
    pub fn time_heatmap(&self, trades: &[TradeRecord], filter: &TradeFilter) -> JournalResult<TimeHeatmap> {
        let trades = self.select(trades, filter)?;
        Ok(TimeHeatmap {
            cells: heatmap::time_heatmap(&trades, filter),
            hourly: heatmap::hourly_win_rate(&trades, filter),
        })
    }

    /// 전체 리포트.
    ///
    /// 같은 필터 결과에 대해 모든 집계를 한 번에 실행합니다.
    pub fn full_report(
        &self,
        trades: &[TradeRecord],
        filter: &TradeFilter,
        initial_balance: Option<Decimal>,
    ) -> JournalResult<JournalReport> {
        let selected = self.select(trades, filter)?;
        let span = journal_core::analytics_span!("full_report", selected.len(), filter.timezone);
        let _guard = span.enter();

        let initial = self.initial_balance(initial_balance)?;
        let options = KpiOptions::new(initial, self.config.ratios);

        Ok(JournalReport {
            equity_curve: equity::build_equity_curve(&selected, initial),
            monthly: rollup::monthly_pnl(&selected, filter, false),
            kpi: kpi::summarize(&selected, filter, &options),
            quality: quality::trade_quality(&selected, &self.config.multipliers),
            by_strategy: breakdown::breakdown(
                &selected,
                CategoryKey::PrimaryTag,
                BreakdownMetric::NetPnl,
                filter,
            ),
            by_asset_type: breakdown::breakdown(
                &selected,
                CategoryKey::AssetType,
                BreakdownMetric::NetPnl,
                filter,
            ),
            by_symbol: breakdown::breakdown(
                &selected,
                CategoryKey::Symbol,
                BreakdownMetric::NetPnl,
                filter,
            ),
        })
    }
}

/// 낙폭 분석 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawdownAnalysis {
    #[serde(flatten)]
    pub report: DrawdownReport,
    pub daily: Vec<DailyEquityPoint>,
}

/// 기간 집계 결과와 요약
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollupReport {
    #[serde(flatten)]
    pub rollup: PeriodRollup,
    pub summary: RollupSummary,
}

/// 분류별 상세 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownDetails {
    pub stats: Vec<CategoryStats>,
    pub top: Vec<breakdown::CategoryRow>,
    pub bottom: Vec<breakdown::CategoryRow>,
}

/// 히트맵 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeHeatmap {
    pub cells: Vec<HeatmapCell>,
    pub hourly: Vec<HourlyWinRate>,
}

/// 전체 리포트
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalReport {
    pub equity_curve: EquityCurveResult,
    pub monthly: MonthlyPnl,
    pub kpi: KpiSummary,
    pub quality: TradeQualityReport,
    pub by_strategy: Breakdown,
    pub by_asset_type: Breakdown,
    pub by_symbol: Breakdown,
}
