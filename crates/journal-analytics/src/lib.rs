//! 매매일지 분석 엔진.
//!
//! 이 크레이트는 정규화된 거래 기록에 대한 순수 집계를 제공합니다:
//! - 자산 곡선과 낙폭 분석
//! - 일/주/월/분기/연 단위 손익 집계
//! - KPI 요약 (승률, 기대값, 수익 팩터, 샤프/소르티노)
//! - 분류별 성과 분석과 수수료 분석
//! - 분포 구간 (R-배수, MAE/MFE, 손익, 보유 시간)
//! - 요일 × 시각 히트맵
//!
//! 모든 집계는 입력을 변경하지 않으며 같은 입력에 대해 같은 결과를 반환합니다.
//!
//! # Re-exports
//!
//! - [`engine`]: 필터 적용과 설정을 묶은 [`JournalAnalytics`]
//! - [`equity`], [`rollup`], [`kpi`], [`breakdown`], [`distribution`]: 개별 집계

pub mod breakdown;
pub mod distribution;
pub mod engine;
pub mod equity;
pub mod heatmap;
pub mod kpi;
pub mod quality;
pub mod rollup;

pub use breakdown::{
    breakdown, breakdown_stats, breakdown_with, cost_breakdown, top_bottom, Breakdown,
    BreakdownMetric, CategoryKey, CategoryLabel, CategoryRow, CategoryStats, CostBreakdown,
    TopBottom, UNCATEGORIZED_KEY, UNCATEGORIZED_LABEL,
};
pub use distribution::{bin, BinRange, BinSpec, Distribution, DistributionAttribute, DistributionBin};
pub use engine::{
    BreakdownDetails, DrawdownAnalysis, JournalAnalytics, JournalReport, RollupReport, TimeHeatmap,
};
pub use equity::{
    analyze_drawdowns, build_equity_curve, daily_equity_series, max_drawdown_of,
    DailyEquityPoint, DrawdownPeriod, DrawdownReport, EquityCurveBuilder, EquityCurveResult,
    EquityPoint,
};
pub use heatmap::{hourly_win_rate, time_heatmap, HeatmapCell, HourlyWinRate};
pub use kpi::{decimal_sqrt, sharpe_ratio, sortino_ratio, summarize, KpiOptions, KpiSummary, Ratio};
pub use quality::{trade_quality, TradeQualityReport};
pub use rollup::{
    monthly_pnl, rollup, MonthlyPnl, MonthlyPnlRow, PeriodBucket, PeriodGranularity,
    PeriodRollup, PeriodTotals, RollupOptions, RollupSummary,
};
