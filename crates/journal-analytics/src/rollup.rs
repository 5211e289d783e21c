//! 기간별 손익 집계 모듈
//!
//! 청산 거래를 청산 시각(필터 시간대 기준)의 일/주/월/분기/연 단위로 묶어
//! 실현 손익, 수수료, 순손익, 거래 수를 합산합니다.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use journal_core::{sorted_closed_trades, TradeFilter, TradeRecord};

/// 집계 기간 단위
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PeriodGranularity {
    /// 일별 (`YYYY-MM-DD`)
    Day,
    /// ISO 주별 (`YYYY-Www`)
    Week,
    /// 월별 (`YYYY-MM`)
    #[default]
    Month,
    /// 분기별 (`YYYY-Qn`)
    Quarter,
    /// 연간 (`YYYY`)
    Year,
}

impl PeriodGranularity {
    /// 날짜가 속한 기간 키를 반환합니다.
    ///
    /// 키는 사전순 정렬이 시간순 정렬과 일치하도록 구성됩니다.
    pub fn period_key(&self, date: NaiveDate) -> String {
        match self {
            PeriodGranularity::Day => date.format("%Y-%m-%d").to_string(),
            PeriodGranularity::Week => {
                let week = date.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            PeriodGranularity::Month => date.format("%Y-%m").to_string(),
            PeriodGranularity::Quarter => {
                let quarter = (date.month() - 1) / 3 + 1;
                format!("{}-Q{}", date.year(), quarter)
            }
            PeriodGranularity::Year => date.format("%Y").to_string(),
        }
    }

    /// 표시 이름
    pub fn display_name(&self) -> &'static str {
        match self {
            PeriodGranularity::Day => "일별",
            PeriodGranularity::Week => "주별",
            PeriodGranularity::Month => "월별",
            PeriodGranularity::Quarter => "분기별",
            PeriodGranularity::Year => "연간",
        }
    }
}

impl FromStr for PeriodGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" | "d" => Ok(Self::Day),
            "week" | "weekly" | "w" => Ok(Self::Week),
            "month" | "monthly" | "m" => Ok(Self::Month),
            "quarter" | "quarterly" | "q" => Ok(Self::Quarter),
            "year" | "yearly" | "y" => Ok(Self::Year),
            _ => Err(format!("Unknown period granularity: {}", s)),
        }
    }
}

/// 기간 집계 옵션
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RollupOptions {
    /// 기간 단위
    pub granularity: PeriodGranularity,
    /// 거래가 없는 기간도 포함할지 여부
    pub include_empty: bool,
}

impl RollupOptions {
    /// 기간 단위를 지정하여 옵션을 생성합니다.
    pub fn new(granularity: PeriodGranularity) -> Self {
        Self {
            granularity,
            include_empty: false,
        }
    }

    /// 빈 기간 포함 여부를 설정합니다.
    pub fn with_empty_periods(mut self, include_empty: bool) -> Self {
        self.include_empty = include_empty;
        self
    }
}

/// 단일 기간 버킷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodBucket {
    /// 기간 키
    pub period: String,
    pub realized_pnl: Decimal,
    pub fees: Decimal,
    pub net_pnl: Decimal,
    pub trade_count: usize,
    /// 순손익 > 0 여부
    pub is_profitable: bool,
}

impl PeriodBucket {
    fn empty(period: String) -> Self {
        Self {
            period,
            realized_pnl: Decimal::ZERO,
            fees: Decimal::ZERO,
            net_pnl: Decimal::ZERO,
            trade_count: 0,
            is_profitable: false,
        }
    }
}

/// 전체 합계
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodTotals {
    pub realized_pnl: Decimal,
    pub fees: Decimal,
    pub net_pnl: Decimal,
    pub trade_count: usize,
}

/// 기간 집계 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodRollup {
    pub granularity: PeriodGranularity,
    /// 기간 오름차순 버킷
    pub periods: Vec<PeriodBucket>,
    pub totals: PeriodTotals,
}

/// 청산 거래를 기간별로 집계합니다.
///
/// # 매개변수
///
/// * `trades` - 정규화된 거래 목록 (청산 거래만 사용)
/// * `filter` - 시간대와 빈 기간 채우기 구간을 제공하는 필터
/// * `options` - 기간 단위와 빈 기간 포함 여부
///
/// # 반환값
///
/// 기간 오름차순 버킷과 합계. `totals.net_pnl`은 버킷 순손익의 합과 정확히 같습니다.
pub fn rollup(trades: &[TradeRecord], filter: &TradeFilter, options: &RollupOptions) -> PeriodRollup {
    let granularity = options.granularity;
    let mut buckets: BTreeMap<String, PeriodBucket> = BTreeMap::new();
    let mut first_day: Option<NaiveDate> = None;
    let mut last_day: Option<NaiveDate> = None;

    for trade in sorted_closed_trades(trades) {
        let day = filter.local_date(trade.closed_at);
        first_day = Some(first_day.map_or(day, |d| d.min(day)));
        last_day = Some(last_day.map_or(day, |d| d.max(day)));

        let key = granularity.period_key(day);
        let bucket = buckets
            .entry(key.clone())
            .or_insert_with(|| PeriodBucket::empty(key));
        bucket.realized_pnl += trade.realized_pnl;
        bucket.fees += trade.fees();
        bucket.trade_count += 1;
    }

    if options.include_empty {
        if let Some((start, end)) = filter.fill_range(first_day, last_day) {
            fill_empty_periods(&mut buckets, granularity, start, end);
        }
    }

    let mut totals = PeriodTotals::default();
    let periods: Vec<PeriodBucket> = buckets
        .into_values()
        .map(|mut bucket| {
            bucket.net_pnl = bucket.realized_pnl - bucket.fees;
            bucket.is_profitable = bucket.net_pnl > Decimal::ZERO;

            totals.realized_pnl += bucket.realized_pnl;
            totals.fees += bucket.fees;
            totals.net_pnl += bucket.net_pnl;
            totals.trade_count += bucket.trade_count;
            bucket
        })
        .collect();

    tracing::debug!(
        granularity = ?granularity,
        periods = periods.len(),
        net_pnl = %totals.net_pnl,
        "Period rollup computed"
    );

    PeriodRollup {
        granularity,
        periods,
        totals,
    }
}

fn fill_empty_periods(
    buckets: &mut BTreeMap<String, PeriodBucket>,
    granularity: PeriodGranularity,
    start: NaiveDate,
    end: NaiveDate,
) {
    let mut day = start;
    while day <= end {
        let key = granularity.period_key(day);
        buckets
            .entry(key.clone())
            .or_insert_with(|| PeriodBucket::empty(key));
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
}

/// 기간 집계 요약
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupSummary {
    /// 순손익이 가장 큰 기간
    pub best_period: Option<PeriodBucket>,
    /// 순손익이 가장 작은 기간
    pub worst_period: Option<PeriodBucket>,
    pub profitable_periods: usize,
    pub losing_periods: usize,
    /// 거래가 있는 기간의 평균 순손익
    pub average_net_pnl: Decimal,
}

impl PeriodRollup {
    /// 최고/최악 기간과 수익 기간 수를 요약합니다.
    ///
    /// 거래가 없는 기간은 요약에서 제외합니다.
    pub fn summary(&self) -> RollupSummary {
        let active: Vec<&PeriodBucket> =
            self.periods.iter().filter(|p| p.trade_count > 0).collect();

        // 동률이면 먼저 나온 기간
        let best = active.iter().copied().fold(None::<&PeriodBucket>, |acc, p| match acc {
            Some(b) if b.net_pnl >= p.net_pnl => Some(b),
            _ => Some(p),
        });
        let worst = active.iter().copied().fold(None::<&PeriodBucket>, |acc, p| match acc {
            Some(w) if w.net_pnl <= p.net_pnl => Some(w),
            _ => Some(p),
        });

        let average_net_pnl = if active.is_empty() {
            Decimal::ZERO
        } else {
            active.iter().map(|p| p.net_pnl).sum::<Decimal>() / Decimal::from(active.len())
        };

        RollupSummary {
            best_period: best.cloned(),
            worst_period: worst.cloned(),
            profitable_periods: active.iter().filter(|p| p.net_pnl > Decimal::ZERO).count(),
            losing_periods: active.iter().filter(|p| p.net_pnl < Decimal::ZERO).count(),
            average_net_pnl,
        }
    }
}

/// 월별 손익 행
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPnlRow {
    /// `YYYY-MM`
    pub month: String,
    pub realized_pnl: Decimal,
    pub fees: Decimal,
    pub net_pnl: Decimal,
    pub trade_count: usize,
    pub is_profitable: bool,
}

/// 월별 손익 응답
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPnl {
    pub months: Vec<MonthlyPnlRow>,
    pub totals: PeriodTotals,
}

/// 월 단위로 집계하여 월별 손익 응답을 생성합니다.
pub fn monthly_pnl(trades: &[TradeRecord], filter: &TradeFilter, include_empty: bool) -> MonthlyPnl {
    let options = RollupOptions::new(PeriodGranularity::Month).with_empty_periods(include_empty);
    let PeriodRollup {
        periods, totals, ..
    } = rollup(trades, filter, &options);

    MonthlyPnl {
        months: periods
            .into_iter()
            .map(|p| MonthlyPnlRow {
                month: p.period,
                realized_pnl: p.realized_pnl,
                fees: p.fees,
                net_pnl: p.net_pnl,
                trade_count: p.trade_count,
                is_profitable: p.is_profitable,
            })
            .collect(),
        totals,
    }
}
