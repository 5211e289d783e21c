//! 분류별 성과 분석(Category Breakdown) 모듈
//!
//! 청산 거래를 태그, 자산 유형, 심볼, 계좌, 방향, 요일, 시간대 등으로 묶어
//! 순손익과 거래 수를 집계합니다.
//!
//! 분류가 없는 거래는 버리지 않고 `Uncategorized` 행으로 모읍니다.
//! 결과는 값 내림차순, 같은 값은 라벨 오름차순으로 정렬됩니다.

use chrono::{Datelike, Timelike, Weekday};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;

use journal_core::{ClosedTrade, Side, TradeFilter, TradeRecord};

use crate::kpi::ratio_or_zero;
use crate::rollup::PeriodGranularity;

/// 분류 없음 행의 키
pub const UNCATEGORIZED_KEY: &str = "__uncategorized";
/// 분류 없음 행의 라벨
pub const UNCATEGORIZED_LABEL: &str = "Uncategorized";

/// 거래가 속한 분류 (키와 표시 라벨)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryLabel {
    pub key: String,
    pub label: String,
}

impl CategoryLabel {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }

    /// 키와 라벨이 같은 분류
    pub fn same(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            key: value.clone(),
            label: value,
        }
    }

    fn uncategorized() -> Self {
        Self::new(UNCATEGORIZED_KEY, UNCATEGORIZED_LABEL)
    }
}

/// 기본 제공 분류 기준
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryKey {
    /// 첫 번째 태그 (기본값)
    #[default]
    PrimaryTag,
    /// 모든 태그 (태그마다 한 번씩 집계)
    Tag,
    AssetType,
    Symbol,
    Account,
    Side,
    /// 진입 요일 (필터 시간대)
    Weekday,
    /// 진입 시각 (필터 시간대)
    Hour,
}

impl CategoryKey {
    /// 거래가 속한 분류 목록. 비어 있으면 `Uncategorized`로 집계됩니다.
    pub fn categorize(&self, trade: &TradeRecord, timezone: Tz) -> Vec<CategoryLabel> {
        match self {
            CategoryKey::PrimaryTag => trade
                .primary_tag()
                .map(|tag| vec![tag_label(tag)])
                .unwrap_or_default(),
            CategoryKey::Tag => trade.category_tags.iter().map(|t| tag_label(t)).collect(),
            CategoryKey::AssetType => vec![CategoryLabel::new(
                trade.asset_type.as_str(),
                trade.asset_type.label(),
            )],
            CategoryKey::Symbol => vec![CategoryLabel::same(trade.symbol.to_uppercase())],
            CategoryKey::Account => trade
                .account_id
                .as_ref()
                .map(|a| vec![CategoryLabel::same(a.clone())])
                .unwrap_or_default(),
            CategoryKey::Side => vec![CategoryLabel::new(
                trade.side.as_str(),
                match trade.side {
                    Side::Buy => "Long",
                    Side::Sell => "Short",
                },
            )],
            CategoryKey::Weekday => {
                let weekday = trade.timestamp_open.with_timezone(&timezone).weekday();
                vec![weekday_label(weekday)]
            }
            CategoryKey::Hour => {
                let hour = trade.timestamp_open.with_timezone(&timezone).hour();
                vec![CategoryLabel::new(format!("{:02}", hour), format!("{:02}:00", hour))]
            }
        }
    }
}

impl FromStr for CategoryKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "primary-tag" | "strategy" | "category" => Ok(Self::PrimaryTag),
            "tag" | "tags" => Ok(Self::Tag),
            "asset-type" | "asset" | "asset-class" => Ok(Self::AssetType),
            "symbol" | "ticker" => Ok(Self::Symbol),
            "account" => Ok(Self::Account),
            "side" | "direction" => Ok(Self::Side),
            "weekday" | "day-of-week" => Ok(Self::Weekday),
            "hour" => Ok(Self::Hour),
            _ => Err(format!("Unknown breakdown key: {}", s)),
        }
    }
}

fn tag_label(tag: &str) -> CategoryLabel {
    CategoryLabel::new(tag.to_lowercase(), tag)
}

fn weekday_label(weekday: Weekday) -> CategoryLabel {
    let label = match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    };
    CategoryLabel::new(weekday.number_from_monday().to_string(), label)
}

/// 행 값으로 사용할 지표
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum BreakdownMetric {
    #[default]
    NetPnl,
    RealizedPnl,
    Fees,
    TradeCount,
    WinRate,
}

impl FromStr for BreakdownMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "netpnl" | "net" => Ok(Self::NetPnl),
            "realizedpnl" | "realized" => Ok(Self::RealizedPnl),
            "fees" => Ok(Self::Fees),
            "tradecount" | "count" => Ok(Self::TradeCount),
            "winrate" => Ok(Self::WinRate),
            _ => Err(format!("Unknown breakdown metric: {}", s)),
        }
    }
}

/// 분류별 상세 통계
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub key: String,
    pub label: String,
    pub trade_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub net_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub fees: Decimal,
    pub win_rate: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    #[serde(skip)]
    gross_win: Decimal,
    #[serde(skip)]
    gross_loss: Decimal,
}

impl CategoryStats {
    fn new(category: CategoryLabel) -> Self {
        Self {
            key: category.key,
            label: category.label,
            trade_count: 0,
            wins: 0,
            losses: 0,
            net_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            fees: Decimal::ZERO,
            win_rate: Decimal::ZERO,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            gross_win: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
        }
    }

    fn record(&mut self, trade: &ClosedTrade<'_>) {
        self.trade_count += 1;
        self.net_pnl += trade.net_pnl;
        self.realized_pnl += trade.realized_pnl;
        self.fees += trade.fees();
        if trade.is_win() {
            self.wins += 1;
            self.gross_win += trade.net_pnl;
        } else if trade.is_loss() {
            self.losses += 1;
            self.gross_loss += trade.net_pnl;
        }
    }

    fn finish(mut self) -> Self {
        self.win_rate = ratio_or_zero(Decimal::from(self.wins), self.trade_count);
        self.avg_win = ratio_or_zero(self.gross_win, self.wins);
        self.avg_loss = ratio_or_zero(self.gross_loss, self.losses);
        self
    }

    /// 지표 값
    pub fn metric(&self, metric: BreakdownMetric) -> Decimal {
        match metric {
            BreakdownMetric::NetPnl => self.net_pnl,
            BreakdownMetric::RealizedPnl => self.realized_pnl,
            BreakdownMetric::Fees => self.fees,
            BreakdownMetric::TradeCount => Decimal::from(self.trade_count),
            BreakdownMetric::WinRate => self.win_rate,
        }
    }
}

/// 분류 행
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRow {
    pub key: String,
    pub label: String,
    pub value: Decimal,
    pub trade_count: usize,
}

/// 분류 분석 응답 (`{ items }`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub items: Vec<CategoryRow>,
}

/// 임의의 분류 함수로 분류별 상세 통계를 계산합니다.
///
/// 청산 거래만 사용합니다. 분류 함수가 여러 분류를 반환하면 거래는 각 분류에
/// 한 번씩 집계되고, 빈 목록을 반환하면 `Uncategorized`로 집계됩니다.
/// 같은 키가 여러 라벨로 나오면 처음 본 라벨을 사용합니다.
pub fn breakdown_stats_with<F>(trades: &[TradeRecord], categorize: F) -> Vec<CategoryStats>
where
    F: Fn(&TradeRecord) -> Vec<CategoryLabel>,
{
    let mut groups: BTreeMap<String, CategoryStats> = BTreeMap::new();

    for trade in trades.iter().filter_map(TradeRecord::as_closed) {
        let mut categories = categorize(trade.record);
        if categories.is_empty() {
            categories.push(CategoryLabel::uncategorized());
        }
        categories.sort_by(|a, b| a.key.cmp(&b.key));
        categories.dedup_by(|a, b| a.key == b.key);

        for category in categories {
            groups
                .entry(category.key.clone())
                .or_insert_with(|| CategoryStats::new(category))
                .record(&trade);
        }
    }

    groups.into_values().map(CategoryStats::finish).collect()
}

/// 임의의 분류 함수로 분류 행을 계산합니다.
///
/// # 반환값
///
/// 값 내림차순(같으면 라벨, 키 오름차순)으로 정렬된 행
pub fn breakdown_with<F>(trades: &[TradeRecord], categorize: F, metric: BreakdownMetric) -> Vec<CategoryRow>
where
    F: Fn(&TradeRecord) -> Vec<CategoryLabel>,
{
    let mut rows: Vec<CategoryRow> = breakdown_stats_with(trades, categorize)
        .into_iter()
        .map(|stats| CategoryRow {
            value: stats.metric(metric),
            key: stats.key,
            label: stats.label,
            trade_count: stats.trade_count,
        })
        .collect();
    rows.sort_by(compare_rows);
    rows
}

/// 기본 분류 기준으로 분류 행을 계산합니다.
///
/// 요일/시각 분류는 필터의 시간대를 사용합니다.
pub fn breakdown(
    trades: &[TradeRecord],
    key: CategoryKey,
    metric: BreakdownMetric,
    filter: &TradeFilter,
) -> Breakdown {
    let timezone = filter.timezone;
    let items = breakdown_with(trades, |t| key.categorize(t, timezone), metric);

    tracing::debug!(key = ?key, metric = ?metric, rows = items.len(), "Category breakdown computed");

    Breakdown { items }
}

/// 기본 분류 기준으로 상세 통계를 계산합니다 (순손익 내림차순).
pub fn breakdown_stats(trades: &[TradeRecord], key: CategoryKey, filter: &TradeFilter) -> Vec<CategoryStats> {
    let timezone = filter.timezone;
    let mut stats = breakdown_stats_with(trades, |t| key.categorize(t, timezone));
    stats.sort_by(|a, b| {
        b.net_pnl
            .cmp(&a.net_pnl)
            .then_with(|| a.label.cmp(&b.label))
            .then_with(|| a.key.cmp(&b.key))
    });
    stats
}

fn compare_rows(a: &CategoryRow, b: &CategoryRow) -> Ordering {
    b.value
        .cmp(&a.value)
        .then_with(|| a.label.cmp(&b.label))
        .then_with(|| a.key.cmp(&b.key))
}

/// 상위/하위 N개 분류
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopBottom {
    /// 값이 큰 순서
    pub top: Vec<CategoryRow>,
    /// 값이 작은 순서
    pub bottom: Vec<CategoryRow>,
}

/// 정렬된 행에서 상위/하위 N개를 선택합니다.
///
/// 행이 2N개보다 적으면 두 목록이 겹칠 수 있습니다.
pub fn top_bottom(rows: &[CategoryRow], n: usize) -> TopBottom {
    let mut sorted = rows.to_vec();
    sorted.sort_by(compare_rows);

    let top = sorted.iter().take(n).cloned().collect();
    let bottom = sorted.iter().rev().take(n).cloned().collect();

    TopBottom { top, bottom }
}

/// 수수료 분석
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub total_fees: Decimal,
    /// Σ|실현 손익| 대비 수수료 (실현 손익이 없으면 None)
    pub fees_to_gross: Option<Decimal>,
    pub by_asset_type: Vec<CategoryRow>,
    pub by_account: Vec<CategoryRow>,
    /// 월별 수수료 (기간 오름차순)
    pub by_month: Vec<CategoryRow>,
}

/// 거래 수수료를 자산 유형, 계좌, 월별로 집계합니다.
///
/// 미청산 거래의 진입 수수료도 포함하며, 월은 기준 시각(청산 또는 진입)의
/// 필터 시간대 날짜입니다.
pub fn cost_breakdown(trades: &[TradeRecord], filter: &TradeFilter) -> CostBreakdown {
    let total_fees: Decimal = trades.iter().map(|t| t.fees).sum();
    let gross: Decimal = trades
        .iter()
        .filter_map(|t| t.as_closed())
        .map(|t| t.realized_pnl.abs())
        .sum();

    let by_asset_type = fee_rows(trades, |t| {
        vec![CategoryLabel::new(t.asset_type.as_str(), t.asset_type.label())]
    });
    let by_account = fee_rows(trades, |t| {
        t.account_id
            .as_ref()
            .map(|a| vec![CategoryLabel::same(a.clone())])
            .unwrap_or_default()
    });
    let mut by_month = fee_rows(trades, |t| {
        let month = PeriodGranularity::Month.period_key(filter.local_date(t.effective_time()));
        vec![CategoryLabel::same(month)]
    });
    by_month.sort_by(|a, b| a.key.cmp(&b.key));

    CostBreakdown {
        total_fees,
        fees_to_gross: if gross.is_zero() {
            None
        } else {
            total_fees.checked_div(gross)
        },
        by_asset_type,
        by_account,
        by_month,
    }
}

/// 모든 거래(미청산 포함)의 수수료를 분류별로 합산합니다.
fn fee_rows<F>(trades: &[TradeRecord], categorize: F) -> Vec<CategoryRow>
where
    F: Fn(&TradeRecord) -> Vec<CategoryLabel>,
{
    let mut groups: BTreeMap<String, CategoryRow> = BTreeMap::new();

    for trade in trades {
        let mut categories = categorize(trade);
        if categories.is_empty() {
            categories.push(CategoryLabel::uncategorized());
        }
        for category in categories {
            let row = groups.entry(category.key.clone()).or_insert_with(|| CategoryRow {
                key: category.key,
                label: category.label,
                value: Decimal::ZERO,
                trade_count: 0,
            });
            row.value += trade.fees;
            row.trade_count += 1;
        }
    }

    let mut rows: Vec<CategoryRow> = groups.into_values().collect();
    rows.sort_by(compare_rows);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use journal_core::{AssetType, TradeState};
    use rust_decimal_macros::dec;

    fn trade(id: &str, tags: &[&str], pnl: Decimal) -> TradeRecord {
        // 2024-06-03은 월요일
        let open: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 6, 3, 14, 30, 0).unwrap();
        TradeRecord {
            id: id.to_string(),
            user_id: None,
            account_id: None,
            symbol: "nvda".to_string(),
            side: Side::Buy,
            asset_type: AssetType::Stock,
            quantity: dec!(1),
            entry_price: dec!(100),
            fees: Decimal::ZERO,
            timestamp_open: open,
            state: TradeState::Closed {
                timestamp_close: open + Duration::hours(1),
                exit_price: dec!(100),
                realized_pnl: pnl,
            },
            category_tags: tags.iter().map(|t| t.to_string()).collect(),
            risk_multiple: None,
            mae: None,
            mfe: None,
        }
    }

    fn values(b: &Breakdown) -> Vec<Decimal> {
        b.items.iter().map(|r| r.value).collect()
    }

    #[test]
    fn test_sorted_by_value_descending() {
        let trades = vec![
            trade("1", &["A"], dec!(100)),
            trade("2", &["B"], dec!(300)),
            trade("3", &["C"], dec!(200)),
        ];
        let b = breakdown(&trades, CategoryKey::PrimaryTag, BreakdownMetric::NetPnl, &TradeFilter::new());
        assert_eq!(values(&b), vec![dec!(300), dec!(200), dec!(100)]);
        assert_eq!(b.items[0].label, "B");
        assert_eq!(b.items[0].key, "b");
    }

    #[test]
    fn test_ties_broken_by_label() {
        let trades = vec![
            trade("1", &["Zeta"], dec!(50)),
            trade("2", &["Alpha"], dec!(50)),
        ];
        let b = breakdown(&trades, CategoryKey::PrimaryTag, BreakdownMetric::NetPnl, &TradeFilter::new());
        let labels: Vec<&str> = b.items.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn test_uncategorized_row() {
        let trades = vec![trade("1", &[], dec!(-20)), trade("2", &["Gap"], dec!(10))];
        let b = breakdown(&trades, CategoryKey::PrimaryTag, BreakdownMetric::NetPnl, &TradeFilter::new());

        assert_eq!(b.items.len(), 2);
        assert_eq!(b.items[1].key, UNCATEGORIZED_KEY);
        assert_eq!(b.items[1].label, UNCATEGORIZED_LABEL);
        assert_eq!(b.items[1].value, dec!(-20));
    }

    #[test]
    fn test_tag_named_uncategorized_stays_separate() {
        let trades = vec![
            trade("1", &[], dec!(-20)),
            trade("2", &["Uncategorized"], dec!(10)),
        ];
        let b = breakdown(&trades, CategoryKey::PrimaryTag, BreakdownMetric::NetPnl, &TradeFilter::new());

        assert_eq!(b.items.len(), 2);
        assert_eq!(b.items[0].key, "uncategorized");
        assert_eq!(b.items[0].value, dec!(10));
        assert_eq!(b.items[1].key, UNCATEGORIZED_KEY);
        assert_eq!(b.items[1].value, dec!(-20));
    }

    #[test]
    fn test_primary_tag_vs_fan_out() {
        let trades = vec![trade("1", &["Breakout", "Momentum"], dec!(100))];

        let primary = breakdown(&trades, CategoryKey::PrimaryTag, BreakdownMetric::NetPnl, &TradeFilter::new());
        assert_eq!(primary.items.len(), 1);

        let fan_out = breakdown(&trades, CategoryKey::Tag, BreakdownMetric::NetPnl, &TradeFilter::new());
        assert_eq!(fan_out.items.len(), 2);
        assert!(fan_out.items.iter().all(|r| r.value == dec!(100) && r.trade_count == 1));
    }

    #[test]
    fn test_weekday_and_hour_use_timezone() {
        let trades = vec![trade("1", &[], dec!(10))];
        let utc = TradeFilter::new();
        let seoul = TradeFilter::new().with_timezone(Tz::Asia__Seoul);

        let weekday = breakdown(&trades, CategoryKey::Weekday, BreakdownMetric::TradeCount, &utc);
        assert_eq!(weekday.items[0].label, "Monday");
        assert_eq!(weekday.items[0].value, dec!(1));

        let hour = breakdown(&trades, CategoryKey::Hour, BreakdownMetric::NetPnl, &seoul);
        assert_eq!(hour.items[0].label, "23:00");
    }

    #[test]
    fn test_win_rate_metric_and_stats() {
        let trades = vec![
            trade("1", &["A"], dec!(10)),
            trade("2", &["A"], dec!(-30)),
            trade("3", &["B"], dec!(5)),
        ];
        let b = breakdown(&trades, CategoryKey::PrimaryTag, BreakdownMetric::WinRate, &TradeFilter::new());
        assert_eq!(b.items[0].label, "B");
        assert_eq!(b.items[0].value, dec!(1));
        assert_eq!(b.items[1].value, dec!(0.5));

        let stats = breakdown_stats(&trades, CategoryKey::PrimaryTag, &TradeFilter::new());
        assert_eq!(stats[0].label, "B");
        assert_eq!(stats[1].avg_loss, dec!(-30));
        assert_eq!(stats[1].avg_win, dec!(10));
    }

    #[test]
    fn test_top_bottom() {
        let rows: Vec<CategoryRow> = [("a", 1), ("b", 5), ("c", -3), ("d", 2)]
            .iter()
            .map(|(k, v)| CategoryRow {
                key: k.to_string(),
                label: k.to_string(),
                value: Decimal::from(*v),
                trade_count: 1,
            })
            .collect();
        let tb = top_bottom(&rows, 2);
        assert_eq!(tb.top.iter().map(|r| r.key.as_str()).collect::<Vec<_>>(), vec!["b", "d"]);
        assert_eq!(tb.bottom.iter().map(|r| r.key.as_str()).collect::<Vec<_>>(), vec!["c", "a"]);
    }

    #[test]
    fn test_cost_breakdown() {
        let mut a = trade("1", &[], dec!(10));
        a.fees = dec!(2);
        a.account_id = Some("ira".to_string());
        let mut b = trade("2", &[], dec!(-10));
        b.fees = dec!(3);
        b.asset_type = AssetType::Futures;
        let mut open = trade("3", &[], dec!(0));
        open.state = TradeState::Open;
        open.fees = dec!(2);

        let costs = cost_breakdown(&[a, b, open], &TradeFilter::new());
        assert_eq!(costs.total_fees, dec!(7));
        assert_eq!(costs.fees_to_gross, Some(dec!(0.35)));
        assert_eq!(costs.by_asset_type[0].key, "stock");
        assert_eq!(costs.by_asset_type[0].value, dec!(4));
        assert_eq!(costs.by_account.len(), 2);
        assert_eq!(costs.by_month.len(), 1);
        assert_eq!(costs.by_month[0].key, "2024-06");
    }

    #[test]
    fn test_key_from_str() {
        assert_eq!("asset_type".parse::<CategoryKey>().unwrap(), CategoryKey::AssetType);
        assert_eq!("strategy".parse::<CategoryKey>().unwrap(), CategoryKey::PrimaryTag);
        assert!("color".parse::<CategoryKey>().is_err());
        assert_eq!("win-rate".parse::<BreakdownMetric>().unwrap(), BreakdownMetric::WinRate);
    }
}
