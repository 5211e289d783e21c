//! 자산 곡선(Equity Curve) 모듈
//!
//! 청산된 거래의 순손익을 시간순으로 누적하여 잔고 곡선과 낙폭을 계산합니다.
//!
//! # 주요 기능
//!
//! - 거래별 자산 곡선과 요약 (초기/최종 잔고, 수익, 최대 낙폭)
//! - 낙폭 구간 분석 (고점, 저점, 회복 시점)
//! - 빈 날짜를 채운 일별 자산 시계열

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use journal_core::{sorted_closed_trades, TradeFilter, TradeRecord};

/// 단일 자산 곡선 데이터 포인트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    /// 타임스탬프 (UTC)
    pub t: DateTime<Utc>,

    /// 해당 시각까지의 모든 청산 손익을 반영한 잔고
    pub equity: Decimal,
}

/// 자산 곡선 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityCurveResult {
    /// 시간순 자산 포인트
    pub points: Vec<EquityPoint>,
    /// 초기 잔고
    pub initial_balance: Decimal,
    /// 최종 잔고
    pub final_balance: Decimal,
    /// 절대 수익 (최종 - 초기)
    pub absolute_return: Decimal,
    /// 수익률 (비율, 초기 잔고가 0이면 null)
    pub pct_return: Option<Decimal>,
    /// 최대 낙폭 (0 이하의 금액)
    pub max_drawdown: Decimal,
}

/// 자산 곡선 빌더
///
/// 순손익을 순차적으로 추가하여 자산 곡선을 구축합니다.
/// 같은 시각의 손익은 하나의 포인트로 합쳐집니다.
#[derive(Debug, Clone)]
pub struct EquityCurveBuilder {
    initial_balance: Decimal,
    balance: Decimal,
    points: Vec<EquityPoint>,
}

impl EquityCurveBuilder {
    /// 새로운 빌더를 생성합니다.
    ///
    /// # 매개변수
    ///
    /// * `initial_balance` - 초기 잔고
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            initial_balance,
            balance: initial_balance,
            points: Vec::new(),
        }
    }

    /// 순손익을 추가합니다.
    ///
    /// 시각은 오름차순으로 추가되어야 합니다. 직전 포인트와 시각이 같으면
    /// 새 포인트를 만들지 않고 직전 포인트의 잔고를 갱신합니다.
    pub fn add_pnl(&mut self, t: DateTime<Utc>, net_pnl: Decimal) -> &mut Self {
        self.balance += net_pnl;

        match self.points.last_mut() {
            Some(last) if last.t == t => last.equity = self.balance,
            _ => self.points.push(EquityPoint {
                t,
                equity: self.balance,
            }),
        }

        self
    }

    /// 자산 곡선 결과를 생성합니다.
    pub fn build(self) -> EquityCurveResult {
        let final_balance = self
            .points
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.initial_balance);
        let absolute_return = final_balance - self.initial_balance;
        let pct_return = if self.initial_balance.is_zero() {
            None
        } else {
            absolute_return.checked_div(self.initial_balance)
        };
        let max_drawdown =
            max_drawdown_of(self.initial_balance, self.points.iter().map(|p| p.equity));

        EquityCurveResult {
            points: self.points,
            initial_balance: self.initial_balance,
            final_balance,
            absolute_return,
            pct_return,
            max_drawdown,
        }
    }
}

/// 거래 목록으로 자산 곡선을 생성합니다.
///
/// 청산된 거래만 사용하며 청산 시각 오름차순(같은 시각은 ID 오름차순)으로
/// 순손익을 누적합니다.
///
/// # 매개변수
///
/// * `trades` - 정규화된 거래 목록
/// * `initial_balance` - 초기 잔고
pub fn build_equity_curve(trades: &[TradeRecord], initial_balance: Decimal) -> EquityCurveResult {
    let mut builder = EquityCurveBuilder::new(initial_balance);
    for trade in sorted_closed_trades(trades) {
        builder.add_pnl(trade.closed_at, trade.net_pnl);
    }
    builder.build()
}

/// 자산 시계열의 최대 낙폭을 계산합니다.
///
/// 고점은 `initial_balance`에서 시작하며 각 포인트에서
/// `equity - 고점`(0 이하)의 최솟값을 반환합니다. 포인트가 없으면 0입니다.
///
/// # 계산 공식
///
/// ```text
/// running_max_i = max(initial_balance, equity_0, ..., equity_i)
/// max_drawdown  = min_i(equity_i - running_max_i)
/// ```
pub fn max_drawdown_of<I>(initial_balance: Decimal, equities: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    let mut running_max = initial_balance;
    let mut max_drawdown = Decimal::ZERO;

    for equity in equities {
        if equity > running_max {
            running_max = equity;
        }
        let drawdown = equity - running_max;
        if drawdown < max_drawdown {
            max_drawdown = drawdown;
        }
    }

    max_drawdown
}

/// 낙폭 구간 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawdownPeriod {
    /// 고점 시각 (초기 잔고가 고점이면 None)
    pub start: Option<DateTime<Utc>>,
    /// 저점 시각
    pub trough: DateTime<Utc>,
    /// 회복 시각 (미회복이면 None)
    pub end: Option<DateTime<Utc>>,
    /// 고점 잔고
    pub peak_equity: Decimal,
    /// 저점 잔고
    pub trough_equity: Decimal,
    /// 낙폭 금액 (0 이하)
    pub depth: Decimal,
    /// 고점 대비 낙폭 비율 (0 이하, 고점이 0 이하면 None)
    pub depth_pct: Option<Decimal>,
    /// 고점부터 회복(또는 마지막 포인트)까지 일수
    pub duration_days: i64,
}

/// 낙폭 분석 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawdownReport {
    /// 최대 낙폭 금액 (0 이하)
    pub max_drawdown_abs: Decimal,
    /// 최대 낙폭 비율 (0 이하)
    pub max_drawdown_pct: Option<Decimal>,
    /// 최악 구간의 고점 시각
    pub worst_start: Option<DateTime<Utc>>,
    /// 최악 구간의 저점 시각
    pub worst_end: Option<DateTime<Utc>>,
    /// 모든 낙폭 구간 (시간순)
    pub periods: Vec<DrawdownPeriod>,
}

/// 자산 곡선의 낙폭 구간을 분석합니다.
///
/// 고점 갱신 또는 회복 시 구간이 종료되며, 마지막까지 회복하지 못한 구간은
/// `end == None`으로 포함됩니다.
pub fn analyze_drawdowns(curve: &EquityCurveResult) -> DrawdownReport {
    let mut periods = Vec::new();
    let mut peak = curve.initial_balance;
    let mut peak_time: Option<DateTime<Utc>> = None;
    let mut trough: Option<(DateTime<Utc>, Decimal)> = None;

    for point in &curve.points {
        if point.equity >= peak {
            if let Some((trough_time, trough_equity)) = trough.take() {
                periods.push(drawdown_period(
                    peak,
                    peak_time,
                    trough_time,
                    trough_equity,
                    Some(point.t),
                    point.t,
                    curve.points.first().map(|p| p.t),
                ));
            }
            peak = point.equity;
            peak_time = Some(point.t);
        } else {
            match trough {
                Some((_, trough_equity)) if point.equity >= trough_equity => {}
                _ => trough = Some((point.t, point.equity)),
            }
        }
    }

    if let (Some((trough_time, trough_equity)), Some(last)) = (trough, curve.points.last()) {
        periods.push(drawdown_period(
            peak,
            peak_time,
            trough_time,
            trough_equity,
            None,
            last.t,
            curve.points.first().map(|p| p.t),
        ));
    }

    // 가장 깊은 구간 (같으면 먼저 발생한 구간)
    let worst = periods.iter().fold(None::<&DrawdownPeriod>, |acc, p| match acc {
        Some(best) if best.depth <= p.depth => Some(best),
        _ => Some(p),
    });

    DrawdownReport {
        max_drawdown_abs: curve.max_drawdown,
        max_drawdown_pct: worst.and_then(|p| p.depth_pct),
        worst_start: worst.and_then(|p| p.start),
        worst_end: worst.map(|p| p.trough),
        periods,
    }
}

fn drawdown_period(
    peak_equity: Decimal,
    start: Option<DateTime<Utc>>,
    trough: DateTime<Utc>,
    trough_equity: Decimal,
    end: Option<DateTime<Utc>>,
    last_seen: DateTime<Utc>,
    first_point: Option<DateTime<Utc>>,
) -> DrawdownPeriod {
    let depth = trough_equity - peak_equity;
    let depth_pct = if peak_equity > Decimal::ZERO {
        depth.checked_div(peak_equity)
    } else {
        None
    };
    let origin = start.or(first_point).unwrap_or(trough);

    DrawdownPeriod {
        start,
        trough,
        end,
        peak_equity,
        trough_equity,
        depth,
        depth_pct,
        duration_days: (end.unwrap_or(last_seen) - origin).num_days(),
    }
}

/// 일별 자산 포인트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyEquityPoint {
    /// 날짜 (필터 시간대 기준)
    pub date: NaiveDate,
    /// 해당 날짜 종료 시점 잔고
    pub value: Decimal,
    /// 전일 대비 금액 변화
    pub dollar_change: Decimal,
    /// 전일 대비 변화율 (전일 잔고가 0이면 None)
    pub percent_change: Option<Decimal>,
    /// 해당 날짜의 순손익
    pub income: Decimal,
}

/// 빈 날짜를 채운 일별 자산 시계열을 생성합니다.
///
/// 구간은 필터의 시작/종료일이 있으면 그 값을, 없으면 첫/마지막 청산일을
/// 사용합니다. 거래가 없는 날은 직전 잔고를 이어받습니다. 시작일 이전에
/// 청산된 손익은 시작 잔고에 반영됩니다.
pub fn daily_equity_series(
    trades: &[TradeRecord],
    initial_balance: Decimal,
    filter: &TradeFilter,
) -> Vec<DailyEquityPoint> {
    let mut income_by_day: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for trade in sorted_closed_trades(trades) {
        *income_by_day
            .entry(filter.local_date(trade.closed_at))
            .or_default() += trade.net_pnl;
    }

    let first_day = income_by_day.keys().next().copied();
    let last_day = income_by_day.keys().next_back().copied();
    let Some((start, end)) = filter.fill_range(first_day, last_day) else {
        return Vec::new();
    };

    let mut balance = initial_balance
        + income_by_day
            .range(..start)
            .map(|(_, income)| *income)
            .sum::<Decimal>();

    let mut series = Vec::new();
    let mut day = start;
    while day <= end {
        let income = income_by_day.get(&day).copied().unwrap_or(Decimal::ZERO);
        let previous = balance;
        balance += income;

        series.push(DailyEquityPoint {
            date: day,
            value: balance,
            dollar_change: income,
            percent_change: if previous.is_zero() {
                None
            } else {
                income.checked_div(previous)
            },
            income,
        });

        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use journal_core::{AssetType, Side, TradeState};
    use rust_decimal_macros::dec;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn closed(id: &str, close: DateTime<Utc>, pnl: Decimal) -> TradeRecord {
        TradeRecord {
            id: id.to_string(),
            user_id: None,
            account_id: None,
            symbol: "AAPL".to_string(),
            side: Side::Buy,
            asset_type: AssetType::Stock,
            quantity: dec!(1),
            entry_price: dec!(100),
            fees: Decimal::ZERO,
            timestamp_open: close - Duration::hours(1),
            state: TradeState::Closed {
                timestamp_close: close,
                exit_price: dec!(100),
                realized_pnl: pnl,
            },
            category_tags: vec![],
            risk_multiple: None,
            mae: None,
            mfe: None,
        }
    }

    #[test]
    fn test_max_drawdown_example_series() {
        let dd = max_drawdown_of(
            dec!(10000),
            [dec!(10000), dec!(10200), dec!(9900), dec!(10500)],
        );
        assert_eq!(dd, dec!(-300));
        assert_eq!(max_drawdown_of(dec!(10000), []), Decimal::ZERO);
    }

    #[test]
    fn test_build_equity_curve_header() {
        let trades = vec![
            closed("b", ts(3, 10), dec!(300)),
            closed("a", ts(2, 10), dec!(200)),
        ];
        let curve = build_equity_curve(&trades, dec!(10000));

        assert_eq!(curve.points.len(), 2);
        assert_eq!(curve.points[0].equity, dec!(10200));
        assert_eq!(curve.final_balance, dec!(10500));
        assert_eq!(curve.absolute_return, dec!(500));
        assert_eq!(curve.pct_return, Some(dec!(0.05)));
        assert_eq!(curve.max_drawdown, Decimal::ZERO);
    }

    #[test]
    fn test_same_timestamp_collapses_to_last_balance() {
        let trades = vec![
            closed("b", ts(2, 10), dec!(-500)),
            closed("a", ts(2, 10), dec!(100)),
            closed("c", ts(3, 10), dec!(50)),
        ];
        let curve = build_equity_curve(&trades, dec!(1000));

        assert_eq!(curve.points.len(), 2);
        assert_eq!(curve.points[0].equity, dec!(600));
        assert_eq!(curve.points[1].equity, dec!(650));
        assert_eq!(curve.max_drawdown, dec!(-400));
    }

    #[test]
    fn test_empty_and_zero_initial_balance() {
        let curve = build_equity_curve(&[], dec!(10000));
        assert!(curve.points.is_empty());
        assert_eq!(curve.final_balance, dec!(10000));
        assert_eq!(curve.max_drawdown, Decimal::ZERO);
        assert_eq!(curve.pct_return, Some(Decimal::ZERO));

        let zero = build_equity_curve(&[closed("a", ts(2, 10), dec!(10))], Decimal::ZERO);
        assert_eq!(zero.pct_return, None);
        let json = serde_json::to_value(&zero).unwrap();
        assert!(json["pctReturn"].is_null());
        assert!(json["points"][0].get("t").is_some());
    }

    #[test]
    fn test_open_trades_are_ignored() {
        let mut open = closed("x", ts(2, 10), dec!(999));
        open.state = TradeState::Open;
        let curve = build_equity_curve(&[open], dec!(100));
        assert!(curve.points.is_empty());
        assert_eq!(curve.final_balance, dec!(100));
    }

    #[test]
    fn test_analyze_drawdowns_finds_worst_period() {
        let trades = vec![
            closed("1", ts(2, 10), dec!(200)),  // 10200 (peak)
            closed("2", ts(3, 10), dec!(-300)), // 9900
            closed("3", ts(4, 10), dec!(600)),  // 10500 (recovered)
            closed("4", ts(5, 10), dec!(-100)), // 10400 (open drawdown)
        ];
        let curve = build_equity_curve(&trades, dec!(10000));
        let report = analyze_drawdowns(&curve);

        assert_eq!(report.max_drawdown_abs, dec!(-300));
        assert_eq!(report.periods.len(), 2);
        assert_eq!(report.worst_start, Some(ts(2, 10)));
        assert_eq!(report.worst_end, Some(ts(3, 10)));
        assert_eq!(report.periods[0].end, Some(ts(4, 10)));
        assert_eq!(report.periods[0].duration_days, 2);
        assert!(report.periods[1].end.is_none());
        assert_eq!(report.periods[1].depth, dec!(-100));
    }

    #[test]
    fn test_daily_equity_series_fills_gaps() {
        let trades = vec![
            closed("1", ts(2, 10), dec!(100)),
            closed("2", ts(4, 10), dec!(-50)),
        ];
        let filter = TradeFilter::new();
        let series = daily_equity_series(&trades, dec!(1000), &filter);

        assert_eq!(series.len(), 3);
        assert_eq!(series[0].value, dec!(1100));
        assert_eq!(series[0].percent_change, Some(dec!(0.1)));
        assert_eq!(series[1].value, dec!(1100));
        assert_eq!(series[1].income, Decimal::ZERO);
        assert_eq!(series[2].value, dec!(1050));
    }

    #[test]
    fn test_daily_equity_series_range_is_capped() {
        let trades = vec![
            closed("1", ts(2, 10), dec!(100)),
            closed("2", ts(4, 10), dec!(-50)),
        ];
        let filter = TradeFilter::new().with_range(
            NaiveDate::from_ymd_opt(1, 1, 1),
            NaiveDate::from_ymd_opt(9999, 12, 31),
        );
        let series = daily_equity_series(&trades, dec!(1000), &filter);

        assert_eq!(series.len(), 3);
        assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(series[2].value, dec!(1050));

        let empty = daily_equity_series(&[], dec!(1000), &filter);
        assert_eq!(empty.len() as i64, journal_core::MAX_FILL_DAYS);
        assert!(empty.iter().all(|p| p.value == dec!(1000)));
    }
}
