//! KPI 요약 모듈
//!
//! 청산 거래에 대해 승률, 평균 손익, 기대값, 수익 팩터, 최대 낙폭,
//! 샤프/소르티노 비율을 계산합니다.
//!
//! 0으로 나누는 경우는 에러가 아니라 [`Ratio`] 센티널 값으로 결과에 포함됩니다.

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use journal_core::{
    sorted_closed_trades, RatioConfig, ReturnBasis, TradeFilter, TradeRecord,
};

use crate::equity::{build_equity_curve, daily_equity_series};

/// 분모가 0일 수 있는 비율 값
///
/// JSON에서는 `Value`가 숫자, `Infinite`가 `"Infinity"` 문자열,
/// `Undefined`가 `null`로 직렬화됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ratio {
    /// 유한한 값
    Value(Decimal),
    /// 분모가 0이고 분자가 양수
    Infinite,
    /// 정의되지 않음 (분모 0 또는 표본 부족)
    Undefined,
}

impl Ratio {
    /// 유한한 값이면 반환합니다.
    pub fn value(&self) -> Option<Decimal> {
        match self {
            Ratio::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Ratio::Infinite)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Ratio::Undefined)
    }
}

impl Serialize for Ratio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Ratio::Value(v) => Serialize::serialize(v, serializer),
            Ratio::Infinite => serializer.serialize_str("Infinity"),
            Ratio::Undefined => serializer.serialize_none(),
        }
    }
}

/// KPI 요약
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSummary {
    /// 순손익 합계
    pub net: Decimal,
    /// 실현 손익 합계
    pub realized: Decimal,
    /// 수수료 합계
    pub fees: Decimal,
    /// 승률 (0~1)
    pub win_rate: Decimal,
    /// 수익 거래 평균 순손익
    pub avg_win: Decimal,
    /// 손실 거래 평균 순손익 (0 이하)
    pub avg_loss: Decimal,
    /// 거래당 기대 손익
    pub expectancy: Decimal,
    pub profit_factor: Ratio,
    pub trade_count: usize,
    /// 최대 낙폭 (0 이하)
    pub max_drawdown: Decimal,
    pub sharpe: Ratio,
    pub sortino: Ratio,
}

/// KPI 계산 옵션
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpiOptions {
    /// 최대 낙폭과 일별 수익률 계산에 쓰는 초기 잔고
    pub initial_balance: Decimal,
    /// 샤프/소르티노 설정
    pub ratios: RatioConfig,
}

impl KpiOptions {
    pub fn new(initial_balance: Decimal, ratios: RatioConfig) -> Self {
        Self {
            initial_balance,
            ratios,
        }
    }
}

/// KPI 요약을 계산합니다.
///
/// 청산 거래만 사용합니다. 빈 거래 목록에서도 모든 필드가 정의된 결과를 반환합니다.
///
/// # 매개변수
///
/// * `trades` - 정규화된 거래 목록
/// * `filter` - 일별 수익률 기준일 때 날짜 구간과 시간대를 제공하는 필터
/// * `options` - 초기 잔고와 비율 설정
pub fn summarize(trades: &[TradeRecord], filter: &TradeFilter, options: &KpiOptions) -> KpiSummary {
    let closed = sorted_closed_trades(trades);
    let trade_count = closed.len();

    let mut net = Decimal::ZERO;
    let mut realized = Decimal::ZERO;
    let mut fees = Decimal::ZERO;
    let mut gross_win = Decimal::ZERO;
    let mut gross_loss = Decimal::ZERO;
    let mut wins = 0usize;
    let mut losses = 0usize;

    for trade in &closed {
        net += trade.net_pnl;
        realized += trade.realized_pnl;
        fees += trade.fees();

        if trade.is_win() {
            wins += 1;
            gross_win += trade.net_pnl;
        } else if trade.is_loss() {
            losses += 1;
            gross_loss += trade.net_pnl;
        }
    }

    let win_rate = ratio_or_zero(Decimal::from(wins), trade_count);
    let avg_win = ratio_or_zero(gross_win, wins);
    let avg_loss = ratio_or_zero(gross_loss, losses);
    let expectancy = win_rate * avg_win + (Decimal::ONE - win_rate) * avg_loss;

    let max_drawdown = build_equity_curve(trades, options.initial_balance).max_drawdown;

    let returns = return_series(trades, filter, options);
    let annualization = options
        .ratios
        .annualize
        .then_some(options.ratios.periods_per_year);

    let summary = KpiSummary {
        net,
        realized,
        fees,
        win_rate,
        avg_win,
        avg_loss,
        expectancy,
        profit_factor: profit_factor(gross_win, gross_loss),
        trade_count,
        max_drawdown,
        sharpe: sharpe_ratio(&returns, annualization),
        sortino: sortino_ratio(&returns, annualization),
    };

    tracing::debug!(
        trade_count,
        net = %summary.net,
        win_rate = %summary.win_rate,
        basis = ?options.ratios.basis,
        "KPI summary computed"
    );

    summary
}

/// 설정된 기준에 따른 수익률 시계열을 생성합니다.
///
/// - `PerTrade`: 청산 시각 순 거래별 순손익
/// - `Daily`: 빈 날짜를 채운 일별 잔고 변화율 (첫날 제외, 전일 잔고가 0인 날 제외)
pub fn return_series(trades: &[TradeRecord], filter: &TradeFilter, options: &KpiOptions) -> Vec<Decimal> {
    match options.ratios.basis {
        ReturnBasis::PerTrade => sorted_closed_trades(trades)
            .into_iter()
            .map(|t| t.net_pnl)
            .collect(),
        ReturnBasis::Daily => daily_equity_series(trades, options.initial_balance, filter)
            .into_iter()
            .skip(1)
            .filter_map(|p| p.percent_change)
            .collect(),
    }
}

/// 수익 팩터를 계산합니다.
///
/// `gross_loss`는 손실 거래 순손익의 합(0 이하)입니다. 손실이 없고 수익이 있으면
/// `Infinite`, 둘 다 없으면 0입니다.
pub fn profit_factor(gross_win: Decimal, gross_loss: Decimal) -> Ratio {
    let loss = gross_loss.abs();
    if loss.is_zero() {
        if gross_win > Decimal::ZERO {
            Ratio::Infinite
        } else {
            Ratio::Value(Decimal::ZERO)
        }
    } else {
        gross_win
            .checked_div(loss)
            .map(Ratio::Value)
            .unwrap_or(Ratio::Undefined)
    }
}

/// 샤프 비율을 계산합니다.
///
/// # 계산 공식
///
/// ```text
/// Sharpe = 평균 수익률 / 표본 표준편차 (n - 1)  [× √periods_per_year]
/// ```
///
/// 표본이 2개 미만이거나 표준편차가 0이면 `Undefined`입니다. 중간 계산이
/// `Decimal` 범위를 넘는 경우에도 `Undefined`입니다.
pub fn sharpe_ratio(returns: &[Decimal], annualization: Option<u32>) -> Ratio {
    if returns.len() < 2 {
        return Ratio::Undefined;
    }
    let Some(mean) = checked_mean(returns) else {
        return Ratio::Undefined;
    };

    let variance = checked_sum_of_squares(returns.iter().map(|r| r.checked_sub(mean)))
        .and_then(|sum| sum.checked_div(Decimal::from(returns.len() - 1)));
    let Some(variance) = variance else {
        return Ratio::Undefined;
    };

    let std_dev = decimal_sqrt(variance);
    if std_dev.is_zero() {
        return Ratio::Undefined;
    }

    annualize(mean.checked_div(std_dev), annualization)
}

/// 소르티노 비율을 계산합니다.
///
/// 하방 편차 = √(음수 수익률²의 합 / 음수 수익률 개수)
///
/// 음수 수익률이 없거나 표본이 2개 미만이면 `Undefined`입니다.
pub fn sortino_ratio(returns: &[Decimal], annualization: Option<u32>) -> Ratio {
    if returns.len() < 2 {
        return Ratio::Undefined;
    }

    let negatives: Vec<Decimal> = returns
        .iter()
        .copied()
        .filter(|r| *r < Decimal::ZERO)
        .collect();
    if negatives.is_empty() {
        return Ratio::Undefined;
    }

    let downside_variance = checked_sum_of_squares(negatives.iter().map(|r| Some(*r)))
        .and_then(|sum| sum.checked_div(Decimal::from(negatives.len())));
    let (Some(downside_variance), Some(mean)) = (downside_variance, checked_mean(returns)) else {
        return Ratio::Undefined;
    };

    let downside_dev = decimal_sqrt(downside_variance);
    if downside_dev.is_zero() {
        return Ratio::Undefined;
    }

    annualize(mean.checked_div(downside_dev), annualization)
}

fn annualize(ratio: Option<Decimal>, annualization: Option<u32>) -> Ratio {
    let Some(ratio) = ratio else {
        return Ratio::Undefined;
    };
    match annualization {
        Some(periods) => ratio
            .checked_mul(decimal_sqrt(Decimal::from(periods)))
            .map(Ratio::Value)
            .unwrap_or(Ratio::Undefined),
        None => Ratio::Value(ratio),
    }
}

fn checked_mean(values: &[Decimal]) -> Option<Decimal> {
    let sum = values
        .iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))?;
    Some(ratio_or_zero(sum, values.len()))
}

/// 제곱합. 어느 항이든 `None`이거나 범위를 넘으면 `None`입니다.
fn checked_sum_of_squares<I>(values: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Option<Decimal>>,
{
    values.into_iter().try_fold(Decimal::ZERO, |acc, v| {
        let v = v?;
        acc.checked_add(v.checked_mul(v)?)
    })
}

pub(crate) fn ratio_or_zero(numerator: Decimal, count: usize) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        numerator / Decimal::from(count)
    }
}

/// Decimal 타입의 제곱근을 뉴턴 방법으로 계산합니다.
///
/// # 알고리즘
///
/// 1. 초기 추정값 = value / 2 (1 이하의 값은 1)
/// 2. 반복: next = (guess + value/guess) / 2
/// 3. 10^-10 이내로 수렴하거나 50회 반복할 때까지
///
/// 0 이하의 값은 0을 반환합니다.
pub fn decimal_sqrt(value: Decimal) -> Decimal {
    if value <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    // 추정값이 항상 제곱근 이상에서 출발하도록
    let mut guess = if value > Decimal::ONE {
        value / Decimal::TWO
    } else {
        Decimal::ONE
    };
    let precision = Decimal::new(1, 10);

    for _ in 0..50 {
        let Some(next_guess) = value
            .checked_div(guess)
            .and_then(|q| q.checked_add(guess))
            .map(|sum| sum / Decimal::TWO)
        else {
            break;
        };
        if (next_guess - guess).abs() < precision {
            return next_guess;
        }
        guess = next_guess;
    }

    guess
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use journal_core::{AssetType, Side, TradeState};
    use rust_decimal_macros::dec;

    fn closed(id: &str, day: u32, pnl: Decimal, fees: Decimal) -> TradeRecord {
        let close: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 5, day, 16, 0, 0).unwrap();
        TradeRecord {
            id: id.to_string(),
            user_id: None,
            account_id: None,
            symbol: "SPY".to_string(),
            side: Side::Buy,
            asset_type: AssetType::Stock,
            quantity: dec!(10),
            entry_price: dec!(500),
            fees,
            timestamp_open: close - Duration::hours(3),
            state: TradeState::Closed {
                timestamp_close: close,
                exit_price: dec!(500),
                realized_pnl: pnl,
            },
            category_tags: vec![],
            risk_multiple: None,
            mae: None,
            mfe: None,
        }
    }

    fn options() -> KpiOptions {
        KpiOptions::new(dec!(10000), RatioConfig::default())
    }

    fn approx(ratio: Ratio, expected: Decimal) {
        let value = ratio.value().expect("finite ratio");
        assert!(
            (value - expected).abs() < dec!(0.0001),
            "expected {expected}, got {value}"
        );
    }

    #[test]
    fn test_decimal_sqrt() {
        assert!((decimal_sqrt(dec!(4)) - dec!(2)).abs() < dec!(0.0000001));
        assert!((decimal_sqrt(dec!(2)) - dec!(1.41421356)).abs() < dec!(0.0000001));
        assert!((decimal_sqrt(dec!(0.0004)) - dec!(0.02)).abs() < dec!(0.0000001));
        assert_eq!(decimal_sqrt(Decimal::ZERO), Decimal::ZERO);
        assert_eq!(decimal_sqrt(dec!(-1)), Decimal::ZERO);
    }

    #[test]
    fn test_summary_basic_metrics() {
        let trades = vec![
            closed("1", 1, dec!(110), dec!(10)), // +100
            closed("2", 2, dec!(210), dec!(10)), // +200
            closed("3", 3, dec!(-90), dec!(10)), // -100
            closed("4", 4, dec!(0), dec!(0)),    // 0 (승/패 아님)
        ];
        let kpi = summarize(&trades, &TradeFilter::new(), &options());

        assert_eq!(kpi.trade_count, 4);
        assert_eq!(kpi.net, dec!(200));
        assert_eq!(kpi.realized, dec!(230));
        assert_eq!(kpi.fees, dec!(30));
        assert_eq!(kpi.win_rate, dec!(0.5));
        assert_eq!(kpi.avg_win, dec!(150));
        assert_eq!(kpi.avg_loss, dec!(-100));
        assert_eq!(kpi.expectancy, dec!(25));
        assert_eq!(kpi.profit_factor, Ratio::Value(dec!(3)));
        assert_eq!(kpi.max_drawdown, dec!(-100));
    }

    #[test]
    fn test_empty_set_is_total() {
        let kpi = summarize(&[], &TradeFilter::new(), &options());

        assert_eq!(kpi.trade_count, 0);
        assert_eq!(kpi.win_rate, Decimal::ZERO);
        assert_eq!(kpi.avg_win, Decimal::ZERO);
        assert_eq!(kpi.avg_loss, Decimal::ZERO);
        assert_eq!(kpi.expectancy, Decimal::ZERO);
        assert_eq!(kpi.profit_factor, Ratio::Value(Decimal::ZERO));
        assert_eq!(kpi.max_drawdown, Decimal::ZERO);
        assert!(kpi.sharpe.is_undefined());
        assert!(kpi.sortino.is_undefined());

        let json = serde_json::to_value(&kpi).unwrap();
        assert!(json["sharpe"].is_null());
        assert_eq!(json["profitFactor"].as_f64(), Some(0.0));
    }

    #[test]
    fn test_all_losers() {
        let trades = vec![
            closed("1", 1, dec!(-50), dec!(0)),
            closed("2", 2, dec!(-150), dec!(0)),
        ];
        let kpi = summarize(&trades, &TradeFilter::new(), &options());

        assert_eq!(kpi.win_rate, Decimal::ZERO);
        assert_eq!(kpi.avg_loss, dec!(-100));
        assert_eq!(kpi.expectancy, dec!(-100));
        assert_eq!(kpi.profit_factor, Ratio::Value(Decimal::ZERO));
        assert_eq!(kpi.max_drawdown, dec!(-200));
        approx(kpi.sharpe, dec!(-1.4142));
        approx(kpi.sortino, dec!(-0.8944));
    }

    #[test]
    fn test_all_winners_profit_factor_infinite() {
        let trades = vec![
            closed("1", 1, dec!(50), dec!(0)),
            closed("2", 2, dec!(150), dec!(0)),
        ];
        let kpi = summarize(&trades, &TradeFilter::new(), &options());

        assert!(kpi.profit_factor.is_infinite());
        assert!(kpi.sortino.is_undefined());

        let json = serde_json::to_value(&kpi).unwrap();
        assert_eq!(json["profitFactor"], "Infinity");
        assert!(json["sortino"].is_null());
    }

    #[test]
    fn test_extreme_magnitudes_are_total() {
        let trades = vec![
            closed("1", 1, dec!(1000000000000000), dec!(0)),
            closed("2", 2, dec!(-1000000000000000), dec!(0)),
        ];
        let kpi = summarize(&trades, &TradeFilter::new(), &options());

        assert_eq!(kpi.net, Decimal::ZERO);
        assert_eq!(kpi.profit_factor, Ratio::Value(Decimal::ONE));
        assert_eq!(kpi.max_drawdown, dec!(-1000000000000000));
        // 제곱이 Decimal 범위를 넘음
        assert!(kpi.sharpe.is_undefined());
        assert!(kpi.sortino.is_undefined());

        let daily = KpiOptions::new(dec!(0.0001), RatioConfig::daily_annualized());
        let kpi = summarize(&trades, &TradeFilter::new(), &daily);
        assert_eq!(kpi.trade_count, 2);
    }

    #[test]
    fn test_sharpe_constant_returns_undefined() {
        assert!(sharpe_ratio(&[dec!(10), dec!(10), dec!(10)], None).is_undefined());
        assert!(sharpe_ratio(&[dec!(10)], None).is_undefined());
    }

    #[test]
    fn test_sharpe_annualization() {
        let returns = [dec!(0.01), dec!(-0.005), dec!(0.02), dec!(0.0)];
        let plain = sharpe_ratio(&returns, None).value().unwrap();
        let annual = sharpe_ratio(&returns, Some(252)).value().unwrap();
        assert!((annual - plain * decimal_sqrt(dec!(252))).abs() < dec!(0.000001));
    }

    #[test]
    fn test_daily_return_basis() {
        let trades = vec![
            closed("1", 1, dec!(100), dec!(0)),
            closed("2", 3, dec!(-50), dec!(0)),
            closed("3", 4, dec!(200), dec!(0)),
        ];
        let options = KpiOptions::new(dec!(10000), RatioConfig::daily_annualized());
        let returns = return_series(&trades, &TradeFilter::new(), &options);

        // 5/2(0), 5/3(-50/10100), 5/4(200/10050)
        assert_eq!(returns.len(), 3);
        assert_eq!(returns[0], Decimal::ZERO);
        assert!(returns[1] < Decimal::ZERO);

        let kpi = summarize(&trades, &TradeFilter::new(), &options);
        assert!(kpi.sharpe.value().is_some());
    }

    #[test]
    fn test_ratio_serialization() {
        assert_eq!(serde_json::to_string(&Ratio::Infinite).unwrap(), "\"Infinity\"");
        assert_eq!(serde_json::to_string(&Ratio::Undefined).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Ratio::Value(dec!(1.5))).unwrap(), "1.5");
    }
}
