//! 거래 품질 리포트
//!
//! KPI 요약을 보완하는 거래 단위 통계입니다. 최대/최소 손익 거래, 승/패/무승부 수,
//! 보유 시간, 거래 대금, 수수료 비중과 결과/보유 시간 분포를 제공합니다.

use rust_decimal::Decimal;
use serde::Serialize;

use journal_core::{sorted_closed_trades, ContractMultipliers, TradeRecord};

use crate::distribution::{bin, BinSpec, DistributionAttribute, DistributionBin};
use crate::kpi::{ratio_or_zero, Ratio};

/// 거래 품질 리포트
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeQualityReport {
    /// 청산 거래 수
    pub trade_count: usize,
    /// 미청산/부분 청산 거래 수
    pub open_trade_count: usize,
    pub win_count: usize,
    pub loss_count: usize,
    pub breakeven_count: usize,
    /// 수익 거래 순손익 합 (0 이상)
    pub gross_profit: Decimal,
    /// 손실 거래 순손익 합 (0 이하)
    pub gross_loss: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    pub best_trade_id: Option<String>,
    pub worst_trade_id: Option<String>,
    /// 거래당 평균 순손익
    pub avg_trade: Decimal,
    /// 평균 수익 / |평균 손실|
    pub payoff_ratio: Ratio,
    pub avg_holding_hours: Option<Decimal>,
    pub median_holding_hours: Option<Decimal>,
    /// Σ 수량 × 진입가 × 승수 (Decimal 범위를 넘으면 null)
    pub total_notional: Option<Decimal>,
    /// 수수료 / Σ|실현 손익|
    pub fee_drag: Option<Decimal>,
    pub outcome_distribution: Vec<DistributionBin>,
    pub holding_time_distribution: Vec<DistributionBin>,
}

/// 거래 품질 리포트를 생성합니다.
///
/// # 매개변수
///
/// * `trades` - 정규화된 거래 목록
/// * `multipliers` - 거래 대금 계산에 쓰는 계약 승수
pub fn trade_quality(trades: &[TradeRecord], multipliers: &ContractMultipliers) -> TradeQualityReport {
    let closed = sorted_closed_trades(trades);

    let mut gross_profit = Decimal::ZERO;
    let mut gross_loss = Decimal::ZERO;
    let mut win_count = 0;
    let mut loss_count = 0;
    let mut fees = Decimal::ZERO;
    let mut gross_abs = Decimal::ZERO;
    let mut best: Option<(&str, Decimal)> = None;
    let mut worst: Option<(&str, Decimal)> = None;

    for trade in &closed {
        fees += trade.fees();
        gross_abs += trade.realized_pnl.abs();

        if trade.is_win() {
            win_count += 1;
            gross_profit += trade.net_pnl;
        } else if trade.is_loss() {
            loss_count += 1;
            gross_loss += trade.net_pnl;
        }

        if best.map_or(true, |(_, pnl)| trade.net_pnl > pnl) {
            best = Some((trade.id(), trade.net_pnl));
        }
        if worst.map_or(true, |(_, pnl)| trade.net_pnl < pnl) {
            worst = Some((trade.id(), trade.net_pnl));
        }
    }

    let mut holding: Vec<Decimal> = closed
        .iter()
        .filter_map(|t| t.record.holding_hours())
        .collect();
    holding.sort();

    let avg_win = ratio_or_zero(gross_profit, win_count);
    let avg_loss = ratio_or_zero(gross_loss, loss_count);
    let payoff_ratio = if avg_loss.is_zero() {
        if avg_win > Decimal::ZERO {
            Ratio::Infinite
        } else {
            Ratio::Undefined
        }
    } else {
        avg_win
            .checked_div(avg_loss.abs())
            .map(Ratio::Value)
            .unwrap_or(Ratio::Undefined)
    };

    let total_notional = trades.iter().try_fold(Decimal::ZERO, |acc, t| {
        let notional = t
            .quantity
            .abs()
            .checked_mul(t.entry_price)?
            .checked_mul(multipliers.multiplier_for(t.asset_type, &t.symbol))?;
        acc.checked_add(notional)
    });

    TradeQualityReport {
        trade_count: closed.len(),
        open_trade_count: trades.len() - closed.len(),
        win_count,
        loss_count,
        breakeven_count: closed.len() - win_count - loss_count,
        gross_profit,
        gross_loss,
        largest_win: best
            .map(|(_, pnl)| pnl.max(Decimal::ZERO))
            .unwrap_or(Decimal::ZERO),
        largest_loss: worst
            .map(|(_, pnl)| pnl.min(Decimal::ZERO))
            .unwrap_or(Decimal::ZERO),
        best_trade_id: best.map(|(id, _)| id.to_string()),
        worst_trade_id: worst.map(|(id, _)| id.to_string()),
        avg_trade: ratio_or_zero(gross_profit + gross_loss, closed.len()),
        payoff_ratio,
        avg_holding_hours: (!holding.is_empty())
            .then(|| ratio_or_zero(holding.iter().copied().sum(), holding.len())),
        median_holding_hours: median(&holding),
        total_notional,
        fee_drag: if gross_abs.is_zero() {
            None
        } else {
            fees.checked_div(gross_abs)
        },
        outcome_distribution: bin(trades, DistributionAttribute::NetPnl, &BinSpec::outcome()).bins,
        holding_time_distribution: bin(
            trades,
            DistributionAttribute::HoldingHours,
            &BinSpec::holding_time(),
        )
        .bins,
    }
}

/// 정렬된 값의 중앙값
fn median(sorted: &[Decimal]) -> Option<Decimal> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / Decimal::TWO),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use journal_core::{AssetType, Side, TradeState};
    use rust_decimal_macros::dec;

    fn trade(id: &str, hours: i64, pnl: Option<Decimal>, asset: AssetType) -> TradeRecord {
        let open = Utc.with_ymd_and_hms(2024, 7, 1, 13, 0, 0).unwrap();
        TradeRecord {
            id: id.to_string(),
            user_id: None,
            account_id: None,
            symbol: if asset == AssetType::Futures { "ESU4" } else { "AMD" }.to_string(),
            side: Side::Buy,
            asset_type: asset,
            quantity: dec!(2),
            entry_price: dec!(100),
            fees: dec!(1),
            timestamp_open: open,
            state: match pnl {
                Some(pnl) => TradeState::Closed {
                    timestamp_close: open + Duration::hours(hours),
                    exit_price: dec!(100),
                    realized_pnl: pnl,
                },
                None => TradeState::Open,
            },
            category_tags: vec![],
            risk_multiple: None,
            mae: None,
            mfe: None,
        }
    }

    #[test]
    fn test_quality_report() {
        let trades = vec![
            trade("a", 1, Some(dec!(301)), AssetType::Stock), // +300
            trade("b", 3, Some(dec!(-99)), AssetType::Stock), // -100
            trade("c", 5, Some(dec!(1)), AssetType::Stock),   // 0
            trade("d", 0, None, AssetType::Futures),
        ];
        let report = trade_quality(&trades, &ContractMultipliers::default());

        assert_eq!(report.trade_count, 3);
        assert_eq!(report.open_trade_count, 1);
        assert_eq!(report.win_count, 1);
        assert_eq!(report.loss_count, 1);
        assert_eq!(report.breakeven_count, 1);
        assert_eq!(report.largest_win, dec!(300));
        assert_eq!(report.largest_loss, dec!(-100));
        assert_eq!(report.best_trade_id.as_deref(), Some("a"));
        assert_eq!(report.worst_trade_id.as_deref(), Some("b"));
        assert_eq!(report.payoff_ratio, Ratio::Value(dec!(3)));
        assert_eq!(report.median_holding_hours, Some(dec!(3)));
        assert_eq!(report.avg_holding_hours, Some(dec!(3)));
        // 주식 3건 × 200 + ES 2계약 × 100 × 50
        assert_eq!(report.total_notional, Some(dec!(10600)));
        assert_eq!(report.fee_drag, Some(dec!(3) / dec!(401)));
        assert_eq!(report.outcome_distribution.iter().map(|b| b.count).sum::<usize>(), 3);
    }

    #[test]
    fn test_extreme_notional_is_null() {
        let mut big = trade("big", 2, Some(dec!(1000000000000000)), AssetType::Futures);
        big.quantity = dec!(1000000000000000);
        big.entry_price = dec!(1000000000000000);
        let trades = vec![big, trade("small", 1, Some(dec!(-1000000000000000)), AssetType::Stock)];

        let report = trade_quality(&trades, &ContractMultipliers::default());
        assert_eq!(report.total_notional, None);
        assert_eq!(report.trade_count, 2);
        assert_eq!(report.largest_win, dec!(999999999999999));
        assert!(serde_json::to_string(&report).is_ok());
    }

    #[test]
    fn test_empty_report() {
        let report = trade_quality(&[], &ContractMultipliers::default());
        assert_eq!(report.trade_count, 0);
        assert!(report.best_trade_id.is_none());
        assert!(report.payoff_ratio.is_undefined());
        assert!(report.median_holding_hours.is_none());
        assert!(report.fee_drag.is_none());
        assert!(serde_json::to_string(&report).is_ok());
    }
}
