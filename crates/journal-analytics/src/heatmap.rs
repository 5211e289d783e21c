//! 시간대별 성과 히트맵
//!
//! 진입 시각(필터 시간대)의 요일 × 시각 셀마다 순손익, 거래 수, 승률을 집계합니다.

use chrono::{Datelike, Timelike};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use journal_core::{TradeFilter, TradeRecord};

use crate::kpi::ratio_or_zero;

/// 히트맵 셀
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapCell {
    /// ISO 요일 (1 = 월요일, 7 = 일요일)
    pub weekday: u32,
    /// 시 (0-23)
    pub hour: u32,
    pub net_pnl: Decimal,
    pub trade_count: usize,
    pub win_rate: Decimal,
}

/// 시각별 승률
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyWinRate {
    pub hour: u32,
    pub trade_count: usize,
    pub wins: usize,
    pub win_rate: Decimal,
    pub net_pnl: Decimal,
}

#[derive(Default)]
struct Cell {
    net_pnl: Decimal,
    trades: usize,
    wins: usize,
}

fn accumulate<K, F>(trades: &[TradeRecord], key: F) -> BTreeMap<K, Cell>
where
    K: Ord,
    F: Fn(&TradeRecord) -> K,
{
    let mut cells: BTreeMap<K, Cell> = BTreeMap::new();
    for trade in trades.iter().filter_map(TradeRecord::as_closed) {
        let cell = cells.entry(key(trade.record)).or_default();
        cell.net_pnl += trade.net_pnl;
        cell.trades += 1;
        if trade.is_win() {
            cell.wins += 1;
        }
    }
    cells
}

/// 요일 × 시각 히트맵을 계산합니다.
///
/// 거래가 있는 셀만 (요일, 시각) 오름차순으로 반환합니다.
pub fn time_heatmap(trades: &[TradeRecord], filter: &TradeFilter) -> Vec<HeatmapCell> {
    let tz = filter.timezone;
    accumulate(trades, |t| {
        let local = t.timestamp_open.with_timezone(&tz);
        (local.weekday().number_from_monday(), local.hour())
    })
    .into_iter()
    .map(|((weekday, hour), cell)| HeatmapCell {
        weekday,
        hour,
        net_pnl: cell.net_pnl,
        trade_count: cell.trades,
        win_rate: ratio_or_zero(Decimal::from(cell.wins), cell.trades),
    })
    .collect()
}

/// 진입 시각별 승률을 계산합니다.
pub fn hourly_win_rate(trades: &[TradeRecord], filter: &TradeFilter) -> Vec<HourlyWinRate> {
    let tz = filter.timezone;
    accumulate(trades, |t| t.timestamp_open.with_timezone(&tz).hour())
        .into_iter()
        .map(|(hour, cell)| HourlyWinRate {
            hour,
            trade_count: cell.trades,
            wins: cell.wins,
            win_rate: ratio_or_zero(Decimal::from(cell.wins), cell.trades),
            net_pnl: cell.net_pnl,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use chrono_tz::Tz;
    use journal_core::{AssetType, Side, TradeState};
    use rust_decimal_macros::dec;

    fn trade(id: &str, open: DateTime<Utc>, pnl: Decimal) -> TradeRecord {
        TradeRecord {
            id: id.to_string(),
            user_id: None,
            account_id: None,
            symbol: "BTC".to_string(),
            side: Side::Buy,
            asset_type: AssetType::Crypto,
            quantity: dec!(0.1),
            entry_price: dec!(60000),
            fees: Decimal::ZERO,
            timestamp_open: open,
            state: TradeState::Closed {
                timestamp_close: open + Duration::minutes(30),
                exit_price: dec!(60000),
                realized_pnl: pnl,
            },
            category_tags: vec![],
            risk_multiple: None,
            mae: None,
            mfe: None,
        }
    }

    #[test]
    fn test_heatmap_cells() {
        // 2024-06-07 금요일
        let fri_9 = Utc.with_ymd_and_hms(2024, 6, 7, 9, 15, 0).unwrap();
        let trades = vec![
            trade("1", fri_9, dec!(100)),
            trade("2", fri_9 + Duration::minutes(20), dec!(-40)),
            trade("3", fri_9 + Duration::days(3), dec!(10)),
        ];
        let cells = time_heatmap(&trades, &TradeFilter::new());

        assert_eq!(cells.len(), 2);
        assert_eq!((cells[0].weekday, cells[0].hour), (1, 9));
        assert_eq!((cells[1].weekday, cells[1].hour), (5, 9));
        assert_eq!(cells[1].net_pnl, dec!(60));
        assert_eq!(cells[1].trade_count, 2);
        assert_eq!(cells[1].win_rate, dec!(0.5));
    }

    #[test]
    fn test_hourly_win_rate_in_timezone() {
        let open = Utc.with_ymd_and_hms(2024, 6, 7, 13, 30, 0).unwrap();
        let filter = TradeFilter::new().with_timezone(Tz::America__New_York);
        let hours = hourly_win_rate(&[trade("1", open, dec!(5))], &filter);

        assert_eq!(hours.len(), 1);
        assert_eq!(hours[0].hour, 9);
        assert_eq!(hours[0].win_rate, dec!(1));
    }
}
