//! 손익 계산 공통 로직.
//!
//! 정규화 단계에서 실현 손익이 없을 때 자산 유형별 계약 승수를 적용하여
//! 손익을 도출합니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::trade::{AssetType, Side};

/// 자산 유형별 계약 승수 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractMultipliers {
    /// 옵션 1계약당 기초자산 수량
    pub option_multiplier: Decimal,
    /// 선물 루트 심볼별 포인트 가치 (예: ES → 50)
    pub futures_point_values: BTreeMap<String, Decimal>,
}

impl Default for ContractMultipliers {
    fn default() -> Self {
        let futures_point_values = [
            ("ES", dec!(50)),
            ("MES", dec!(5)),
            ("NQ", dec!(20)),
            ("MNQ", dec!(2)),
            ("YM", dec!(5)),
            ("MYM", dec!(0.5)),
            ("RTY", dec!(50)),
            ("M2K", dec!(5)),
            ("CL", dec!(1000)),
            ("GC", dec!(100)),
            ("SI", dec!(5000)),
            ("ZB", dec!(1000)),
        ]
        .into_iter()
        .map(|(root, value)| (root.to_string(), value))
        .collect();

        Self {
            option_multiplier: dec!(100),
            futures_point_values,
        }
    }
}

impl ContractMultipliers {
    /// 선물 루트 키를 대문자로 정규화한 설정을 반환합니다.
    pub fn with_uppercase_roots(mut self) -> Self {
        self.futures_point_values = self
            .futures_point_values
            .into_iter()
            .map(|(root, value)| (root.trim().to_uppercase(), value))
            .collect();
        self
    }

    /// 자산 유형과 심볼에 맞는 승수를 반환합니다.
    ///
    /// 주식과 암호화폐는 1, 옵션은 설정된 계약 승수, 선물은 루트 심볼의
    /// 포인트 가치입니다. 알 수 없는 선물 루트는 1을 사용합니다.
    pub fn multiplier_for(&self, asset_type: AssetType, symbol: &str) -> Decimal {
        match asset_type {
            AssetType::Stock | AssetType::Crypto => Decimal::ONE,
            AssetType::Options => self.option_multiplier,
            AssetType::Futures => self
                .futures_root(symbol)
                .and_then(|root| self.futures_point_values.get(root))
                .copied()
                .unwrap_or(Decimal::ONE),
        }
    }

    /// 선물 심볼에 해당하는 루트 심볼을 찾습니다.
    ///
    /// 테이블에 등록된 루트 중 심볼의 접두어와 일치하는 가장 긴 루트를 사용합니다
    /// (예: "MESZ4" → "MES", "ESH25" → "ES", "M2KU4" → "M2K").
    pub fn futures_root<'a>(&'a self, symbol: &str) -> Option<&'a str> {
        let symbol = symbol.trim().to_uppercase();
        self.futures_point_values
            .keys()
            .filter(|root| symbol.starts_with(root.as_str()))
            .max_by_key(|root| root.len())
            .map(String::as_str)
    }
}

/// 거래 한 건에서 허용하는 숫자 필드와 손익의 최대 크기 (10^15).
///
/// 정규화된 거래는 모두 이 범위 안에 있으므로 거래 수가 메모리에 담을 수 있는
/// 규모인 한 누적 합계는 `Decimal` 범위를 넘지 않습니다.
pub const MAX_TRADE_MAGNITUDE: Decimal = dec!(1000000000000000);

/// 값이 [`MAX_TRADE_MAGNITUDE`] 이내인지 확인합니다.
pub fn within_trade_magnitude(value: Decimal) -> bool {
    value.abs() <= MAX_TRADE_MAGNITUDE
}

/// 실현 손익 계산.
///
/// `방향 × (청산가 - 진입가) × 수량 × 승수`
///
/// 계산 중 `Decimal` 범위를 넘거나 결과가 [`MAX_TRADE_MAGNITUDE`]를 넘으면 `None`을
/// 반환합니다.
///
/// # 매개변수
///
/// * `entry_price` - 진입가
/// * `exit_price` - 청산가
/// * `quantity` - 수량 (0 이상)
/// * `side` - 매매 방향
/// * `multiplier` - 계약 승수
pub fn realized_pnl(
    entry_price: Decimal,
    exit_price: Decimal,
    quantity: Decimal,
    side: Side,
    multiplier: Decimal,
) -> Option<Decimal> {
    exit_price
        .checked_sub(entry_price)?
        .checked_mul(quantity)?
        .checked_mul(multiplier)?
        .checked_mul(side.direction())
        .filter(|pnl| within_trade_magnitude(*pnl))
}

/// 순손익 계산 (실현 손익 - 수수료).
pub fn net_pnl(gross: Decimal, fees: Decimal) -> Decimal {
    gross - fees
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realized_pnl_long_and_short() {
        assert_eq!(
            realized_pnl(dec!(100), dec!(110), dec!(10), Side::Buy, Decimal::ONE),
            Some(dec!(100))
        );
        assert_eq!(
            realized_pnl(dec!(100), dec!(110), dec!(10), Side::Sell, Decimal::ONE),
            Some(dec!(-100))
        );
    }

    #[test]
    fn test_realized_pnl_out_of_range() {
        // Decimal 범위 초과
        assert_eq!(
            realized_pnl(
                dec!(1),
                dec!(100000000000001),
                dec!(1000000000000000),
                Side::Buy,
                Decimal::ONE
            ),
            None
        );
        // 계산은 가능하지만 거래당 허용 크기 초과
        assert_eq!(
            realized_pnl(dec!(0), dec!(1000000), dec!(1000000), Side::Sell, dec!(5000)),
            None
        );
        assert_eq!(
            realized_pnl(dec!(0), dec!(1000), dec!(1000000000000), Side::Buy, Decimal::ONE),
            Some(MAX_TRADE_MAGNITUDE)
        );
    }

    #[test]
    fn test_multiplier_by_asset_type() {
        let m = ContractMultipliers::default();
        assert_eq!(m.multiplier_for(AssetType::Stock, "AAPL"), dec!(1));
        assert_eq!(m.multiplier_for(AssetType::Crypto, "BTC"), dec!(1));
        assert_eq!(m.multiplier_for(AssetType::Options, "AAPL240621C200"), dec!(100));
        assert_eq!(m.multiplier_for(AssetType::Futures, "MES"), dec!(5));
        assert_eq!(m.multiplier_for(AssetType::Futures, "mym2024"), dec!(0.5));
        assert_eq!(m.multiplier_for(AssetType::Futures, "XYZ"), dec!(1));
    }

    #[test]
    fn test_futures_root_prefers_longest_prefix() {
        let m = ContractMultipliers::default();
        assert_eq!(m.futures_root("MESZ4"), Some("MES"));
        assert_eq!(m.futures_root("ESH25"), Some("ES"));
        assert_eq!(m.futures_root("m2ku4"), Some("M2K"));
        assert_eq!(m.futures_root("cl2412"), Some("CL"));
        assert_eq!(m.futures_root("6E"), None);
    }

    #[test]
    fn test_net_pnl() {
        assert_eq!(net_pnl(dec!(50), dec!(1.25)), dec!(48.75));
    }
}
