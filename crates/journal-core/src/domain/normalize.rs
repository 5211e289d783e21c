//! 거래 기록 정규화.
//!
//! 원시 기록을 검증하여 [`TradeRecord`]로 변환합니다. 위반 사항은 첫 번째에서
//! 멈추지 않고 모두 수집하여 [`ValidationError`]로 반환합니다.
//!
//! # 규칙
//!
//! - 필수: `id`, `symbol`, `quantity`, `entryPrice`, `timestampOpen`
//! - 모든 숫자는 유한해야 하며 크기가 [`MAX_TRADE_MAGNITUDE`] 이내
//! - `fees >= 0` (없으면 0)
//! - `timestampClose >= timestampOpen`
//! - 청산된 거래는 `exitPrice`, `timestampClose` 필수, `realizedPnl`이 없으면 도출
//!   (도출한 손익이 허용 크기를 넘으면 `realizedPnl` 위반)
//! - 상태가 없으면 청산가와 청산 시각이 모두 있을 때 `closed`, 아니면 `open`
//! - 음수 수량은 크기로 정규화하며 방향이 없으면 매도로 간주

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::pnl::{realized_pnl, within_trade_magnitude, ContractMultipliers, MAX_TRADE_MAGNITUDE};
use super::raw::{RawScalar, RawTags, RawTradeRecord};
use super::trade::{AssetType, Side, TradeRecord, TradeState, TradeStatus};
use crate::error::{FieldViolation, ValidationError};

/// 배치 정규화에서 거부된 기록.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// 입력 배치 내 위치
    pub index: usize,
    /// 검증 에러
    pub error: ValidationError,
}

/// 배치 정규화 결과.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBatch {
    /// 정규화된 거래 (입력 순서 유지)
    pub trades: Vec<TradeRecord>,
    /// 거부된 기록
    pub rejected: Vec<RejectedRecord>,
}

impl NormalizedBatch {
    /// 모든 기록이 통과했는지 확인합니다.
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// 거래 기록 정규화기.
#[derive(Debug, Clone, Default)]
pub struct TradeNormalizer {
    multipliers: ContractMultipliers,
}

impl TradeNormalizer {
    /// 계약 승수 설정으로 정규화기를 생성합니다.
    pub fn new(multipliers: ContractMultipliers) -> Self {
        Self { multipliers }
    }

    /// 계약 승수 설정.
    pub fn multipliers(&self) -> &ContractMultipliers {
        &self.multipliers
    }

    /// 원시 기록 하나를 정규화합니다.
    ///
    /// # 반환값
    ///
    /// 성공 시 정규화된 거래, 실패 시 위반한 모든 필드를 담은 검증 에러
    pub fn normalize(&self, raw: &RawTradeRecord) -> Result<TradeRecord, ValidationError> {
        let mut check = FieldCheck::default();

        let id = check.required_text("id", raw.id.as_ref().and_then(RawScalar::to_text));
        let symbol = check.required_text(
            "symbol",
            raw.symbol
                .as_deref()
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty()),
        );

        let side = check.parse_enum::<Side>("side", raw.side.as_deref());
        let asset_type = check
            .parse_enum::<AssetType>("assetType", raw.asset_type.as_deref())
            .unwrap_or_default();
        let status = check.parse_enum::<TradeStatus>("status", raw.status.as_deref());

        let raw_quantity = check.required_number("quantity", raw.quantity.as_ref());
        let entry_price = check.required_number("entryPrice", raw.entry_price.as_ref());
        let exit_price = check.optional_number("exitPrice", raw.exit_price.as_ref());
        let supplied_pnl = check.optional_number("realizedPnl", raw.realized_pnl.as_ref());
        let risk_multiple = check.optional_number("riskMultiple", raw.risk_multiple.as_ref());
        let mae = check.optional_number("mae", raw.mae.as_ref());
        let mfe = check.optional_number("mfe", raw.mfe.as_ref());

        let fees = check
            .optional_number("fees", raw.fees.as_ref())
            .unwrap_or(Decimal::ZERO);
        if fees < Decimal::ZERO {
            check.violate("fees", "수수료는 음수일 수 없습니다");
        }

        if raw_quantity == Some(Decimal::ZERO) {
            check.violate("quantity", "수량은 0일 수 없습니다");
        }

        let timestamp_open = check.required_timestamp("timestampOpen", raw.timestamp_open.as_ref());
        let timestamp_close =
            check.optional_timestamp("timestampClose", raw.timestamp_close.as_ref());
        if let (Some(open), Some(close)) = (timestamp_open, timestamp_close) {
            if close < open {
                check.violate("timestampClose", "청산 시각이 진입 시각보다 이릅니다");
            }
        }

        // 음수 수량은 방향 정보로 사용
        let side = side.unwrap_or(match raw_quantity {
            Some(q) if q < Decimal::ZERO => Side::Sell,
            _ => Side::Buy,
        });
        let quantity = raw_quantity.map(|q| q.abs());

        let status = status.unwrap_or(match (exit_price, timestamp_close) {
            (Some(_), Some(_)) => TradeStatus::Closed,
            _ => TradeStatus::Open,
        });

        if status == TradeStatus::Closed {
            if exit_price.is_none() {
                check.violate("exitPrice", "청산된 거래에는 청산가가 필요합니다");
            }
            if timestamp_close.is_none() && raw.timestamp_close.is_none() {
                check.violate("timestampClose", "청산된 거래에는 청산 시각이 필요합니다");
            }
        }

        // 미청산 거래는 손익을 도출하지 않음
        let realized = match (supplied_pnl, exit_price, quantity, entry_price) {
            (Some(pnl), ..) => Some(pnl),
            (None, Some(exit), Some(quantity), Some(entry)) if status != TradeStatus::Open => {
                let multiplier = symbol
                    .as_deref()
                    .map(|s| self.multipliers.multiplier_for(asset_type, s))
                    .unwrap_or(Decimal::ONE);
                let derived = realized_pnl(entry, exit, quantity, side, multiplier);
                if derived.is_none() {
                    check.violate("realizedPnl", "도출된 손익이 허용 범위를 벗어났습니다");
                }
                derived
            }
            _ => None,
        };

        let tags = normalize_tags(raw.category_tags.as_ref(), raw.strategies.as_ref());

        let record_id = id.clone();
        if !check.violations.is_empty() {
            debug!(
                record_id = record_id.as_deref().unwrap_or("<unknown>"),
                violations = check.violations.len(),
                "Trade record rejected"
            );
            return Err(ValidationError::new(record_id, check.violations));
        }

        // 위반이 없으면 필수 필드는 모두 존재
        let (Some(id), Some(symbol), Some(quantity), Some(entry_price), Some(timestamp_open)) =
            (id, symbol, quantity, entry_price, timestamp_open)
        else {
            return Err(ValidationError::new(
                record_id,
                vec![FieldViolation::new("record", "필수 필드가 누락되었습니다")],
            ));
        };

        let state = match status {
            TradeStatus::Open => TradeState::Open,
            TradeStatus::Partial => TradeState::Partial {
                timestamp_close,
                exit_price,
                realized_pnl: realized,
            },
            TradeStatus::Closed => match (timestamp_close, exit_price, realized) {
                (Some(timestamp_close), Some(exit_price), Some(realized_pnl)) => TradeState::Closed {
                    timestamp_close,
                    exit_price,
                    realized_pnl,
                },
                _ => {
                    return Err(ValidationError::new(
                        Some(id),
                        vec![FieldViolation::new(
                            "status",
                            "청산 데이터가 없는 청산 거래입니다",
                        )],
                    ))
                }
            },
        };

        Ok(TradeRecord {
            id,
            user_id: non_empty(raw.user_id.as_deref()),
            account_id: non_empty(raw.account_id.as_deref()),
            symbol,
            side,
            asset_type,
            quantity,
            entry_price,
            fees,
            timestamp_open,
            state,
            category_tags: tags,
            risk_multiple,
            mae,
            mfe,
        })
    }

    /// 원시 기록 배치를 정규화합니다.
    ///
    /// 통과한 거래는 입력 순서를 유지하고, 거부된 기록은 위치와 함께 반환합니다.
    /// 거부된 기록을 버릴지 배치 전체를 거부할지는 호출자가 결정합니다.
    pub fn normalize_batch(&self, raws: &[RawTradeRecord]) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();

        for (index, raw) in raws.iter().enumerate() {
            match self.normalize(raw) {
                Ok(trade) => batch.trades.push(trade),
                Err(error) => batch.rejected.push(RejectedRecord { index, error }),
            }
        }

        if !batch.rejected.is_empty() {
            warn!(
                accepted = batch.trades.len(),
                rejected = batch.rejected.len(),
                "Some trade records failed validation"
            );
        }

        batch
    }
}

/// 필드 위반 수집기.
#[derive(Debug, Default)]
struct FieldCheck {
    violations: Vec<FieldViolation>,
}

impl FieldCheck {
    fn violate(&mut self, field: &str, reason: impl Into<String>) {
        self.violations.push(FieldViolation::new(field, reason));
    }

    fn required_text(&mut self, field: &str, value: Option<String>) -> Option<String> {
        if value.is_none() {
            self.violate(field, "필수 필드입니다");
        }
        value
    }

    fn parse_enum<T>(&mut self, field: &str, value: Option<&str>) -> Option<T>
    where
        T: std::str::FromStr<Err = String>,
    {
        let value = value.map(str::trim).filter(|s| !s.is_empty())?;
        match value.parse::<T>() {
            Ok(parsed) => Some(parsed),
            Err(reason) => {
                self.violate(field, reason);
                None
            }
        }
    }

    fn optional_number(&mut self, field: &str, value: Option<&RawScalar>) -> Option<Decimal> {
        match value?.to_decimal() {
            Ok(number) if within_trade_magnitude(number) => Some(number),
            Ok(_) => {
                self.violate(
                    field,
                    format!("크기가 허용 범위(±{})를 벗어났습니다", MAX_TRADE_MAGNITUDE),
                );
                None
            }
            Err(reason) => {
                self.violate(field, reason);
                None
            }
        }
    }

    fn required_number(&mut self, field: &str, value: Option<&RawScalar>) -> Option<Decimal> {
        if value.is_none() {
            self.violate(field, "필수 필드입니다");
            return None;
        }
        self.optional_number(field, value)
    }

    fn optional_timestamp(
        &mut self,
        field: &str,
        value: Option<&RawScalar>,
    ) -> Option<DateTime<Utc>> {
        match value?.to_timestamp() {
            Ok(ts) => Some(ts),
            Err(reason) => {
                self.violate(field, reason);
                None
            }
        }
    }

    fn required_timestamp(
        &mut self,
        field: &str,
        value: Option<&RawScalar>,
    ) -> Option<DateTime<Utc>> {
        if value.is_none() {
            self.violate(field, "필수 필드입니다");
            return None;
        }
        self.optional_timestamp(field, value)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// 태그를 정리합니다.
///
/// 공백을 제거하고 빈 태그를 버리며, 대소문자 구분 없이 중복을 제거합니다.
/// 순서는 처음 등장한 순서를 유지합니다 (태그 다음 전략).
fn normalize_tags(tags: Option<&RawTags>, strategies: Option<&RawTags>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for item in tags
        .into_iter()
        .chain(strategies)
        .flat_map(RawTags::items)
    {
        let tag = item.trim();
        if tag.is_empty() || result.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            continue;
        }
        result.push(tag.to_string());
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn raw_closed() -> RawTradeRecord {
        RawTradeRecord {
            id: Some("t-1".into()),
            symbol: Some(" aapl ".to_string()),
            side: Some("buy".to_string()),
            asset_type: Some("stock".to_string()),
            quantity: Some(RawScalar::Integer(10)),
            entry_price: Some("100".into()),
            exit_price: Some(RawScalar::Float(110.0)),
            fees: Some(RawScalar::Integer(2)),
            status: Some("closed".to_string()),
            timestamp_open: Some("2024-03-01T14:30:00Z".into()),
            timestamp_close: Some("2024-03-01T15:30:00Z".into()),
            category_tags: Some(RawTags::List(vec![
                "Breakout".to_string(),
                "breakout".to_string(),
                " ".to_string(),
                "Gap".to_string(),
            ])),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_derives_realized_pnl() {
        let trade = TradeNormalizer::default().normalize(&raw_closed()).unwrap();

        assert_eq!(trade.id, "t-1");
        assert_eq!(trade.symbol, "AAPL");
        assert_eq!(trade.realized_pnl(), Some(dec!(100)));
        assert_eq!(trade.net_pnl(), Some(dec!(98)));
        assert_eq!(trade.category_tags, vec!["Breakout", "Gap"]);
        assert_eq!(
            trade.timestamp_close(),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 15, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_normalize_trusts_supplied_pnl() {
        let mut raw = raw_closed();
        raw.realized_pnl = Some(RawScalar::Float(-12.5));
        let trade = TradeNormalizer::default().normalize(&raw).unwrap();
        assert_eq!(trade.realized_pnl(), Some(dec!(-12.5)));
    }

    #[test]
    fn test_normalize_option_and_futures_multipliers() {
        let normalizer = TradeNormalizer::default();

        let mut option = raw_closed();
        option.asset_type = Some("options".to_string());
        option.quantity = Some(RawScalar::Integer(2));
        option.entry_price = Some("1.50".into());
        option.exit_price = Some("2.00".into());
        let trade = normalizer.normalize(&option).unwrap();
        assert_eq!(trade.realized_pnl(), Some(dec!(100)));

        let mut future = raw_closed();
        future.symbol = Some("MESZ4".to_string());
        future.asset_type = Some("futures".to_string());
        future.side = Some("sell".to_string());
        future.quantity = Some(RawScalar::Integer(1));
        future.entry_price = Some("5000".into());
        future.exit_price = Some("4990".into());
        let trade = normalizer.normalize(&future).unwrap();
        assert_eq!(trade.realized_pnl(), Some(dec!(50)));
    }

    #[test]
    fn test_normalize_reports_every_violation() {
        let raw = RawTradeRecord {
            id: Some("bad".into()),
            symbol: None,
            quantity: Some(RawScalar::Float(f64::NAN)),
            entry_price: Some("abc".into()),
            fees: Some(RawScalar::Integer(-1)),
            status: Some("closed".to_string()),
            timestamp_open: Some("2024-03-02T00:00:00Z".into()),
            timestamp_close: Some("2024-03-01T00:00:00Z".into()),
            ..Default::default()
        };

        let err = TradeNormalizer::default().normalize(&raw).unwrap_err();
        assert_eq!(err.record_id.as_deref(), Some("bad"));
        for field in [
            "symbol",
            "quantity",
            "entryPrice",
            "fees",
            "timestampClose",
            "exitPrice",
        ] {
            assert!(err.has_field(field), "missing violation for {}", field);
        }
    }

    #[test]
    fn test_closed_without_exit_price_is_rejected() {
        let mut raw = raw_closed();
        raw.exit_price = None;
        let err = TradeNormalizer::default().normalize(&raw).unwrap_err();
        assert_eq!(err.fields(), vec!["exitPrice"]);
    }

    #[test]
    fn test_derived_pnl_overflow_is_a_violation() {
        let mut raw = raw_closed();
        raw.quantity = Some("1000000000000000".into());
        raw.entry_price = Some("1".into());
        raw.exit_price = Some("100000000000001".into());

        let err = TradeNormalizer::default().normalize(&raw).unwrap_err();
        assert_eq!(err.fields(), vec!["realizedPnl"]);

        // 청산가를 알 수 없는 미청산 거래는 손익을 도출하지 않음
        raw.status = Some("open".to_string());
        raw.exit_price = None;
        raw.timestamp_close = None;
        assert!(TradeNormalizer::default().normalize(&raw).is_ok());
    }

    #[test]
    fn test_oversized_numbers_are_rejected() {
        let mut raw = raw_closed();
        raw.entry_price = Some("79228162514264337593543950335".into());
        raw.fees = Some(RawScalar::Float(1e300));
        raw.realized_pnl = Some("-1000000000000001".into());

        let err = TradeNormalizer::default().normalize(&raw).unwrap_err();
        assert!(err.has_field("entryPrice"));
        assert!(err.has_field("fees"));
        assert!(err.has_field("realizedPnl"));
    }

    #[test]
    fn test_status_inference_and_negative_quantity() {
        let mut raw = raw_closed();
        raw.status = None;
        raw.side = None;
        raw.quantity = Some(RawScalar::Integer(-10));
        let trade = TradeNormalizer::default().normalize(&raw).unwrap();
        assert!(trade.is_closed());
        assert_eq!(trade.side, Side::Sell);
        assert_eq!(trade.quantity, dec!(10));
        assert_eq!(trade.realized_pnl(), Some(dec!(-100)));

        raw.exit_price = None;
        let trade = TradeNormalizer::default().normalize(&raw).unwrap();
        assert_eq!(trade.status(), TradeStatus::Open);
    }

    #[test]
    fn test_normalize_batch_keeps_order_and_indices() {
        let mut bad = raw_closed();
        bad.id = None;
        let mut second = raw_closed();
        second.id = Some("t-2".into());

        let batch = TradeNormalizer::default().normalize_batch(&[raw_closed(), bad, second]);
        assert!(!batch.is_clean());
        assert_eq!(batch.trades.len(), 2);
        assert_eq!(batch.trades[1].id, "t-2");
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].index, 1);
        assert!(batch.rejected[0].error.has_field("id"));
    }
}
