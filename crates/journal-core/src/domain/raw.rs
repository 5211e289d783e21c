//! 저장소/가져오기에서 받은 느슨한 타입의 원시 거래 기록.
//!
//! 숫자는 JSON 숫자 또는 숫자 문자열, 시각은 RFC 3339 문자열, 날짜 문자열,
//! epoch 밀리초 중 어느 형태로든 들어올 수 있습니다. 필드명은 camelCase가 기본이며
//! 백엔드의 snake_case 별칭도 받아들입니다.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 문자열/정수/실수/불리언 중 하나인 원시 스칼라 값.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawScalar {
    /// 정수
    Integer(i64),
    /// 실수
    Float(f64),
    /// 문자열
    Text(String),
    /// 불리언
    Bool(bool),
}

impl From<&str> for RawScalar {
    fn from(value: &str) -> Self {
        RawScalar::Text(value.to_string())
    }
}

impl From<i64> for RawScalar {
    fn from(value: i64) -> Self {
        RawScalar::Integer(value)
    }
}

impl From<f64> for RawScalar {
    fn from(value: f64) -> Self {
        RawScalar::Float(value)
    }
}

impl RawScalar {
    /// 유한한 십진수로 변환합니다.
    ///
    /// NaN, 무한대, 숫자가 아닌 문자열은 거부합니다.
    pub fn to_decimal(&self) -> Result<Decimal, String> {
        match self {
            RawScalar::Integer(v) => Ok(Decimal::from(*v)),
            RawScalar::Float(v) => {
                if !v.is_finite() {
                    return Err(format!("유한한 숫자가 아닙니다: {}", v));
                }
                Decimal::from_str(&v.to_string())
                    .ok()
                    .or_else(|| Decimal::from_f64(*v))
                    .ok_or_else(|| format!("십진수로 표현할 수 없습니다: {}", v))
            }
            RawScalar::Text(s) => {
                let trimmed = s.trim();
                Decimal::from_str(trimmed)
                    .or_else(|_| Decimal::from_scientific(trimmed))
                    .map_err(|_| format!("숫자가 아닙니다: {:?}", s))
            }
            RawScalar::Bool(_) => Err("불리언은 숫자로 사용할 수 없습니다".to_string()),
        }
    }

    /// 식별자/텍스트로 변환합니다.
    pub fn to_text(&self) -> Option<String> {
        let text = match self {
            RawScalar::Integer(v) => v.to_string(),
            RawScalar::Float(v) if v.is_finite() => v.to_string(),
            RawScalar::Float(_) => return None,
            RawScalar::Text(s) => s.trim().to_string(),
            RawScalar::Bool(_) => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    /// UTC 시각으로 변환합니다.
    ///
    /// 지원 형식:
    /// - RFC 3339 (`2024-03-01T09:30:00Z`, `2024-03-01T09:30:00+09:00`)
    /// - 시간대 없는 일시 (`2024-03-01 09:30:00`, `2024-03-01T09:30:00`) → UTC로 간주
    /// - 날짜 (`2024-03-01`) → UTC 자정
    /// - 정수 → epoch 밀리초
    pub fn to_timestamp(&self) -> Result<DateTime<Utc>, String> {
        match self {
            RawScalar::Integer(ms) => Utc
                .timestamp_millis_opt(*ms)
                .single()
                .ok_or_else(|| format!("범위를 벗어난 epoch 밀리초: {}", ms)),
            RawScalar::Text(s) => parse_timestamp_text(s.trim()),
            RawScalar::Float(_) | RawScalar::Bool(_) => {
                Err("시각은 문자열 또는 epoch 밀리초여야 합니다".to_string())
            }
        }
    }
}

fn parse_timestamp_text(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(format!("시각 형식을 해석할 수 없습니다: {:?}", s))
}

/// 태그 목록 또는 쉼표로 구분된 문자열.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTags {
    /// 목록
    List(Vec<String>),
    /// 쉼표 구분 문자열
    Text(String),
}

impl RawTags {
    /// 개별 태그로 분리합니다 (정리 전).
    pub fn items(&self) -> Vec<&str> {
        match self {
            RawTags::List(items) => items.iter().map(String::as_str).collect(),
            RawTags::Text(text) => text.split(',').collect(),
        }
    }
}

/// 원시 거래 기록.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTradeRecord {
    #[serde(alias = "trade_id", alias = "tradeId")]
    pub id: Option<RawScalar>,
    #[serde(alias = "user_id")]
    pub user_id: Option<String>,
    #[serde(alias = "account_id", alias = "account")]
    pub account_id: Option<String>,
    #[serde(alias = "ticker")]
    pub symbol: Option<String>,
    #[serde(alias = "direction", alias = "trade_type")]
    pub side: Option<String>,
    #[serde(alias = "asset_type", alias = "assetClass", alias = "asset_class")]
    pub asset_type: Option<String>,
    #[serde(alias = "qty", alias = "shares", alias = "contracts")]
    pub quantity: Option<RawScalar>,
    #[serde(alias = "entry_price")]
    pub entry_price: Option<RawScalar>,
    #[serde(alias = "exit_price")]
    pub exit_price: Option<RawScalar>,
    #[serde(alias = "commission", alias = "commissions")]
    pub fees: Option<RawScalar>,
    #[serde(alias = "realized_pnl", alias = "pnl")]
    pub realized_pnl: Option<RawScalar>,
    pub status: Option<String>,
    #[serde(alias = "timestamp_open", alias = "entry_date", alias = "entryDate", alias = "entry_time")]
    pub timestamp_open: Option<RawScalar>,
    #[serde(alias = "timestamp_close", alias = "exit_date", alias = "exitDate", alias = "exit_time")]
    pub timestamp_close: Option<RawScalar>,
    #[serde(alias = "tags", alias = "category_tags")]
    pub category_tags: Option<RawTags>,
    #[serde(alias = "strategy")]
    pub strategies: Option<RawTags>,
    #[serde(alias = "risk_multiple", alias = "r_multiple", alias = "rMultiple")]
    pub risk_multiple: Option<RawScalar>,
    pub mae: Option<RawScalar>,
    pub mfe: Option<RawScalar>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scalar_to_decimal() {
        assert_eq!(RawScalar::Integer(5).to_decimal().unwrap(), dec!(5));
        assert_eq!(RawScalar::Float(0.1).to_decimal().unwrap(), dec!(0.1));
        assert_eq!(RawScalar::from(" 12.50 ").to_decimal().unwrap(), dec!(12.50));
        assert!(RawScalar::Float(f64::NAN).to_decimal().is_err());
        assert!(RawScalar::Float(f64::INFINITY).to_decimal().is_err());
        assert!(RawScalar::from("NaN").to_decimal().is_err());
        assert!(RawScalar::from("abc").to_decimal().is_err());
        assert!(RawScalar::Bool(true).to_decimal().is_err());
    }

    #[test]
    fn test_scalar_to_timestamp() {
        let rfc = RawScalar::from("2024-03-01T09:30:00+09:00").to_timestamp().unwrap();
        assert_eq!(rfc, Utc.with_ymd_and_hms(2024, 3, 1, 0, 30, 0).unwrap());

        let naive = RawScalar::from("2024-03-01 09:30:00").to_timestamp().unwrap();
        assert_eq!(naive, Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap());

        let date = RawScalar::from("2024-03-01").to_timestamp().unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());

        let millis = RawScalar::Integer(1_709_251_200_000).to_timestamp().unwrap();
        assert_eq!(millis, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());

        assert!(RawScalar::from("yesterday").to_timestamp().is_err());
    }

    #[test]
    fn test_raw_record_accepts_snake_case_aliases() {
        let raw: RawTradeRecord = serde_json::from_value(serde_json::json!({
            "trade_id": 42,
            "ticker": "aapl",
            "trade_type": "long",
            "asset_type": "stocks",
            "qty": "10",
            "entry_price": 100.5,
            "pnl": "25",
            "commission": 1,
            "entry_date": "2024-03-01",
            "tags": "breakout, momentum"
        }))
        .unwrap();

        assert_eq!(raw.id, Some(RawScalar::Integer(42)));
        assert_eq!(raw.symbol.as_deref(), Some("aapl"));
        assert_eq!(raw.side.as_deref(), Some("long"));
        assert_eq!(raw.quantity, Some(RawScalar::from("10")));
        assert_eq!(
            raw.category_tags.as_ref().map(|t| t.items().len()),
            Some(2)
        );
    }
}
