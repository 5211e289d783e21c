//! 정규화된 거래 기록.
//!
//! 모든 집계는 이 모듈의 [`TradeRecord`]만을 입력으로 받습니다.
//! 거래 상태는 태그된 variant([`TradeState`])로 표현되어
//! 청산된 거래는 청산 시각, 청산가, 실현 손익을 항상 가집니다.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::pnl::net_pnl;

/// 자산 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetType {
    /// 주식/ETF
    #[serde(rename = "stock", alias = "stocks", alias = "equity")]
    Stock,
    /// 옵션
    #[serde(rename = "option", alias = "options")]
    Options,
    /// 선물
    #[serde(rename = "futures", alias = "future")]
    Futures,
    /// 암호화폐
    #[serde(rename = "crypto", alias = "cryptocurrency")]
    Crypto,
}

impl AssetType {
    /// 모든 자산 유형.
    pub const ALL: [AssetType; 4] = [
        AssetType::Stock,
        AssetType::Options,
        AssetType::Futures,
        AssetType::Crypto,
    ];

    /// 외부 계약에서 사용하는 키.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Stock => "stock",
            AssetType::Options => "option",
            AssetType::Futures => "futures",
            AssetType::Crypto => "crypto",
        }
    }

    /// 표시 이름.
    pub fn label(&self) -> &'static str {
        match self {
            AssetType::Stock => "Stock",
            AssetType::Options => "Option",
            AssetType::Futures => "Futures",
            AssetType::Crypto => "Crypto",
        }
    }
}

impl Default for AssetType {
    fn default() -> Self {
        Self::Stock
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stock" | "stocks" | "equity" | "etf" => Ok(Self::Stock),
            "option" | "options" => Ok(Self::Options),
            "future" | "futures" => Ok(Self::Futures),
            "crypto" | "cryptocurrency" => Ok(Self::Crypto),
            _ => Err(format!("Unknown asset type: {}", s)),
        }
    }
}

/// 매매 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// 매수 (롱)
    Buy,
    /// 매도 (숏)
    Sell,
}

impl Side {
    /// 손익 계산용 방향 계수 (매수 +1, 매도 -1).
    pub fn direction(&self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => Decimal::NEGATIVE_ONE,
        }
    }

    /// 외부 계약에서 사용하는 키.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl Default for Side {
    fn default() -> Self {
        Self::Buy
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "long" | "b" => Ok(Self::Buy),
            "sell" | "short" | "s" => Ok(Self::Sell),
            _ => Err(format!("Unknown side: {}", s)),
        }
    }
}

/// 거래 상태 종류 (상태별 데이터 없이).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    /// 미청산
    Open,
    /// 청산 완료
    Closed,
    /// 부분 청산
    Partial,
}

impl FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" | "close" => Ok(Self::Closed),
            "partial" | "partially_closed" => Ok(Self::Partial),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// 상태별 데이터를 담는 거래 상태.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum TradeState {
    /// 미청산 포지션
    Open,
    /// 부분 청산 (일부 손익만 확정)
    Partial {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp_close: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_price: Option<Decimal>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        realized_pnl: Option<Decimal>,
    },
    /// 청산 완료
    Closed {
        timestamp_close: DateTime<Utc>,
        exit_price: Decimal,
        realized_pnl: Decimal,
    },
}

impl TradeState {
    /// 상태 종류.
    pub fn status(&self) -> TradeStatus {
        match self {
            TradeState::Open => TradeStatus::Open,
            TradeState::Partial { .. } => TradeStatus::Partial,
            TradeState::Closed { .. } => TradeStatus::Closed,
        }
    }
}

/// 정규화된 거래 기록.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    /// 거래 고유 ID
    pub id: String,
    /// 소유 사용자 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// 계좌 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    /// 종목 심볼 (대문자)
    pub symbol: String,
    /// 매매 방향
    pub side: Side,
    /// 자산 유형
    pub asset_type: AssetType,
    /// 수량 (항상 0 이상, 방향은 side가 표현)
    pub quantity: Decimal,
    /// 진입가
    pub entry_price: Decimal,
    /// 수수료 합계 (0 이상)
    pub fees: Decimal,
    /// 진입 시각
    pub timestamp_open: DateTime<Utc>,
    /// 상태 및 상태별 데이터
    #[serde(flatten)]
    pub state: TradeState,
    /// 분류 태그 (전략, 셋업 등)
    #[serde(default)]
    pub category_tags: Vec<String>,
    /// R 배수
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_multiple: Option<Decimal>,
    /// 최대 역행폭
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mae: Option<Decimal>,
    /// 최대 순행폭
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfe: Option<Decimal>,
}

impl TradeRecord {
    /// 상태 종류.
    pub fn status(&self) -> TradeStatus {
        self.state.status()
    }

    /// 청산 완료 여부.
    pub fn is_closed(&self) -> bool {
        matches!(self.state, TradeState::Closed { .. })
    }

    /// 청산 시각 (부분 청산 포함).
    pub fn timestamp_close(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            TradeState::Open => None,
            TradeState::Partial {
                timestamp_close, ..
            } => *timestamp_close,
            TradeState::Closed {
                timestamp_close, ..
            } => Some(*timestamp_close),
        }
    }

    /// 청산가.
    pub fn exit_price(&self) -> Option<Decimal> {
        match &self.state {
            TradeState::Open => None,
            TradeState::Partial { exit_price, .. } => *exit_price,
            TradeState::Closed { exit_price, .. } => Some(*exit_price),
        }
    }

    /// 실현 손익 (수수료 차감 전).
    pub fn realized_pnl(&self) -> Option<Decimal> {
        match &self.state {
            TradeState::Open => None,
            TradeState::Partial { realized_pnl, .. } => *realized_pnl,
            TradeState::Closed { realized_pnl, .. } => Some(*realized_pnl),
        }
    }

    /// 순손익 (실현 손익 - 수수료).
    pub fn net_pnl(&self) -> Option<Decimal> {
        self.realized_pnl().map(|pnl| net_pnl(pnl, self.fees))
    }

    /// 필터와 기간 집계에 사용하는 기준 시각.
    ///
    /// 청산 시각이 있으면 청산 시각, 없으면 진입 시각입니다.
    pub fn effective_time(&self) -> DateTime<Utc> {
        self.timestamp_close().unwrap_or(self.timestamp_open)
    }

    /// 보유 기간.
    pub fn holding_duration(&self) -> Option<Duration> {
        self.timestamp_close()
            .map(|close| close.signed_duration_since(self.timestamp_open))
    }

    /// 보유 시간 (시간 단위).
    pub fn holding_hours(&self) -> Option<Decimal> {
        self.holding_duration()
            .map(|d| Decimal::from(d.num_seconds()) / Decimal::from(3600))
    }

    /// 첫 번째 분류 태그.
    pub fn primary_tag(&self) -> Option<&str> {
        self.category_tags.first().map(String::as_str)
    }

    /// 대소문자 구분 없이 태그 보유 여부를 확인합니다.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.category_tags
            .iter()
            .any(|t| t.eq_ignore_ascii_case(tag.trim()))
    }

    /// 청산된 거래 뷰를 반환합니다.
    pub fn as_closed(&self) -> Option<ClosedTrade<'_>> {
        match &self.state {
            TradeState::Closed {
                timestamp_close,
                exit_price,
                realized_pnl,
            } => Some(ClosedTrade {
                record: self,
                closed_at: *timestamp_close,
                exit_price: *exit_price,
                realized_pnl: *realized_pnl,
                net_pnl: net_pnl(*realized_pnl, self.fees),
            }),
            _ => None,
        }
    }
}

/// 청산된 거래의 읽기 전용 뷰.
///
/// 상태 분기 없이 청산 데이터에 바로 접근하기 위해 사용합니다.
#[derive(Debug, Clone, Copy)]
pub struct ClosedTrade<'a> {
    /// 원본 거래 기록
    pub record: &'a TradeRecord,
    /// 청산 시각
    pub closed_at: DateTime<Utc>,
    /// 청산가
    pub exit_price: Decimal,
    /// 실현 손익
    pub realized_pnl: Decimal,
    /// 순손익
    pub net_pnl: Decimal,
}

impl<'a> ClosedTrade<'a> {
    /// 거래 ID.
    pub fn id(&self) -> &'a str {
        &self.record.id
    }

    /// 수수료.
    pub fn fees(&self) -> Decimal {
        self.record.fees
    }

    /// 수익 거래 여부 (순손익 > 0).
    pub fn is_win(&self) -> bool {
        self.net_pnl > Decimal::ZERO
    }

    /// 손실 거래 여부 (순손익 < 0).
    pub fn is_loss(&self) -> bool {
        self.net_pnl < Decimal::ZERO
    }
}

/// 청산된 거래만 골라 청산 시각 오름차순으로 정렬합니다.
///
/// 같은 시각은 ID 오름차순으로 정렬되므로 입력 순서와 무관하게 결과가 같습니다.
pub fn sorted_closed_trades(trades: &[TradeRecord]) -> Vec<ClosedTrade<'_>> {
    let mut closed: Vec<ClosedTrade<'_>> = trades.iter().filter_map(TradeRecord::as_closed).collect();
    closed.sort_by(|a, b| {
        a.closed_at
            .cmp(&b.closed_at)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    closed
}
