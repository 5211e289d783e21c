//! 분포 구간(Distribution Binner) 모듈
//!
//! R-배수, MAE/MFE, 순손익, 보유 시간 같은 거래 속성을 정렬된 구간에 나누어
//! 거래 수를 셉니다.
//!
//! # 구간 규칙
//!
//! - 마지막을 제외한 구간은 `[lo, hi)` 반열림 구간
//! - 마지막 구간은 `[lo, hi]` 닫힌 구간 또는 위로 무한
//! - 첫 구간만 하한을, 마지막 구간만 상한을 생략할 수 있음
//! - 인접 구간은 빈틈과 겹침 없이 이어져야 함
//!
//! 규칙을 어긴 설정은 계산 전에 [`JournalError::InvalidConfiguration`]으로 거부됩니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use journal_core::{JournalError, JournalResult, TradeRecord};

/// 분포를 계산할 거래 속성
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DistributionAttribute {
    /// R-배수
    RiskMultiple,
    /// 최대 역행폭
    Mae,
    /// 최대 순행폭
    Mfe,
    /// 순손익 (청산 거래)
    NetPnl,
    /// 보유 시간 (시간 단위, 청산 거래)
    HoldingHours,
}

impl DistributionAttribute {
    /// 거래의 속성 값. 값이 없으면 None.
    pub fn value(&self, trade: &TradeRecord) -> Option<Decimal> {
        match self {
            DistributionAttribute::RiskMultiple => trade.risk_multiple,
            DistributionAttribute::Mae => trade.mae,
            DistributionAttribute::Mfe => trade.mfe,
            DistributionAttribute::NetPnl => trade.as_closed().map(|c| c.net_pnl),
            DistributionAttribute::HoldingHours => {
                if trade.is_closed() {
                    trade.holding_hours()
                } else {
                    None
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionAttribute::RiskMultiple => "riskMultiple",
            DistributionAttribute::Mae => "mae",
            DistributionAttribute::Mfe => "mfe",
            DistributionAttribute::NetPnl => "netPnl",
            DistributionAttribute::HoldingHours => "holdingHours",
        }
    }

    /// 속성에 어울리는 기본 구간 설정.
    ///
    /// MAE/MFE는 R-배수와 같은 단위로 기록된다고 보고 R-배수 구간을 사용합니다.
    pub fn default_bins(&self) -> BinSpec {
        match self {
            DistributionAttribute::RiskMultiple
            | DistributionAttribute::Mae
            | DistributionAttribute::Mfe => BinSpec::r_multiple(),
            DistributionAttribute::NetPnl => BinSpec::outcome(),
            DistributionAttribute::HoldingHours => BinSpec::holding_time(),
        }
    }
}

impl fmt::Display for DistributionAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistributionAttribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "riskmultiple" | "rmultiple" | "r" => Ok(Self::RiskMultiple),
            "mae" => Ok(Self::Mae),
            "mfe" => Ok(Self::Mfe),
            "netpnl" | "pnl" | "outcome" => Ok(Self::NetPnl),
            "holdinghours" | "holding" | "holdingtime" => Ok(Self::HoldingHours),
            _ => Err(format!("Unknown distribution attribute: {}", s)),
        }
    }
}

/// 단일 구간
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinRange {
    /// 하한 (포함). 첫 구간에서만 생략 가능
    #[serde(default)]
    pub lo: Option<Decimal>,
    /// 상한. 마지막 구간에서만 생략 가능
    #[serde(default)]
    pub hi: Option<Decimal>,
    /// 표시 이름 (없으면 경계값으로 생성)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl BinRange {
    /// `[lo, hi)` 구간
    pub fn new(lo: Decimal, hi: Decimal) -> Self {
        Self {
            lo: Some(lo),
            hi: Some(hi),
            label: None,
        }
    }

    /// 하한 없는 첫 구간 `(-∞, hi)`
    pub fn below(hi: Decimal) -> Self {
        Self {
            lo: None,
            hi: Some(hi),
            label: None,
        }
    }

    /// 상한 없는 마지막 구간 `[lo, ∞)`
    pub fn at_least(lo: Decimal) -> Self {
        Self {
            lo: Some(lo),
            hi: None,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn display_label(&self, is_last: bool) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        match (self.lo, self.hi) {
            (None, Some(hi)) => format!("< {}", hi.normalize()),
            (Some(lo), None) => format!(">= {}", lo.normalize()),
            (Some(lo), Some(hi)) if is_last => format!("[{}, {}]", lo.normalize(), hi.normalize()),
            (Some(lo), Some(hi)) => format!("[{}, {})", lo.normalize(), hi.normalize()),
            (None, None) => "all".to_string(),
        }
    }
}

/// 검증된 구간 목록
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinSpec {
    ranges: Vec<BinRange>,
}

impl BinSpec {
    /// 구간 목록을 검증하여 생성합니다.
    ///
    /// # 에러
    ///
    /// 비어 있거나, 경계가 누락/역전되었거나, 인접 구간이 이어지지 않으면
    /// `JournalError::InvalidConfiguration`을 반환합니다.
    pub fn new(ranges: Vec<BinRange>) -> JournalResult<Self> {
        if ranges.is_empty() {
            return Err(JournalError::InvalidConfiguration(
                "구간이 하나 이상 필요합니다".to_string(),
            ));
        }

        let last = ranges.len() - 1;
        for (i, range) in ranges.iter().enumerate() {
            if range.lo.is_none() && i != 0 {
                return Err(JournalError::InvalidConfiguration(format!(
                    "{}번째 구간의 하한이 없습니다 (첫 구간만 생략 가능)",
                    i + 1
                )));
            }
            if range.hi.is_none() && i != last {
                return Err(JournalError::InvalidConfiguration(format!(
                    "{}번째 구간의 상한이 없습니다 (마지막 구간만 생략 가능)",
                    i + 1
                )));
            }
            if range.lo.is_none() && range.hi.is_none() {
                return Err(JournalError::InvalidConfiguration(
                    "구간에 하한 또는 상한이 필요합니다".to_string(),
                ));
            }
            if let (Some(lo), Some(hi)) = (range.lo, range.hi) {
                if lo >= hi {
                    return Err(JournalError::InvalidConfiguration(format!(
                        "{}번째 구간의 하한({})이 상한({})보다 작지 않습니다",
                        i + 1,
                        lo,
                        hi
                    )));
                }
            }
        }

        for (i, pair) in ranges.windows(2).enumerate() {
            if pair[0].hi != pair[1].lo {
                return Err(JournalError::InvalidConfiguration(format!(
                    "{}번째와 {}번째 구간이 이어지지 않습니다 (겹침 또는 빈틈)",
                    i + 1,
                    i + 2
                )));
            }
        }

        Ok(Self { ranges })
    }

    /// 경계값 목록으로 `(-∞, e0), [e0, e1), ..., [en, ∞)` 구간을 생성합니다.
    pub fn from_edges(edges: &[Decimal]) -> JournalResult<Self> {
        let Some((first, rest)) = edges.split_first() else {
            return Err(JournalError::InvalidConfiguration(
                "경계값이 하나 이상 필요합니다".to_string(),
            ));
        };

        let mut ranges = vec![BinRange::below(*first)];
        let mut lo = *first;
        for hi in rest {
            ranges.push(BinRange::new(lo, *hi));
            lo = *hi;
        }
        ranges.push(BinRange::at_least(lo));

        Self::new(ranges)
    }

    /// R-배수 기본 구간: `<-2R`, `-2R to -1R`, ..., `2R to 3R`, `≥3R`
    pub fn r_multiple() -> Self {
        Self {
            ranges: vec![
                BinRange::below(dec!(-2)).with_label("<-2R"),
                BinRange::new(dec!(-2), dec!(-1)).with_label("-2R to -1R"),
                BinRange::new(dec!(-1), dec!(0)).with_label("-1R to 0R"),
                BinRange::new(dec!(0), dec!(1)).with_label("0R to 1R"),
                BinRange::new(dec!(1), dec!(2)).with_label("1R to 2R"),
                BinRange::new(dec!(2), dec!(3)).with_label("2R to 3R"),
                BinRange::at_least(dec!(3)).with_label("≥3R"),
            ],
        }
    }

    /// 거래 결과(순손익) 기본 구간
    pub fn outcome() -> Self {
        Self {
            ranges: vec![
                BinRange::below(dec!(-200)).with_label("<$-200"),
                BinRange::new(dec!(-200), dec!(-50)).with_label("$-200 to $-50"),
                BinRange::new(dec!(-50), dec!(0)).with_label("$-50 to $0"),
                BinRange::new(dec!(0), dec!(50)).with_label("$0 to $50"),
                BinRange::new(dec!(50), dec!(200)).with_label("$50 to $200"),
                BinRange::at_least(dec!(200)).with_label(">$200"),
            ],
        }
    }

    /// 보유 시간 기본 구간 (시간 단위)
    pub fn holding_time() -> Self {
        Self {
            ranges: vec![
                BinRange::new(dec!(0), dec!(1)).with_label("0-1h"),
                BinRange::new(dec!(1), dec!(4)).with_label("1-4h"),
                BinRange::new(dec!(4), dec!(24)).with_label("4-24h"),
                BinRange::new(dec!(24), dec!(72)).with_label("1-3d"),
                BinRange::new(dec!(72), dec!(168)).with_label("3-7d"),
                BinRange::at_least(dec!(168)).with_label("7d+"),
            ],
        }
    }

    pub fn ranges(&self) -> &[BinRange] {
        &self.ranges
    }

    /// 값이 속한 구간 인덱스. 어느 구간에도 속하지 않으면 None.
    pub fn locate(&self, value: Decimal) -> Option<usize> {
        let last = self.ranges.len() - 1;
        self.ranges.iter().enumerate().position(|(i, range)| {
            let above_lo = range.lo.map_or(true, |lo| value >= lo);
            let below_hi = match range.hi {
                None => true,
                Some(hi) if i == last => value <= hi,
                Some(hi) => value < hi,
            };
            above_lo && below_hi
        })
    }
}

/// 분포 구간 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionBin {
    /// 구간 표시 이름
    pub range: String,
    pub count: usize,
}

/// 분포 계산 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub attribute: DistributionAttribute,
    /// 구간 순서대로의 거래 수
    pub bins: Vec<DistributionBin>,
    /// 속성 값이 없어 제외된 거래 수
    pub excluded_missing: usize,
    /// 값은 있으나 어느 구간에도 속하지 않은 거래 수
    pub out_of_range: usize,
}

/// 거래 속성의 분포를 계산합니다.
///
/// 값이 있는 거래는 정확히 하나의 구간에 들어가거나 `out_of_range`로 집계되며,
/// 값이 없는 거래는 `excluded_missing`으로 따로 집계됩니다.
pub fn bin(trades: &[TradeRecord], attribute: DistributionAttribute, spec: &BinSpec) -> Distribution {
    let mut counts = vec![0usize; spec.ranges.len()];
    let mut excluded_missing = 0;
    let mut out_of_range = 0;

    for trade in trades {
        match attribute.value(trade) {
            None => excluded_missing += 1,
            Some(value) => match spec.locate(value) {
                Some(index) => counts[index] += 1,
                None => out_of_range += 1,
            },
        }
    }

    let last = spec.ranges.len() - 1;
    let bins = spec
        .ranges
        .iter()
        .zip(counts)
        .enumerate()
        .map(|(i, (range, count))| DistributionBin {
            range: range.display_label(i == last),
            count,
        })
        .collect();

    if excluded_missing > 0 || out_of_range > 0 {
        tracing::debug!(
            attribute = %attribute,
            excluded_missing,
            out_of_range,
            "Trades excluded from distribution"
        );
    }

    Distribution {
        attribute,
        bins,
        excluded_missing,
        out_of_range,
    }
}
