//! 분석 필터.
//!
//! 모든 집계 호출에 명시적으로 전달되는 불변 필터 설정입니다.
//! 전역 필터 상태는 두지 않습니다.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::trade::{AssetType, TradeRecord};
use crate::error::{JournalError, JournalResult};

/// 빈 날짜/기간 채우기 구간의 최대 길이 (일, 약 10년)
pub const MAX_FILL_DAYS: i64 = 3660;

/// 기간 프리셋.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodPreset {
    /// 연초부터 오늘까지
    #[serde(rename = "ytd")]
    YearToDate,
    /// 월초부터 오늘까지
    #[serde(rename = "mtd")]
    MonthToDate,
    /// 최근 30일
    #[serde(rename = "30d")]
    Last30Days,
    /// 최근 90일
    #[serde(rename = "90d")]
    Last90Days,
    /// 최근 1년
    #[serde(rename = "1y")]
    LastYear,
    /// 전체 (2020-01-01부터)
    #[serde(rename = "all")]
    All,
}

impl PeriodPreset {
    /// 기준일(`today`)에 대한 포함 날짜 구간을 계산합니다.
    pub fn date_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = match self {
            PeriodPreset::YearToDate => NaiveDate::from_ymd_opt(today.year(), 1, 1),
            PeriodPreset::MonthToDate => today.with_day(1),
            PeriodPreset::Last30Days => Some(today - Duration::days(30)),
            PeriodPreset::Last90Days => Some(today - Duration::days(90)),
            PeriodPreset::LastYear => Some(today - Duration::days(365)),
            PeriodPreset::All => NaiveDate::from_ymd_opt(2020, 1, 1),
        };
        (start.unwrap_or(today), today)
    }
}

impl FromStr for PeriodPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ytd" => Ok(Self::YearToDate),
            "mtd" => Ok(Self::MonthToDate),
            "30d" => Ok(Self::Last30Days),
            "90d" => Ok(Self::Last90Days),
            "1y" => Ok(Self::LastYear),
            "all" => Ok(Self::All),
            _ => Err(format!("Unknown period: {}", s)),
        }
    }
}

/// 거래 필터.
///
/// 비어 있는 목록 조건은 "제한 없음"을 뜻합니다. 날짜 조건은 필터 시간대 기준의
/// 포함 구간이며 거래의 기준 시각(청산 시각, 없으면 진입 시각)에 적용됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TradeFilter {
    /// 사용자 ID
    pub user_id: Option<String>,
    /// 계좌 ID 목록
    pub account_ids: Vec<String>,
    /// 시작일 (포함)
    pub start: Option<NaiveDate>,
    /// 종료일 (포함)
    pub end: Option<NaiveDate>,
    /// 자산 유형 목록
    pub asset_classes: Vec<AssetType>,
    /// 전략 태그 목록 (대소문자 무시)
    pub strategies: Vec<String>,
    /// 종목 목록 (대소문자 무시)
    pub tickers: Vec<String>,
    /// 날짜 경계와 기간 키에 사용하는 시간대
    pub timezone: Tz,
}

impl Default for TradeFilter {
    fn default() -> Self {
        Self {
            user_id: None,
            account_ids: Vec::new(),
            start: None,
            end: None,
            asset_classes: Vec::new(),
            strategies: Vec::new(),
            tickers: Vec::new(),
            timezone: Tz::UTC,
        }
    }
}

impl TradeFilter {
    /// 제한 없는 필터를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 시간대를 설정합니다.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// 날짜 구간을 설정합니다.
    pub fn with_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// 기간 프리셋으로 날짜 구간을 설정합니다.
    ///
    /// 기준일은 `now`를 필터 시간대로 변환한 날짜입니다.
    pub fn with_period(mut self, preset: PeriodPreset, now: DateTime<Utc>) -> Self {
        let (start, end) = preset.date_range(self.local_date(now));
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// 자산 유형 조건을 설정합니다.
    pub fn with_asset_classes(mut self, asset_classes: Vec<AssetType>) -> Self {
        self.asset_classes = asset_classes;
        self
    }

    /// 전략 태그 조건을 설정합니다.
    pub fn with_strategies(mut self, strategies: Vec<String>) -> Self {
        self.strategies = strategies;
        self
    }

    /// 종목 조건을 설정합니다.
    pub fn with_tickers(mut self, tickers: Vec<String>) -> Self {
        self.tickers = tickers;
        self
    }

    /// 필터 설정 자체가 유효한지 확인합니다.
    pub fn validate(&self) -> JournalResult<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(JournalError::InvalidInput(format!(
                    "시작일({})이 종료일({})보다 늦습니다",
                    start, end
                )));
            }
        }
        Ok(())
    }

    /// 시각을 필터 시간대의 날짜로 변환합니다.
    pub fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.timezone).date_naive()
    }

    /// 시작일과 종료일이 모두 지정된 경우 날짜 구간.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.start?, self.end?))
    }

    /// 빈 날짜/기간을 채울 포함 구간.
    ///
    /// 필터의 시작/종료일이 있으면 그 값을, 없으면 `first`/`last`(첫/마지막 청산일)를
    /// 사용합니다. 구간이 [`MAX_FILL_DAYS`]를 넘으면 거래가 있는 구간으로 좁히고,
    /// 그래도 넘으면 종료일 기준 마지막 `MAX_FILL_DAYS`일만 남깁니다.
    pub fn fill_range(
        &self,
        first: Option<NaiveDate>,
        last: Option<NaiveDate>,
    ) -> Option<(NaiveDate, NaiveDate)> {
        let (start, end) = (self.start.or(first)?, self.end.or(last)?);
        if start > end {
            return None;
        }
        if (end - start).num_days() < MAX_FILL_DAYS {
            return Some((start, end));
        }

        let (start, end) = match (first, last) {
            (Some(first), Some(last)) if start.max(first) <= end.min(last) => {
                (start.max(first), end.min(last))
            }
            _ => (start, end),
        };
        let floor = end.checked_sub_signed(Duration::days(MAX_FILL_DAYS - 1));
        let bounded = (floor.map_or(start, |floor| start.max(floor)), end);

        tracing::warn!(
            requested_start = ?self.start,
            requested_end = ?self.end,
            start = %bounded.0,
            end = %bounded.1,
            "Fill range too long, narrowed"
        );
        Some(bounded)
    }

    /// 거래가 필터 조건을 모두 만족하는지 확인합니다.
    pub fn matches(&self, trade: &TradeRecord) -> bool {
        if let (Some(user), Some(owner)) = (&self.user_id, &trade.user_id) {
            if user != owner {
                return false;
            }
        }

        if !self.account_ids.is_empty() {
            let Some(account) = &trade.account_id else {
                return false;
            };
            if !self.account_ids.iter().any(|a| a == account) {
                return false;
            }
        }

        if !self.asset_classes.is_empty() && !self.asset_classes.contains(&trade.asset_type) {
            return false;
        }

        if !self.tickers.is_empty()
            && !self
                .tickers
                .iter()
                .any(|t| t.trim().eq_ignore_ascii_case(&trade.symbol))
        {
            return false;
        }

        if !self.strategies.is_empty() && !self.strategies.iter().any(|s| trade.has_tag(s)) {
            return false;
        }

        let date = self.local_date(trade.effective_time());
        if self.start.is_some_and(|start| date < start) {
            return false;
        }
        if self.end.is_some_and(|end| date > end) {
            return false;
        }

        true
    }

    /// 필터를 통과한 거래의 복사본을 입력 순서대로 반환합니다.
    pub fn apply(&self, trades: &[TradeRecord]) -> Vec<TradeRecord> {
        trades.iter().filter(|t| self.matches(t)).cloned().collect()
    }
}
