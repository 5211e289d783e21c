//! 설정 관리.
//!
//! 기본값 → 설정 파일(`config/default.toml`, 선택) → `JOURNAL__*` 환경 변수 순서로
//! 애플리케이션 설정을 계층적으로 로드합니다.

use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::domain::{within_trade_magnitude, ContractMultipliers, MAX_TRADE_MAGNITUDE};
use crate::error::{JournalError, JournalResult};

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 분석 설정
    pub analytics: AnalyticsConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 요청 본문 최대 크기 (바이트)
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout_secs: 30,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 샤프/소르티노 비율의 수익률 시계열 기준.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnBasis {
    /// 청산 거래별 순손익
    PerTrade,
    /// 빈 날짜를 채운 일별 자산 수익률
    Daily,
}

impl Default for ReturnBasis {
    fn default() -> Self {
        Self::PerTrade
    }
}

impl FromStr for ReturnBasis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "per_trade" | "trade" => Ok(Self::PerTrade),
            "daily" | "day" => Ok(Self::Daily),
            _ => Err(format!("Unknown return basis: {}", s)),
        }
    }
}

/// 위험 조정 비율 설정.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatioConfig {
    /// 수익률 시계열 기준
    pub basis: ReturnBasis,
    /// 연율화 여부 (√periods_per_year 곱)
    pub annualize: bool,
    /// 연간 기간 수 (일별 기준 252)
    pub periods_per_year: u32,
}

impl Default for RatioConfig {
    fn default() -> Self {
        Self {
            basis: ReturnBasis::PerTrade,
            annualize: false,
            periods_per_year: 252,
        }
    }
}

impl RatioConfig {
    /// 일별 수익률을 연율화하는 설정.
    pub fn daily_annualized() -> Self {
        Self {
            basis: ReturnBasis::Daily,
            annualize: true,
            periods_per_year: 252,
        }
    }
}

/// 분석 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// 요청에 초기 잔고가 없을 때 사용하는 값
    pub initial_balance: Decimal,
    /// 필터에 시간대가 없을 때 사용하는 시간대
    pub timezone: Tz,
    /// 샤프/소르티노 설정
    pub ratios: RatioConfig,
    /// 계약 승수
    pub multipliers: ContractMultipliers,
    /// 상위/하위 목록 크기
    pub top_n: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            initial_balance: dec!(10000),
            timezone: Tz::UTC,
            ratios: RatioConfig::default(),
            multipliers: ContractMultipliers::default(),
            top_n: 10,
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> JournalResult<Self> {
        let builder = config::Config::builder()
            // 기본값으로 시작
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("JOURNAL")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut loaded: AppConfig = builder.build()?.try_deserialize()?;
        // 설정 키는 소문자로 읽히므로 선물 루트를 다시 대문자로 맞춤
        loaded.analytics.multipliers = loaded.analytics.multipliers.with_uppercase_roots();
        loaded.validate()?;
        Ok(loaded)
    }

    /// 기본 경로(`config/default.toml`)에서 설정을 로드합니다.
    pub fn load_default() -> JournalResult<Self> {
        Self::load("config/default.toml")
    }

    /// 설정 값의 일관성을 확인합니다.
    pub fn validate(&self) -> JournalResult<()> {
        if self.analytics.ratios.periods_per_year == 0 {
            return Err(JournalError::Config(
                "analytics.ratios.periods_per_year는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.analytics.top_n == 0 {
            return Err(JournalError::Config(
                "analytics.top_n은 0보다 커야 합니다".to_string(),
            ));
        }
        if !within_trade_magnitude(self.analytics.initial_balance) {
            return Err(JournalError::Config(format!(
                "analytics.initial_balance는 ±{} 이내여야 합니다",
                MAX_TRADE_MAGNITUDE
            )));
        }
        if self.analytics.multipliers.option_multiplier <= Decimal::ZERO {
            return Err(JournalError::Config(
                "옵션 계약 승수는 0보다 커야 합니다".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.analytics.initial_balance, dec!(10000));
        assert_eq!(config.analytics.ratios.basis, ReturnBasis::PerTrade);
        assert!(!config.analytics.ratios.annualize);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.analytics.top_n, 10);
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!(
            "journal-config-test-{}.toml",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8080

[analytics]
initial_balance = 25000
timezone = "Asia/Seoul"

[analytics.ratios]
basis = "daily"
annualize = true

[analytics.multipliers.futures_point_values]
ES = 50
NKD = 5
"#
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.analytics.initial_balance, dec!(25000));
        assert_eq!(config.analytics.timezone, chrono_tz::Asia::Seoul);
        assert_eq!(config.analytics.ratios.basis, ReturnBasis::Daily);
        assert_eq!(
            config
                .analytics
                .multipliers
                .futures_point_values
                .get("NKD")
                .copied(),
            Some(dec!(5))
        );
    }

    #[test]
    fn test_validate_rejects_zero_periods() {
        let mut config = AppConfig::default();
        config.analytics.ratios.periods_per_year = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_return_basis_from_str() {
        assert_eq!("per-trade".parse::<ReturnBasis>().unwrap(), ReturnBasis::PerTrade);
        assert_eq!("DAILY".parse::<ReturnBasis>().unwrap(), ReturnBasis::Daily);
        assert!("weekly".parse::<ReturnBasis>().is_err());
    }
}
