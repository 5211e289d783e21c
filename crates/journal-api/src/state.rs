//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! 분석 엔진은 요청마다 전달된 거래와 필터만으로 계산하므로
//! 상태에는 읽기 전용 설정과 메타데이터만 담깁니다.

use journal_analytics::JournalAnalytics;
use journal_core::{AnalyticsConfig, AppConfig};

/// 애플리케이션 공유 상태.
///
/// Arc로 래핑되어 Axum의 State extractor를 통해 핸들러에 주입됩니다.
#[derive(Debug, Clone)]
pub struct AppState {
    /// 분석 엔진 (설정된 초기 잔고, 비율 기준, 계약 승수 포함)
    pub analytics: JournalAnalytics,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 분석 설정으로 AppState 생성.
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            analytics: JournalAnalytics::new(config),
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 전체 애플리케이션 설정에서 AppState 생성.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.analytics.clone())
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> i64 {
        (chrono::Utc::now() - self.started_at).num_seconds()
    }

    /// 분석 설정 참조.
    pub fn config(&self) -> &AnalyticsConfig {
        self.analytics.config()
    }
}

/// 테스트용 AppState 생성 (기본 분석 설정).
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    AppState::new(AnalyticsConfig::default())
}
