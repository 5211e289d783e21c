//! 매매일지 분석 시스템의 에러 타입.
//!
//! 이 모듈은 정규화, 구간 설정, 직렬화 과정에서 발생하는 에러를 정의합니다.
//! 비율 지표의 0 나누기는 에러가 아니라 결과 안의 센티널 값으로 표현되므로
//! 여기에 포함되지 않습니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 단일 필드 위반 사항.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// 위반한 필드 이름 (외부 JSON 필드명 기준, 예: "timestampClose")
    pub field: String,
    /// 사람이 읽을 수 있는 사유
    pub reason: String,
}

impl FieldViolation {
    /// 새 위반 사항을 생성합니다.
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 원시 거래 기록 검증 실패.
///
/// 첫 번째 위반에서 멈추지 않고 위반한 모든 필드를 담습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// 식별 가능한 경우 거래 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    /// 위반 필드 목록
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    /// 위반 목록으로 검증 에러를 생성합니다.
    pub fn new(record_id: Option<String>, violations: Vec<FieldViolation>) -> Self {
        Self {
            record_id,
            violations,
        }
    }

    /// 위반한 필드 이름 목록.
    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }

    /// 특정 필드가 위반 목록에 있는지 확인합니다.
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.record_id.as_deref().unwrap_or("<unknown>");
        write!(f, "거래 기록 검증 실패 ({}): ", id)?;
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} - {}", v.field, v.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// 핵심 매매일지 에러.
#[derive(Debug, Error)]
pub enum JournalError {
    /// 설정 로드 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 거래 기록 검증 에러
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// 구간/버킷 설정 에러 (계산 시작 전에 거부)
    #[error("구간 설정 에러: {0}")]
    InvalidConfiguration(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 입출력 에러
    #[error("입출력 에러: {0}")]
    Io(String),
}

/// 매매일지 작업을 위한 Result 타입.
pub type JournalResult<T> = Result<T, JournalError>;

impl JournalError {
    /// 호출자의 입력이 원인인 에러인지 확인합니다.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            JournalError::Validation(_)
                | JournalError::InvalidConfiguration(_)
                | JournalError::InvalidInput(_)
                | JournalError::Serialization(_)
        )
    }
}

impl From<serde_json::Error> for JournalError {
    fn from(err: serde_json::Error) -> Self {
        JournalError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for JournalError {
    fn from(err: std::io::Error) -> Self {
        JournalError::Io(err.to_string())
    }
}

impl From<config::ConfigError> for JournalError {
    fn from(err: config::ConfigError) -> Self {
        JournalError::Config(err.to_string())
    }
}
