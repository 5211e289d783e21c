//! 통합 API 에러 응답 타입.
//!
//! 모든 분석 엔드포인트에서 일관된 에러 형식을 제공합니다.
//! [`JournalError`]는 [`journal_error_response`]를 통해 HTTP 상태 코드와
//! 에러 코드로 변환됩니다.

use axum::http::{Method, StatusCode, Uri};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use journal_core::JournalError;

/// 통합 API 에러 응답.
///
/// # 예시
///
/// ```json
/// {
///   "code": "VALIDATION_ERROR",
///   "message": "거래 기록 검증 실패 (t-1): fees - 음수일 수 없습니다",
///   "details": [{"index": 0, "error": {"recordId": "t-1", "violations": []}}],
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "VALIDATION_ERROR", "INVALID_BIN_CONFIGURATION")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp, 선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// HTTP 메서드 (GET, POST 등)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// 요청 경로
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    ///
    /// # Example
    ///
    /// ```
    /// use journal_api::error::ApiErrorResponse;
    ///
    /// let error = ApiErrorResponse::new("INVALID_INPUT", "Unknown breakdown key");
    /// assert_eq!(error.code(), "INVALID_INPUT");
    /// ```
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
            method: None,
            path: None,
        }
    }

    /// 상세 정보 포함 에러 생성.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }

    /// 요청 정보(메서드, 경로)를 추가합니다.
    #[must_use]
    pub fn with_request_info(mut self, method: &Method, uri: &Uri) -> Self {
        self.method = Some(method.to_string());
        self.path = Some(uri.path().to_string());
        self
    }

    /// 에러 코드 반환.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// 에러 메시지 반환.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiErrorResponse>)>;

/// 잘못된 요청(400) 응답을 생성합니다.
pub fn bad_request(code: &str, message: impl Into<String>) -> (StatusCode, Json<ApiErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ApiErrorResponse::new(code, message)))
}

/// [`JournalError`]를 HTTP 에러 응답으로 변환합니다.
pub fn journal_error_response(err: JournalError) -> (StatusCode, Json<ApiErrorResponse>) {
    let (status, code) = match &err {
        JournalError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
        JournalError::InvalidConfiguration(_) => {
            (StatusCode::BAD_REQUEST, "INVALID_BIN_CONFIGURATION")
        }
        JournalError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
        JournalError::Serialization(_) => (StatusCode::BAD_REQUEST, "INVALID_JSON"),
        JournalError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
        JournalError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
    };

    let body = match &err {
        JournalError::Validation(validation) => match serde_json::to_value(validation) {
            Ok(details) => ApiErrorResponse::with_details(code, err.to_string(), details),
            Err(_) => ApiErrorResponse::new(code, err.to_string()),
        },
        _ => ApiErrorResponse::new(code, err.to_string()),
    };

    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use journal_core::{FieldViolation, ValidationError};

    #[test]
    fn test_api_error_response_new() {
        let error = ApiErrorResponse::new("TEST_ERROR", "Test message");
        assert_eq!(error.code, "TEST_ERROR");
        assert_eq!(error.message, "Test message");
        assert!(error.timestamp.is_some());
        assert!(error.details.is_none());
        assert!(error.method.is_none());
        assert!(error.path.is_none());
    }

    #[test]
    fn test_with_request_info() {
        let error = ApiErrorResponse::new("NOT_FOUND", "missing")
            .with_request_info(&Method::POST, &"/api/v1/analytics/kpi?x=1".parse::<Uri>().unwrap());
        assert_eq!(error.method.as_deref(), Some("POST"));
        assert_eq!(error.path.as_deref(), Some("/api/v1/analytics/kpi"));
    }

    #[test]
    fn test_json_skips_empty_fields() {
        let error = ApiErrorResponse::new("INVALID_INPUT", "bad");
        let json = serde_json::to_value(&error).unwrap();
        assert!(json.get("details").is_none());
        assert!(json.get("method").is_none());
        assert_eq!(json["code"], "INVALID_INPUT");
    }

    #[test]
    fn test_journal_error_status_mapping() {
        let (status, body) =
            journal_error_response(JournalError::InvalidConfiguration("overlap".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "INVALID_BIN_CONFIGURATION");

        let (status, body) = journal_error_response(JournalError::Io("disk".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "IO_ERROR");
    }

    #[test]
    fn test_validation_error_carries_details() {
        let validation = ValidationError::new(
            Some("t-1".to_string()),
            vec![FieldViolation::new("fees", "음수일 수 없습니다")],
        );
        let (status, body) = journal_error_response(validation.into());

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let details = body.details.clone().unwrap();
        assert_eq!(details["recordId"], "t-1");
        assert_eq!(details["violations"][0]["field"], "fees");
    }
}
