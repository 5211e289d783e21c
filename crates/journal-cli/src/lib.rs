//! 매매일지 CLI 도구 모음.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - JSON 거래 파일 로드
//! - 분석 리포트 출력 (JSON, 테이블)
//! - 원시 기록 검증

pub mod commands;
