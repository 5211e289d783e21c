//! # Journal Core
//!
//! 매매일지 분석 엔진의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 모든 집계가 공유하는 기본 타입을 제공합니다:
//! - 정규화된 거래 기록과 상태 variant
//! - 원시 기록 정규화 및 필드 단위 검증
//! - 자산 유형별 손익 도출
//! - 명시적 분석 필터
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
