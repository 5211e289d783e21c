//! 검증 명령어.
//!
//! 거래 파일의 모든 원시 기록을 정규화해 보고, 거부된 기록과 위반 필드를
//! 빠짐없이 출력합니다.
//!
//! # 사용 예시
//!
//! ```bash
//! journal validate -i trades.json
//! journal validate -i trades.json --format json
//! ```

use anyhow::{Context, Result};
use serde::Serialize;

use journal_analytics::JournalAnalytics;
use journal_core::{RawTradeRecord, RejectedRecord};

/// 검증 결과 요약
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total: usize,
    pub accepted: usize,
    pub rejected: Vec<RejectedRecord>,
}

impl ValidationSummary {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// 원시 기록을 검증합니다.
pub fn validate_records(analytics: &JournalAnalytics, raws: &[RawTradeRecord]) -> ValidationSummary {
    let batch = analytics.normalize(raws);
    ValidationSummary {
        total: raws.len(),
        accepted: batch.trades.len(),
        rejected: batch.rejected,
    }
}

/// 사람이 읽는 형식으로 출력합니다. 거부된 기록마다 한 줄씩, 위반마다 들여쓴 줄을 씁니다.
pub fn format_summary(summary: &ValidationSummary) -> String {
    let mut output = String::new();
    for rejected in &summary.rejected {
        output.push_str(&format!(
            "#{} id={}\n",
            rejected.index,
            rejected.error.record_id.as_deref().unwrap_or("<unknown>")
        ));
        for violation in &rejected.error.violations {
            output.push_str(&format!("  {:<16} {}\n", violation.field, violation.reason));
        }
    }
    if !summary.rejected.is_empty() {
        output.push('\n');
    }
    output.push_str(&format!(
        "Total: {} records, {} accepted, {} rejected",
        summary.total,
        summary.accepted,
        summary.rejected.len()
    ));
    output
}

/// JSON 형식 출력.
pub fn format_summary_json(summary: &ValidationSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("Failed to serialize validation summary")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::input::parse_raw_trades;

    fn raws() -> Vec<RawTradeRecord> {
        parse_raw_trades(
            r#"[
                {"id": "ok", "symbol": "SPY", "quantity": 1, "entryPrice": 500,
                 "timestampOpen": "2024-05-01T14:00:00Z"},
                {"id": "bad", "symbol": "SPY", "quantity": "abc", "entryPrice": 500,
                 "fees": -1, "timestampOpen": "2024-05-01T14:00:00Z"},
                {"symbol": "QQQ"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_lists_every_rejection() {
        let summary = validate_records(&JournalAnalytics::default(), &raws());

        assert_eq!(summary.total, 3);
        assert_eq!(summary.accepted, 1);
        assert!(!summary.is_clean());
        assert_eq!(summary.rejected.len(), 2);
        assert_eq!(summary.rejected[0].index, 1);
        assert!(summary.rejected[0].error.has_field("quantity"));
        assert!(summary.rejected[0].error.has_field("fees"));
        assert!(summary.rejected[1].error.has_field("id"));
        assert!(summary.rejected[1].error.has_field("timestampOpen"));
    }

    #[test]
    fn test_format_summary() {
        let summary = validate_records(&JournalAnalytics::default(), &raws());
        let text = format_summary(&summary);

        assert!(text.contains("#1 id=bad"));
        assert!(text.contains("#2 id=<unknown>"));
        assert!(text.ends_with("Total: 3 records, 1 accepted, 2 rejected"));

        let json: serde_json::Value =
            serde_json::from_str(&format_summary_json(&summary).unwrap()).unwrap();
        assert_eq!(json["accepted"], 1);
        assert_eq!(json["rejected"][0]["error"]["recordId"], "bad");
    }
}
