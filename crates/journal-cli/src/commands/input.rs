//! 거래 파일 로드.
//!
//! JSON 배열 또는 `{ "trades": [...] }` 객체 형태의 파일을 읽습니다.
//! 경로가 `-`이면 표준 입력에서 읽습니다.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::info;

use journal_core::RawTradeRecord;

#[derive(Deserialize)]
#[serde(untagged)]
enum TradeFile {
    List(Vec<RawTradeRecord>),
    Wrapped { trades: Vec<RawTradeRecord> },
}

/// JSON 텍스트에서 원시 거래 기록을 파싱합니다.
pub fn parse_raw_trades(content: &str) -> Result<Vec<RawTradeRecord>> {
    let file: TradeFile =
        serde_json::from_str(content).context("Trade file must be a JSON array or {\"trades\": [...]}")?;
    Ok(match file {
        TradeFile::List(trades) | TradeFile::Wrapped { trades } => trades,
    })
}

/// 파일(또는 `-`로 표준 입력)에서 원시 거래 기록을 읽습니다.
pub fn load_raw_trades(path: &Path) -> Result<Vec<RawTradeRecord>> {
    let content = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read trades from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read trade file: {}", path.display()))?
    };

    let trades = parse_raw_trades(&content)?;
    info!(path = %path.display(), records = trades.len(), "Trade file loaded");
    Ok(trades)
}
