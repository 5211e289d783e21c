//! 리포트 명령어.
//!
//! JSON 거래 파일을 정규화하고 필터를 적용한 뒤 선택한 분석 결과를 출력합니다.
//!
//! # 사용 예시
//!
//! ```bash
//! # 올해 KPI 요약 (테이블)
//! journal report kpi -i trades.json --period ytd --format table
//!
//! # 뉴욕 시간 기준 주별 손익
//! journal report rollup -i trades.json --granularity week --timezone America/New_York
//!
//! # 주식/옵션 거래의 전략별 성과
//! journal report breakdown -i trades.json --key strategy --asset-class stock,option
//!
//! # 사용자 정의 경계로 R-배수 분포
//! journal report distribution -i trades.json --attribute r-multiple --edges -1,0,1,2
//! ```

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

use journal_analytics::{
    BinSpec, BreakdownMetric, CategoryKey, CategoryRow, Distribution, DistributionAttribute,
    JournalAnalytics, KpiSummary, PeriodGranularity, Ratio, RollupOptions,
};
use journal_core::{AssetType, PeriodPreset, TradeFilter, TradeRecord};

use crate::commands::input::load_raw_trades;

/// 출력할 리포트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Equity,
    Drawdown,
    Monthly,
    Rollup,
    Kpi,
    Quality,
    Breakdown,
    Costs,
    Distribution,
    Heatmap,
    Full,
}

impl ReportKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "equity" | "equity-curve" => Ok(Self::Equity),
            "drawdown" => Ok(Self::Drawdown),
            "monthly" | "monthly-pnl" => Ok(Self::Monthly),
            "rollup" | "periods" => Ok(Self::Rollup),
            "kpi" | "summary" => Ok(Self::Kpi),
            "quality" | "trade-quality" => Ok(Self::Quality),
            "breakdown" => Ok(Self::Breakdown),
            "costs" | "fees" => Ok(Self::Costs),
            "distribution" => Ok(Self::Distribution),
            "heatmap" | "time-heatmap" => Ok(Self::Heatmap),
            "full" | "all" => Ok(Self::Full),
            _ => Err(anyhow!(
                "Invalid report: {}. Use: equity, drawdown, monthly, rollup, kpi, quality, \
                 breakdown, costs, distribution, heatmap, full",
                s
            )),
        }
    }
}

/// 출력 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    /// kpi, monthly, rollup, breakdown, distribution만 테이블을 지원 (나머지는 JSON)
    Table,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "table" => Ok(Self::Table),
            _ => Err(anyhow!("Invalid format: {}. Use: json, table", s)),
        }
    }
}

/// 필터 옵션 (명령줄 문자열)
#[derive(Debug, Clone, Default, Args)]
pub struct FilterOptions {
    /// 시작 날짜 (YYYY-MM-DD, 포함)
    #[arg(short = 'f', long)]
    pub from: Option<String>,

    /// 종료 날짜 (YYYY-MM-DD, 포함)
    #[arg(short = 't', long)]
    pub to: Option<String>,

    /// 기간 프리셋 (ytd, mtd, 30d, 90d, 1y, all)
    #[arg(long)]
    pub period: Option<String>,

    /// 날짜 경계 시간대 (예: America/New_York, 기본: 설정값)
    #[arg(long)]
    pub timezone: Option<String>,

    /// 자산 유형 (쉼표 구분: stock, option, futures, crypto)
    #[arg(long = "asset-class", value_delimiter = ',')]
    pub asset_classes: Vec<String>,

    /// 전략 태그 (쉼표 구분, 대소문자 무시)
    #[arg(long = "strategy", value_delimiter = ',')]
    pub strategies: Vec<String>,

    /// 종목 (쉼표 구분, 대소문자 무시)
    #[arg(long = "ticker", value_delimiter = ',')]
    pub tickers: Vec<String>,

    /// 계좌 ID (쉼표 구분)
    #[arg(long = "account", value_delimiter = ',')]
    pub accounts: Vec<String>,
}

impl FilterOptions {
    /// 분석 필터로 변환합니다.
    ///
    /// 기간 프리셋을 먼저 적용하고 `--from`/`--to`가 그 경계를 덮어씁니다.
    pub fn to_filter(&self, default_timezone: Tz, now: DateTime<Utc>) -> Result<TradeFilter> {
        let timezone = match &self.timezone {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| anyhow!("Invalid timezone: {} ({})", name, e))?,
            None => default_timezone,
        };

        let asset_classes = self
            .asset_classes
            .iter()
            .map(|s| s.parse::<AssetType>().map_err(|e| anyhow!(e)))
            .collect::<Result<Vec<_>>>()?;

        let mut filter = TradeFilter::new()
            .with_timezone(timezone)
            .with_asset_classes(asset_classes)
            .with_strategies(self.strategies.clone())
            .with_tickers(self.tickers.clone());
        filter.account_ids = self.accounts.clone();

        if let Some(period) = &self.period {
            let preset = period.parse::<PeriodPreset>().map_err(|e| anyhow!(e))?;
            filter = filter.with_period(preset, now);
        }
        if let Some(from) = &self.from {
            filter.start = Some(parse_date(from)?);
        }
        if let Some(to) = &self.to {
            filter.end = Some(parse_date(to)?);
        }

        filter.validate()?;
        Ok(filter)
    }
}

/// 날짜 파싱 (YYYY-MM-DD).
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date: {}. Use YYYY-MM-DD", s))
}

/// 쉼표 구분 경계값 파싱.
pub fn parse_edges(s: &str) -> Result<Vec<Decimal>> {
    s.split(',')
        .map(|edge| {
            edge.trim()
                .parse::<Decimal>()
                .with_context(|| format!("Invalid bin edge: {}", edge))
        })
        .collect()
}

/// 리포트 CLI 설정
#[derive(Debug, Clone)]
pub struct ReportCliConfig {
    /// 거래 파일 경로 (`-`면 표준 입력)
    pub input: PathBuf,
    pub kind: ReportKind,
    pub filter: TradeFilter,
    /// 초기 잔고 (없으면 설정값)
    pub initial_balance: Option<Decimal>,
    pub granularity: PeriodGranularity,
    pub include_empty: bool,
    pub key: CategoryKey,
    pub metric: BreakdownMetric,
    pub attribute: DistributionAttribute,
    /// 사용자 정의 분포 경계
    pub edges: Option<Vec<Decimal>>,
    /// 거부된 기록이 있으면 실패
    pub strict: bool,
    pub format: OutputFormat,
}

impl ReportCliConfig {
    /// 기본 옵션으로 설정 생성.
    pub fn new(input: impl Into<PathBuf>, kind: ReportKind) -> Self {
        Self {
            input: input.into(),
            kind,
            filter: TradeFilter::new(),
            initial_balance: None,
            granularity: PeriodGranularity::Month,
            include_empty: false,
            key: CategoryKey::PrimaryTag,
            metric: BreakdownMetric::NetPnl,
            attribute: DistributionAttribute::RiskMultiple,
            edges: None,
            strict: false,
            format: OutputFormat::Json,
        }
    }
}

/// 거래 파일을 읽어 리포트를 생성합니다.
///
/// 반환값은 표준 출력에 쓸 텍스트입니다.
pub fn report(analytics: &JournalAnalytics, config: &ReportCliConfig) -> Result<String> {
    let raws = load_raw_trades(&config.input)?;
    let batch = analytics.normalize(&raws);

    if !batch.is_clean() {
        if config.strict {
            bail!(
                "{} of {} records failed validation (run `journal validate` for details)",
                batch.rejected.len(),
                raws.len()
            );
        }
        warn!(
            rejected = batch.rejected.len(),
            "Skipping invalid records (use --strict to fail instead)"
        );
    }

    info!(
        report = ?config.kind,
        trades = batch.trades.len(),
        timezone = %config.filter.timezone,
        "Generating report"
    );
    run_report(analytics, &batch.trades, config)
}

/// 정규화된 거래로 리포트를 생성합니다.
pub fn run_report(
    analytics: &JournalAnalytics,
    trades: &[TradeRecord],
    config: &ReportCliConfig,
) -> Result<String> {
    let filter = &config.filter;
    let initial = config.initial_balance;
    let table = config.format == OutputFormat::Table;

    let output = match config.kind {
        ReportKind::Equity => to_json(&analytics.equity_curve(trades, filter, initial)?)?,
        ReportKind::Drawdown => to_json(&analytics.drawdown(trades, filter, initial)?)?,
        ReportKind::Monthly => {
            let monthly = analytics.monthly_pnl(trades, filter, config.include_empty)?;
            if table {
                let lines: Vec<PeriodLine<'_>> = monthly
                    .months
                    .iter()
                    .map(|m| PeriodLine {
                        period: &m.month,
                        realized: m.realized_pnl,
                        fees: m.fees,
                        net: m.net_pnl,
                        trades: m.trade_count,
                    })
                    .collect();
                let totals = PeriodLine {
                    period: "TOTAL",
                    realized: monthly.totals.realized_pnl,
                    fees: monthly.totals.fees,
                    net: monthly.totals.net_pnl,
                    trades: monthly.totals.trade_count,
                };
                format_period_table("MONTH", &lines, &totals)
            } else {
                to_json(&monthly)?
            }
        }
        ReportKind::Rollup => {
            let options =
                RollupOptions::new(config.granularity).with_empty_periods(config.include_empty);
            let report = analytics.rollup(trades, filter, &options)?;
            if table {
                let lines: Vec<PeriodLine<'_>> = report
                    .rollup
                    .periods
                    .iter()
                    .map(|p| PeriodLine {
                        period: &p.period,
                        realized: p.realized_pnl,
                        fees: p.fees,
                        net: p.net_pnl,
                        trades: p.trade_count,
                    })
                    .collect();
                let totals = PeriodLine {
                    period: "TOTAL",
                    realized: report.rollup.totals.realized_pnl,
                    fees: report.rollup.totals.fees,
                    net: report.rollup.totals.net_pnl,
                    trades: report.rollup.totals.trade_count,
                };
                format_period_table("PERIOD", &lines, &totals)
            } else {
                to_json(&report)?
            }
        }
        ReportKind::Kpi => {
            let kpi = analytics.kpi(trades, filter, initial)?;
            if table {
                format_kpi_table(&kpi)
            } else {
                to_json(&kpi)?
            }
        }
        ReportKind::Quality => to_json(&analytics.trade_quality(trades, filter)?)?,
        ReportKind::Breakdown => {
            let breakdown = analytics.breakdown(trades, filter, config.key, config.metric)?;
            if table {
                format_breakdown_table(&breakdown.items)
            } else {
                to_json(&breakdown)?
            }
        }
        ReportKind::Costs => to_json(&analytics.costs(trades, filter)?)?,
        ReportKind::Distribution => {
            let spec = config
                .edges
                .as_deref()
                .map(BinSpec::from_edges)
                .transpose()?;
            let distribution =
                analytics.distribution(trades, filter, config.attribute, spec.as_ref())?;
            if table {
                format_distribution_table(&distribution)
            } else {
                to_json(&distribution)?
            }
        }
        ReportKind::Heatmap => to_json(&analytics.time_heatmap(trades, filter)?)?,
        ReportKind::Full => to_json(&analytics.full_report(trades, filter, initial)?)?,
    };

    Ok(output)
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize report to JSON")
}

/// 비율 표시 (무한대 / 정의되지 않음 포함)
fn format_ratio(ratio: &Ratio) -> String {
    if ratio.is_infinite() {
        "Infinity".to_string()
    } else {
        ratio
            .value()
            .map(|v| v.round_dp(4).to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

/// KPI 테이블 형식 출력.
fn format_kpi_table(kpi: &KpiSummary) -> String {
    let rows = [
        ("Net P&L", kpi.net.round_dp(2).to_string()),
        ("Realized P&L", kpi.realized.round_dp(2).to_string()),
        ("Fees", kpi.fees.round_dp(2).to_string()),
        ("Trades", kpi.trade_count.to_string()),
        ("Win rate", format!("{}%", (kpi.win_rate * Decimal::ONE_HUNDRED).round_dp(2))),
        ("Avg win", kpi.avg_win.round_dp(2).to_string()),
        ("Avg loss", kpi.avg_loss.round_dp(2).to_string()),
        ("Expectancy", kpi.expectancy.round_dp(2).to_string()),
        ("Profit factor", format_ratio(&kpi.profit_factor)),
        ("Max drawdown", kpi.max_drawdown.round_dp(2).to_string()),
        ("Sharpe", format_ratio(&kpi.sharpe)),
        ("Sortino", format_ratio(&kpi.sortino)),
    ];

    let mut output = String::new();
    output.push_str(&format!("{:<16} {:>16}\n", "METRIC", "VALUE"));
    output.push_str(&"-".repeat(33));
    output.push('\n');
    for (name, value) in rows {
        output.push_str(&format!("{:<16} {:>16}\n", name, value));
    }
    output
}

struct PeriodLine<'a> {
    period: &'a str,
    realized: Decimal,
    fees: Decimal,
    net: Decimal,
    trades: usize,
}

/// 기간별 손익 테이블 형식 출력.
fn format_period_table(header: &str, lines: &[PeriodLine<'_>], totals: &PeriodLine<'_>) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{:<12} {:>14} {:>10} {:>14} {:>7}\n",
        header, "REALIZED", "FEES", "NET", "TRADES"
    ));
    output.push_str(&"-".repeat(61));
    output.push('\n');

    let mut push_line = |line: &PeriodLine<'_>| {
        output.push_str(&format!(
            "{:<12} {:>14} {:>10} {:>14} {:>7}\n",
            line.period,
            line.realized.round_dp(2),
            line.fees.round_dp(2),
            line.net.round_dp(2),
            line.trades
        ));
    };
    for line in lines {
        push_line(line);
    }
    push_line(totals);
    output
}

/// 분류별 성과 테이블 형식 출력.
fn format_breakdown_table(rows: &[CategoryRow]) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{:<24} {:<24} {:>14} {:>7}\n",
        "KEY", "LABEL", "VALUE", "TRADES"
    ));
    output.push_str(&"-".repeat(72));
    output.push('\n');
    for row in rows {
        output.push_str(&format!(
            "{:<24} {:<24} {:>14} {:>7}\n",
            truncate(&row.key, 24),
            truncate(&row.label, 24),
            row.value.round_dp(4),
            row.trade_count
        ));
    }
    output.push('\n');
    output.push_str(&format!("Total: {} categories", rows.len()));
    output
}

/// 분포 테이블 형식 출력.
fn format_distribution_table(distribution: &Distribution) -> String {
    let mut output = String::new();
    output.push_str(&format!("{:<20} {:>7}\n", "RANGE", "COUNT"));
    output.push_str(&"-".repeat(28));
    output.push('\n');
    for bin in &distribution.bins {
        output.push_str(&format!("{:<20} {:>7}\n", bin.range, bin.count));
    }
    output.push('\n');
    output.push_str(&format!(
        "Excluded (missing value): {}\nOut of range: {}",
        distribution.excluded_missing, distribution.out_of_range
    ));
    output
}

/// 문자열 자르기 (UTF-8 안전).
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
