//! 매매일지 분석 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 전체 리포트 (JSON)
//! journal report full -i trades.json
//!
//! # 최근 90일 KPI 요약
//! journal report kpi -i trades.json --period 90d --format table
//!
//! # 분기별 손익 (빈 분기 포함)
//! journal report rollup -i trades.json --granularity quarter --include-empty
//!
//! # 거부된 기록 확인
//! journal validate -i trades.json
//! ```

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{error, info};

use journal_analytics::{BreakdownMetric, CategoryKey, DistributionAttribute, JournalAnalytics};
use journal_cli::commands::input::load_raw_trades;
use journal_cli::commands::report::{
    parse_edges, report, FilterOptions, OutputFormat, ReportCliConfig, ReportKind,
};
use journal_cli::commands::validate::{format_summary, format_summary_json, validate_records};
use journal_core::{init_logging, AppConfig, LogConfig, LogFormat};

#[derive(Parser)]
#[command(name = "journal")]
#[command(about = "Trading journal analytics CLI - 매매일지 분석 도구", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일
    #[arg(short, long, global = true, default_value = "config/default.toml")]
    config: String,

    /// 로그 레벨 (기본: 설정값, RUST_LOG가 우선)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 분석 리포트 출력
    Report {
        /// 리포트 종류 (equity, drawdown, monthly, rollup, kpi, quality, breakdown,
        /// costs, distribution, heatmap, full)
        kind: String,

        /// 거래 JSON 파일 (`-`면 표준 입력)
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        filter: FilterOptions,

        /// 초기 잔고 (기본: 설정값)
        #[arg(long)]
        initial_balance: Option<Decimal>,

        /// 집계 기간 단위 (day, week, month, quarter, year)
        #[arg(short, long, default_value = "month")]
        granularity: String,

        /// 거래 없는 기간 포함
        #[arg(long, default_value = "false")]
        include_empty: bool,

        /// 분류 기준 (strategy, tag, asset-type, symbol, account, side, weekday, hour)
        #[arg(short, long, default_value = "strategy")]
        key: String,

        /// 분류 행 값 지표 (net-pnl, realized-pnl, fees, trade-count, win-rate)
        #[arg(short, long, default_value = "net-pnl")]
        metric: String,

        /// 분포 속성 (r-multiple, mae, mfe, net-pnl, holding-hours)
        #[arg(short, long, default_value = "r-multiple")]
        attribute: String,

        /// 분포 경계값 (쉼표 구분, 예: -1,0,1,2)
        #[arg(long, allow_hyphen_values = true)]
        edges: Option<String>,

        /// 거부된 기록이 있으면 실패
        #[arg(long, default_value = "false")]
        strict: bool,

        /// 출력 형식 (json, table)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// 거래 파일 검증 (거부된 기록과 위반 필드 전체 출력)
    Validate {
        /// 거래 JSON 파일 (`-`면 표준 입력)
        #[arg(short, long)]
        input: PathBuf,

        /// 출력 형식 (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    // 표준 출력은 결과 전용, 로그는 표준 에러로
    let mut log_config = LogConfig::from(&config.logging)
        .with_format(LogFormat::Compact)
        .with_stderr(true);
    if let Some(level) = cli.log_level {
        log_config.level = level;
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let analytics = JournalAnalytics::new(config.analytics.clone());

    match cli.command {
        Commands::Report {
            kind,
            input,
            filter,
            initial_balance,
            granularity,
            include_empty,
            key,
            metric,
            attribute,
            edges,
            strict,
            format,
        } => {
            let mut report_config = ReportCliConfig::new(input, ReportKind::parse(&kind)?);
            report_config.filter = filter.to_filter(config.analytics.timezone, Utc::now())?;
            report_config.initial_balance = initial_balance;
            report_config.granularity = granularity.parse().map_err(anyhow::Error::msg)?;
            report_config.include_empty = include_empty;
            report_config.key = key.parse::<CategoryKey>().map_err(anyhow::Error::msg)?;
            report_config.metric = metric.parse::<BreakdownMetric>().map_err(anyhow::Error::msg)?;
            report_config.attribute = attribute
                .parse::<DistributionAttribute>()
                .map_err(anyhow::Error::msg)?;
            report_config.edges = edges.as_deref().map(parse_edges).transpose()?;
            report_config.strict = strict;
            report_config.format = OutputFormat::parse(&format)?;

            match report(&analytics, &report_config) {
                Ok(output) => println!("{}", output),
                Err(e) => {
                    error!("Report failed: {:#}", e);
                    return Err(e);
                }
            }
        }

        Commands::Validate { input, format } => {
            let raws = load_raw_trades(&input)?;
            let summary = validate_records(&analytics, &raws);

            let output = match OutputFormat::parse(&format)? {
                OutputFormat::Table => format_summary(&summary),
                OutputFormat::Json => format_summary_json(&summary)?,
            };
            println!("{}", output);

            if !summary.is_clean() {
                error!(rejected = summary.rejected.len(), "Validation failed");
                std::process::exit(1);
            }
            info!(records = summary.total, "All records valid");
        }
    }

    Ok(())
}
