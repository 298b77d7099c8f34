//! 命令列結構

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Factory Plan - 產量預測與配產規劃
#[derive(Parser)]
#[command(name = "factory-plan")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 將原始試算表整理成歷史表格
    Normalize(NormalizeArgs),

    /// 預測未來各期產量並附加到歷史表格
    Forecast(ForecastArgs),

    /// 逐期求解最佳配產
    Allocate(AllocateArgs),
}

#[derive(clap::Args)]
pub struct NormalizeArgs {
    /// 原始檔案（.xlsx / .xls / .csv）
    #[arg(short, long)]
    pub input: PathBuf,

    /// 輸出 CSV
    #[arg(short, long)]
    pub output: PathBuf,

    /// 保留的指標欄位
    #[arg(short = 'M', long = "metric", default_values_t = default_metrics())]
    pub metrics: Vec<String>,
}

#[derive(clap::Args)]
pub struct ForecastArgs {
    /// 歷史 CSV
    #[arg(short, long)]
    pub input: PathBuf,

    /// 輸出 CSV
    #[arg(short, long)]
    pub output: PathBuf,

    /// 預測期數
    #[arg(short, long, default_value_t = 3)]
    pub count: usize,

    /// 預測方法（exponential / prophet）
    #[arg(short, long, default_value = "exponential")]
    pub method: String,

    /// 隨機種子
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

#[derive(clap::Args)]
pub struct AllocateArgs {
    /// 輸入 CSV（歷史或含預測）
    #[arg(short, long)]
    pub input: PathBuf,

    /// 輸出 CSV
    #[arg(short, long)]
    pub output: PathBuf,

    /// 配產參數 JSON（省略時使用預設值）
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// 無可行解時的處理方式
    #[arg(long, value_enum, default_value_t = InfeasiblePolicy::Report)]
    pub on_infeasible: InfeasiblePolicy,
}

/// 無可行解處理策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum InfeasiblePolicy {
    /// 照實輸出 Feasible = false
    #[default]
    Report,
    /// 將最低產量壓到產能上限後重試
    Clamp,
    /// 遇到第一個無可行解的期間即中止
    Abort,
}

fn default_metrics() -> Vec<String> {
    plan_core::DEFAULT_METRICS.iter().map(|s| s.to_string()).collect()
}
