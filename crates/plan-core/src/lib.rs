//! # Plan Core
//!
//! 核心資料模型與類型定義

pub mod calendar;
pub mod config;
pub mod history;
pub mod plan;

// Re-export 主要類型
pub use config::{
    AllocationInput, ForecastConfig, ForecastStrategy, MetricAllocation,
    SeasonalConfig, SolverSettings,
};
pub use history::{HistoryRecord, HistoryStore, MetricSeries};
pub use plan::{AllocationResult, PlanRow};

/// 預設追蹤的產品線
pub const DEFAULT_METRICS: [&str; 2] = ["Fish", "Ducks"];

/// 規劃錯誤類型
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("歷史資料不足: 指標 {metric} 至少需要 {required} 筆，實際 {actual} 筆")]
    InsufficientHistory {
        metric: String,
        required: usize,
        actual: usize,
    },

    #[error("資料錯誤: {0}")]
    DataError(String),

    #[error("缺少欄位: {0}")]
    MissingColumn(String),

    #[error("無效的日期: {0}")]
    InvalidDate(String),

    #[error("不支援的預測策略: {0}")]
    UnsupportedStrategy(String),

    #[error("預測期數必須為正整數，收到 {0}")]
    InvalidHorizon(usize),

    #[error("配置錯誤: {0}")]
    ConfigError(String),

    #[error("期間 {period} 無可行解: {reason}")]
    InfeasibleAllocation { period: String, reason: String },

    #[error("求解器錯誤: {0}")]
    SolverError(String),

    #[error("計算錯誤: {0}")]
    CalculationError(String),
}

/// 錯誤分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 輸入資料格式錯誤或不足
    Data,
    /// 配置錯誤（計算開始前即失敗）
    Config,
    /// 單一期間無可行解
    Infeasible,
    /// 求解器或數值計算失敗
    Solver,
}

impl PlanError {
    /// 取得錯誤分類
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlanError::InsufficientHistory { .. }
            | PlanError::DataError(_)
            | PlanError::MissingColumn(_)
            | PlanError::InvalidDate(_) => ErrorKind::Data,
            PlanError::UnsupportedStrategy(_)
            | PlanError::InvalidHorizon(_)
            | PlanError::ConfigError(_) => ErrorKind::Config,
            PlanError::InfeasibleAllocation { .. } => ErrorKind::Infeasible,
            PlanError::SolverError(_) | PlanError::CalculationError(_) => ErrorKind::Solver,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;
