//! # Plan Forecast
//!
//! 歷史產量預測引擎

pub mod damped;
pub mod engine;
pub mod linalg;
pub mod model;
pub mod seasonal;

// Re-export 主要類型
pub use damped::DampedTrendSmoothing;
pub use engine::ForecastEngine;
pub use model::{FittedModel, ForecastModel};
pub use seasonal::AdditiveSeasonalRegression;

use chrono::NaiveDate;
use plan_core::{ForecastConfig, ForecastStrategy, HistoryRecord, MetricSeries, PlanError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 單期預測值（已截斷並取整）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: u64,
}

/// 單一指標預測結果
#[derive(Debug, Clone)]
pub struct ForecastOutput {
    pub metric: String,

    pub strategy: ForecastStrategy,

    /// 擬合參數摘要
    pub model_summary: String,

    /// 截斷取整後的預測
    pub points: Vec<ForecastPoint>,

    /// 模型原始輸出
    pub raw: Vec<f64>,

    pub warnings: Vec<ForecastWarning>,
}

/// 多指標預測結果
#[derive(Debug)]
pub struct ForecastBatch {
    /// 預測期數
    pub horizon: usize,

    /// 各指標結果（依欄位順序）
    pub outcomes: Vec<(String, plan_core::Result<ForecastOutput>)>,

    /// 計算耗時（毫秒）
    pub calculation_time_ms: Option<u128>,
}

impl ForecastBatch {
    /// 失敗的指標
    pub fn failures(&self) -> Vec<(&str, &PlanError)> {
        self.outcomes
            .iter()
            .filter_map(|(metric, outcome)| outcome.as_ref().err().map(|e| (metric.as_str(), e)))
            .collect()
    }

    /// 所有警告
    pub fn warnings(&self) -> Vec<&ForecastWarning> {
        self.outcomes
            .iter()
            .filter_map(|(_, outcome)| outcome.as_ref().ok())
            .flat_map(|output| output.warnings.iter())
            .collect()
    }

    /// 組成預測紀錄；任一指標失敗則回傳第一個錯誤
    pub fn into_records(self) -> plan_core::Result<Vec<HistoryRecord>> {
        let mut outputs = Vec::with_capacity(self.outcomes.len());
        for (_, outcome) in self.outcomes {
            outputs.push(outcome?);
        }

        // 各指標由同一最後日期推出相同的預測日期
        let dates: Vec<NaiveDate> = outputs
            .first()
            .map(|output| output.points.iter().map(|p| p.date).collect())
            .unwrap_or_default();

        let records = dates
            .into_iter()
            .enumerate()
            .map(|(step, date)| {
                let metrics: BTreeMap<String, u64> = outputs
                    .iter()
                    .map(|output| (output.metric.clone(), output.points[step].value))
                    .collect();
                HistoryRecord::forecast(date, metrics)
            })
            .collect();

        Ok(records)
    }
}

/// 預測警告
#[derive(Debug, Clone)]
pub struct ForecastWarning {
    pub metric: String,
    pub message: String,
    pub severity: WarningSeverity,
}

impl ForecastWarning {
    pub fn new(metric: String, message: String, severity: WarningSeverity) -> Self {
        Self {
            metric,
            message,
            severity,
        }
    }

    pub fn info(metric: String, message: String) -> Self {
        Self::new(metric, message, WarningSeverity::Info)
    }

    pub fn warning(metric: String, message: String) -> Self {
        Self::new(metric, message, WarningSeverity::Warning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Info,
    Warning,
}

/// 以預設配置預測單一指標
pub fn forecast(
    series: &MetricSeries,
    horizon: usize,
    strategy: ForecastStrategy,
) -> plan_core::Result<Vec<ForecastPoint>> {
    let engine = ForecastEngine::new(ForecastConfig::new(horizon, strategy))?;
    Ok(engine.forecast_series(series)?.points)
}
