//! # Factory Plan
//!
//! 產量預測與配產規劃：
//! - [`forecast`]：依歷史產量預測未來各期
//! - [`allocate`]：在產能與原料預算下求解利潤最大的整數產量

pub use plan_core;
pub use plan_forecast;
pub use plan_optimizer;

pub use plan_core::{
    calendar, AllocationInput, AllocationResult, ForecastConfig, ForecastStrategy, HistoryRecord,
    HistoryStore, MetricAllocation, MetricSeries, PlanError, PlanRow, Result, SolverSettings,
};
pub use plan_forecast::{forecast, ForecastEngine, ForecastPoint};
pub use plan_optimizer::{allocate, AllocationEngine, PeriodAllocation};
