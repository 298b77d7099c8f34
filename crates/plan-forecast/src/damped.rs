//! 阻尼趨勢指數平滑
//!
//! 以 `augurs_ets::AutoETS` 擬合 ETS(A,Ad,N)：加法誤差、加法阻尼趨勢、無季節。
//! 平滑參數 α、β 與阻尼係數 φ 由最大概似自動選擇，預測為
//! `ŷ_{t+h} = l_t + (φ + φ² + … + φ^h) b_t`。

use augurs_core::{Fit, Predict};
use augurs_ets::{AutoETS, FittedAutoETS};
use plan_core::{MetricSeries, PlanError, Result};
use std::fmt;

use crate::model::{FittedModel, ForecastModel};

/// 誤差、趨勢、季節成分
const MODEL_SPEC: &str = "AAN";

/// α、β、φ 與初始水準、趨勢共 5 個參數，至少再多 5 筆觀測
const MIN_OBSERVATIONS: usize = 10;

/// 阻尼趨勢指數平滑模型
#[derive(Debug, Clone, Default)]
pub struct DampedTrendSmoothing;

/// 已擬合的阻尼趨勢模型
pub struct FittedDampedTrend {
    metric: String,
    estimate: Estimate,
    fitted: Vec<f64>,
}

enum Estimate {
    Ets(Box<FittedAutoETS>),

    /// 常數序列沒有可估計的變異，直接以該值外推
    Constant(f64),
}

impl DampedTrendSmoothing {
    pub fn new() -> Self {
        Self
    }
}

impl ForecastModel for DampedTrendSmoothing {
    type Fitted = FittedDampedTrend;

    fn name(&self) -> &str {
        "DampedExponentialSmoothing"
    }

    fn min_observations(&self) -> usize {
        MIN_OBSERVATIONS
    }

    fn fit(&self, series: &MetricSeries) -> Result<Self::Fitted> {
        self.ensure_history(series)?;

        let values = series.values();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(PlanError::DataError(format!(
                "指標 {} 含有非有限數值",
                series.metric
            )));
        }

        if values.windows(2).all(|w| w[0] == w[1]) {
            return Ok(FittedDampedTrend {
                metric: series.metric.clone(),
                estimate: Estimate::Constant(values[0]),
                fitted: values,
            });
        }

        let model = AutoETS::new(1, MODEL_SPEC)
            .map_err(|e| ets_error(&series.metric, "建立", e))?
            .damped(true)
            .map_err(|e| ets_error(&series.metric, "建立", e))?;
        let fitted_model = model
            .fit(&values)
            .map_err(|e| ets_error(&series.metric, "擬合", e))?;
        let fitted = fitted_model
            .predict_in_sample(None)
            .map_err(|e| ets_error(&series.metric, "樣本內預測", e))?
            .point;

        Ok(FittedDampedTrend {
            metric: series.metric.clone(),
            estimate: Estimate::Ets(Box::new(fitted_model)),
            fitted,
        })
    }
}

impl FittedModel for FittedDampedTrend {
    fn predict(&self, horizon: usize) -> Result<Vec<f64>> {
        match &self.estimate {
            Estimate::Constant(level) => Ok(vec![*level; horizon]),
            Estimate::Ets(model) => model
                .predict(horizon, None)
                .map(|forecast| forecast.point)
                .map_err(|e| ets_error(&self.metric, "預測", e)),
        }
    }

    fn fitted_values(&self) -> &[f64] {
        &self.fitted
    }

    fn describe(&self) -> String {
        match &self.estimate {
            Estimate::Constant(level) => format!("constant level={:.3}", level),
            Estimate::Ets(_) => format!("ETS(A,Ad,N) n={}", self.fitted.len()),
        }
    }
}

impl fmt::Debug for FittedDampedTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FittedDampedTrend")
            .field("metric", &self.metric)
            .field("model", &self.describe())
            .finish()
    }
}

fn ets_error(metric: &str, stage: &str, err: impl fmt::Display) -> PlanError {
    PlanError::CalculationError(format!("指標 {} 的 ETS 模型{}失敗: {}", metric, stage, err))
}
