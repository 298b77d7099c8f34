//! 預測模型介面

use plan_core::{MetricSeries, PlanError, Result};

/// 可擬合的預測模型
pub trait ForecastModel {
    type Fitted: FittedModel;

    /// 模型名稱
    fn name(&self) -> &str;

    /// 擬合所需的最少觀測數
    fn min_observations(&self) -> usize;

    /// 以歷史序列擬合模型
    fn fit(&self, series: &MetricSeries) -> Result<Self::Fitted>;

    /// 檢查歷史長度
    fn ensure_history(&self, series: &MetricSeries) -> Result<()> {
        let required = self.min_observations();
        if series.len() < required {
            return Err(PlanError::InsufficientHistory {
                metric: series.metric.clone(),
                required,
                actual: series.len(),
            });
        }
        Ok(())
    }
}

/// 已擬合模型
pub trait FittedModel {
    /// 預測未來 `horizon` 期（未經截斷與取整）
    fn predict(&self, horizon: usize) -> Result<Vec<f64>>;

    /// 樣本內的一步預測值
    fn fitted_values(&self) -> &[f64];

    /// 擬合參數摘要（寫入日誌）
    fn describe(&self) -> String;
}

/// 擬合後直接預測
pub(crate) fn fit_and_predict<M: ForecastModel>(
    model: &M,
    series: &MetricSeries,
    horizon: usize,
) -> Result<(Vec<f64>, String)> {
    model.ensure_history(series)?;
    let fitted = model.fit(series)?;
    let summary = format!(
        "{} sse={:.3}",
        fitted.describe(),
        in_sample_sse(&series.values(), fitted.fitted_values())
    );

    tracing::debug!("指標 {} 使用 {} 擬合完成: {}", series.metric, model.name(), summary);

    Ok((fitted.predict(horizon)?, summary))
}

/// 樣本內誤差平方和
fn in_sample_sse(actual: &[f64], fitted: &[f64]) -> f64 {
    actual.iter().zip(fitted).map(|(y, f)| (y - f).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_sample_sse() {
        assert_eq!(in_sample_sse(&[1.0, 2.0, 4.0], &[1.0, 3.0, 2.0]), 5.0);
        assert_eq!(in_sample_sse(&[], &[]), 0.0);
    }
}
