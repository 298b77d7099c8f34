//! 預測主引擎

use chrono::NaiveDate;
use plan_core::calendar;
use plan_core::{ForecastConfig, ForecastStrategy, HistoryStore, MetricSeries, PlanError};
use rayon::prelude::*;

use crate::damped::DampedTrendSmoothing;
use crate::model::fit_and_predict;
use crate::seasonal::AdditiveSeasonalRegression;
use crate::{ForecastBatch, ForecastOutput, ForecastPoint, ForecastWarning};

/// 取整容差：浮點誤差造成的 50.000000001 不應被進位成 51
const ROUND_UP_TOLERANCE: f64 = 1e-6;

/// 預測引擎
///
/// 每個指標獨立預測，不建模指標之間的相關性。
pub struct ForecastEngine {
    config: ForecastConfig,
}

impl ForecastEngine {
    /// 創建新的預測引擎（配置錯誤在此即失敗）
    pub fn new(config: ForecastConfig) -> plan_core::Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// 單一指標預測
    pub fn forecast_series(&self, series: &MetricSeries) -> plan_core::Result<ForecastOutput> {
        let horizon = self.config.horizon;
        let last_date = series.last_date().ok_or_else(|| PlanError::InsufficientHistory {
            metric: series.metric.clone(),
            required: 1,
            actual: 0,
        })?;
        let dates = calendar::forecast_dates(last_date, horizon)?;

        let (raw, model_summary) = match self.config.strategy {
            ForecastStrategy::DampedExponentialSmoothing => fit_and_predict(
                &DampedTrendSmoothing::new(),
                series,
                horizon,
            )?,
            ForecastStrategy::AdditiveRegressionWithSeasonality => fit_and_predict(
                &AdditiveSeasonalRegression::new(self.config.seasonal.clone()),
                series,
                horizon,
            )?,
        };

        let mut warnings = Vec::new();
        let points = dates
            .into_iter()
            .zip(&raw)
            .map(|(date, &value)| {
                let (rounded, clamped) = round_up_non_negative(&series.metric, date, value)?;
                if clamped {
                    tracing::warn!(
                        "指標 {} 在 {} 預測值 {:.3} 為負，截斷為 0",
                        series.metric,
                        date,
                        value
                    );
                    warnings.push(ForecastWarning::warning(
                        series.metric.clone(),
                        format!("{} 預測值 {:.3} 為負，已截斷為 0", date, value),
                    ));
                }
                Ok(ForecastPoint {
                    date,
                    value: rounded,
                })
            })
            .collect::<plan_core::Result<Vec<_>>>()?;

        Ok(ForecastOutput {
            metric: series.metric.clone(),
            strategy: self.config.strategy,
            model_summary,
            points,
            raw,
            warnings,
        })
    }

    /// 所有指標預測（各指標獨立回報成敗）
    pub fn forecast_store(&self, store: &HistoryStore) -> ForecastBatch {
        tracing::info!(
            "開始預測：歷史 {} 筆，指標 {} 個，預測 {} 期，策略 {}，種子 {}",
            store.len(),
            store.metric_names().len(),
            self.config.horizon,
            self.config.strategy,
            self.config.seed
        );

        let start_time = std::time::Instant::now();

        let outcomes: Vec<(String, plan_core::Result<ForecastOutput>)> = store
            .metric_names()
            .par_iter()
            .map(|metric| {
                let outcome = store
                    .series(metric)
                    .and_then(|series| self.forecast_series(&series));
                if let Err(err) = &outcome {
                    tracing::error!("指標 {} 預測失敗: {}", metric, err);
                }
                (metric.clone(), outcome)
            })
            .collect();

        tracing::info!("預測完成，耗時 {:?}", start_time.elapsed());

        ForecastBatch {
            horizon: self.config.horizon,
            outcomes,
            calculation_time_ms: Some(start_time.elapsed().as_millis()),
        }
    }
}

/// 截斷負值並無條件進位
fn round_up_non_negative(
    metric: &str,
    date: NaiveDate,
    value: f64,
) -> plan_core::Result<(u64, bool)> {
    if !value.is_finite() {
        return Err(PlanError::CalculationError(format!(
            "指標 {} 在 {} 的預測值非有限: {}",
            metric, date, value
        )));
    }
    if value < 0.0 {
        return Ok((0, true));
    }

    let rounded = (value - ROUND_UP_TOLERANCE).ceil().max(0.0);
    if rounded > u64::MAX as f64 {
        return Err(PlanError::CalculationError(format!(
            "指標 {} 在 {} 的預測值溢出: {}",
            metric, date, value
        )));
    }
    Ok((rounded as u64, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_core::{HistoryRecord, SeasonalConfig};
    use rstest::rstest;
    use std::collections::BTreeMap;

    fn store(fish: impl Fn(usize) -> u64, ducks: impl Fn(usize) -> u64, n: usize) -> HistoryStore {
        let start = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        let records = (0..n)
            .map(|i| {
                HistoryRecord::new(
                    calendar::advance_months(start, i as u32).unwrap(),
                    BTreeMap::new(),
                )
                .with_metric("Fish", fish(i))
                .with_metric("Ducks", ducks(i))
            })
            .collect();
        HistoryStore::with_default_metrics(records).unwrap()
    }

    #[test]
    fn test_round_up_non_negative() {
        let date = NaiveDate::from_ymd_opt(2022, 1, 31).unwrap();
        assert_eq!(round_up_non_negative("Fish", date, 50.000000001).unwrap(), (50, false));
        assert_eq!(round_up_non_negative("Fish", date, 50.2).unwrap(), (51, false));
        assert_eq!(round_up_non_negative("Fish", date, 0.0).unwrap(), (0, false));
        assert_eq!(round_up_non_negative("Fish", date, -3.7).unwrap(), (0, true));
        assert!(round_up_non_negative("Fish", date, f64::NAN).is_err());
    }

    #[test]
    fn test_negative_trend_is_clamped() {
        // 快速下降：外推後一定為負
        let history = store(|i| 500 - 40 * i as u64 + (i % 2) as u64 * 3, |_| 10, 12);
        let engine = ForecastEngine::new(ForecastConfig::new(
            6,
            ForecastStrategy::DampedExponentialSmoothing,
        ))
        .unwrap();

        let output = engine.forecast_series(&history.series("Fish").unwrap()).unwrap();
        assert_eq!(output.points.len(), 6);
        assert!(output.raw.iter().any(|v| *v < 0.0));
        assert!(output.points.iter().any(|p| p.value == 0));
        assert!(!output.warnings.is_empty());
    }

    #[rstest]
    #[case(ForecastStrategy::DampedExponentialSmoothing)]
    #[case(ForecastStrategy::AdditiveRegressionWithSeasonality)]
    fn test_horizon_and_dates(#[case] strategy: ForecastStrategy) {
        let history = store(|i| 100 + i as u64, |i| 40 + (i % 12) as u64, 36);
        let engine = ForecastEngine::new(ForecastConfig::new(5, strategy)).unwrap();
        let output = engine.forecast_series(&history.series("Ducks").unwrap()).unwrap();

        let expected = calendar::forecast_dates(history.last_date(), 5).unwrap();
        let dates: Vec<NaiveDate> = output.points.iter().map(|p| p.date).collect();
        assert_eq!(dates, expected);
        assert!(dates[0] > history.last_date());
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
        assert!(dates.iter().all(|d| calendar::is_month_end(*d)));
    }

    #[rstest]
    #[case(ForecastStrategy::DampedExponentialSmoothing)]
    #[case(ForecastStrategy::AdditiveRegressionWithSeasonality)]
    fn test_repeated_calls_identical(#[case] strategy: ForecastStrategy) {
        let history = store(|i| 80 + (i * i % 17) as u64, |i| 30 + (i % 5) as u64, 30);
        let engine = ForecastEngine::new(ForecastConfig::new(4, strategy).with_seed(7)).unwrap();
        let series = history.series("Fish").unwrap();

        let a = engine.forecast_series(&series).unwrap();
        let b = engine.forecast_series(&series).unwrap();
        assert_eq!(a.points, b.points);
        let bits_a: Vec<u64> = a.raw.iter().map(|v| v.to_bits()).collect();
        let bits_b: Vec<u64> = b.raw.iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
    }

    #[test]
    fn test_store_reports_each_metric() {
        // 20 筆不足季節模型所需的 24 筆，兩個指標都應各自回報錯誤
        let history = store(|i| 100 + i as u64, |_| 50, 20);
        let engine = ForecastEngine::new(
            ForecastConfig::new(3, ForecastStrategy::AdditiveRegressionWithSeasonality)
                .with_seasonal(SeasonalConfig::default()),
        )
        .unwrap();

        let batch = engine.forecast_store(&history);
        assert_eq!(batch.outcomes.len(), 2);
        assert_eq!(batch.failures().len(), 2);
        assert!(matches!(
            batch.into_records(),
            Err(PlanError::InsufficientHistory { .. })
        ));
    }

    #[test]
    fn test_date_overflow_fails_each_metric() {
        // 歷史止於可表示的最後一個月，預測日期無法推算
        use chrono::Datelike;
        let year = NaiveDate::MAX.year();
        let mut dates: Vec<NaiveDate> = (1..=11u32)
            .map(|month| calendar::last_day_of_month(year, month).unwrap())
            .collect();
        dates.push(NaiveDate::MAX);

        let records = dates
            .into_iter()
            .enumerate()
            .map(|(i, date)| {
                HistoryRecord::new(date, BTreeMap::new())
                    .with_metric("Fish", 100 + 3 * i as u64)
                    .with_metric("Ducks", 50)
            })
            .collect();
        let history = HistoryStore::with_default_metrics(records).unwrap();
        let engine = ForecastEngine::new(ForecastConfig::default()).unwrap();

        let batch = engine.forecast_store(&history);
        let failures = batch.failures();
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|(_, e)| matches!(e, PlanError::InvalidDate(_))));
        assert!(matches!(batch.into_records(), Err(PlanError::InvalidDate(_))));
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let result = ForecastEngine::new(ForecastConfig::new(
            0,
            ForecastStrategy::DampedExponentialSmoothing,
        ));
        assert!(matches!(result, Err(PlanError::InvalidHorizon(0))));
    }
}
