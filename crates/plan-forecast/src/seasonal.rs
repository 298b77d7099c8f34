//! 加法季節迴歸
//!
//! `y(t) = k + m t + Σ δ_j (t - s_j)₊ + Σ_n [a_n cos(2πn·月/P) + b_n sin(2πn·月/P)]`
//!
//! 以懲罰式最小平方法擬合：轉折點係數 δ 懲罰 `1/changepoint_prior_scale²`，
//! 傅立葉係數懲罰 `1/seasonality_prior_scale²`，截距與斜率不懲罰。
//! y 以 max|y| 縮放、時間縮放到 [0, 1]，懲罰強度因此與資料量級無關。

use ndarray::{Array1, Array2};
use plan_core::calendar;
use plan_core::{MetricSeries, PlanError, Result, SeasonalConfig};
use std::f64::consts::PI;

use crate::linalg;
use crate::model::{FittedModel, ForecastModel};

/// 截距與斜率的數值穩定項
const UNPENALIZED_RIDGE: f64 = 1e-8;

/// 加法季節迴歸模型
#[derive(Debug, Clone)]
pub struct AdditiveSeasonalRegression {
    config: SeasonalConfig,
}

/// 已擬合的季節迴歸模型
#[derive(Debug, Clone)]
pub struct FittedSeasonalRegression {
    coefficients: Array1<f64>,
    design: DesignSpec,
    y_scale: f64,
    last_month: i64,
    fitted: Vec<f64>,
}

/// 設計矩陣規格（擬合與預測共用）
#[derive(Debug, Clone)]
struct DesignSpec {
    first_month: i64,
    t_span: f64,
    changepoints: Vec<f64>,
    period: usize,
    fourier_order: usize,
}

impl DesignSpec {
    fn width(&self) -> usize {
        2 + self.changepoints.len() + 2 * self.fourier_order
    }

    fn row(&self, month: i64) -> Vec<f64> {
        let t = (month - self.first_month) as f64 / self.t_span;
        let mut row = Vec::with_capacity(self.width());
        row.push(1.0);
        row.push(t);
        row.extend(self.changepoints.iter().map(|&s| (t - s).max(0.0)));

        let phase = month.rem_euclid(self.period as i64) as f64;
        for n in 1..=self.fourier_order {
            let angle = 2.0 * PI * n as f64 * phase / self.period as f64;
            row.push(angle.cos());
            row.push(angle.sin());
        }
        row
    }
}

impl AdditiveSeasonalRegression {
    pub fn new(config: SeasonalConfig) -> Self {
        Self { config }
    }

    /// 轉折點：均勻分布在歷史前 `changepoint_range` 段
    fn changepoints(&self, months: &[i64], first: i64, t_span: f64) -> Vec<f64> {
        let hist_size = (months.len() as f64 * self.config.changepoint_range).floor() as usize;
        if hist_size < 2 {
            return Vec::new();
        }

        let count = self.config.n_changepoints.min(hist_size - 1);
        (1..=count)
            .map(|i| {
                let idx = (i as f64 * (hist_size - 1) as f64 / count as f64).round() as usize;
                (months[idx] - first) as f64 / t_span
            })
            .collect()
    }

    /// 各係數的懲罰權重
    fn penalties(&self, design: &DesignSpec) -> Vec<f64> {
        let trend_penalty = 1.0 / self.config.changepoint_prior_scale.powi(2);
        let season_penalty = 1.0 / self.config.seasonality_prior_scale.powi(2);

        let mut penalties = vec![UNPENALIZED_RIDGE, UNPENALIZED_RIDGE];
        penalties.extend(std::iter::repeat(trend_penalty).take(design.changepoints.len()));
        penalties.extend(std::iter::repeat(season_penalty).take(2 * design.fourier_order));
        penalties
    }
}

impl ForecastModel for AdditiveSeasonalRegression {
    type Fitted = FittedSeasonalRegression;

    fn name(&self) -> &str {
        "AdditiveRegressionWithSeasonality"
    }

    fn min_observations(&self) -> usize {
        self.config.min_observations()
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

        let months: Vec<i64> = series.dates().into_iter().map(calendar::month_index).collect();
        let first_month = months[0];
        let last_month = months[months.len() - 1];
        let t_span = ((last_month - first_month) as f64).max(1.0);

        let design = DesignSpec {
            first_month,
            t_span,
            changepoints: self.changepoints(&months, first_month, t_span),
            period: self.config.period,
            fourier_order: self.config.fourier_order.min((self.config.period - 1) / 2),
        };

        let max_abs = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let y_scale = if max_abs > 0.0 { max_abs } else { 1.0 };

        // 正規方程：(XᵀX + Λ) β = Xᵀy
        let width = design.width();
        let rows: Vec<Vec<f64>> = months.iter().map(|&m| design.row(m)).collect();
        let x = Array2::from_shape_fn((rows.len(), width), |(i, j)| rows[i][j]);
        let y: Array1<f64> = values.iter().map(|v| v / y_scale).collect();

        let penalties = Array1::from(self.penalties(&design));
        let xtx = x.t().dot(&x) + Array2::from_diag(&penalties);
        let xty = x.t().dot(&y);

        let coefficients = linalg::cholesky_solve(&xtx, &xty)?;
        let fitted = (x.dot(&coefficients) * y_scale).to_vec();

        Ok(FittedSeasonalRegression {
            coefficients,
            design,
            y_scale,
            last_month,
            fitted,
        })
    }
}

impl FittedModel for FittedSeasonalRegression {
    fn predict(&self, horizon: usize) -> Result<Vec<f64>> {
        Ok((1..=horizon as i64)
            .map(|h| {
                let row = Array1::from(self.design.row(self.last_month + h));
                row.dot(&self.coefficients) * self.y_scale
            })
            .collect())
    }

    fn fitted_values(&self) -> &[f64] {
        &self.fitted
    }

    fn describe(&self) -> String {
        format!(
            "changepoints={} fourier_order={} slope={:.4} scale={:.3}",
            self.design.changepoints.len(),
            self.design.fourier_order,
            self.coefficients[1],
            self.y_scale
        )
    }
}
